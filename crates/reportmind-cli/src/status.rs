//! `reportmind status` — show configuration, provider and tool status.

use anyhow::Result;
use colored::Colorize;

use reportmind_core::config::{get_config_path, load_config, ProviderFlavor};
use reportmind_core::utils::expand_home;

/// Scripts the report tools run.
const TOOL_SCRIPTS: &[(&str, &str)] = &[
    ("splitExcel", "Script_particion_excel_to_csv.py"),
    ("retrieveKnowledgeBase", "Retrieve_knowledgeBase.py"),
    ("readCSV", "Read_CSV.py"),
    ("createChart", "mcp_matplotlib.py"),
];

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "📊 ReportMind Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        found(config_path.exists())
    );

    let flavor = match config.provider.flavor {
        ProviderFlavor::OpenAi => "OpenAI",
        ProviderFlavor::Azure => "Azure OpenAI",
    };
    let key = if config.provider.is_configured() {
        format!("{} (key set)", "✓".green())
    } else {
        format!("{}", "· not configured".dimmed())
    };
    println!("  {:<18} {} {}", "Provider:".bold(), flavor, key);
    if let Some(deployment) = &config.provider.deployment {
        println!("  {:<18} {}", "Deployment:".bold(), deployment);
    }
    println!("  {:<18} {}", "Model:".bold(), config.agent.model);
    println!(
        "  {:<18} {} | max_tokens: {}",
        "Parameters:".bold(),
        format!("temp: {}", config.agent.temperature).dimmed(),
        format!("{}", config.agent.max_tokens).dimmed(),
    );
    println!(
        "  {:<18} threshold {} | keep {}",
        "Compaction:".bold(),
        config.agent.compaction.threshold,
        config.agent.compaction.keep_recent
    );

    println!();
    let scripts_dir = expand_home(&config.tools.scripts_dir);
    println!(
        "  {:<18} {} {}",
        "Scripts:".bold(),
        scripts_dir.display(),
        found(scripts_dir.is_dir())
    );
    for (tool, script) in TOOL_SCRIPTS {
        println!(
            "    {:<22} {}",
            tool,
            found(scripts_dir.join(script).is_file())
        );
    }

    println!();
    let auth = if config.attachments.auth.is_configured() {
        format!("{} (client credentials set)", "✓".green())
    } else {
        format!("{}", "· anonymous only".dimmed())
    };
    println!("  {:<18} {}", "Attachments:".bold(), auth);
    let sessions = if config.sessions.persist {
        expand_home(&config.sessions.dir).display().to_string()
    } else {
        "in memory".dimmed().to_string()
    };
    println!("  {:<18} {}", "Sessions:".bold(), sessions);
    println!();

    Ok(())
}

fn found(exists: bool) -> String {
    if exists {
        "✓".green().to_string()
    } else {
        "(not found)".red().to_string()
    }
}

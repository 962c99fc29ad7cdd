//! `reportmind onboard` — initialize configuration and data directories.

use anyhow::Result;
use colored::Colorize;

use reportmind_core::config::{get_config_path, save_config, Config};
use reportmind_core::utils::{expand_home, get_data_path};

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "📊 ReportMind — Setup".cyan().bold());
    println!();

    let config_path = get_config_path();
    let config = Config::default();

    if config_path.exists() {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    } else {
        save_config(&config, Some(&config_path))?;
        println!(
            "  {} created config at {}",
            "✓".green(),
            config_path.display()
        );
    }

    let dirs = [
        ("scripts", expand_home(&config.tools.scripts_dir)),
        ("data", expand_home(&config.tools.data_dir)),
        ("raw uploads", expand_home(&config.attachments.raw_dir)),
        ("sessions", expand_home(&config.sessions.dir)),
        ("history", get_data_path().join("history")),
    ];
    for (label, dir) in dirs {
        std::fs::create_dir_all(&dir)?;
        println!("  {} {} dir at {}", "✓".green(), label, dir.display());
    }

    println!();
    println!(
        "  Put the tool scripts in {} and set {} (or {}).",
        expand_home(&config.tools.scripts_dir).display(),
        "provider.apiKey".bold(),
        "REPORTMIND_PROVIDER__API_KEY".bold()
    );
    println!(
        "{}",
        "  Setup complete! Run `reportmind agent` to start chatting.".green()
    );
    println!();

    Ok(())
}

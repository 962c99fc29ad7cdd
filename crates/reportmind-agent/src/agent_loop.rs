//! Orchestration loop — drives one inbound turn through the state machine.
//!
//! ```text
//! Idle → [attachment ingestion] → Decision → [tool dispatch] → [Finalize] → Replied → CompactionCheck
//! ```
//!
//! Each turn holds its conversation's lock from start to finish, so turns
//! for one conversation are serialized while different conversations run
//! concurrently.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::{debug, error, info, warn};

use reportmind_core::bus::queue::MessageBus;
use reportmind_core::bus::types::{InboundMessage, OutboundMessage};
use reportmind_core::config::Config;
use reportmind_core::types::{BinaryAttachment, InboundAttachment};
use reportmind_core::utils::expand_home;
use reportmind_core::{ConversationMemory, SessionRegistry};
use reportmind_providers::LlmProvider;

use crate::attachments::AttachmentFetcher;
use crate::compaction::CompactionPolicy;
use crate::context::PromptAssembler;
use crate::error::{IngestionError, ToolFailure, TurnError};
use crate::gateway::{Decision, ModelGateway};
use crate::tools::registry::{ToolInvocationRequest, ToolInvocationResult};
use crate::tools::{default_registry, ToolRegistry, SPLIT_EXCEL_TOOL};

/// Tool turn content recorded when a result was shown to the user directly.
const DELIVERED_TOOL_CONTENT: &str = "Chart created and displayed.";

/// How a turn ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Attachment-only turn: the dataset was ingested, no model call made.
    IngestedOnly { dataset: String },
    /// The model answered, directly or after tools.
    Answered { text: String },
    /// A tool result was delivered as an attachment; finalization skipped.
    AttachmentDelivered { caption: String },
}

// ─────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────

pub struct Orchestrator {
    bus: Arc<MessageBus>,
    sessions: SessionRegistry,
    assembler: PromptAssembler,
    gateway: ModelGateway,
    tools: ToolRegistry,
    compaction: CompactionPolicy,
    fetcher: AttachmentFetcher,
}

impl Orchestrator {
    /// Orchestrator with in-memory sessions and default prompt, compaction
    /// and attachment settings.
    pub fn new(bus: Arc<MessageBus>, gateway: ModelGateway, tools: ToolRegistry) -> Self {
        let defaults = Config::default();
        Self {
            bus,
            sessions: SessionRegistry::new(),
            assembler: PromptAssembler::default(),
            gateway,
            tools,
            compaction: CompactionPolicy::default(),
            fetcher: AttachmentFetcher::from_config(&defaults.attachments),
        }
    }

    /// Wire everything from `config`.
    pub fn from_config(
        config: &Config,
        bus: Arc<MessageBus>,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let sessions = if config.sessions.persist {
            SessionRegistry::with_persistence(expand_home(&config.sessions.dir))?
        } else {
            SessionRegistry::new()
        };
        let orchestrator = Self {
            bus,
            sessions,
            assembler: PromptAssembler::from_config(&config.agent)?,
            gateway: ModelGateway::from_config(provider, &config.agent),
            tools: default_registry(&config.tools),
            compaction: CompactionPolicy::from_config(&config.agent.compaction),
            fetcher: AttachmentFetcher::from_config(&config.attachments),
        };
        info!(
            model = %orchestrator.gateway.model(),
            provider = %orchestrator.gateway.provider_name(),
            tools = orchestrator.tools.len(),
            persistent_sessions = orchestrator.sessions.is_persistent(),
            "orchestrator initialized"
        );
        Ok(orchestrator)
    }

    pub fn with_sessions(mut self, sessions: SessionRegistry) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_compaction(mut self, compaction: CompactionPolicy) -> Self {
        self.compaction = compaction;
        self
    }

    pub fn with_fetcher(mut self, fetcher: AttachmentFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// Consume inbound turns until the bus closes, one task per turn.
    pub async fn run(self: Arc<Self>) {
        info!("orchestrator started, waiting for turns");
        while let Some(msg) = self.bus.consume_inbound().await {
            debug!(conversation = %msg.conversation_id, "received turn");
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                this.handle_turn(&msg).await;
            });
        }
        info!("inbound channel closed, orchestrator exiting");
    }

    /// Process `msg` and publish a notice if the turn fails.
    pub async fn handle_turn(&self, msg: &InboundMessage) -> Option<TurnOutcome> {
        match self.process_turn(msg).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(conversation = %msg.conversation_id, error = %e, "turn failed");
                self.publish(msg, e.user_message()).await;
                None
            }
        }
    }

    /// Run one turn under the conversation's lock and persist the result.
    ///
    /// Turns appended before a failure are kept.
    pub async fn process_turn(&self, msg: &InboundMessage) -> Result<TurnOutcome, TurnError> {
        let handle = self.sessions.handle(&msg.conversation_id);
        let mut memory = handle.lock().await;

        let result = self.drive(msg, &mut memory).await;
        if let Err(e) = self.sessions.persist(&memory) {
            warn!(conversation = %msg.conversation_id, error = %e, "failed to persist conversation");
        }
        result
    }

    async fn drive(
        &self,
        msg: &InboundMessage,
        memory: &mut ConversationMemory,
    ) -> Result<TurnOutcome, TurnError> {
        let conversation = msg.conversation_id.as_str();

        // Attachment ingestion
        if let Some(attachment) = msg.dataset_attachment() {
            self.publish(msg, format!("📎 File received: {}. Processing...", attachment.name))
                .await;
            let report = self.ingest(attachment).await?;
            self.publish(msg, report).await;

            let dataset = attachment.dataset_name();
            memory.set_active_dataset(&dataset);
            info!(conversation, dataset = %dataset, "dataset ingested");

            if msg.content.trim().is_empty() {
                return Ok(TurnOutcome::IngestedOnly { dataset });
            }
        }

        // Decision
        memory.push_user(&msg.content);
        let decision = self
            .gateway
            .decide(&self.assembler.assemble(memory), &self.tools.get_definitions())
            .await?;

        let (content, calls) = match decision {
            Decision::Final(text) => {
                info!(conversation, "answered directly");
                return self.reply(msg, memory, text).await;
            }
            Decision::ToolCalls { content, calls } => (content, calls),
        };

        // Tool dispatch
        memory.push_tool_calls(content, calls.clone())?;
        let requests: Vec<ToolInvocationRequest> = calls.iter().map(ToolInvocationRequest::from).collect();
        for request in &requests {
            if let Some(notice) = self.tools.progress_notice(request) {
                self.publish(msg, notice).await;
            }
        }
        let results = self.tools.invoke_batch(&requests).await;

        let mut delivered: Vec<(String, BinaryAttachment)> = Vec::new();
        for (request, result) in requests.iter().zip(&results) {
            match result.attachment() {
                Some(attachment) => {
                    memory.push_tool_result(&result.correlation_id, DELIVERED_TOOL_CONTENT)?;
                    delivered.push((chart_caption(request), attachment.clone()));
                }
                None => memory.push_tool_result(&result.correlation_id, result.turn_content())?,
            }
        }
        info!(
            conversation,
            tools = results.len(),
            failed = results.iter().filter(|r| !r.is_success()).count(),
            "tool batch complete"
        );

        if !delivered.is_empty() {
            return self.deliver(msg, memory, delivered).await;
        }

        // Finalization
        let text = self.gateway.finalize(&self.assembler.assemble(memory)).await?;
        self.reply(msg, memory, text).await
    }

    /// Fetch the attachment and run it through the ingestion tool.
    ///
    /// Memory is not touched; the caller records the dataset on success.
    async fn ingest(&self, attachment: &InboundAttachment) -> Result<String, IngestionError> {
        self.fetcher.fetch(attachment).await?;

        let request = ToolInvocationRequest::new(
            format!("ingest_{}", uuid::Uuid::new_v4().simple()),
            SPLIT_EXCEL_TOOL,
            json!({ "fileName": attachment.name }).to_string(),
        );
        let ToolInvocationResult { outcome, .. } = self.tools.invoke(&request).await;
        match outcome {
            Ok(output) => Ok(output.text),
            Err(ToolFailure::Execution { reason, .. }) => Err(IngestionError::Processing(reason)),
            Err(other) => Err(IngestionError::Processing(other.to_string())),
        }
    }

    /// Append the final answer, send it, then run the compaction check.
    async fn reply(
        &self,
        msg: &InboundMessage,
        memory: &mut ConversationMemory,
        text: String,
    ) -> Result<TurnOutcome, TurnError> {
        memory.push_assistant(&text)?;
        self.publish(msg, &text).await;
        self.compaction.apply(&self.gateway, memory).await?;
        Ok(TurnOutcome::Answered { text })
    }

    /// Surface attachments directly and acknowledge them instead of finalizing.
    async fn deliver(
        &self,
        msg: &InboundMessage,
        memory: &mut ConversationMemory,
        delivered: Vec<(String, BinaryAttachment)>,
    ) -> Result<TurnOutcome, TurnError> {
        let mut captions = Vec::with_capacity(delivered.len());
        for (caption, attachment) in delivered {
            info!(
                conversation = %msg.conversation_id,
                name = %attachment.name,
                bytes = attachment.data.len(),
                "delivering attachment"
            );
            let outbound = OutboundMessage::new(&msg.channel, &msg.conversation_id, &caption)
                .with_attachment(attachment);
            if let Err(e) = self.bus.publish_outbound(outbound).await {
                warn!(error = %e, "failed to publish attachment");
            }
            captions.push(caption);
        }

        let caption = captions.join("\n");
        memory.push_assistant(&caption)?;
        self.compaction.apply(&self.gateway, memory).await?;
        Ok(TurnOutcome::AttachmentDelivered { caption })
    }

    async fn publish(&self, msg: &InboundMessage, content: impl Into<String>) {
        let outbound = OutboundMessage::new(&msg.channel, &msg.conversation_id, content);
        if let Err(e) = self.bus.publish_outbound(outbound).await {
            warn!(error = %e, "failed to publish outbound message");
        }
    }
}

/// Acknowledgment recorded and shown for a delivered chart.
fn chart_caption(request: &ToolInvocationRequest) -> String {
    let title = request
        .arguments()
        .ok()
        .and_then(|args| args.get("title").and_then(|t| t.as_str()).map(str::to_string))
        .unwrap_or_default();
    format!("Here is the chart: {title}")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

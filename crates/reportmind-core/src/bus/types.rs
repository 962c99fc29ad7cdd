//! Bus event types — turns flowing between a hosting channel and the agent loop.

use crate::types::{BinaryAttachment, InboundAttachment};
use chrono::{DateTime, Utc};

/// An inbound user turn.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Channel name (e.g. "teams", "cli").
    pub channel: String,
    /// Conversation identifier; the key of the conversation memory.
    pub conversation_id: String,
    /// Free text typed by the user (may be empty for attachment-only turns).
    pub content: String,
    /// When the turn was received.
    pub timestamp: DateTime<Utc>,
    /// Files attached to the turn.
    pub attachments: Vec<InboundAttachment>,
}

impl InboundMessage {
    /// Create a new inbound turn without attachments.
    pub fn new(
        channel: impl Into<String>,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        InboundMessage {
            channel: channel.into(),
            conversation_id: conversation_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
        }
    }

    /// Builder-style attachment.
    pub fn with_attachment(mut self, attachment: InboundAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// First attachment that is an ingestible dataset, if any.
    pub fn dataset_attachment(&self) -> Option<&InboundAttachment> {
        self.attachments.iter().find(|a| a.is_dataset())
    }
}

/// An outbound message from the agent to a channel.
#[derive(Clone, Debug)]
pub struct OutboundMessage {
    /// Target channel name.
    pub channel: String,
    /// Target conversation.
    pub conversation_id: String,
    /// Text content to send.
    pub content: String,
    /// Binary payload to surface directly (rendered chart).
    pub attachment: Option<BinaryAttachment>,
}

impl OutboundMessage {
    /// Create a new text-only outbound message.
    pub fn new(
        channel: impl Into<String>,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        OutboundMessage {
            channel: channel.into(),
            conversation_id: conversation_id.into(),
            content: content.into(),
            attachment: None,
        }
    }

    /// Attach a binary payload.
    pub fn with_attachment(mut self, attachment: BinaryAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttachmentRef;

    #[test]
    fn test_inbound_message_creation() {
        let msg = InboundMessage::new("teams", "c1", "What was total claims in Q1?");
        assert_eq!(msg.channel, "teams");
        assert_eq!(msg.conversation_id, "c1");
        assert!(msg.attachments.is_empty());
        assert!(msg.dataset_attachment().is_none());
    }

    #[test]
    fn test_dataset_attachment_skips_non_excel() {
        let msg = InboundMessage::new("teams", "c1", "")
            .with_attachment(InboundAttachment::new("notes.txt", None))
            .with_attachment(InboundAttachment::new(
                "Book2.xlsx",
                Some(AttachmentRef::Direct("https://files/Book2.xlsx".into())),
            ));

        let dataset = msg.dataset_attachment().unwrap();
        assert_eq!(dataset.name, "Book2.xlsx");
    }

    #[test]
    fn test_outbound_with_attachment() {
        let msg = OutboundMessage::new("teams", "c1", "Here is the chart: Claims").with_attachment(
            BinaryAttachment {
                mime_type: "image/png".into(),
                name: "chart.png".into(),
                data: vec![1, 2, 3],
            },
        );
        assert_eq!(msg.attachment.as_ref().unwrap().data.len(), 3);
    }
}

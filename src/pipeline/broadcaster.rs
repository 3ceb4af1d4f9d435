use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{DeliveryReport, TranslationResult};
use crate::session::{Recipient, ServerMessage, TranslationOutput};

/// Best-effort, at-most-once delivery of a language result to a partition
#[derive(Debug, Clone, Default)]
pub struct DeliveryBroadcaster {
    public_base_url: Option<String>,
}

impl DeliveryBroadcaster {
    pub fn new(public_base_url: Option<String>) -> Self {
        Self { public_base_url }
    }

    pub fn artifact_address(&self, result: &TranslationResult) -> String {
        result.artifact.address(self.public_base_url.as_deref())
    }

    /// Send to every recipient captured in the snapshot. A listener that is
    /// gone or saturated is skipped; the others are unaffected.
    pub fn deliver(
        &self,
        utterance_id: Uuid,
        original_text: &str,
        result: &TranslationResult,
        recipients: &[Recipient],
    ) -> DeliveryReport {
        let output = TranslationOutput {
            utterance_id,
            original_text: original_text.to_string(),
            translated_text: result.translated_text.clone(),
            artifact_address: self.artifact_address(result),
            language: result.language.clone(),
        };

        let mut report = DeliveryReport::default();
        for recipient in recipients {
            match recipient.try_send(ServerMessage::TranslationOutput(output.clone())) {
                Ok(()) => report.delivered.push(recipient.id),
                Err(failure) => {
                    warn!(
                        utterance_id = %utterance_id,
                        listener_id = %recipient.id,
                        language = %result.language,
                        "Delivery skipped: {}",
                        failure
                    );
                    report.failed.push(failure);
                }
            }
        }

        debug!(
            utterance_id = %utterance_id,
            language = %result.language,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Partition delivered"
        );

        report
    }
}

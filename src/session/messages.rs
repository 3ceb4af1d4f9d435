use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message sent by a connection to the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register (or re-register) with a target language
    Join {
        #[serde(default)]
        language: Option<String>,
    },

    /// Change the target language of this connection
    SetLanguage { language: String },

    /// Speaker audio, base64-encoded (data URLs accepted)
    VoiceInput {
        #[serde(rename = "audioBytes", alias = "audio_bytes", alias = "audio")]
        audio_bytes: String,
        /// Declared encoding, e.g. "webm" or "audio/wav"
        #[serde(default)]
        encoding: Option<String>,
    },
}

/// Result of one language partition, as delivered to a listener
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationOutput {
    pub utterance_id: Uuid,
    pub original_text: String,
    pub translated_text: String,
    pub artifact_address: String,
    pub language: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidMessage,
    UnsupportedLanguage,
    UnknownListener,
    IngestError,
}

/// Message sent by the server to a connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Joined { listener_id: Uuid, language: String },

    LanguageSet { language: String },

    /// The utterance was queued for processing
    #[serde(rename_all = "camelCase")]
    Accepted { utterance_id: Uuid },

    TranslationOutput(TranslationOutput),

    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }
}

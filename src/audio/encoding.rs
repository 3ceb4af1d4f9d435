use serde::{Deserialize, Serialize};

/// Declared encoding of an inbound audio payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    Wav,
    Webm,
    Ogg,
    Mp3,
    Flac,
    M4a,
    /// Not declared by the sender (raw binary frames)
    #[default]
    Unknown,
}

impl AudioEncoding {
    /// Parse a declared encoding. Accepts bare names ("webm"), file
    /// extensions (".wav") and MIME types ("audio/webm;codecs=opus").
    pub fn from_declared(declared: &str) -> Self {
        let value = declared.trim().to_ascii_lowercase();
        let value = value.split(';').next().unwrap_or_default().trim();
        let value = value.rsplit('/').next().unwrap_or_default();
        let value = value.trim_start_matches('.');

        match value {
            "wav" | "wave" | "x-wav" | "vnd.wave" => AudioEncoding::Wav,
            "webm" => AudioEncoding::Webm,
            "ogg" | "oga" | "opus" => AudioEncoding::Ogg,
            "mp3" | "mpeg" | "mpga" => AudioEncoding::Mp3,
            "flac" | "x-flac" => AudioEncoding::Flac,
            "m4a" | "mp4" | "x-m4a" | "aac" => AudioEncoding::M4a,
            _ => AudioEncoding::Unknown,
        }
    }

    /// Guess from an uploaded file name, e.g. "recording.webm"
    pub fn from_file_name(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((_, ext)) => Self::from_declared(ext),
            None => AudioEncoding::Unknown,
        }
    }

    pub fn extension(&self) -> Option<&'static str> {
        match self {
            AudioEncoding::Wav => Some("wav"),
            AudioEncoding::Webm => Some("webm"),
            AudioEncoding::Ogg => Some("ogg"),
            AudioEncoding::Mp3 => Some("mp3"),
            AudioEncoding::Flac => Some("flac"),
            AudioEncoding::M4a => Some("m4a"),
            AudioEncoding::Unknown => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioEncoding::Wav => "audio/wav",
            AudioEncoding::Webm => "audio/webm",
            AudioEncoding::Ogg => "audio/ogg",
            AudioEncoding::Mp3 => "audio/mpeg",
            AudioEncoding::Flac => "audio/flac",
            AudioEncoding::M4a => "audio/mp4",
            AudioEncoding::Unknown => "application/octet-stream",
        }
    }

    /// File name used when forwarding the payload to a transcription engine
    pub fn upload_file_name(&self) -> String {
        format!("utterance.{}", self.extension().unwrap_or("bin"))
    }
}

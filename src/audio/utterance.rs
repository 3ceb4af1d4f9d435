use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::Cursor;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;
use uuid::Uuid;

use super::encoding::AudioEncoding;
use crate::config::IngestConfig;
use crate::error::IngestError;

/// Raw audio of one utterance. Owned by exactly one pipeline run and
/// dropped as soon as transcription returns.
#[derive(Debug)]
pub struct UtteranceAudio {
    pub bytes: Bytes,
    pub encoding: AudioEncoding,
}

impl UtteranceAudio {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One inbound audio submission from the speaker
#[derive(Debug)]
pub struct Utterance {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    /// Duration reported by the container, when it could be read
    pub duration_ms: Option<u64>,
    pub audio: UtteranceAudio,
}

/// What the container probe found out about a payload
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeInfo {
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
    pub duration_ms: Option<u64>,
}

impl Utterance {
    /// Validate an inbound payload and wrap it as an utterance.
    pub fn ingest(
        bytes: Bytes,
        encoding: AudioEncoding,
        limits: &IngestConfig,
    ) -> Result<Self, IngestError> {
        if bytes.is_empty() {
            return Err(IngestError::Empty);
        }

        if bytes.len() > limits.max_bytes {
            return Err(IngestError::TooLarge {
                size: bytes.len(),
                limit: limits.max_bytes,
            });
        }

        let duration_ms = if limits.probe_audio {
            probe_container(&bytes, encoding)?.duration_ms
        } else {
            None
        };

        let utterance = Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            duration_ms,
            audio: UtteranceAudio { bytes, encoding },
        };

        debug!(
            utterance_id = %utterance.id,
            bytes = utterance.audio.len(),
            encoding = ?encoding,
            duration_ms = ?duration_ms,
            "Utterance ingested"
        );

        Ok(utterance)
    }

    /// Decode a base64 payload from a JSON frame, then ingest it.
    pub fn ingest_base64(
        encoded: &str,
        encoding: AudioEncoding,
        limits: &IngestConfig,
    ) -> Result<Self, IngestError> {
        use base64::Engine;

        // Browsers send data URLs ("data:audio/webm;base64,....")
        let payload = match encoded.split_once(";base64,") {
            Some((_, data)) => data,
            None => encoded,
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| IngestError::Malformed(format!("invalid base64: {}", e)))?;

        Self::ingest(Bytes::from(bytes), encoding, limits)
    }
}

/// Check that the payload is a recognisable audio container.
pub fn probe_container(bytes: &Bytes, encoding: AudioEncoding) -> Result<ProbeInfo, IngestError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.clone())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = encoding.extension() {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| IngestError::Malformed(format!("unrecognised audio container: {}", e)))?;

    let Some(track) = probed.format.default_track() else {
        return Err(IngestError::Malformed("no audio track".to_string()));
    };

    let params = &track.codec_params;
    let duration_ms = match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => Some(frames * 1000 / rate as u64),
        _ => None,
    };

    Ok(ProbeInfo {
        sample_rate: params.sample_rate,
        channels: params.channels.map(|c| c.count()),
        duration_ms,
    })
}

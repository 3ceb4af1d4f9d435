use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub languages: LanguagesConfig,
    pub artifacts: ArtifactsConfig,
    pub ingest: IngestConfig,
    pub engines: EnginesConfig,
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    /// Prefix for artifact addresses sent to listeners (e.g. "https://relay.example.com").
    /// When unset, addresses are server-relative ("/tts/<id>").
    pub public_base_url: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voice-relay".to_string(),
            http: HttpConfig::default(),
            public_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LanguagesConfig {
    /// Fallback language for new connections
    pub default: String,
    /// Supported language code -> synthesis voice
    pub voices: BTreeMap<String, String>,
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        let voices = ["en", "es", "fr", "de", "it", "pt", "ja", "ko", "zh", "hi"]
            .into_iter()
            .map(|code| (code.to_string(), code.to_string()))
            .collect();

        Self {
            default: "en".to_string(),
            voices,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub mime_type: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("voice-relay").join("artifacts"),
            ttl_secs: 3600, // 1 hour
            sweep_interval_secs: 60,
            mime_type: "audio/mpeg".to_string(),
        }
    }
}

impl ArtifactsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_bytes: usize,
    /// Reject payloads whose container format cannot be recognised
    pub probe_audio: bool,
    /// Utterances that waited longer than this are dropped before
    /// transcription; 0 disables the check
    pub max_age_secs: u64,
}

impl IngestConfig {
    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_secs > 0).then(|| Duration::from_secs(self.max_age_secs))
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_bytes: 25 * 1024 * 1024,
            probe_audio: true,
            max_age_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
    pub transcription: EngineConfig,
    pub translation: EngineConfig,
    pub synthesis: EngineConfig,
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            transcription: EngineConfig {
                url: "http://127.0.0.1:8000/v1/audio/transcriptions".to_string(),
                model: Some("whisper-small".to_string()),
                ..EngineConfig::default()
            },
            translation: EngineConfig {
                url: "http://127.0.0.1:5001/translate".to_string(),
                ..EngineConfig::default()
            },
            synthesis: EngineConfig {
                url: "http://127.0.0.1:8000/v1/audio/speech".to_string(),
                model: Some("tts-1".to_string()),
                ..EngineConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            model: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Outbound messages buffered per listener before sends are dropped
    pub outbox_capacity: usize,
    /// Pending utterances buffered per speaker
    pub queue_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 64,
            queue_capacity: 16,
        }
    }
}

impl Config {
    /// Load from an optional file (extension inferred) overlaid with
    /// `VOICE_RELAY__SECTION__KEY` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("VOICE_RELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

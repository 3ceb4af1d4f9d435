use std::collections::BTreeMap;

use crate::config::LanguagesConfig;

/// Supported target languages and the synthesis voice for each
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    default: String,
    voices: BTreeMap<String, String>,
}

impl LanguageCatalog {
    pub fn new(default: impl Into<String>, voices: BTreeMap<String, String>) -> Self {
        let voices: BTreeMap<String, String> = voices
            .into_iter()
            .map(|(code, voice)| (normalize(&code), voice))
            .collect();
        let mut default = normalize(&default.into());

        // The fallback must itself be deliverable
        if !voices.contains_key(&default) {
            if let Some(first) = voices.keys().next() {
                default = first.clone();
            }
        }

        Self { default, voices }
    }

    pub fn from_config(config: &LanguagesConfig) -> Self {
        Self::new(config.default.clone(), config.voices.clone())
    }

    pub fn default_language(&self) -> &str {
        &self.default
    }

    pub fn is_supported(&self, language: &str) -> bool {
        self.voices.contains_key(&normalize(language))
    }

    /// Canonical code for a supported language, `None` otherwise
    pub fn canonical(&self, language: &str) -> Option<String> {
        let code = normalize(language);
        self.voices.contains_key(&code).then_some(code)
    }

    /// Canonical code, or the default language when missing/unsupported
    pub fn resolve(&self, language: Option<&str>) -> String {
        language
            .and_then(|lang| self.canonical(lang))
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn voice_for(&self, language: &str) -> Option<&str> {
        self.voices.get(&normalize(language)).map(String::as_str)
    }

    pub fn supported(&self) -> impl Iterator<Item = &str> {
        self.voices.keys().map(String::as_str)
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::languages::LanguageCatalog;
use super::messages::ServerMessage;
use crate::error::{DeliveryFailure, RegistryError};

/// One connected participant
#[derive(Debug, Clone)]
pub struct ListenerSession {
    pub id: Uuid,
    pub language: String,
    pub joined_at: DateTime<Utc>,
    outbox: mpsc::Sender<ServerMessage>,
}

/// A listener as captured by a snapshot: id plus a handle to its connection
#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: Uuid,
    outbox: mpsc::Sender<ServerMessage>,
}

impl Recipient {
    /// Queue a message without waiting. A closed or full outbox fails for
    /// this listener only.
    pub fn try_send(&self, message: ServerMessage) -> Result<(), DeliveryFailure> {
        self.outbox.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Disconnected(self.id),
            mpsc::error::TrySendError::Full(_) => DeliveryFailure::Backpressure(self.id),
        })
    }
}

/// Point-in-time grouping of connected listeners by language
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    partitions: BTreeMap<String, Vec<Recipient>>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    /// Distinct languages with at least one listener
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }

    pub fn partition(&self, language: &str) -> &[Recipient] {
        self.partitions
            .get(language)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn by_language(&self) -> BTreeMap<String, BTreeSet<Uuid>> {
        self.partitions
            .iter()
            .map(|(lang, recipients)| (lang.clone(), recipients.iter().map(|r| r.id).collect()))
            .collect()
    }

    pub fn into_partitions(self) -> BTreeMap<String, Vec<Recipient>> {
        self.partitions
    }
}

type SessionMap = HashMap<Uuid, ListenerSession>;

/// Concurrency-safe listener id -> language mapping.
///
/// Mutations are serialized by the write lock and copy the map only when a
/// snapshot still references the previous version. Readers clone an `Arc`
/// and never wait on in-flight engine calls.
#[derive(Clone)]
pub struct ConnectionRegistry {
    sessions: Arc<RwLock<Arc<SessionMap>>>,
    catalog: Arc<LanguageCatalog>,
}

impl ConnectionRegistry {
    pub fn new(catalog: LanguageCatalog) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(Arc::new(HashMap::new()))),
            catalog: Arc::new(catalog),
        }
    }

    pub fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    /// Insert or replace a session. Unsupported languages fall back to the
    /// default. Returns the effective language.
    pub fn join(
        &self,
        id: Uuid,
        language: Option<&str>,
        outbox: mpsc::Sender<ServerMessage>,
    ) -> String {
        let effective = self.catalog.resolve(language);
        if let Some(requested) = language {
            if !self.catalog.is_supported(requested) {
                warn!(
                    listener_id = %id,
                    requested,
                    fallback = %effective,
                    "Unsupported join language, using fallback"
                );
            }
        }

        let session = ListenerSession {
            id,
            language: effective.clone(),
            joined_at: Utc::now(),
            outbox,
        };

        {
            let mut guard = self.sessions.write();
            Arc::make_mut(&mut guard).insert(id, session);
        }

        info!(listener_id = %id, language = %effective, "Listener joined");
        effective
    }

    /// Remove a session; no-op if absent
    pub fn leave(&self, id: Uuid) -> bool {
        let removed = {
            let mut guard = self.sessions.write();
            if !guard.contains_key(&id) {
                return false;
            }
            Arc::make_mut(&mut guard).remove(&id).is_some()
        };

        info!(listener_id = %id, "Listener left");
        removed
    }

    /// Change the language of a registered listener. The prior value is kept
    /// on any error.
    pub fn set_language(&self, id: Uuid, language: &str) -> Result<String, RegistryError> {
        let code = self
            .catalog
            .canonical(language)
            .ok_or_else(|| RegistryError::UnsupportedLanguage(language.to_string()))?;

        {
            let mut guard = self.sessions.write();
            if !guard.contains_key(&id) {
                return Err(RegistryError::UnknownListener(id));
            }
            if let Some(session) = Arc::make_mut(&mut guard).get_mut(&id) {
                session.language = code.clone();
            }
        }

        info!(listener_id = %id, language = %code, "Listener language updated");
        Ok(code)
    }

    pub fn language_of(&self, id: Uuid) -> Option<String> {
        self.current().get(&id).map(|s| s.language.clone())
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    /// Group every currently connected listener by language
    pub fn snapshot(&self) -> Snapshot {
        let current = self.current();
        let mut partitions: BTreeMap<String, Vec<Recipient>> = BTreeMap::new();

        for session in current.values() {
            partitions
                .entry(session.language.clone())
                .or_default()
                .push(Recipient {
                    id: session.id,
                    outbox: session.outbox.clone(),
                });
        }

        for recipients in partitions.values_mut() {
            recipients.sort_by_key(|r| r.id);
        }

        Snapshot {
            taken_at: Utc::now(),
            partitions,
        }
    }

    pub fn counts_by_language(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for session in self.current().values() {
            *counts.entry(session.language.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn current(&self) -> Arc<SessionMap> {
        Arc::clone(&self.sessions.read())
    }
}

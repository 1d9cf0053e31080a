//! Call-id keyed session registry.
//!
//! The registry is the only structure shared across calls. Each entry holds
//! the session actor's handle and the set of attached consumers; entry
//! mutations happen under the map's shard lock, so attach and detach for the
//! same call never interleave.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::actor::{SessionHandle, spawn_session};
use super::client::{ClientHandle, ClientId, ClientPrefs, Outbound};
use super::state::SessionSettings;
use crate::core::codec::Resampler;
use crate::core::realtime::BackendConnector;

#[derive(Debug)]
struct SessionEntry {
    handle: SessionHandle,
    clients: HashMap<ClientId, ClientHandle>,
}

/// Read-only view of one registered session.
pub struct SessionView<'a> {
    call_id: &'a str,
    entry: &'a SessionEntry,
}

impl<'a> SessionView<'a> {
    pub fn call_id(&self) -> &'a str {
        self.call_id
    }

    pub fn handle(&self) -> &'a SessionHandle {
        &self.entry.handle
    }

    pub fn clients(&self) -> impl Iterator<Item = &'a ClientHandle> + 'a {
        self.entry.clients.values()
    }

    pub fn client_count(&self) -> usize {
        self.entry.clients.len()
    }
}

pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
    settings: Arc<SessionSettings>,
    connector: Arc<dyn BackendConnector>,
    resampler: Arc<dyn Resampler>,
}

impl SessionRegistry {
    pub fn new(
        settings: SessionSettings,
        connector: Arc<dyn BackendConnector>,
        resampler: Arc<dyn Resampler>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            settings: Arc::new(settings),
            connector,
            resampler,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Attach a consumer to `call_id`, creating the session on first use.
    ///
    /// The consumer's formats become the session's negotiated formats.
    pub fn attach(&self, call_id: &str, client: ClientHandle, prefs: ClientPrefs) -> SessionHandle {
        let mut entry = self.get_or_create(call_id);
        entry.clients.insert(client.id(), client.clone());
        entry.handle.attach(client, prefs);
        entry.handle.clone()
    }

    /// Detach a consumer. Returns true if this removed the session.
    ///
    /// When the last consumer leaves, the actor is shut down (closing the
    /// backend link) and the entry is removed.
    pub fn detach(&self, call_id: &str, client_id: ClientId) -> bool {
        let Entry::Occupied(mut occupied) = self.sessions.entry(call_id.to_string()) else {
            return false;
        };

        if occupied.get_mut().clients.remove(&client_id).is_none() {
            return false;
        }
        occupied.get().handle.detach(client_id);

        if occupied.get().clients.is_empty() {
            let entry = occupied.remove();
            entry.handle.shutdown();
            info!(call_id, "Last consumer left, session removed");
            return true;
        }
        false
    }

    /// Handle for an existing session.
    pub fn get(&self, call_id: &str) -> Option<SessionHandle> {
        self.sessions.get(call_id).map(|entry| entry.handle.clone())
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.sessions.contains_key(call_id)
    }

    /// Number of consumers attached to `call_id`.
    pub fn client_count(&self, call_id: &str) -> usize {
        self.sessions
            .get(call_id)
            .map(|entry| entry.clients.len())
            .unwrap_or(0)
    }

    /// Visit every active session.
    ///
    /// The visitor runs under a shard read lock; it must not call back into
    /// the registry.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(SessionView<'_>),
    {
        for item in self.sessions.iter() {
            visit(SessionView {
                call_id: item.key(),
                entry: item.value(),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close every consumer and session. Used on server shutdown.
    pub fn shutdown_all(&self) {
        let call_ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for call_id in call_ids {
            if let Some((_, entry)) = self.sessions.remove(&call_id) {
                for client in entry.clients.values() {
                    client.send(Outbound::Close {
                        code: 1001,
                        reason: "server shutting down".to_string(),
                    });
                }
                entry.handle.shutdown();
            }
        }
    }

    /// Entry for `call_id`, spawning a fresh actor for an unseen call id.
    ///
    /// Private to attach: a session never exists without a consumer.
    fn get_or_create(&self, call_id: &str) -> RefMut<'_, String, SessionEntry> {
        let mut entry = self
            .sessions
            .entry(call_id.to_string())
            .or_insert_with(|| self.create_entry(call_id));

        if entry.handle.is_closed() {
            // Actor died without detaching everyone; start over.
            *entry = self.create_entry(call_id);
        }
        entry
    }

    fn create_entry(&self, call_id: &str) -> SessionEntry {
        info!(call_id, "Creating session");
        SessionEntry {
            handle: spawn_session(
                call_id,
                self.settings.clone(),
                self.connector.clone(),
                self.resampler.clone(),
            ),
            clients: HashMap::new(),
        }
    }
}

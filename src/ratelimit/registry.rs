//! Client registry binding client ids to live limiters.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::algorithm::Algorithm;
use super::client::ClientConfig;
use super::factory::StrategyFactory;
use super::strategy::Limiter;
use crate::error::{RatekeeperError, Result};

/// A registered client: its configuration and the limiter built from it.
struct Registration {
    config: ClientConfig,
    limiter: Arc<dyn Limiter>,
    registered_at: DateTime<Utc>,
}

/// Point-in-time view of a registered client.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSnapshot {
    /// The client identifier
    pub client_id: String,
    /// Algorithm limiting this client
    pub algorithm: Algorithm,
    /// Configured capacity
    pub capacity: u64,
    /// Approximate admissions currently available
    pub remaining: u64,
    /// When the client was registered
    pub registered_at: DateTime<Utc>,
}

/// Owns the mapping from client id to limiter.
///
/// All operations take `&self` and may be called from any number of threads.
/// Lookups for one client never wait on another client's decision: `admit`
/// clones the limiter handle out of the map before deciding.
pub struct ClientRegistry {
    factory: StrategyFactory,
    entries: DashMap<String, Registration>,
}

impl ClientRegistry {
    /// Create an empty registry that builds limiters with `factory`.
    pub fn new(factory: StrategyFactory) -> Self {
        Self {
            factory,
            entries: DashMap::new(),
        }
    }

    /// Register `config`, replacing any existing registration for the same id.
    ///
    /// A replaced limiter is stopped before the new one becomes visible.
    pub fn register(&self, config: ClientConfig) -> Result<()> {
        let limiter = self.factory.create(&config)?;
        let client_id = config.client_id().to_string();

        info!(
            client_id = %client_id,
            algorithm = %config.algorithm(),
            capacity = config.capacity(),
            rate = config.rate(),
            window = ?config.window(),
            "Registering client"
        );

        let registration = Registration {
            config,
            limiter,
            registered_at: Utc::now(),
        };

        match self.entries.entry(client_id) {
            Entry::Occupied(mut occupied) => {
                warn!(client_id = %occupied.key(), "Replacing existing registration");
                occupied.get().limiter.stop();
                occupied.insert(registration);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(registration);
            }
        }

        Ok(())
    }

    /// Decide whether a request from `client_id` is admitted.
    pub fn admit(&self, client_id: &str) -> Result<bool> {
        let limiter = self
            .entries
            .get(client_id)
            .map(|entry| Arc::clone(&entry.limiter))
            .ok_or_else(|| RatekeeperError::UnknownClient(client_id.to_string()))?;

        let admitted = limiter.decide();
        if admitted {
            trace!(client_id = %client_id, "Request admitted");
        } else {
            debug!(client_id = %client_id, algorithm = %limiter.algorithm(), "Rate limit exceeded");
        }

        Ok(admitted)
    }

    /// Remove and stop the limiter for `client_id`.
    ///
    /// Returns whether a registration was removed. Unknown ids are a no-op.
    pub fn unregister(&self, client_id: &str) -> bool {
        match self.entries.remove(client_id) {
            Some((_, registration)) => {
                registration.limiter.stop();
                info!(client_id = %client_id, "Unregistered client");
                true
            }
            None => {
                trace!(client_id = %client_id, "Unregister for unknown client ignored");
                false
            }
        }
    }

    /// Whether `client_id` is currently registered.
    pub fn is_registered(&self, client_id: &str) -> bool {
        self.entries.contains_key(client_id)
    }

    /// The configuration registered for `client_id`.
    pub fn configuration(&self, client_id: &str) -> Option<ClientConfig> {
        self.entries.get(client_id).map(|entry| entry.config.clone())
    }

    /// Approximate admissions currently available to `client_id`.
    pub fn remaining(&self, client_id: &str) -> Result<u64> {
        self.entries
            .get(client_id)
            .map(|entry| entry.limiter.remaining())
            .ok_or_else(|| RatekeeperError::UnknownClient(client_id.to_string()))
    }

    /// Snapshots of every registered client, ordered by id.
    pub fn clients(&self) -> Vec<ClientSnapshot> {
        let mut snapshots: Vec<ClientSnapshot> = self
            .entries
            .iter()
            .map(|entry| ClientSnapshot {
                client_id: entry.key().clone(),
                algorithm: entry.config.algorithm(),
                capacity: entry.config.capacity(),
                remaining: entry.limiter.remaining(),
                registered_at: entry.registered_at,
            })
            .collect();
        snapshots.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        snapshots
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unregister every client, stopping all maintenance tasks.
    pub fn shutdown(&self) {
        let client_ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for client_id in &client_ids {
            self.unregister(client_id);
        }
        info!(count = client_ids.len(), "Client registry shut down");
    }
}

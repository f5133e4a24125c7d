use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;

use crate::entities::{download_client, indexer};
use crate::models::release::Protocol;

/// Immutable per-reconcile-run view of the world: the wall clock plus the
/// indexers and download clients that were usable when the run started.
/// Built once at the top of a reconcile job and shared by value; sweeps read
/// it but never mutate it, so mid-run configuration changes cannot skew a
/// run halfway through.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub now: DateTime<Utc>,

    pub indexers: Vec<indexer::Model>,

    pub download_clients: Vec<download_client::Model>,
}

impl Snapshot {
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    /// Protocols for which at least one enabled download client exists.
    /// Releases on any other protocol are unusable this run.
    #[must_use]
    pub fn allowed_protocols(&self) -> HashSet<Protocol> {
        self.download_clients
            .iter()
            .filter_map(|c| c.protocol.parse().ok())
            .collect()
    }

    /// First download client speaking the given protocol, in insertion order.
    #[must_use]
    pub fn client_for_protocol(&self, protocol: Protocol) -> Option<&download_client::Model> {
        self.download_clients
            .iter()
            .find(|c| c.protocol.parse::<Protocol>().is_ok_and(|p| p == protocol))
    }

    #[must_use]
    pub fn client_by_id(&self, id: i32) -> Option<&download_client::Model> {
        self.download_clients.iter().find(|c| c.id == id)
    }
}

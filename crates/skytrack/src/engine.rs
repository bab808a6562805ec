// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tracker engine: command surface and loop lifecycle.
//!
//! An explicit instance constructed with injected collaborators (feed
//! connector, beacon decoder, message channel); no globals. Authorization
//! happens upstream in the command framework — every operation here assumes
//! the caller is already allowed to invoke it.

use crate::channel::MessageChannel;
use crate::config::TrackerConfig;
use crate::feed::{BeaconDecoder, FeedConnector};
use crate::geo::GeoPoint;
use crate::ingest::{run_ingest_loop, IngestContext};
use crate::reconcile::{run_reconcile_loop, ReconcileContext};
use crate::state::{ListEntry, TrackError, TrackerState};
use crate::types::{ChannelId, TrackedId};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Result of the `list` operation.
#[derive(Debug, Clone)]
pub struct ListSnapshot {
    pub enabled: bool,
    pub entries: Vec<ListEntry>,
}

/// Result of the `status` operation.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub enabled: bool,
    pub tracked: usize,
    pub feed_connected: bool,
    pub target_configured: bool,
    pub landing_configured: bool,
}

struct LoopRuntime {
    shutdown: watch::Sender<bool>,
    filter: watch::Sender<u64>,
    ingest: JoinHandle<()>,
    reconcile: JoinHandle<()>,
}

/// The beacon-to-chat relay engine.
pub struct TrackerEngine {
    state: Arc<Mutex<TrackerState>>,
    connector: Arc<dyn FeedConnector>,
    decoder: Arc<dyn BeaconDecoder>,
    channel: Arc<dyn MessageChannel>,
    config: TrackerConfig,
    runtime: Mutex<Option<LoopRuntime>>,
}

impl TrackerEngine {
    pub fn new(
        config: TrackerConfig,
        connector: Arc<dyn FeedConnector>,
        decoder: Arc<dyn BeaconDecoder>,
        channel: Arc<dyn MessageChannel>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState::new())),
            connector,
            decoder,
            channel,
            config,
            runtime: Mutex::new(None),
        }
    }

    /// Start tracking `raw_id` (normalized). The first message for it is
    /// created once a position arrives and a tick runs.
    pub fn add(
        &self,
        raw_id: &str,
        name: Option<String>,
        added_by: Option<String>,
    ) -> Result<TrackedId, TrackError> {
        let id = TrackedId::normalize(raw_id);
        let rev = {
            let mut st = self.state.lock();
            st.add(id.clone(), name, added_by)?;
            st.filter_rev()
        };
        self.notify_filter(rev);
        tracing::info!(%id, "tracking added");
        Ok(id)
    }

    /// Stop tracking `raw_id`; its position and message handle go with it.
    pub fn remove(&self, raw_id: &str) -> Result<TrackedId, TrackError> {
        let id = TrackedId::normalize(raw_id);
        let rev = {
            let mut st = self.state.lock();
            st.remove(&id)?;
            st.filter_rev()
        };
        self.notify_filter(rev);
        tracing::info!(%id, "tracking removed");
        Ok(id)
    }

    /// Drop every tracked id. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let (count, rev) = {
            let mut st = self.state.lock();
            let count = st.clear();
            (count, st.filter_rev())
        };
        if count > 0 {
            self.notify_filter(rev);
        }
        tracing::info!(count, "tracking cleared");
        count
    }

    /// Forget the position and message of one id while keeping it tracked;
    /// the next tick creates a fresh message.
    pub fn clear_id(&self, raw_id: &str) -> Result<TrackedId, TrackError> {
        let id = TrackedId::normalize(raw_id);
        self.state.lock().reset_entry(&id)?;
        tracing::info!(%id, "message state reset");
        Ok(id)
    }

    pub fn list(&self) -> ListSnapshot {
        let st = self.state.lock();
        ListSnapshot {
            enabled: st.enabled(),
            entries: st.list(),
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let st = self.state.lock();
        StatusSnapshot {
            enabled: st.enabled(),
            tracked: st.len(),
            feed_connected: st.feed_connected(),
            target_configured: st.target().is_some(),
            landing_configured: st.landing().is_some(),
        }
    }

    /// Set or reassign the channel that receives the live messages.
    pub fn set_target_channel(&self, channel: ChannelId) {
        self.state.lock().set_target(channel);
        tracing::info!(%channel, "target channel set");
    }

    /// Set the landing site used for caption distance annotations.
    pub fn set_landing(&self, landing: GeoPoint) {
        self.state.lock().set_landing(landing);
        tracing::info!(
            lat = landing.latitude,
            lon = landing.longitude,
            "landing site set"
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled()
    }

    /// Enable tracking: spawn the ingestion and reconciliation loops.
    pub async fn track_on(&self) -> Result<(), TrackError> {
        {
            let st = self.state.lock();
            if st.enabled() {
                return Err(TrackError::AlreadyEnabled);
            }
            if st.is_empty() {
                return Err(TrackError::NothingTracked);
            }
        }

        // Reap loops left over from a feed failure or a lost join race; a
        // restart supersedes them.
        self.stop_loops().await;

        {
            let mut st = self.state.lock();
            if st.enabled() {
                return Err(TrackError::AlreadyEnabled);
            }
            if st.is_empty() {
                return Err(TrackError::NothingTracked);
            }
            st.set_enabled(true);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (filter_tx, filter_rx) = watch::channel(self.state.lock().filter_rev());

        let ingest = tokio::spawn(run_ingest_loop(IngestContext {
            state: Arc::clone(&self.state),
            connector: Arc::clone(&self.connector),
            decoder: Arc::clone(&self.decoder),
            reconnect: self.config.reconnect.clone(),
            shutdown: shutdown_rx.clone(),
            filter: filter_rx,
        }));
        let reconcile = tokio::spawn(run_reconcile_loop(ReconcileContext {
            state: Arc::clone(&self.state),
            channel: Arc::clone(&self.channel),
            interval: self.config.update_interval(),
            initial_delay: self.config.initial_delay(),
            shutdown: shutdown_rx,
        }));

        *self.runtime.lock() = Some(LoopRuntime {
            shutdown: shutdown_tx,
            filter: filter_tx,
            ingest,
            reconcile,
        });

        tracing::info!("tracking enabled");
        Ok(())
    }

    /// Disable tracking: signal both loops and join them with a bounded
    /// timeout. A loop that fails to stop in time is logged and left behind;
    /// the next `track_on` supersedes it.
    pub async fn track_off(&self) -> Result<(), TrackError> {
        {
            let mut st = self.state.lock();
            if !st.enabled() {
                return Err(TrackError::AlreadyDisabled);
            }
            st.set_enabled(false);
        }
        self.stop_loops().await;
        tracing::info!("tracking disabled");
        Ok(())
    }

    /// Reset to a clean session: stop the loops, drop all tracked ids, and
    /// keep or clear the target channel per explicit operator choice.
    pub async fn reset_session(&self, keep_channel: bool) {
        {
            let mut st = self.state.lock();
            st.set_enabled(false);
            st.clear();
            if !keep_channel {
                st.clear_target();
            }
        }
        self.stop_loops().await;
        tracing::info!(keep_channel, "session reset");
    }

    /// Tell the ingestion loop the tracked set changed so it can reconnect
    /// with a fresh feed filter. A no-op while the loops are down.
    fn notify_filter(&self, rev: u64) {
        if let Some(rt) = self.runtime.lock().as_ref() {
            let _ = rt.filter.send(rev);
        }
    }

    async fn stop_loops(&self) {
        let Some(rt) = self.runtime.lock().take() else {
            return;
        };
        let _ = rt.shutdown.send(true);

        let timeout = self.config.stop_timeout();
        for (name, handle) in [("ingest", rt.ingest), ("reconcile", rt.reconcile)] {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::error!("{name} loop failed: {err}"),
                Err(_) => {
                    tracing::warn!("{name} loop did not stop within {timeout:?}; superseding it");
                }
            }
        }
    }
}

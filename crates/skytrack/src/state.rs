// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared tracking state.
//!
//! [`TrackerState`] is the single shared container behind the engine: one map
//! from tracked id to [`TrackedEntry`], plus the enabled flag, target channel
//! and landing site. Keeping handle and position inside the same entry makes
//! the "positions only for tracked ids" invariant structural; there is no
//! second map to drift out of sync. Callers guard the whole struct with one
//! lock and never hold it across network or I/O waits.

use crate::channel::MessageHandle;
use crate::geo::GeoPoint;
use crate::types::{Beacon, ChannelId, Position, TrackedId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Tracking-set operation failures, reported back to the caller as short
/// acknowledgements.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("{0} already tracked")]
    AlreadyTracked(TrackedId),

    #[error("{0} not tracked")]
    NotFound(TrackedId),

    #[error("no ids tracked")]
    NothingTracked,

    #[error("tracking already enabled")]
    AlreadyEnabled,

    #[error("tracking already disabled")]
    AlreadyDisabled,
}

/// Per-id tracking record.
///
/// `lifetime` is stamped at insert (and bumped by a reset) so a message
/// handle produced against a removed-and-readded id is never written back:
/// the handle belongs to the entry's previous tracked lifetime.
#[derive(Debug, Clone)]
pub struct TrackedEntry {
    pub name: Option<String>,
    pub added_by: Option<String>,
    pub handle: Option<MessageHandle>,
    pub position: Option<Position>,
    pub last_update: Option<DateTime<Utc>>,
    pub(crate) lifetime: u64,
}

impl TrackedEntry {
    fn new(name: Option<String>, added_by: Option<String>, lifetime: u64) -> Self {
        Self {
            name,
            added_by,
            handle: None,
            position: None,
            last_update: None,
            lifetime,
        }
    }
}

/// One row of the user-facing `list` output.
#[derive(Debug, Clone)]
pub struct ListEntry {
    pub id: TrackedId,
    pub name: Option<String>,
    pub added_by: Option<String>,
    pub has_position: bool,
}

/// Copy of one entry taken for a reconciliation pass.
#[derive(Debug, Clone)]
pub(crate) struct ReconcileItem {
    pub id: TrackedId,
    pub lifetime: u64,
    pub handle: Option<MessageHandle>,
    pub position: Option<Position>,
    pub name: Option<String>,
    pub added_by: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Atomic copy of everything a reconciliation tick needs, taken under the
/// lock and consumed after releasing it.
#[derive(Debug, Clone)]
pub(crate) struct ReconcileSnapshot {
    pub enabled: bool,
    pub target: Option<ChannelId>,
    pub landing: Option<GeoPoint>,
    pub items: Vec<ReconcileItem>,
}

/// The one shared mutable resource of the engine.
#[derive(Debug, Default)]
pub struct TrackerState {
    entries: HashMap<TrackedId, TrackedEntry>,
    enabled: bool,
    feed_connected: bool,
    target: Option<ChannelId>,
    landing: Option<GeoPoint>,
    next_lifetime: u64,
    filter_rev: u64,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `id`. The message handle starts unset; the first
    /// reconciliation tick with a known position creates the message.
    pub fn add(
        &mut self,
        id: TrackedId,
        name: Option<String>,
        added_by: Option<String>,
    ) -> Result<(), TrackError> {
        if self.entries.contains_key(&id) {
            return Err(TrackError::AlreadyTracked(id));
        }
        let lifetime = self.next_lifetime();
        self.entries
            .insert(id, TrackedEntry::new(name, added_by, lifetime));
        self.filter_rev += 1;
        Ok(())
    }

    /// Stop tracking `id`. Removing the entry destroys its position and
    /// handle with it.
    pub fn remove(&mut self, id: &TrackedId) -> Result<(), TrackError> {
        match self.entries.remove(id) {
            Some(_) => {
                self.filter_rev += 1;
                Ok(())
            }
            None => Err(TrackError::NotFound(id.clone())),
        }
    }

    /// Drop every tracked id. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        if count > 0 {
            self.filter_rev += 1;
        }
        self.entries.clear();
        count
    }

    /// Keep `id` tracked but forget its position and message handle and
    /// start a fresh lifetime, forcing the next tick to create a new
    /// message.
    pub fn reset_entry(&mut self, id: &TrackedId) -> Result<(), TrackError> {
        let lifetime = self.next_lifetime();
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.handle = None;
                entry.position = None;
                entry.last_update = None;
                entry.lifetime = lifetime;
                Ok(())
            }
            None => Err(TrackError::NotFound(id.clone())),
        }
    }

    /// Upsert the latest position for `id` if it is tracked. Untracked
    /// beacons are dropped; this is the hot path for feed traffic and stays
    /// a single map lookup.
    pub fn record_position(&mut self, id: &TrackedId, beacon: &Beacon) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.position = Some(Position::from_beacon(beacon));
                entry.last_update = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Write back a handle produced by a successful create.
    ///
    /// Single-writer rule: only the reconciler calls this, and only for the
    /// lifetime it snapshotted. Returns false when the entry is gone, was
    /// reset in the meantime, or already carries a handle.
    pub fn store_handle(
        &mut self,
        id: &TrackedId,
        lifetime: u64,
        handle: MessageHandle,
    ) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) if entry.lifetime == lifetime && entry.handle.is_none() => {
                entry.handle = Some(handle);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn snapshot(&self) -> ReconcileSnapshot {
        let mut items: Vec<ReconcileItem> = self
            .entries
            .iter()
            .map(|(id, entry)| ReconcileItem {
                id: id.clone(),
                lifetime: entry.lifetime,
                handle: entry.handle.clone(),
                position: entry.position.clone(),
                name: entry.name.clone(),
                added_by: entry.added_by.clone(),
                last_update: entry.last_update,
            })
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        ReconcileSnapshot {
            enabled: self.enabled,
            target: self.target,
            landing: self.landing,
            items,
        }
    }

    pub fn list(&self) -> Vec<ListEntry> {
        let mut entries: Vec<ListEntry> = self
            .entries
            .iter()
            .map(|(id, entry)| ListEntry {
                id: id.clone(),
                name: entry.name.clone(),
                added_by: entry.added_by.clone(),
                has_position: entry.position.is_some(),
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Tracked ids in sorted order, for building feed filters.
    pub fn tracked_ids(&self) -> Vec<TrackedId> {
        let mut ids: Vec<TrackedId> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, id: &TrackedId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn entry(&self, id: &TrackedId) -> Option<&TrackedEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the ingestion loop currently holds a live feed connection.
    pub fn feed_connected(&self) -> bool {
        self.feed_connected
    }

    pub fn set_feed_connected(&mut self, connected: bool) {
        self.feed_connected = connected;
    }

    pub fn target(&self) -> Option<ChannelId> {
        self.target
    }

    pub fn set_target(&mut self, target: ChannelId) {
        self.target = Some(target);
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    pub fn landing(&self) -> Option<GeoPoint> {
        self.landing
    }

    pub fn set_landing(&mut self, landing: GeoPoint) {
        self.landing = Some(landing);
    }

    /// Revision of the tracked-id set. Bumped by membership changes so the
    /// ingestion loop knows to reconnect with a fresh feed filter.
    pub fn filter_rev(&self) -> u64 {
        self.filter_rev
    }

    fn next_lifetime(&mut self) -> u64 {
        self.next_lifetime += 1;
        self.next_lifetime
    }
}

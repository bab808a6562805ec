// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Skytrack — relay live aircraft beacons into chat messages.
//!
//! The engine keeps one continuously updated live-location message per
//! tracked aircraft: beacons stream in from a tracking feed, a fixed-period
//! reconciler diffs the latest positions against message state, and the
//! target chat channel receives a `create` the first time a position is
//! known, then an `update` in place on every later change.
//!
//! # Architecture
//!
//! - [`state::TrackerState`] — the single shared container: tracked id →
//!   `{name, handle, position}`. One lock, taken only around point updates.
//! - Ingestion ([`feed`]) — consumes raw feed records on its own task,
//!   decodes, filters by membership, upserts positions.
//! - Reconciliation ([`channel`]) — fixed-period ticks snapshot the state,
//!   release the lock, then create/update messages; transient send failures
//!   heal on the next tick.
//! - [`engine::TrackerEngine`] — the command surface (`add`, `remove`,
//!   `track_on`, `track_off`, `list`, `clear`, ...) wired from injected
//!   collaborators.
//!
//! # Quick Start
//!
//! ```no_run
//! use skytrack::{ChannelId, TrackerConfig, TrackerEngine};
//! use std::sync::Arc;
//!
//! # async fn run(connector: Arc<dyn skytrack::FeedConnector>,
//! #              decoder: Arc<dyn skytrack::BeaconDecoder>,
//! #              channel: Arc<dyn skytrack::MessageChannel>) {
//! let engine = TrackerEngine::new(TrackerConfig::default(), connector, decoder, channel);
//! engine.set_target_channel(ChannelId(-1001234));
//! engine.add("FLRDD8F2A", Some("D-1234".into()), None).unwrap();
//! engine.track_on().await.unwrap();
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod engine;
pub mod feed;
pub mod geo;
mod ingest;
mod reconcile;
pub mod state;
pub mod types;

pub use channel::{ChannelError, MessageChannel, MessageHandle};
pub use config::{ConfigError, ReconnectConfig, TrackerConfig};
pub use engine::{ListSnapshot, StatusSnapshot, TrackerEngine};
pub use feed::{BeaconDecoder, DecodeError, FeedConnection, FeedConnector, FeedError};
pub use geo::GeoPoint;
pub use state::{ListEntry, TrackError, TrackedEntry};
pub use types::{Beacon, ChannelId, Position, TrackedId};

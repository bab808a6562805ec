// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound beacon-feed interface.
//!
//! The wire protocol and record format live behind these traits. The engine
//! only needs three things from a feed: a way to open a connection scoped to
//! the currently tracked ids, a stream of raw records from that connection,
//! and a decoder turning a raw record into a [`Beacon`].

use crate::types::{Beacon, TrackedId};
use async_trait::async_trait;
use thiserror::Error;

/// Connection-level feed failures. These terminate the ingestion loop once
/// the reconnect budget is exhausted; a later `track_on` restarts it.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed connection failed: {0}")]
    Connection(String),

    #[error("feed connection closed")]
    Closed,
}

/// A malformed beacon record. Recoverable: the ingestion loop drops the
/// record and continues.
#[derive(Debug, Error)]
#[error("malformed beacon: {0}")]
pub struct DecodeError(pub String);

/// An open feed connection delivering raw records one at a time.
#[async_trait]
pub trait FeedConnection: Send {
    /// Receive the next raw record.
    async fn recv(&mut self) -> Result<String, FeedError>;

    /// Release the connection.
    async fn disconnect(&mut self);
}

/// Factory for feed connections.
///
/// `tracked` carries the current tracked-id set so implementations can
/// install a server-side filter; the ingestion loop reconnects whenever the
/// set changes so the filter stays current.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self, tracked: &[TrackedId]) -> Result<Box<dyn FeedConnection>, FeedError>;
}

/// Decoder for the feed's record format.
pub trait BeaconDecoder: Send + Sync {
    fn decode(&self, raw: &str) -> Result<Beacon, DecodeError>;
}

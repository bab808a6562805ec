// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound message-channel interface.
//!
//! The engine consumes a [`MessageChannel`] to publish one live-location
//! message per tracked id: `create` once, then `update` in place. Both calls
//! are fallible, non-idempotent network operations; the reconciler never
//! retries them synchronously. A failed create leaves no handle behind, a
//! failed update leaves the existing handle intact, and the next scheduled
//! tick is the retry mechanism for both.

use crate::types::{ChannelId, Position};
use async_trait::async_trait;
use thiserror::Error;

/// Message-platform failures, split by operation so callers can log them
/// distinctly. Neither variant is surfaced to end users.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("message send failed: {0}")]
    Send(String),

    #[error("message edit failed: {0}")]
    Edit(String),
}

/// Opaque reference to a previously created message.
///
/// Implementations that post a live-location object plus a companion caption
/// message keep both ids here; the engine only stores the handle and passes
/// it back on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub message_id: i64,
    pub caption_id: Option<i64>,
}

impl MessageHandle {
    pub fn new(message_id: i64) -> Self {
        Self {
            message_id,
            caption_id: None,
        }
    }

    pub fn with_caption(message_id: i64, caption_id: i64) -> Self {
        Self {
            message_id,
            caption_id: Some(caption_id),
        }
    }
}

/// Chat-platform primitive consumed by the reconciler.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Post a new live-location message to `channel` and return its handle.
    async fn create(
        &self,
        channel: ChannelId,
        position: &Position,
        caption: &str,
    ) -> Result<MessageHandle, ChannelError>;

    /// Move an existing live-location message to a new position.
    async fn update(
        &self,
        channel: ChannelId,
        handle: &MessageHandle,
        position: &Position,
        caption: &str,
    ) -> Result<(), ChannelError>;
}

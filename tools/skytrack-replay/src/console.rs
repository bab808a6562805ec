// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Console-backed message channel: prints what a real chat client would send.

use async_trait::async_trait;
use skytrack::{ChannelError, ChannelId, MessageChannel, MessageHandle, Position};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

pub struct ConsoleChannel {
    live_period_secs: u32,
    next_id: AtomicI64,
    creates: AtomicU64,
    updates: AtomicU64,
}

impl ConsoleChannel {
    pub fn new(live_period_secs: u32) -> Self {
        Self {
            live_period_secs,
            next_id: AtomicI64::new(0),
            creates: AtomicU64::new(0),
            updates: AtomicU64::new(0),
        }
    }

    pub fn creates(&self) -> u64 {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageChannel for ConsoleChannel {
    async fn create(
        &self,
        channel: ChannelId,
        position: &Position,
        caption: &str,
    ) -> Result<MessageHandle, ChannelError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.creates.fetch_add(1, Ordering::SeqCst);
        println!(
            "[{channel}] CREATE #{id} live({}s) at {:.5},{:.5}",
            self.live_period_secs, position.latitude, position.longitude
        );
        for line in caption.lines() {
            println!("[{channel}]   | {line}");
        }
        Ok(MessageHandle::new(id))
    }

    async fn update(
        &self,
        channel: ChannelId,
        handle: &MessageHandle,
        position: &Position,
        _caption: &str,
    ) -> Result<(), ChannelError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        println!(
            "[{channel}] UPDATE #{} at {:.5},{:.5}",
            handle.message_id, position.latitude, position.longitude
        );
        Ok(())
    }
}

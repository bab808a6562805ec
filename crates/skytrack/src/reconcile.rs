// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Position-to-message reconciliation.
//!
//! A fixed-period loop diffs the tracked set against message state and issues
//! create/update calls. Each tick copies everything it needs under the lock,
//! releases it, then talks to the network. Handles are assigned here and only
//! here (single-writer rule), so the ingestor, which only ever writes
//! positions, can never race a create. Per-id failures are logged and
//! isolated; the next tick is the retry mechanism. Ticks never overlap: the
//! loop awaits the whole pass before the interval fires again.

use crate::channel::MessageChannel;
use crate::geo::{self, GeoPoint};
use crate::state::{ReconcileItem, TrackerState};
use crate::types::Position;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub(crate) struct ReconcileContext {
    pub state: Arc<Mutex<TrackerState>>,
    pub channel: Arc<dyn MessageChannel>,
    pub interval: Duration,
    pub initial_delay: Duration,
    pub shutdown: watch::Receiver<bool>,
}

pub(crate) async fn run_reconcile_loop(mut ctx: ReconcileContext) {
    tracing::info!("reconciler started");
    let start = tokio::time::Instant::now() + ctx.initial_delay;
    let mut ticker = tokio::time::interval_at(start, ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = ctx.shutdown.changed() => {
                if changed.is_err() || *ctx.shutdown.borrow() {
                    tracing::info!("reconciler stopped");
                    return;
                }
            }
            _ = ticker.tick() => {
                reconcile_tick(&ctx.state, ctx.channel.as_ref()).await;
            }
        }
    }
}

/// One reconciliation pass.
pub(crate) async fn reconcile_tick(state: &Mutex<TrackerState>, channel: &dyn MessageChannel) {
    let snapshot = {
        let st = state.lock();
        if !st.enabled() || st.target().is_none() {
            return;
        }
        st.snapshot()
    };
    let Some(target) = snapshot.target else {
        return;
    };

    for item in snapshot.items {
        // No position yet: the first message appears once one arrives.
        let Some(position) = item.position.clone() else {
            continue;
        };
        let caption = caption(&item, &position, snapshot.landing);

        match item.handle.clone() {
            Some(handle) => {
                if let Err(err) = channel.update(target, &handle, &position, &caption).await {
                    // Keep the handle; the next tick retries the update.
                    tracing::warn!(id = %item.id, "live message update failed: {err}");
                } else {
                    tracing::debug!(id = %item.id, "live message updated");
                }
            }
            None => match channel.create(target, &position, &caption).await {
                Ok(handle) => {
                    let stored = state.lock().store_handle(&item.id, item.lifetime, handle);
                    if stored {
                        tracing::info!(id = %item.id, "live message created");
                    } else {
                        // Removed or reset while the create was in flight.
                        tracing::debug!(id = %item.id, "discarding handle from stale lifetime");
                    }
                }
                Err(err) => {
                    // No handle stored; the next tick retries the create.
                    tracing::warn!(id = %item.id, "live message create failed: {err}");
                }
            },
        }
    }
}

/// Caption text shown next to the live location.
fn caption(item: &ReconcileItem, position: &Position, landing: Option<GeoPoint>) -> String {
    let mut text = format!("Address: {}", item.id);

    let name = item.name.as_deref().or(position.label.as_deref());
    match (name, item.added_by.as_deref()) {
        (Some(name), Some(by)) => {
            text.push_str(&format!("\n{name} ({by})"));
        }
        (Some(name), None) => {
            text.push_str(&format!("\n{name}"));
        }
        (None, Some(by)) => {
            text.push_str(&format!("\n{by}"));
        }
        (None, None) => {}
    }

    if let Some(ts) = item.last_update {
        text.push_str(&format!("\nLast update: {}", ts.format("%Y-%m-%d %H:%M:%S")));
    }

    if let Some(landing) = landing {
        let here = GeoPoint::new(position.latitude, position.longitude);
        let dist = geo::distance_km(here, landing);
        text.push_str(&format!("\nDistance to landing: {dist:.1} km"));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelError, MessageHandle};
    use crate::types::{Beacon, ChannelId, TrackedId};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create { lat: f64, lon: f64 },
        Update { message_id: i64, lat: f64, lon: f64 },
    }

    #[derive(Default)]
    struct RecordingChannel {
        calls: StdMutex<Vec<Call>>,
        captions: StdMutex<Vec<String>>,
        fail_creates: AtomicBool,
        fail_updates: AtomicBool,
        fail_for: StdMutex<HashSet<String>>,
        next_id: AtomicI64,
    }

    impl RecordingChannel {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("calls").clone()
        }

        fn creates(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::Create { .. }))
                .count()
        }

        fn updates(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::Update { .. }))
                .count()
        }
    }

    #[async_trait]
    impl MessageChannel for RecordingChannel {
        async fn create(
            &self,
            _channel: ChannelId,
            position: &Position,
            caption: &str,
        ) -> Result<MessageHandle, ChannelError> {
            let failing = self.fail_creates.load(Ordering::SeqCst)
                || self
                    .fail_for
                    .lock()
                    .expect("fail_for")
                    .iter()
                    .any(|id| caption.contains(id.as_str()));
            if failing {
                return Err(ChannelError::Send("unavailable".into()));
            }
            self.calls.lock().expect("calls").push(Call::Create {
                lat: position.latitude,
                lon: position.longitude,
            });
            self.captions.lock().expect("captions").push(caption.to_string());
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(MessageHandle::new(id))
        }

        async fn update(
            &self,
            _channel: ChannelId,
            handle: &MessageHandle,
            position: &Position,
            _caption: &str,
        ) -> Result<(), ChannelError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(ChannelError::Edit("unavailable".into()));
            }
            self.calls.lock().expect("calls").push(Call::Update {
                message_id: handle.message_id,
                lat: position.latitude,
                lon: position.longitude,
            });
            Ok(())
        }
    }

    fn id(raw: &str) -> TrackedId {
        TrackedId::normalize(raw)
    }

    fn beacon(address: &str, lat: f64, lon: f64) -> Beacon {
        Beacon {
            address: address.into(),
            latitude: lat,
            longitude: lon,
            timestamp: Utc::now(),
            name: None,
        }
    }

    fn ready_state() -> Mutex<TrackerState> {
        let mut st = TrackerState::new();
        st.set_enabled(true);
        st.set_target(ChannelId(42));
        Mutex::new(st)
    }

    #[tokio::test]
    async fn test_create_once_then_update() {
        let state = ready_state();
        let channel = RecordingChannel::default();
        state.lock().add(id("ABC123"), None, None).expect("add");
        state
            .lock()
            .record_position(&id("abc123"), &beacon("abc123", 52.1, 13.4));

        reconcile_tick(&state, &channel).await;
        assert_eq!(channel.calls(), vec![Call::Create { lat: 52.1, lon: 13.4 }]);
        let handle = state
            .lock()
            .entry(&id("ABC123"))
            .expect("entry")
            .handle
            .clone()
            .expect("handle stored");

        state
            .lock()
            .record_position(&id("ABC123"), &beacon("ABC123", 52.2, 13.4));
        reconcile_tick(&state, &channel).await;

        assert_eq!(channel.creates(), 1);
        assert_eq!(
            channel.calls()[1],
            Call::Update {
                message_id: handle.message_id,
                lat: 52.2,
                lon: 13.4
            }
        );
    }

    #[tokio::test]
    async fn test_noop_when_disabled_or_unconfigured() {
        let state = Mutex::new(TrackerState::new());
        let channel = RecordingChannel::default();
        state.lock().add(id("ABC123"), None, None).expect("add");
        state
            .lock()
            .record_position(&id("ABC123"), &beacon("ABC123", 52.1, 13.4));

        // Disabled.
        reconcile_tick(&state, &channel).await;
        assert!(channel.calls().is_empty());

        // Enabled but no target channel.
        state.lock().set_enabled(true);
        reconcile_tick(&state, &channel).await;
        assert!(channel.calls().is_empty());

        state.lock().set_target(ChannelId(42));
        reconcile_tick(&state, &channel).await;
        assert_eq!(channel.creates(), 1);
    }

    #[tokio::test]
    async fn test_positionless_ids_skipped() {
        let state = ready_state();
        let channel = RecordingChannel::default();
        state.lock().add(id("ABC123"), None, None).expect("add");

        reconcile_tick(&state, &channel).await;
        assert!(channel.calls().is_empty());
        assert!(state
            .lock()
            .entry(&id("ABC123"))
            .expect("entry")
            .handle
            .is_none());
    }

    #[tokio::test]
    async fn test_create_failure_leaves_handle_unset_and_retries() {
        let state = ready_state();
        let channel = RecordingChannel::default();
        state.lock().add(id("ABC123"), None, None).expect("add");
        state
            .lock()
            .record_position(&id("ABC123"), &beacon("ABC123", 52.1, 13.4));

        channel.fail_creates.store(true, Ordering::SeqCst);
        reconcile_tick(&state, &channel).await;
        assert!(state
            .lock()
            .entry(&id("ABC123"))
            .expect("entry")
            .handle
            .is_none());

        channel.fail_creates.store(false, Ordering::SeqCst);
        reconcile_tick(&state, &channel).await;
        assert_eq!(channel.creates(), 1);
        assert!(state
            .lock()
            .entry(&id("ABC123"))
            .expect("entry")
            .handle
            .is_some());
    }

    #[tokio::test]
    async fn test_update_failure_keeps_handle() {
        let state = ready_state();
        let channel = RecordingChannel::default();
        state.lock().add(id("ABC123"), None, None).expect("add");
        state
            .lock()
            .record_position(&id("ABC123"), &beacon("ABC123", 52.1, 13.4));

        reconcile_tick(&state, &channel).await;
        let handle = state
            .lock()
            .entry(&id("ABC123"))
            .expect("entry")
            .handle
            .clone()
            .expect("handle");

        channel.fail_updates.store(true, Ordering::SeqCst);
        reconcile_tick(&state, &channel).await;
        assert_eq!(
            state.lock().entry(&id("ABC123")).expect("entry").handle,
            Some(handle.clone())
        );

        // Next tick retries the update against the same handle, no resend.
        channel.fail_updates.store(false, Ordering::SeqCst);
        reconcile_tick(&state, &channel).await;
        assert_eq!(channel.creates(), 1);
        assert_eq!(channel.updates(), 1);
    }

    #[tokio::test]
    async fn test_per_id_failures_isolated() {
        let state = ready_state();
        let channel = RecordingChannel::default();
        for raw in ["AAA111", "BBB222", "CCC333"] {
            state.lock().add(id(raw), None, None).expect("add");
            state
                .lock()
                .record_position(&id(raw), &beacon(raw, 50.0, 10.0));
        }
        channel
            .fail_for
            .lock()
            .expect("fail_for")
            .insert("BBB222".into());

        reconcile_tick(&state, &channel).await;

        // The failing id aborts nothing: the other two got their messages.
        assert_eq!(channel.creates(), 2);
        let st = state.lock();
        assert!(st.entry(&id("AAA111")).expect("entry").handle.is_some());
        assert!(st.entry(&id("BBB222")).expect("entry").handle.is_none());
        assert!(st.entry(&id("CCC333")).expect("entry").handle.is_some());
    }

    #[tokio::test]
    async fn test_caption_contents() {
        let state = ready_state();
        let channel = RecordingChannel::default();
        state
            .lock()
            .add(id("ABC123"), Some("Arcus M".into()), Some("ops".into()))
            .expect("add");
        state
            .lock()
            .record_position(&id("ABC123"), &beacon("ABC123", 52.0, 13.0));
        state.lock().set_landing(GeoPoint::new(52.0, 13.0));

        reconcile_tick(&state, &channel).await;

        let captions = channel.captions.lock().expect("captions").clone();
        assert_eq!(captions.len(), 1);
        assert!(captions[0].contains("Address: ABC123"));
        assert!(captions[0].contains("Arcus M (ops)"));
        assert!(captions[0].contains("Last update: "));
        assert!(captions[0].contains("Distance to landing: 0.0 km"));
    }
}

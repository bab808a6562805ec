// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Beacon ingestion loop.
//!
//! Consumes the feed one raw record at a time on its own task: decode,
//! filter by tracked-set membership, upsert the position. Decode failures are
//! dropped and logged; the loop only terminates on shutdown or once the
//! bounded reconnect budget is exhausted. The shared lock is taken only
//! around the point update, never across a feed read.

use crate::config::ReconnectConfig;
use crate::feed::{BeaconDecoder, FeedConnection, FeedConnector};
use crate::state::TrackerState;
use crate::types::TrackedId;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

pub(crate) struct IngestContext {
    pub state: Arc<Mutex<TrackerState>>,
    pub connector: Arc<dyn FeedConnector>,
    pub decoder: Arc<dyn BeaconDecoder>,
    pub reconnect: ReconnectConfig,
    /// Flipped to true by `track_off`; also fires when the sender drops.
    pub shutdown: watch::Receiver<bool>,
    /// Tracked-set revision; a change means the server-side filter is stale
    /// and the connection must be reopened.
    pub filter: watch::Receiver<u64>,
}

enum LoopExit {
    Shutdown,
    GaveUp,
}

pub(crate) async fn run_ingest_loop(mut ctx: IngestContext) {
    tracing::info!("beacon ingestion started");
    let exit = ingest_loop(&mut ctx).await;
    ctx.state.lock().set_feed_connected(false);
    match exit {
        LoopExit::Shutdown => tracing::info!("beacon ingestion stopped"),
        LoopExit::GaveUp => {
            tracing::warn!("feed link lost; ingestion stopped until tracking is restarted");
        }
    }
}

async fn ingest_loop(ctx: &mut IngestContext) -> LoopExit {
    // Consecutive connect/read failures; any received record resets it.
    let mut failures: u32 = 0;

    'connect: loop {
        // Consume any filter change that raced the previous connection; the
        // tracked set is re-read below, so the change is already reflected.
        ctx.filter.borrow_and_update();

        let tracked = ctx.state.lock().tracked_ids();
        let mut conn = loop {
            if *ctx.shutdown.borrow() {
                return LoopExit::Shutdown;
            }
            match ctx.connector.connect(&tracked).await {
                Ok(conn) => break conn,
                Err(err) => {
                    failures += 1;
                    tracing::warn!(
                        "feed connect failed ({failures}/{}): {err}",
                        ctx.reconnect.max_attempts
                    );
                    if failures >= ctx.reconnect.max_attempts {
                        return LoopExit::GaveUp;
                    }
                    if !backoff_sleep(ctx, failures).await {
                        return LoopExit::Shutdown;
                    }
                }
            }
        };
        ctx.state.lock().set_feed_connected(true);

        loop {
            tokio::select! {
                changed = ctx.shutdown.changed() => {
                    if changed.is_err() || *ctx.shutdown.borrow() {
                        conn.disconnect().await;
                        return LoopExit::Shutdown;
                    }
                }
                changed = ctx.filter.changed() => {
                    if changed.is_err() {
                        conn.disconnect().await;
                        return LoopExit::Shutdown;
                    }
                    tracing::debug!("tracked set changed; reconnecting with fresh feed filter");
                    conn.disconnect().await;
                    ctx.state.lock().set_feed_connected(false);
                    continue 'connect;
                }
                record = conn.recv() => match record {
                    Ok(raw) => {
                        failures = 0;
                        ingest_record(ctx, &raw);
                    }
                    Err(err) => {
                        conn.disconnect().await;
                        ctx.state.lock().set_feed_connected(false);
                        failures += 1;
                        tracing::warn!(
                            "feed read failed ({failures}/{}): {err}",
                            ctx.reconnect.max_attempts
                        );
                        if failures >= ctx.reconnect.max_attempts {
                            return LoopExit::GaveUp;
                        }
                        if !backoff_sleep(ctx, failures).await {
                            return LoopExit::Shutdown;
                        }
                        continue 'connect;
                    }
                }
            }
        }
    }
}

/// Sleep out the backoff for failure number `attempt`. Returns false when
/// shutdown arrived instead.
async fn backoff_sleep(ctx: &mut IngestContext, attempt: u32) -> bool {
    let delay = ctx.reconnect.backoff(attempt);
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        changed = ctx.shutdown.changed() => {
            !(changed.is_err() || *ctx.shutdown.borrow())
        }
    }
}

fn ingest_record(ctx: &IngestContext, raw: &str) {
    let beacon = match ctx.decoder.decode(raw) {
        Ok(beacon) => beacon,
        Err(err) => {
            tracing::warn!("dropping feed record: {err}");
            return;
        }
    };
    let id = TrackedId::normalize(&beacon.address);
    let tracked = ctx.state.lock().record_position(&id, &beacon);
    if tracked {
        tracing::debug!(%id, lat = beacon.latitude, lon = beacon.longitude, "position updated");
    } else {
        tracing::trace!(%id, "ignoring untracked beacon");
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Replay feed: serves recorded beacon lines as a live connection.
//!
//! Record format is one beacon per line, `address,lat,lon[,name]`. Blank
//! lines and `#` comments are skipped. The cursor survives reconnects, so a
//! tracked-set change mid-replay resumes where it left off.

use async_trait::async_trait;
use chrono::Utc;
use skytrack::{Beacon, BeaconDecoder, DecodeError, FeedConnection, FeedConnector, FeedError, TrackedId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct ReplayFeed {
    records: Arc<Vec<String>>,
    cursor: Arc<AtomicUsize>,
    delay: Duration,
}

impl ReplayFeed {
    pub fn new(records: Vec<String>, delay: Duration) -> Self {
        Self {
            records: Arc::new(records),
            cursor: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }

    pub fn from_log(content: &str, delay: Duration) -> Self {
        let records = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self::new(records, delay)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl FeedConnector for ReplayFeed {
    async fn connect(&self, tracked: &[TrackedId]) -> Result<Box<dyn FeedConnection>, FeedError> {
        if self.cursor.load(Ordering::SeqCst) >= self.records.len() {
            return Err(FeedError::Connection("replay exhausted".into()));
        }
        tracing::debug!("replay connected with {} tracked ids", tracked.len());
        Ok(Box::new(ReplayConnection {
            records: Arc::clone(&self.records),
            cursor: Arc::clone(&self.cursor),
            delay: self.delay,
        }))
    }
}

struct ReplayConnection {
    records: Arc<Vec<String>>,
    cursor: Arc<AtomicUsize>,
    delay: Duration,
}

#[async_trait]
impl FeedConnection for ReplayConnection {
    async fn recv(&mut self) -> Result<String, FeedError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        match self.records.get(index) {
            Some(record) => {
                tokio::time::sleep(self.delay).await;
                Ok(record.clone())
            }
            None => Err(FeedError::Closed),
        }
    }

    async fn disconnect(&mut self) {}
}

/// Decoder for the replay record format.
pub struct LineDecoder;

impl BeaconDecoder for LineDecoder {
    fn decode(&self, raw: &str) -> Result<Beacon, DecodeError> {
        let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
        if fields.len() < 3 {
            return Err(DecodeError(format!(
                "expected address,lat,lon[,name], got {raw:?}"
            )));
        }
        let latitude: f64 = fields[1]
            .parse()
            .map_err(|_| DecodeError(format!("bad latitude {:?}", fields[1])))?;
        let longitude: f64 = fields[2]
            .parse()
            .map_err(|_| DecodeError(format!("bad longitude {:?}", fields[2])))?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(DecodeError(format!("latitude out of range: {latitude}")));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(DecodeError(format!("longitude out of range: {longitude}")));
        }
        Ok(Beacon {
            address: fields[0].to_string(),
            latitude,
            longitude,
            timestamp: Utc::now(),
            name: fields.get(3).map(|s| s.to_string()).filter(|s| !s.is_empty()),
        })
    }
}

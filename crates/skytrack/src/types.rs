// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core identifier and position types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Feeds prefix device addresses with scheme tags (ICAO/FLARM/OGN); the
/// trailing hex digits are the stable part used for tracking.
pub const ID_SUFFIX_LEN: usize = 6;

/// Case-normalized tracked identifier.
///
/// Construction goes through [`TrackedId::normalize`], so two spellings of
/// the same device address always collapse to one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackedId(String);

impl TrackedId {
    /// Normalize a raw identifier: trim, uppercase, and keep only the
    /// trailing [`ID_SUFFIX_LEN`] characters of longer ids.
    pub fn normalize(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        let chars: Vec<char> = upper.chars().collect();
        if chars.len() <= ID_SUFFIX_LEN {
            Self(upper)
        } else {
            Self(chars[chars.len() - ID_SUFFIX_LEN..].iter().collect())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded position report delivered by the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Beacon {
    /// Raw device address as transmitted (not yet normalized).
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    /// Optional display name carried by the feed record.
    pub name: Option<String>,
}

/// Latest known position for a tracked id.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub label: Option<String>,
}

impl Position {
    pub fn from_beacon(beacon: &Beacon) -> Self {
        Self {
            latitude: beacon.latitude,
            longitude: beacon.longitude,
            timestamp: beacon.timestamp,
            label: beacon.name.clone(),
        }
    }
}

/// Opaque id of the target chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

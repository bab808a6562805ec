// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Great-circle distance helpers for caption annotations.

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A plain WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Haversine distance between two points in kilometers.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_zero() {
        let p = GeoPoint::new(52.52, 13.405);
        assert!(distance_km(p, p) < 1e-9);
    }

    #[test]
    fn test_distance_berlin_munich() {
        // Berlin Mitte to Munich Marienplatz, roughly 504 km.
        let berlin = GeoPoint::new(52.520, 13.405);
        let munich = GeoPoint::new(48.137, 11.575);
        let d = distance_km(berlin, munich);
        assert!((500.0..510.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_distance_symmetric() {
        let a = GeoPoint::new(50.0, 8.0);
        let b = GeoPoint::new(51.0, 9.0);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_distance_short_hop() {
        // One degree of longitude at the equator is about 111 km.
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 1.0);
        let d = distance_km(a, b);
        assert!((110.0..112.5).contains(&d), "got {d}");
    }
}

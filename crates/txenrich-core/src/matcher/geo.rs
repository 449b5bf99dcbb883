//! Great-circle distance and nearest-location search

use crate::models::MerchantLocation;

const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Haversine distance in miles between two `(lat, lon)` points in degrees
pub fn haversine_miles(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}

/// Closest location within `max_miles` of `point`; locations without coordinates are ignored
pub fn nearest_location<'a>(
    point: (f64, f64),
    locations: &'a [MerchantLocation],
    max_miles: f64,
) -> Option<(&'a MerchantLocation, f64)> {
    locations
        .iter()
        .filter_map(|loc| loc.coordinates().map(|c| (loc, haversine_miles(point, c))))
        .filter(|(_, d)| *d <= max_miles)
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(guid: &str, lat: Option<f64>, lon: Option<f64>) -> MerchantLocation {
        MerchantLocation {
            guid: guid.to_string(),
            merchant_guid: "MER-1".to_string(),
            address: None,
            city: None,
            state: None,
            postal_code: None,
            country: None,
            latitude: lat,
            longitude: lon,
            phone: None,
        }
    }

    #[test]
    fn test_zero_distance_to_self() {
        let p = (37.7749, -122.4194);
        assert_eq!(haversine_miles(p, p), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let sf = (37.7749, -122.4194);
        let la = (34.0522, -118.2437);
        let d = haversine_miles(sf, la);
        assert!((d - haversine_miles(la, sf)).abs() < 1e-9);
        // ~347 miles
        assert!((340.0..355.0).contains(&d), "got {}", d);
    }

    #[test]
    fn test_nearest_within_radius() {
        let locations = vec![
            location("LOC-FAR", Some(37.8044), Some(-122.2712)), // Oakland, ~8.4mi
            location("LOC-NEAR", Some(37.7793), Some(-122.4193)), // ~0.3mi
            location("LOC-NONE", None, None),
        ];
        let (best, d) = nearest_location((37.7749, -122.4194), &locations, 10.0).unwrap();
        assert_eq!(best.guid, "LOC-NEAR");
        assert!(d < 1.0);
    }

    #[test]
    fn test_nothing_within_radius() {
        let locations = vec![location("LOC-LA", Some(34.0522), Some(-118.2437))];
        assert!(nearest_location((37.7749, -122.4194), &locations, 10.0).is_none());
    }
}

use crate::types::{Coordinates, Office};

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance between two points, haversine form.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// The geocoded office closest to `point`, or `None` when no office has
/// coordinates yet.
pub fn nearest_office(point: Coordinates, offices: &[Office]) -> Option<&Office> {
    offices
        .iter()
        .filter_map(|office| office.coordinates.map(|c| (office, distance_km(point, c))))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(office, _)| office)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office(id: i64, name: &str, coordinates: Option<Coordinates>) -> Office {
        Office {
            id,
            name: name.to_string(),
            address: String::new(),
            coordinates,
        }
    }

    #[test]
    fn astana_to_almaty_is_roughly_960_km() {
        let astana = Coordinates {
            lat: 51.1694,
            lon: 71.4491,
        };
        let almaty = Coordinates {
            lat: 43.2389,
            lon: 76.8897,
        };
        let d = distance_km(astana, almaty);
        assert!((d - 960.0).abs() < 20.0, "got {d}");
    }

    #[test]
    fn zero_distance_for_identical_points() {
        let p = Coordinates { lat: 48.0, lon: 67.0 };
        assert!(distance_km(p, p) < 1e-9);
    }

    #[test]
    fn nearest_office_skips_ungeocoded_candidates() {
        let offices = vec![
            office(1, "Pending", None),
            office(
                2,
                "Astana",
                Some(Coordinates {
                    lat: 51.1694,
                    lon: 71.4491,
                }),
            ),
            office(
                3,
                "Almaty",
                Some(Coordinates {
                    lat: 43.2389,
                    lon: 76.8897,
                }),
            ),
        ];
        let near_astana = Coordinates { lat: 52.0, lon: 71.0 };
        let nearest = nearest_office(near_astana, &offices).unwrap();
        assert_eq!(nearest.id, 2);
    }

    #[test]
    fn nearest_office_is_none_without_geocoded_offices() {
        let offices = vec![office(1, "A", None), office(2, "B", None)];
        let p = Coordinates { lat: 50.0, lon: 70.0 };
        assert!(nearest_office(p, &offices).is_none());
    }
}

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "latitude": 12.9716, "longitude": 77.5946 }))]
pub struct Coordinate {
    #[serde(deserialize_with = "degrees")]
    #[schema(example = 12.9716)]
    pub latitude: f64,
    #[serde(deserialize_with = "degrees")]
    #[schema(example = 77.5946)]
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle distance to `other`, in meters.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_m(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    /// Finite and inside [-90, 90] x [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Haversine distance in meters between two points given in degrees.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// A degree value as typed by a person: either a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DegreeInput {
    Number(f64),
    Text(String),
}

impl DegreeInput {
    pub fn parse(&self) -> Option<f64> {
        let value = match self {
            DegreeInput::Number(n) => *n,
            DegreeInput::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

fn degrees<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    DegreeInput::deserialize(deserializer)?
        .parse()
        .ok_or_else(|| serde::de::Error::custom("expected a finite number of degrees"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            ((12.9716, 77.5946), (12.9716, 77.5950)),
            ((51.5007, -0.1246), (40.6892, -74.0445)),
            ((-33.8568, 151.2153), (35.6586, 139.7454)),
            ((0.0, 179.9), (0.0, -179.9)),
        ];

        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let ab = haversine_m(lat1, lon1, lat2, lon2);
            let ba = haversine_m(lat2, lon2, lat1, lon1);
            assert!((ab - ba).abs() < 1e-6, "{ab} != {ba}");
        }
    }

    #[test]
    fn distance_to_self_is_zero() {
        for (lat, lon) in [(0.0, 0.0), (12.9716, 77.5946), (-89.9, 45.0), (23.8, -179.0)] {
            assert_eq!(haversine_m(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn one_degree_of_longitude_on_the_equator() {
        let d = haversine_m(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111_195.0).abs() / 111_195.0 < 0.01, "got {d}");
    }

    #[test]
    fn bangalore_office_fixture_is_about_44_meters() {
        let office = Coordinate::new(12.9716, 77.5946);
        let device = Coordinate::new(12.9716, 77.5950);
        let d = office.distance_to(&device);
        assert!((d - 43.4).abs() < 1.0, "got {d}");
    }

    #[test]
    fn coordinate_accepts_numeric_strings() {
        let c: Coordinate =
            serde_json::from_str(r#"{"latitude":"12.9716","longitude":77.5946}"#).unwrap();
        assert_eq!(c, Coordinate::new(12.9716, 77.5946));

        let bad = serde_json::from_str::<Coordinate>(r#"{"latitude":"north","longitude":1}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn coordinate_range_check() {
        assert!(Coordinate::new(90.0, -180.0).is_valid());
        assert!(!Coordinate::new(90.5, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 181.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }
}

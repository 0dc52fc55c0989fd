use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::model::session::PunchMethod;

/// A WGS84 coordinate pair as reported by the punch client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[schema(example = 23.8103)]
    pub lat: f64,
    #[schema(example = 90.4125)]
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(EngineError::validation("coordinates must be finite numbers"));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(EngineError::validation("latitude must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(EngineError::validation("longitude must be between -180 and 180"));
        }
        Ok(())
    }
}

/// Circular boundary around a workplace coordinate.
///
/// `allowed_methods` is a comma-separated list of punch methods the zone
/// accepts; an empty list accepts every method.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GeofenceZone {
    pub id: u64,
    pub workplace_id: u64,
    pub label: String,
    pub center_lat: f64,
    pub center_lng: f64,
    pub radius_m: f64,
    pub active: bool,
    pub allowed_methods: String,
}

impl GeofenceZone {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.center_lat, self.center_lng)
    }

    pub fn allows(&self, method: PunchMethod) -> bool {
        let list = self.allowed_methods.trim();
        if list.is_empty() {
            return true;
        }
        list.split(',')
            .any(|m| m.trim().eq_ignore_ascii_case(&method.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(allowed: &str) -> GeofenceZone {
        GeofenceZone {
            id: 1,
            workplace_id: 1,
            label: "HQ".into(),
            center_lat: 0.0,
            center_lng: 0.0,
            radius_m: 100.0,
            active: true,
            allowed_methods: allowed.into(),
        }
    }

    #[test]
    fn empty_method_list_allows_everything() {
        assert!(zone("").allows(PunchMethod::Gps));
        assert!(zone("").allows(PunchMethod::Manual));
    }

    #[test]
    fn method_list_is_case_insensitive() {
        let z = zone("GPS, wifi");
        assert!(z.allows(PunchMethod::Gps));
        assert!(z.allows(PunchMethod::Wifi));
        assert!(!z.allows(PunchMethod::Beacon));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(GeoPoint::new(91.0, 0.0).validate().is_err());
        assert!(GeoPoint::new(0.0, -180.5).validate().is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).validate().is_err());
        assert!(GeoPoint::new(-90.0, 180.0).validate().is_ok());
    }
}

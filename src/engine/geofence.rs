//! Pure geofence containment checks plus the store-backed lookup that
//! feeds them. Containment is inclusive at the boundary: a point exactly
//! `radius_m` meters from the center is inside the zone.

use crate::error::EngineError;
use crate::model::geofence::{GeoPoint, GeofenceZone};
use crate::model::session::PunchMethod;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Zones with a non-positive radius never match.
pub fn is_within_zone(point: GeoPoint, zone: &GeofenceZone) -> bool {
    if zone.radius_m <= 0.0 {
        return false;
    }
    haversine_meters(point, zone.center()) <= zone.radius_m
}

/// A workplace with no active zone is unrestricted: every location is
/// treated as valid.
pub fn is_compliant(point: GeoPoint, method: PunchMethod, zones: &[GeofenceZone]) -> bool {
    if zones.is_empty() {
        return true;
    }
    zones
        .iter()
        .any(|zone| zone.allows(method) && is_within_zone(point, zone))
}

/// Fetch the workplace's active zones and apply the pure check.
pub async fn check_compliance<'e, E>(
    executor: E,
    workplace_id: u64,
    point: GeoPoint,
    method: PunchMethod,
) -> Result<bool, EngineError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let zones = sqlx::query_as::<_, GeofenceZone>(
        r#"
        SELECT id, workplace_id, label, center_lat, center_lng, radius_m, active, allowed_methods
        FROM geofence_zones
        WHERE workplace_id = ? AND active = TRUE
        "#,
    )
    .bind(workplace_id)
    .fetch_all(executor)
    .await?;

    Ok(is_compliant(point, method, &zones))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone_at(lat: f64, lng: f64, radius_m: f64) -> GeofenceZone {
        GeofenceZone {
            id: 1,
            workplace_id: 7,
            label: "HQ".into(),
            center_lat: lat,
            center_lng: lng,
            radius_m,
            active: true,
            allowed_methods: String::new(),
        }
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = GeoPoint::new(23.8103, 90.4125);
        assert!(haversine_meters(p, p).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        let d = haversine_meters(a, b);
        assert!((d - 111_194.9).abs() < 1.0, "got {d}");
    }

    #[test]
    fn containment_is_inclusive_at_the_boundary() {
        // A point ~100 m north of center: within at exactly that radius,
        // outside once the radius shrinks by a centimeter.
        let center = GeoPoint::new(23.8103, 90.4125);
        let point = GeoPoint::new(23.8103 + 100.0 / 111_194.926, 90.4125);
        let d = haversine_meters(point, center);
        assert!((d - 100.0).abs() < 0.1, "got {d}");

        assert!(is_within_zone(point, &zone_at(center.lat, center.lng, d)));
        assert!(!is_within_zone(point, &zone_at(center.lat, center.lng, d - 0.01)));
    }

    #[test]
    fn point_at_center_is_within() {
        let z = zone_at(40.0, -74.0, 50.0);
        assert!(is_within_zone(GeoPoint::new(40.0, -74.0), &z));
    }

    #[test]
    fn non_positive_radius_never_matches() {
        let z = zone_at(40.0, -74.0, 0.0);
        assert!(!is_within_zone(GeoPoint::new(40.0, -74.0), &z));
    }

    #[test]
    fn unconfigured_workplace_is_unrestricted() {
        assert!(is_compliant(GeoPoint::new(0.0, 0.0), PunchMethod::Gps, &[]));
    }

    #[test]
    fn zone_method_restrictions_apply() {
        let mut z = zone_at(40.0, -74.0, 100.0);
        z.allowed_methods = "gps".into();
        let point = GeoPoint::new(40.0, -74.0);
        assert!(is_compliant(point, PunchMethod::Gps, std::slice::from_ref(&z)));
        assert!(!is_compliant(point, PunchMethod::Manual, std::slice::from_ref(&z)));
    }
}

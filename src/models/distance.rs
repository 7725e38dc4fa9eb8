use crate::models::{
    common::{constants::EARTH_RADIUS_KM, GeoPoint},
    traits::IDistanceMetric,
};

/// Haversine公式による大円距離
///
/// 地球を半径 6371 km の球とみなし、2地点間の大円距離をkm単位で返します。
/// 入力は度単位で、範囲の検証は行いません。
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl IDistanceMetric for Haversine {
    fn distance(&self, a: &GeoPoint, b: &GeoPoint) -> f64 {
        if a == b {
            return 0.0;
        }

        let d_lat = (b.latitude - a.latitude).to_radians();
        let d_lon = (b.longitude - a.longitude).to_radians();
        let lat_a = a.latitude.to_radians();
        let lat_b = b.latitude.to_radians();

        let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
        let central_angle = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

        EARTH_RADIUS_KM * central_angle
    }
}

/// 関数形式のショートカット
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    Haversine.distance(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        for p in [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(23.0375, 72.4949),
            GeoPoint::new(-89.9, 179.9),
        ] {
            assert_eq!(haversine_km(&p, &p), 0.0);
        }
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // 1度 = 2πR/360 ≈ 111.195 km
        let d = haversine_km(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(1.0, 0.0));
        assert!((d - 111.195).abs() < 0.01, "distance = {}", d);
    }

    #[test]
    fn test_symmetric_and_positive() {
        let a = GeoPoint::new(23.0375, 72.4949);
        let b = GeoPoint::new(23.129318, 72.544884);
        let ab = haversine_km(&a, &b);
        let ba = haversine_km(&b, &a);
        assert!(ab > 0.0);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_antipodal_points() {
        let d = haversine_km(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }
}

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 地理座標（緯度・経度）を表す値型
///
/// 緯度・経度はいずれも度単位です。範囲チェックは呼び出し側（シナリオ読み込み）で行います。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,  // deg [-90, 90]
    pub longitude: f64, // deg [-180, 180]
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// 2点間の線形補間
    ///
    /// 緯度・経度の各軸を独立に補間します（`self + (target - self) * fraction`）。
    /// `fraction = 0` で `self`、`fraction = 1` で `target` になります。
    pub fn lerp(&self, target: &GeoPoint, fraction: f64) -> GeoPoint {
        *self + (*target - *self) * fraction
    }

    /// 座標差のユークリッド長（度単位）
    ///
    /// 測地線距離ではありません。中央値推定の収束判定にのみ使用します。
    pub fn coordinate_delta(&self, other: &GeoPoint) -> f64 {
        ((self.latitude - other.latitude).powi(2) + (self.longitude - other.longitude).powi(2)).sqrt()
    }

    /// 座標が有効範囲内かどうか
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// 座標列の成分ごとの算術平均
    ///
    /// 球面上の重心ではなく、緯度・経度それぞれの単純平均です。空の場合は `None`。
    pub fn mean(points: &[GeoPoint]) -> Option<GeoPoint> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (lat_sum, lon_sum) = points
            .iter()
            .fold((0.0, 0.0), |(lat, lon), p| (lat + p.latitude, lon + p.longitude));
        Some(GeoPoint::new(lat_sum / n, lon_sum / n))
    }
}

impl Add for GeoPoint {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.latitude + other.latitude, self.longitude + other.longitude)
    }
}

impl Sub for GeoPoint {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.latitude - other.latitude, self.longitude - other.longitude)
    }
}

impl Mul<f64> for GeoPoint {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.latitude * scalar, self.longitude * scalar)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// シミュレーション定数
pub mod constants {
    /// 地球の平均半径（km）
    pub const EARTH_RADIUS_KM: f64 = 6371.0;

    /// 進捗の到達判定で許容する浮動小数点の累積誤差
    pub const PROGRESS_TOLERANCE: f64 = 1e-9;

    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
    pub const DEFAULT_PHASE_INCREMENT: f64 = 0.02;
    pub const DEFAULT_CONVERGENCE_EPSILON: f64 = 1e-10;
    pub const DEFAULT_MAX_ITERATIONS: u32 = 100;
}

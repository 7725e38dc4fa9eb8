use crate::error::{SimError, SimResult};
use crate::models::{common::GeoPoint, distance::Haversine, traits::IDistanceMetric};
use serde::Serialize;
use tracing::{debug, warn};

/// 中央値推定の結果
///
/// `converged = false` はエラーではなく、最大反復回数内に収束しなかった
/// 最良推定値であることを示します。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MedianEstimate {
    pub point: GeoPoint,
    pub converged: bool,
    pub iterations: u32,
}

/// Weiszfeld法による幾何中央値の推定器
///
/// 重みの計算には距離関数 `M`（既定はHaversine）を使用しますが、収束判定は
/// 座標差のユークリッド長で行います。この不一致は既存の挙動に合わせた近似で、
/// 球面上の最適性は保証しません。
#[derive(Debug, Clone, Default)]
pub struct MedianSolver<M: IDistanceMetric = Haversine> {
    metric: M,
}

impl MedianSolver<Haversine> {
    pub fn new() -> Self {
        Self { metric: Haversine }
    }
}

impl<M: IDistanceMetric> MedianSolver<M> {
    pub fn with_metric(metric: M) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// 入力点群の幾何中央値を推定
    ///
    /// # 引数
    ///
    /// * `points` - 入力座標（1点以上）
    /// * `max_iterations` - 最大反復回数
    /// * `epsilon` - 収束判定しきい値（座標差、度）
    ///
    /// # 戻り値
    ///
    /// 推定結果。`points` が空の場合は `SimError::EmptyInput`
    pub fn solve(&self, points: &[GeoPoint], max_iterations: u32, epsilon: f64) -> SimResult<MedianEstimate> {
        let mut current = match points {
            [] => return Err(SimError::EmptyInput),
            [single] => {
                return Ok(MedianEstimate {
                    point: *single,
                    converged: true,
                    iterations: 0,
                });
            }
            _ => GeoPoint::mean(points).ok_or(SimError::EmptyInput)?,
        };

        for iteration in 1..=max_iterations {
            let mut weight_sum = 0.0;
            let mut lat_numerator = 0.0;
            let mut lon_numerator = 0.0;

            for point in points {
                let distance = self.metric.distance(&current, point);
                // 推定点と一致する点はこの反復では寄与しない
                if distance == 0.0 {
                    continue;
                }
                let weight = 1.0 / distance;
                weight_sum += weight;
                lat_numerator += weight * point.latitude;
                lon_numerator += weight * point.longitude;
            }

            // 全ての点が推定点と一致している
            if weight_sum == 0.0 {
                return Ok(MedianEstimate {
                    point: current,
                    converged: true,
                    iterations: iteration,
                });
            }

            let next = GeoPoint::new(lat_numerator / weight_sum, lon_numerator / weight_sum);
            let change = next.coordinate_delta(&current);

            if change < epsilon {
                debug!(
                    iterations = iteration,
                    latitude = next.latitude,
                    longitude = next.longitude,
                    "MEDIAN_CONVERGED: 中央値推定が収束しました"
                );
                return Ok(MedianEstimate {
                    point: next,
                    converged: true,
                    iterations: iteration,
                });
            }

            current = next;
        }

        warn!(
            max_iterations,
            epsilon,
            latitude = current.latitude,
            longitude = current.longitude,
            "MEDIAN_NOT_CONVERGED: 最大反復回数内に収束しませんでした"
        );

        Ok(MedianEstimate {
            point: current,
            converged: false,
            iterations: max_iterations,
        })
    }

    /// 候補点から全入力点までの距離の総和（km）
    pub fn total_distance(&self, points: &[GeoPoint], candidate: &GeoPoint) -> f64 {
        points.iter().map(|p| self.metric.distance(candidate, p)).sum()
    }
}

use crate::models::common::GeoPoint;

/// シミュレーション内の移動エージェントが実装する基本インターフェース
pub trait IAgent {
    /// エージェントIDの取得
    fn get_id(&self) -> String;

    /// 現在位置の取得
    fn get_position(&self) -> GeoPoint;

    /// 開始位置の取得
    fn get_start_position(&self) -> GeoPoint;
}

/// 2地点間距離の計算インターフェース
pub trait IDistanceMetric {
    /// 2地点間の距離（km, 0以上）
    fn distance(&self, a: &GeoPoint, b: &GeoPoint) -> f64;
}

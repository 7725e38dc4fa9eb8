use crate::models::{common::GeoPoint, traits::IAgent};

/// 合流地点へ向かう移動エージェント
///
/// 開始位置と現在位置を保持します。現在位置が更新されるのはApproachingフェーズの間のみです。
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    /// エージェントの一意識別子
    pub id: String,
    /// 開始位置（補間の基準点）
    pub start_position: GeoPoint,
    /// 現在位置
    pub current_position: GeoPoint,
}

impl Agent {
    pub fn new(id: String, start_position: GeoPoint) -> Self {
        Self {
            id,
            start_position,
            current_position: start_position,
        }
    }

    /// 座標列から入力順にエージェントを生成（ID: A001, A002, ...）
    pub fn from_positions(positions: &[GeoPoint]) -> Vec<Agent> {
        positions
            .iter()
            .enumerate()
            .map(|(index, position)| Agent::new(format!("A{:03}", index + 1), *position))
            .collect()
    }

    /// 開始位置から `target` へ向かう線上の `fraction` の位置へ移動
    pub fn move_toward(&mut self, target: &GeoPoint, fraction: f64) {
        self.current_position = self.start_position.lerp(target, fraction);
    }

    /// 指定位置へ直接配置
    pub fn place_at(&mut self, position: GeoPoint) {
        self.current_position = position;
    }
}

impl IAgent for Agent {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_position(&self) -> GeoPoint {
        self.current_position
    }

    fn get_start_position(&self) -> GeoPoint {
        self.start_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_positions_assigns_ids_in_order() {
        let agents = Agent::from_positions(&[GeoPoint::new(1.0, 2.0), GeoPoint::new(3.0, 4.0)]);
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].get_id(), "A001");
        assert_eq!(agents[1].get_id(), "A002");
        assert_eq!(agents[1].get_position(), GeoPoint::new(3.0, 4.0));
    }

    #[test]
    fn test_move_toward_uses_start_as_baseline() {
        let mut agent = Agent::new("A001".to_string(), GeoPoint::new(0.0, 0.0));
        let target = GeoPoint::new(2.0, 4.0);
        agent.move_toward(&target, 0.5);
        agent.move_toward(&target, 0.5);
        assert_eq!(agent.get_position(), GeoPoint::new(1.0, 2.0));
        assert_eq!(agent.get_start_position(), GeoPoint::new(0.0, 0.0));
    }
}

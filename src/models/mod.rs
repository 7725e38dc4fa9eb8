// 基本的なデータ型と定数
pub mod common;

// エージェント・距離関数のインターフェース（trait）定義
pub mod traits;

// 距離関数・中央値推定・フェーズシミュレータの実装
pub mod agent;
pub mod distance;
pub mod median;
pub mod simulator;

// 便利な re-export
pub use agent::Agent;
pub use common::*;
pub use distance::{haversine_km, Haversine};
pub use median::{MedianEstimate, MedianSolver};
pub use simulator::{Phase, PhaseSimulator, SimulationState, TickOutcome};
pub use traits::*;

//! # mergesim
//!
//! 複数の移動エージェントの合流地点（幾何中央値）を推定し、合流・帰路の
//! 2フェーズを補間で再現するティック駆動シミュレーション。
//!
//! | モジュール       | 内容                                                   |
//! |------------------|--------------------------------------------------------|
//! | [`models`]       | `GeoPoint`、Haversine距離、Weiszfeld中央値推定、状態機械 |
//! | [`simulation`]   | コントローラ（開始・停止・再開）、スケジューラ・シンクのtrait |
//! | [`runner`]       | tokioインターバルによるスケジューラと実行ループ          |
//! | [`scenario`]     | YAMLシナリオの読み込みと検証                             |
//! | [`output`]       | スナップショット出力（ログ、JSON Lines）                 |
//! | [`logging`]      | tracingの初期化                                          |

pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod runner;
pub mod scenario;
pub mod simulation;

pub use error::{SimError, SimResult};

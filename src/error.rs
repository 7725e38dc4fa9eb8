use thiserror::Error;

/// シミュレーション構築時のエラー
///
/// ティック処理中にエラーは発生しません。全てのエラーは `start` / `restart` の
/// 呼び出し元へ同期的に返されます。
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("エージェント座標が1つも指定されていません")]
    EmptyInput,

    #[error("シミュレーションは既に実行中です (restartを使用してください)")]
    AlreadyRunning,
}

pub type SimResult<T> = Result<T, SimError>;

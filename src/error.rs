// ============================================
// src/error.rs
// エラー型の定義
// ============================================

use thiserror::Error;

/// カード生成 API の失敗。呼び出し側はフォールバックデッキで続行する
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generator returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("empty response from generator")]
    EmptyResponse,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("generator returned no usable cards")]
    EmptyDeck,
}

/// ラウンド開始時の致命的なエラー (フォールバックデッキ自体が壊れている等)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("deck is empty")]
    EmptyDeck,

    #[error("card #{0} has no name")]
    BlankName(usize),

    #[error("card \"{name}\" has {count} hints (expected 3)")]
    HintCount { name: String, count: usize },

    #[error("duplicate card id \"{0}\"")]
    DuplicateId(String),
}

/// 設定ファイルの読み込みエラー
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================
// src/config.rs
// 設定ファイル (config.json) の読み込みと保存先パス
// ============================================

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::cards::{Category, Difficulty, Settings};
use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.json";
const LOG_FILE: &str = "tobe_heads_up.log";

/// API キーを探す環境変数 (先に見つかったもの)
const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// アプリの設定。書き出しはしない (読み込みのみ)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub cards_per_round: usize,
    pub duration_secs: u32,
    pub category: Category,
    pub difficulty: Difficulty,
    pub image_endpoint: String,
    pub request_timeout_secs: u64,
    pub image_timeout_secs: u64,
    pub offline: bool,
    pub shuffle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            cards_per_round: 15,
            duration_secs: 90,
            category: Category::FamousPeople,
            difficulty: Difficulty::Easy,
            image_endpoint: "https://image.pollinations.ai".to_string(),
            request_timeout_secs: 20,
            image_timeout_secs: 30,
            offline: false,
            shuffle: false,
        }
    }
}

impl Config {
    /// `path` が指定されていればそのファイル (なければエラー)、
    /// なければ設定ディレクトリの config.json (なければデフォルト)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };

        if let Some(key) = api_key_from_env(|name| env::var(name).ok()) {
            config.api_key = Some(key);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// メニューの初期値
    pub fn settings(&self) -> Settings {
        Settings {
            category: self.category,
            difficulty: self.difficulty,
            duration: self.duration_secs.max(1),
        }
    }
}

fn api_key_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|v| !v.trim().is_empty())
}

// MARK: パス

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("jp", "Fukumoto0141", "TOBE_HEADS_UP")
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join(CONFIG_FILE))
}

/// ログファイルのパス。データディレクトリがなければ作る
pub fn log_file_path() -> PathBuf {
    if let Some(proj_dirs) = project_dirs() {
        let data_dir = proj_dirs.data_dir();
        if fs::create_dir_all(data_dir).is_ok() {
            return data_dir.join(LOG_FILE);
        }
    }
    // 取得できなかったらカレントディレクトリに
    PathBuf::from(LOG_FILE)
}

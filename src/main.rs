// ============================================
// src/main.rs (メインファイル)
// ============================================

use std::fs::File;
use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod app;
mod cards;
mod config;
mod deck_provider;
mod error;
mod image_gate;
mod round;
mod timer;
mod ui;

use app::App;
use cards::{Category, Difficulty};
use config::Config;
use deck_provider::{DeckProvider, GeminiProvider};
use image_gate::{ImageRenderer, PlaceholderRenderer, PollinationsRenderer};
use round::RoundMachine;

use clap::Parser;
use console::style;
use crossterm::{
    ExecutableCommand,
    cursor::{Hide, Show},
    event::{self, Event, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{LevelFilter, info};
use ratatui::prelude::*;

/// 「to be」動詞を練習する Heads Up 風パーティーゲーム
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// 最初に選ばれているカテゴリ
    #[arg(long, value_enum)]
    category: Option<Category>,

    #[arg(long, value_enum)]
    difficulty: Option<Difficulty>,

    /// 1ラウンドの秒数
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    duration: Option<u32>,

    /// 1ラウンドで生成するカード枚数
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=50))]
    cards: Option<u64>,

    /// 生成に使うモデル名
    #[arg(long)]
    model: Option<String>,

    /// API を使わずフォールバックデッキで遊ぶ
    #[arg(long)]
    offline: bool,

    /// 生成したデッキをシャッフルする
    #[arg(long)]
    shuffle: bool,

    /// 設定ファイルのパス (省略時は設定ディレクトリの config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// デバッグログを出す
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// コマンドライン引数で設定を上書き
    fn apply(&self, config: &mut Config) {
        if let Some(c) = self.category {
            config.category = c;
        }
        if let Some(d) = self.difficulty {
            config.difficulty = d;
        }
        if let Some(secs) = self.duration {
            config.duration_secs = secs;
        }
        if let Some(n) = self.cards {
            config.cards_per_round = n as usize;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        config.offline |= self.offline;
        config.shuffle |= self.shuffle;
    }
}

// --------------------------------------------------
// メイン関数 (TUIセットアップと実行ループ)
// --------------------------------------------------

fn main() -> io::Result<()> {
    let args = Args::parse();
    let log_path = init_logging(args.verbose);

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {e}", style("config error:").red().bold());
            std::process::exit(2);
        }
    };
    args.apply(&mut config);

    let app = match build_app(&config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{} {e}", style("failed to create HTTP client:").red().bold());
            std::process::exit(1);
        }
    };
    info!(
        "starting: offline={} model={} cards={}",
        config.offline, config.model, config.cards_per_round
    );

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, app);
    restore_terminal(&mut terminal)?;

    if let Some(path) = log_path {
        println!("{} {}", style("log:").dim(), path.display());
    }
    result
}

/// ログはターミナルを汚さないようにファイルへ出す
fn init_logging(verbose: bool) -> Option<PathBuf> {
    let path = config::log_file_path();
    let file = File::create(&path).ok()?;

    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .filter_module("reqwest", LevelFilter::Warn)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Some(path)
}

fn build_app(config: &Config) -> Result<App, reqwest::Error> {
    let provider: Arc<dyn DeckProvider> = Arc::new(GeminiProvider::new(
        &config.api_base,
        // オフラインなら必ずフォールバックデッキになる
        if config.offline { None } else { config.api_key.clone() },
        &config.model,
        Duration::from_secs(config.request_timeout_secs),
    )?);

    let renderer: Arc<dyn ImageRenderer> = if config.offline {
        Arc::new(PlaceholderRenderer)
    } else {
        Arc::new(PollinationsRenderer::new(
            &config.image_endpoint,
            Duration::from_secs(config.image_timeout_secs),
        )?)
    };

    Ok(App::new(
        RoundMachine::new(config.settings()),
        provider,
        renderer,
        config.cards_per_round,
        config.shuffle,
    ))
}

fn setup_terminal() -> io::Result<Terminal<impl Backend>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?; // 代替スクリーンを使用
    stdout().execute(Hide)?; // カーソルを非表示
    let backend = CrosstermBackend::new(stdout());
    Terminal::new(backend)
}

fn restore_terminal(_terminal: &mut Terminal<impl Backend>) -> io::Result<()> {
    stdout().execute(Show)?; // カーソルを再表示
    stdout().execute(LeaveAlternateScreen)?; // 代替スクリーンを終了
    disable_raw_mode()?;
    Ok(())
}

fn run_app(terminal: &mut Terminal<impl Backend>, mut app: App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui::ui(f, app.machine()))?;

        // ワーカーからの結果とタイマーを先に処理
        app.pump(Instant::now());

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code, Instant::now());
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    info!("bye");
    Ok(())
}

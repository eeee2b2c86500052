// ============================================
// src/image_gate.rs
// カード画像の読み込み状態 (タイマーのゲート) と画像レンダラー
// ============================================

use std::time::Duration;

use log::debug;
use reqwest::Url;
use reqwest::blocking::Client;

use crate::cards::Card;

/// 画像読み込みの結果。成功でも失敗でも「準備完了」として扱う
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Loaded { bytes: usize },
    Failed(String),
}

/// 表示中カードの画像が読み込み済みかを管理する
#[derive(Debug, Default)]
pub struct ImageGate {
    round: u64,
    card_id: Option<String>,
    outcome: Option<ImageOutcome>,
}

impl ImageGate {
    /// 表示カードが変わったら必ず呼ぶ (準備完了フラグを下ろす)
    pub fn reset(&mut self, round: u64, card_id: &str) {
        self.round = round;
        self.card_id = Some(card_id.to_string());
        self.outcome = None;
    }

    /// ラウンド終了時など、表示カードがなくなったとき
    pub fn clear(&mut self) {
        self.card_id = None;
        self.outcome = None;
    }

    /// 読み込み結果を受け取る。今のカード宛てで、初めての結果なら true
    pub fn signal(&mut self, round: u64, card_id: &str, outcome: ImageOutcome) -> bool {
        if self.round != round || self.card_id.as_deref() != Some(card_id) {
            debug!("stale image signal for {card_id} (round {round})");
            return false;
        }
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }

    pub fn is_ready(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&ImageOutcome> {
        self.outcome.as_ref()
    }
}

// --------------------------------------------------
// レンダラー
// --------------------------------------------------

/// カード画像を用意する外部サービス。ブロッキングで呼ばれる (ワーカースレッド上)
pub trait ImageRenderer: Send + Sync {
    fn render(&self, card: &Card) -> ImageOutcome;
}

/// image.pollinations.ai で肖像画を生成する
pub struct PollinationsRenderer {
    client: Client,
    endpoint: String,
}

impl PollinationsRenderer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

impl ImageRenderer for PollinationsRenderer {
    fn render(&self, card: &Card) -> ImageOutcome {
        let Some(url) = image_url(&self.endpoint, card) else {
            return ImageOutcome::Failed(format!("bad image endpoint {}", self.endpoint));
        };

        let response = match self.client.get(url).send() {
            Ok(r) => r,
            Err(e) => return ImageOutcome::Failed(e.to_string()),
        };
        if !response.status().is_success() {
            return ImageOutcome::Failed(format!("status {}", response.status()));
        }
        match response.bytes() {
            Ok(body) => ImageOutcome::Loaded { bytes: body.len() },
            Err(e) => ImageOutcome::Failed(e.to_string()),
        }
    }
}

/// オフライン用。すぐに失敗を返してプレースホルダー表示にする
pub struct PlaceholderRenderer;

impl ImageRenderer for PlaceholderRenderer {
    fn render(&self, _card: &Card) -> ImageOutcome {
        ImageOutcome::Failed("offline".to_string())
    }
}

/// カードの名前とIDから画像URLを作る (seed にIDを使うので同じカードは同じ絵)
pub fn image_url(endpoint: &str, card: &Card) -> Option<Url> {
    let mut url = Url::parse(endpoint).ok()?;
    let prompt = format!(
        "{} {} portrait icon bright colorful style",
        card.name, card.category
    );
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push("prompt")
        .push(&prompt);
    url.query_pairs_mut()
        .append_pair("width", "400")
        .append_pair("height", "400")
        .append_pair("nologo", "true")
        .append_pair("seed", &card.id);
    Some(url)
}

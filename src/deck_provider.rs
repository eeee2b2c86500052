// ============================================
// src/deck_provider.rs
// カード生成 (Gemini API) とレスポンスの整形
// ============================================

use std::time::Duration;

use chrono::Utc;
use log::{debug, info};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::cards::{Card, Category, Difficulty, HINTS_PER_CARD};
use crate::error::GenerationError;

/// カードデッキを用意する外部サービス。ワーカースレッドから呼ばれる
pub trait DeckProvider: Send + Sync {
    fn fetch_deck(
        &self,
        category: Category,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<Card>, GenerationError>;
}

pub struct GeminiProvider {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl GeminiProvider {
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }
}

impl DeckProvider for GeminiProvider {
    fn fetch_deck(
        &self,
        category: Category,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<Card>, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::MissingApiKey)?;

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        info!("requesting {count} cards ({category} / {difficulty}) from {}", self.model);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&request_body(category, difficulty, count))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response.json()?;
        let text = body.first_text().ok_or(GenerationError::EmptyResponse)?;
        debug!("generator returned {} bytes", text.len());

        parse_cards(text, count, Utc::now().timestamp_millis())
    }
}

// --------------------------------------------------
// リクエスト
// --------------------------------------------------

fn prompt(category: Category, difficulty: Difficulty, count: usize) -> String {
    format!(
        r#"Generate {count} "Heads Up" game cards for learning the English verb "To Be".

Category: {category}
Difficulty: {difficulty}

Rules:
1. "name": The famous person, character, animal, or job.
2. "category": A short subtitle (e.g., "Actor", "Superhero", "Mammal").
3. "hints": Provide 3 short sentences describing the name using ONLY the "To Be" verb (am, is, are, was, were).
   Example: "He is famous." "He was a president."
4. "toBeContext": The question format the guesser should use (e.g., "Am I...?" for people, "Is it...?" for animals).
"#
    )
}

fn request_body(category: Category, difficulty: Difficulty, count: usize) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt(category, difficulty, count) }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "name": { "type": "STRING" },
                        "category": { "type": "STRING" },
                        "hints": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "toBeContext": { "type": "STRING" }
                    },
                    "required": ["id", "name", "category", "hints", "toBeContext"]
                }
            }
        }
    })
}

// --------------------------------------------------
// レスポンス
// --------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.text.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

/// 生成されたカード (id は信用しないので読むだけ)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedCard {
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default)]
    to_be_context: String,
}

/// JSON 文字列をカードに変換する。IDは `card-{生成時刻}-{番号}` で振り直す
pub fn parse_cards(text: &str, count: usize, stamp_millis: i64) -> Result<Vec<Card>, GenerationError> {
    let raw: Vec<GeneratedCard> = serde_json::from_str(text)?;

    let cards: Vec<Card> = raw
        .into_iter()
        .filter(|c| !c.name.trim().is_empty() && c.hints.len() >= HINTS_PER_CARD)
        .take(count)
        .enumerate()
        .map(|(i, c)| Card {
            id: format!("card-{stamp_millis}-{i}"),
            name: c.name.trim().to_string(),
            category: c.category,
            hints: c.hints.into_iter().take(HINTS_PER_CARD).collect(),
            to_be_context: c.to_be_context,
        })
        .collect();

    if cards.is_empty() {
        return Err(GenerationError::EmptyDeck);
    }
    Ok(cards)
}

/*
 * src/cards.rs
 * カード・カテゴリ・難易度と、オフライン用のフォールバックデッキ
 */

use std::collections::HashSet;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::StartError;

/// 1枚のカードに付くヒントの数
pub const HINTS_PER_CARD: usize = 3;

/// 1ラウンド分のカード (生成後は変更しない)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,     // 例: "Taylor Swift"
    pub category: String, // 例: "Singer"
    pub hints: Vec<String>,
    pub to_be_context: String, // "Am I...?" など
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Category {
    #[default]
    #[serde(rename = "Famous People")]
    FamousPeople,
    #[serde(rename = "Fictional Characters")]
    FictionalCharacters,
    #[serde(rename = "Animals")]
    Animals,
    #[serde(rename = "Jobs & Professions")]
    Jobs,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::FamousPeople,
        Category::FictionalCharacters,
        Category::Animals,
        Category::Jobs,
    ];

    /// 画面表示と生成プロンプトで使うラベル
    pub fn label(self) -> &'static str {
        match self {
            Category::FamousPeople => "Famous People",
            Category::FictionalCharacters => "Fictional Characters",
            Category::Animals => "Animals",
            Category::Jobs => "Jobs & Professions",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Difficulty {
    #[default]
    Easy,
    Hard,
}

impl Difficulty {
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Hard,
            Difficulty::Hard => Difficulty::Easy,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// メニューで選ぶ設定。ラウンドをまたいで保持する (メモリ上のみ)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub category: Category,
    pub difficulty: Difficulty,
    pub duration: u32, // 秒
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            category: Category::FamousPeople,
            difficulty: Difficulty::Easy,
            duration: 90,
        }
    }
}

// --------------------------------------------------
// フォールバックデッキ
// --------------------------------------------------

#[derive(Copy, Clone)]
struct CardTemplate {
    id: &'static str,
    name: &'static str,
    category: &'static str,
    hints: [&'static str; HINTS_PER_CARD],
    to_be_context: &'static str,
}

/// API が使えないときのカード (順番も固定)
const FALLBACK_LIST: &[CardTemplate] = &[
    CardTemplate {
        id: "1",
        name: "Spiderman",
        category: "Superhero",
        hints: ["He is a teenager", "He is strong", "He is red and blue"],
        to_be_context: "Am I...?",
    },
    CardTemplate {
        id: "2",
        name: "Lion",
        category: "Animal",
        hints: ["It is the king of the jungle", "It is fierce", "It is big"],
        to_be_context: "Am I...?",
    },
    CardTemplate {
        id: "3",
        name: "Doctor",
        category: "Job",
        hints: ["They are helpful", "They are in a hospital", "They are smart"],
        to_be_context: "Am I...?",
    },
    CardTemplate {
        id: "4",
        name: "Harry Potter",
        category: "Wizard",
        hints: ["He is magical", "He is brave", "He is a student"],
        to_be_context: "Am I...?",
    },
];

pub fn fallback_deck() -> Vec<Card> {
    FALLBACK_LIST
        .iter()
        .map(|t| Card {
            id: t.id.to_string(),
            name: t.name.to_string(),
            category: t.category.to_string(),
            hints: t.hints.iter().map(|h| h.to_string()).collect(),
            to_be_context: t.to_be_context.to_string(),
        })
        .collect()
}

/// デッキがプレイ可能かチェックする
pub fn validate_deck(deck: &[Card]) -> Result<(), StartError> {
    if deck.is_empty() {
        return Err(StartError::EmptyDeck);
    }

    let mut seen = HashSet::new();
    for (i, card) in deck.iter().enumerate() {
        if card.name.trim().is_empty() {
            return Err(StartError::BlankName(i));
        }
        if card.hints.len() != HINTS_PER_CARD {
            return Err(StartError::HintCount {
                name: card.name.clone(),
                count: card.hints.len(),
            });
        }
        if !seen.insert(card.id.as_str()) {
            return Err(StartError::DuplicateId(card.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_deck_is_playable() {
        let deck = fallback_deck();
        let names: Vec<&str> = deck.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Spiderman", "Lion", "Doctor", "Harry Potter"]);
        assert_eq!(validate_deck(&deck), Ok(()));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut deck = fallback_deck();
        deck[3].id = deck[0].id.clone();
        assert_eq!(
            validate_deck(&deck),
            Err(StartError::DuplicateId("1".to_string()))
        );
    }

    #[test]
    fn missing_hint_is_rejected() {
        let mut deck = fallback_deck();
        deck[1].hints.pop();
        assert!(matches!(
            validate_deck(&deck),
            Err(StartError::HintCount { count: 2, .. })
        ));
        assert_eq!(validate_deck(&[]), Err(StartError::EmptyDeck));
    }

    #[test]
    fn category_cycles_through_all_labels() {
        let mut c = Category::FamousPeople;
        for _ in 0..Category::ALL.len() {
            c = c.next();
        }
        assert_eq!(c, Category::FamousPeople);
        assert_eq!(Category::FamousPeople.prev(), Category::Jobs);
        assert_eq!(Category::Jobs.to_string(), "Jobs & Professions");
    }

    #[test]
    fn card_uses_camel_case_context_key() {
        let json = r#"{"id":"x","name":"Cat","category":"Pet","hints":["a","b","c"],"toBeContext":"Is it...?"}"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.to_be_context, "Is it...?");
    }
}

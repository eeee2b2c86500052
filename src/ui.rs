// ============================================
// src/ui.rs
// 画面描画 (状態ごとに1画面)
// ============================================

use ratatui::{
    prelude::*,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};

use crate::cards::{Card, Category, Difficulty};
use crate::image_gate::ImageOutcome;
use crate::round::{RoundMachine, RoundState};

pub const APP_TITLE: &str = "ToBe Heads Up";

pub fn ui(f: &mut Frame, machine: &RoundMachine) {
    let size = f.area();
    // 枠線を描画
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("{APP_TITLE} !"));
    let inner_area = block.inner(size);
    f.render_widget(block, size);

    match machine.state() {
        RoundState::Menu => render_menu(f, inner_area, machine),
        RoundState::Generating => render_generating(f, inner_area, machine),
        RoundState::Countdown => render_countdown(f, inner_area, machine),
        RoundState::Playing => render_playing(f, inner_area, machine),
        RoundState::Summary => render_summary(f, inner_area, machine),
        RoundState::Error => render_error(f, inner_area, machine),
    }
}

// --------------------------------------------------
// メニュー
// --------------------------------------------------

fn render_menu(f: &mut Frame, area: Rect, machine: &RoundMachine) {
    let settings = machine.settings();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // [0] タイトル
            Constraint::Length(7), // [1] 遊び方
            Constraint::Length(2), // [2] カテゴリ
            Constraint::Length(2), // [3] 難易度
            Constraint::Length(2), // [4] 制限時間
            Constraint::Min(1),    // [5] 操作説明
        ])
        .split(area);

    f.render_widget(
        Paragraph::new(vec![
            Line::from(APP_TITLE).style(Style::default().fg(Color::Yellow).bold()),
            Line::from("English Grammar Game").style(Style::default().fg(Color::Gray)),
        ])
        .centered(),
        chunks[0],
    );

    let how_to = vec![
        Line::from("How to Play").style(Style::default().fg(Color::Blue).bold()),
        Line::from(" - Select a category."),
        Line::from(" - Hold the screen where you can't see it."),
        Line::from(" - Friends see the Picture and Clues."),
        Line::from(vec![
            Span::raw(" - Friends say: \"He "),
            Span::styled("is", Style::default().bold()),
            Span::raw(" rich!\""),
        ]),
        Line::from(vec![
            Span::raw(" - You ask: \""),
            Span::styled("Am I", Style::default().bold()),
            Span::raw(" Batman?\""),
        ]),
    ];
    f.render_widget(
        Paragraph::new(how_to).block(Block::default().borders(Borders::LEFT)),
        chunks[1],
    );

    // 選択中の項目をハイライト
    let category_spans: Vec<Span> = Category::ALL
        .iter()
        .enumerate()
        .flat_map(|(i, c)| {
            let style = if *c == settings.category {
                Style::default().fg(Color::White).bg(Color::Blue).bold()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            [
                Span::styled(format!(" {}:{} ", i + 1, c.label()), style),
                Span::raw(" "),
            ]
        })
        .collect();
    f.render_widget(
        Paragraph::new(vec![
            Line::from("Select Category (←/→)").bold(),
            Line::from(category_spans),
        ]),
        chunks[2],
    );

    let difficulty_spans: Vec<Span> = [Difficulty::Easy, Difficulty::Hard]
        .iter()
        .flat_map(|d| {
            let style = if *d == settings.difficulty {
                Style::default().fg(Color::Black).bg(Color::Yellow).bold()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            [Span::styled(format!(" {} ", d.label()), style), Span::raw(" ")]
        })
        .collect();
    f.render_widget(
        Paragraph::new(vec![
            Line::from("Difficulty (d)").bold(),
            Line::from(difficulty_spans),
        ]),
        chunks[3],
    );

    f.render_widget(
        Paragraph::new(vec![
            Line::from("Time (+/-)").bold(),
            Line::from(format!(" {}s", settings.duration)),
        ]),
        chunks[4],
    );

    f.render_widget(
        Paragraph::new("[Enter] PLAY    [Esc] Quit")
            .style(Style::default().fg(Color::Green).bold())
            .centered(),
        chunks[5],
    );
}

// --------------------------------------------------
// 生成中・カウントダウン
// --------------------------------------------------

fn render_generating(f: &mut Frame, area: Rect, machine: &RoundMachine) {
    let text = vec![
        Line::from(format!("Curating {}...", machine.settings().category)).bold(),
        Line::from(""),
        Line::from("Generating cards and clues...").style(Style::default().fg(Color::Gray)),
    ];
    f.render_widget(Paragraph::new(text).centered(), vertically_centered(area, 3));
}

fn render_countdown(f: &mut Frame, area: Rect, machine: &RoundMachine) {
    let big = match machine.countdown() {
        0 => "GO!".to_string(),
        n => n.to_string(),
    };
    let text = vec![
        Line::from("GET READY!").style(Style::default().fg(Color::Yellow).bold()),
        Line::from(""),
        Line::from(big).style(Style::default().fg(Color::White).bold()),
        Line::from(""),
        Line::from("Place on forehead").style(Style::default().fg(Color::DarkGray)),
    ];
    f.render_widget(Paragraph::new(text).centered(), vertically_centered(area, 5));
}

// --------------------------------------------------
// プレイ中
// --------------------------------------------------

fn render_playing(f: &mut Frame, area: Rect, machine: &RoundMachine) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // [0] オフライン通知
            Constraint::Length(1), // [1] 残り時間ゲージ
            Constraint::Length(1), // [2] 進捗 "Card: 1 / 15"
            Constraint::Min(8),    // [3] カード
            Constraint::Length(1), // [4] 読み込み中表示
            Constraint::Length(1), // [5] 操作説明
        ])
        .split(area);

    // 0. 通知
    if let Some(notice) = machine.advisory() {
        f.render_widget(
            Paragraph::new(notice)
                .style(Style::default().fg(Color::White).bg(Color::Red))
                .centered(),
            chunks[0],
        );
    }

    // 1. 残り時間 (緑 → 黄 → 赤)
    let total = machine.settings().duration.max(1);
    let ratio = (machine.time_left() as f64 / total as f64).clamp(0.0, 1.0);
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(timer_color(ratio)).bg(Color::Black))
            .ratio(ratio)
            .label(format!("Time Remaining {}s", machine.time_left())),
        chunks[1],
    );

    // 2. 進捗
    f.render_widget(
        Paragraph::new(format!(
            "Card: {} / {}",
            machine.current_index() + 1,
            machine.deck().len()
        ))
        .style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );

    // 3. カード本体
    if let Some(card) = machine.current_card() {
        render_card(f, chunks[3], card, machine.image_outcome());
    }

    // 4. 画像待ちの間はボタン無効
    if !machine.is_card_ready() {
        f.render_widget(
            Paragraph::new("Loading next card...")
                .style(Style::default().fg(Color::Yellow))
                .centered(),
            chunks[4],
        );
    }

    let controls_style = if machine.is_card_ready() {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("[←] PASS", controls_style.bg(Color::Red)),
            Span::raw("    "),
            Span::styled("[→] CORRECT", controls_style.bg(Color::Green)),
        ]))
        .centered(),
        chunks[5],
    );
}

fn render_card(f: &mut Frame, area: Rect, card: &Card, image: Option<&ImageOutcome>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue))
        .title(Line::from(format!(" {} ", card.category.to_uppercase())).centered());
    let inner = block.inner(area);
    f.render_widget(block, area);

    let image_line = match image {
        None => Line::from("Painting Portrait...").style(Style::default().fg(Color::Blue)),
        Some(ImageOutcome::Loaded { bytes }) => {
            Line::from(format!("[portrait ready: {} KB]", bytes.div_ceil(1024)))
                .style(Style::default().fg(Color::Gray))
        }
        Some(ImageOutcome::Failed(_)) => {
            Line::from("[No Image]").style(Style::default().fg(Color::DarkGray))
        }
    };

    let mut lines = vec![
        image_line,
        Line::from(""),
        Line::from(card.name.as_str()).style(Style::default().fg(Color::White).bold()),
        Line::from(""),
        Line::from("GUESSER ASKS:").style(Style::default().fg(Color::DarkGray)),
        Line::from(format!("\"{}\"", card.to_be_context)).style(Style::default().fg(Color::Yellow)),
        Line::from(""),
        Line::from("CLUES FOR FRIENDS (READ ALOUD)").style(Style::default().fg(Color::DarkGray)),
    ];
    lines.extend(
        card.hints
            .iter()
            .map(|h| Line::from(format!("▌ {h}")).style(Style::default().fg(Color::Green))),
    );

    f.render_widget(
        Paragraph::new(lines).centered().wrap(Wrap { trim: true }),
        inner,
    );
}

fn timer_color(ratio: f64) -> Color {
    if ratio < 0.2 {
        Color::Red
    } else if ratio < 0.5 {
        Color::Yellow
    } else {
        Color::Green
    }
}

// --------------------------------------------------
// 結果・エラー
// --------------------------------------------------

fn render_summary(f: &mut Frame, area: Rect, machine: &RoundMachine) {
    let results = machine.results();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // [0] 見出し
            Constraint::Length(2), // [1] スコア
            Constraint::Length(1), // [2] 正解数 / パス数
            Constraint::Min(3),    // [3] 履歴
            Constraint::Length(1), // [4] 操作説明
        ])
        .split(area);

    f.render_widget(
        Paragraph::new("Round Over!").bold().centered(),
        chunks[0],
    );
    f.render_widget(
        Paragraph::new(vec![
            Line::from("TOTAL SCORE").style(Style::default().fg(Color::Gray)),
            Line::from(results.total_score.to_string()).style(Style::default().fg(Color::Blue).bold()),
        ])
        .centered(),
        chunks[1],
    );
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                format!("{} CORRECT", results.correct.len()),
                Style::default().fg(Color::Green).bold(),
            ),
            Span::raw("    "),
            Span::styled(
                format!("{} SKIPPED", results.skipped.len()),
                Style::default().fg(Color::Red).bold(),
            ),
        ]))
        .centered(),
        chunks[2],
    );

    // 正解したカード → パスしたカードの順
    let mut history: Vec<Line> = results
        .correct
        .iter()
        .map(|c| {
            Line::from(vec![
                Span::styled(" ✓ ", Style::default().fg(Color::Black).bg(Color::Green)),
                Span::raw(" "),
                Span::styled(c.name.as_str(), Style::default().bold()),
                Span::styled(
                    format!("  {}", c.hints.first().map(String::as_str).unwrap_or("")),
                    Style::default().fg(Color::Gray),
                ),
            ])
        })
        .collect();
    history.extend(results.skipped.iter().map(|c| {
        Line::from(vec![
            Span::styled(" ✗ ", Style::default().fg(Color::Black).bg(Color::Red)),
            Span::raw(" "),
            Span::styled(c.name.as_str(), Style::default().fg(Color::DarkGray)),
            Span::styled(format!("  {}", c.category), Style::default().fg(Color::DarkGray)),
        ])
    }));

    f.render_widget(
        Paragraph::new(history).block(Block::default().borders(Borders::TOP).title("History")),
        chunks[3],
    );
    f.render_widget(
        Paragraph::new("[m] Menu    [Enter] Play Again")
            .style(Style::default().fg(Color::Yellow))
            .centered(),
        chunks[4],
    );
}

fn render_error(f: &mut Frame, area: Rect, machine: &RoundMachine) {
    let text = vec![
        Line::from("Oops!").style(Style::default().fg(Color::Red).bold()),
        Line::from(""),
        Line::from(machine.error_message().unwrap_or("Something went wrong.")),
        Line::from(""),
        Line::from("[Enter] Back to Menu").style(Style::default().fg(Color::Gray)),
    ];
    f.render_widget(
        Paragraph::new(text).centered().wrap(Wrap { trim: true }),
        vertically_centered(area, 5),
    );
}

/// `height` 行分の領域を縦中央に取る
fn vertically_centered(area: Rect, height: u16) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height),
        Constraint::Fill(1),
    ])
    .areas(area);
    middle
}

// ============================================
// src/round.rs
// ラウンドの状態遷移 (メニュー → 生成中 → カウントダウン → プレイ中 → 結果)
// ============================================

use log::{debug, error, info, warn};

use crate::cards::{Card, Category, Difficulty, Settings, fallback_deck, validate_deck};
use crate::error::GenerationError;
use crate::image_gate::{ImageGate, ImageOutcome};
use crate::timer::TimerKind;

/// カウントダウンの開始値 (3 → 2 → 1 → GO!)
pub const COUNTDOWN_FROM: u32 = 3;

/// API が失敗したときに表示する注意書き
pub const OFFLINE_NOTICE: &str = "Offline mode: Using default cards.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Menu,
    Generating,
    Countdown,
    Playing,
    Summary,
    Error,
}

/// ラウンドの成績。`total_score` は常に `correct.len()` と同じ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundResult {
    pub correct: Vec<Card>,
    pub skipped: Vec<Card>,
    pub total_score: u32,
}

/// 状態機械への入力
#[derive(Debug)]
pub enum Event {
    SelectCategory(Category),
    SelectDifficulty(Difficulty),
    SetDuration(u32),
    Start,
    DeckFetched {
        round: u64,
        result: Result<Vec<Card>, GenerationError>,
    },
    Tick(TimerKind),
    ImageLoaded {
        round: u64,
        card_id: String,
        outcome: ImageOutcome,
    },
    MarkCorrect,
    MarkPass,
    PlayAgain,
    ReturnToMenu,
    Acknowledge,
}

/// 状態遷移の結果、外側 (App) で実行してほしいこと
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchDeck {
        round: u64,
        category: Category,
        difficulty: Difficulty,
    },
    StartTimer(TimerKind),
    CancelTimer(TimerKind),
    LoadImage { round: u64, card: Card },
}

pub struct RoundMachine {
    state: RoundState,
    settings: Settings,

    /// 今のラウンドのデッキと表示中のカード
    deck: Vec<Card>,
    current_index: usize,
    results: RoundResult,

    countdown: u32,
    time_left: u32,
    gate: ImageGate,

    /// ラウンド開始ごとに増える。古い非同期結果を捨てるために使う
    round_id: u64,
    live_timer: Option<TimerKind>,

    advisory: Option<String>,
    error_msg: Option<String>,

    fallback: Vec<Card>,
}

impl RoundMachine {
    pub fn new(settings: Settings) -> Self {
        Self::with_fallback(settings, fallback_deck())
    }

    pub fn with_fallback(settings: Settings, fallback: Vec<Card>) -> Self {
        Self {
            state: RoundState::Menu,
            settings,
            deck: Vec::new(),
            current_index: 0,
            results: RoundResult::default(),
            countdown: COUNTDOWN_FROM,
            time_left: settings.duration,
            gate: ImageGate::default(),
            round_id: 0,
            live_timer: None,
            advisory: None,
            error_msg: None,
            fallback,
        }
    }

    /// 状態遷移関数。(状態, イベント) → 新しい状態 + 実行すべき Effect
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut fx = Vec::new();

        match (self.state, event) {
            // --- メニュー ---
            (RoundState::Menu, Event::SelectCategory(category)) => {
                self.settings.category = category;
            }
            (RoundState::Menu, Event::SelectDifficulty(difficulty)) => {
                self.settings.difficulty = difficulty;
            }
            (RoundState::Menu, Event::SetDuration(secs)) if secs > 0 => {
                self.settings.duration = secs;
            }
            (RoundState::Menu, Event::Start) | (RoundState::Summary, Event::PlayAgain) => {
                self.begin_generating(&mut fx);
            }

            // --- 生成中 ---
            (RoundState::Generating, Event::DeckFetched { round, result }) => {
                if round == self.round_id {
                    self.receive_deck(result, &mut fx);
                } else {
                    debug!("dropping deck for stale round {round}");
                }
            }

            // --- カウントダウン ---
            (RoundState::Countdown, Event::Tick(TimerKind::Countdown))
                if self.live_timer == Some(TimerKind::Countdown) =>
            {
                self.countdown_tick(&mut fx);
            }

            // --- プレイ中 ---
            (RoundState::Playing, Event::ImageLoaded { round, card_id, outcome }) => {
                self.image_signal(round, &card_id, outcome, &mut fx);
            }
            (RoundState::Playing, Event::Tick(TimerKind::Round))
                if self.live_timer == Some(TimerKind::Round) =>
            {
                self.round_tick(&mut fx);
            }
            (RoundState::Playing, Event::MarkCorrect) => self.mark(true, &mut fx),
            (RoundState::Playing, Event::MarkPass) => self.mark(false, &mut fx),

            // --- 結果 / エラー ---
            (RoundState::Summary, Event::ReturnToMenu) => {
                self.state = RoundState::Menu;
            }
            (RoundState::Error, Event::Acknowledge) => {
                self.error_msg = None;
                self.state = RoundState::Menu;
            }

            (state, event) => debug!("ignored {} in {state:?}", event_name(&event)),
        }

        fx
    }

    // MARK: 遷移ごとの処理

    fn begin_generating(&mut self, fx: &mut Vec<Effect>) {
        self.stop_timer(fx);

        // 前のラウンドのデータはすべて捨てる
        self.round_id += 1;
        self.deck.clear();
        self.current_index = 0;
        self.results = RoundResult::default();
        self.gate.clear();
        self.advisory = None;
        self.error_msg = None;

        self.state = RoundState::Generating;
        info!(
            "round {} generating: {} / {} / {}s",
            self.round_id, self.settings.category, self.settings.difficulty, self.settings.duration
        );
        fx.push(Effect::FetchDeck {
            round: self.round_id,
            category: self.settings.category,
            difficulty: self.settings.difficulty,
        });
    }

    fn receive_deck(&mut self, result: Result<Vec<Card>, GenerationError>, fx: &mut Vec<Effect>) {
        let generated = match result {
            Ok(deck) => match validate_deck(&deck) {
                Ok(()) => Some(deck),
                Err(e) => {
                    warn!("generated deck rejected, using fallback deck: {e}");
                    None
                }
            },
            Err(e) => {
                warn!("API failed, using fallback deck: {e}");
                None
            }
        };

        let deck = match generated {
            Some(deck) => deck,
            None => {
                self.advisory = Some(OFFLINE_NOTICE.to_string());
                self.fallback.clone()
            }
        };

        if let Err(e) = validate_deck(&deck) {
            error!("cannot start round {}: {e}", self.round_id);
            self.error_msg = Some(format!("Critical error starting game: {e}"));
            self.state = RoundState::Error;
            return;
        }

        info!("round {} deck ready ({} cards)", self.round_id, deck.len());
        self.deck = deck;
        self.current_index = 0;
        self.gate.clear();
        self.countdown = COUNTDOWN_FROM;
        self.time_left = self.settings.duration;
        self.state = RoundState::Countdown;
        self.start_timer(TimerKind::Countdown, fx);
    }

    fn countdown_tick(&mut self, fx: &mut Vec<Effect>) {
        if self.countdown > 0 {
            self.countdown -= 1;
            return;
        }

        // GO! を丸1秒表示し、次の tick でプレイ開始 (3, 2, 1, GO! で計4 tick)。
        // ラウンドタイマーは画像が来るまで動かさない
        self.stop_timer(fx);
        self.state = RoundState::Playing;
        self.show_current_card(fx);
    }

    fn image_signal(&mut self, round: u64, card_id: &str, outcome: ImageOutcome, fx: &mut Vec<Effect>) {
        if round != self.round_id {
            return;
        }
        debug!("image for {card_id}: {outcome:?}");
        if self.gate.signal(round, card_id, outcome) {
            self.start_timer(TimerKind::Round, fx);
        }
    }

    fn round_tick(&mut self, fx: &mut Vec<Effect>) {
        if !self.gate.is_ready() {
            return;
        }
        self.time_left = self.time_left.saturating_sub(1);
        debug!("time left: {}", self.time_left);

        // 時間切れは読み込み状態より優先
        if self.time_left == 0 {
            self.end_round(fx);
        }
    }

    fn mark(&mut self, correct: bool, fx: &mut Vec<Effect>) {
        if !self.gate.is_ready() {
            return; // 画像がまだ。見ていないカードは採点しない
        }
        let Some(card) = self.deck.get(self.current_index).cloned() else {
            return;
        };

        if correct {
            self.results.correct.push(card);
            self.results.total_score += 1;
        } else {
            self.results.skipped.push(card);
        }
        self.current_index += 1;

        if self.current_index >= self.deck.len() {
            self.end_round(fx);
        } else {
            // 次のカードの画像が来るまでタイマーは止める (残り時間はそのまま)
            self.stop_timer(fx);
            self.show_current_card(fx);
        }
    }

    fn end_round(&mut self, fx: &mut Vec<Effect>) {
        self.stop_timer(fx);
        self.gate.clear();
        self.state = RoundState::Summary;
        info!(
            "round {} over: score {}, skipped {}, {}s left",
            self.round_id,
            self.results.total_score,
            self.results.skipped.len(),
            self.time_left
        );
    }

    fn show_current_card(&mut self, fx: &mut Vec<Effect>) {
        if let Some(card) = self.deck.get(self.current_index) {
            self.gate.reset(self.round_id, &card.id);
            fx.push(Effect::LoadImage {
                round: self.round_id,
                card: card.clone(),
            });
        }
    }

    // MARK: タイマー

    /// 動いているタイマーを止めてから新しいタイマーを始める
    fn start_timer(&mut self, kind: TimerKind, fx: &mut Vec<Effect>) {
        self.stop_timer(fx);
        self.live_timer = Some(kind);
        fx.push(Effect::StartTimer(kind));
    }

    fn stop_timer(&mut self, fx: &mut Vec<Effect>) {
        if let Some(kind) = self.live_timer.take() {
            fx.push(Effect::CancelTimer(kind));
        }
    }

    // MARK: 表示用

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn deck(&self) -> &[Card] {
        &self.deck
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.deck.get(self.current_index)
    }

    pub fn results(&self) -> &RoundResult {
        &self.results
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn is_card_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn image_outcome(&self) -> Option<&ImageOutcome> {
        self.gate.outcome()
    }

    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_msg.as_deref()
    }

    pub fn round_id(&self) -> u64 {
        self.round_id
    }
}

/// ログ用。デッキの中身までは出さない
fn event_name(event: &Event) -> &'static str {
    match event {
        Event::SelectCategory(_) => "SelectCategory",
        Event::SelectDifficulty(_) => "SelectDifficulty",
        Event::SetDuration(_) => "SetDuration",
        Event::Start => "Start",
        Event::DeckFetched { .. } => "DeckFetched",
        Event::Tick(TimerKind::Countdown) => "Tick(Countdown)",
        Event::Tick(TimerKind::Round) => "Tick(Round)",
        Event::ImageLoaded { .. } => "ImageLoaded",
        Event::MarkCorrect => "MarkCorrect",
        Event::MarkPass => "MarkPass",
        Event::PlayAgain => "PlayAgain",
        Event::ReturnToMenu => "ReturnToMenu",
        Event::Acknowledge => "Acknowledge",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn settings(duration: u32) -> Settings {
        Settings {
            duration,
            ..Settings::default()
        }
    }

    fn generated_deck(n: usize) -> Vec<Card> {
        (0..n)
            .map(|i| Card {
                id: format!("card-42-{i}"),
                name: format!("Name {i}"),
                category: "Test".to_string(),
                hints: vec!["It is a".into(), "It is b".into(), "It is c".into()],
                to_be_context: "Am I...?".to_string(),
            })
            .collect()
    }

    /// Start → デッキ到着 → カウントダウン終了までを進める
    fn to_playing(m: &mut RoundMachine, result: Result<Vec<Card>, GenerationError>) {
        m.handle(Event::Start);
        let round = m.round_id();
        m.handle(Event::DeckFetched { round, result });
        assert_eq!(m.state(), RoundState::Countdown);
        for _ in 0..=COUNTDOWN_FROM {
            m.handle(Event::Tick(TimerKind::Countdown));
        }
        assert_eq!(m.state(), RoundState::Playing);
    }

    fn load_image(m: &mut RoundMachine, outcome: ImageOutcome) -> Vec<Effect> {
        let card_id = m.current_card().unwrap().id.clone();
        m.handle(Event::ImageLoaded {
            round: m.round_id(),
            card_id,
            outcome,
        })
    }

    fn loaded() -> ImageOutcome {
        ImageOutcome::Loaded { bytes: 1024 }
    }

    fn assert_invariants(m: &RoundMachine) {
        let r = m.results();
        assert_eq!(r.total_score as usize, r.correct.len());
        assert!(r.correct.len() + r.skipped.len() <= m.deck().len());
        assert!(m.current_index() <= m.deck().len());
    }

    #[test]
    fn all_correct_ends_before_time_runs_out() {
        let mut m = RoundMachine::new(settings(90));
        to_playing(&mut m, Err(GenerationError::EmptyResponse));

        for _ in 0..4 {
            load_image(&mut m, loaded());
            m.handle(Event::MarkCorrect);
            assert_invariants(&m);
        }

        assert_eq!(m.state(), RoundState::Summary);
        assert_eq!(m.results().total_score, 4);
        assert!(m.results().skipped.is_empty());
        assert_eq!(m.time_left(), 90);
        assert_eq!(m.current_index(), m.deck().len());
    }

    #[test]
    fn idle_round_expires_after_duration_ticks() {
        let mut m = RoundMachine::new(settings(5));
        to_playing(&mut m, Ok(generated_deck(4)));
        load_image(&mut m, loaded());

        for i in 0..5 {
            assert_eq!(m.state(), RoundState::Playing, "tick {i}");
            let fx = m.handle(Event::Tick(TimerKind::Round));
            if i == 4 {
                assert_eq!(fx, vec![Effect::CancelTimer(TimerKind::Round)]);
            }
        }

        assert_eq!(m.state(), RoundState::Summary);
        assert_eq!(m.time_left(), 0);
        assert_eq!(m.results(), &RoundResult::default());

        // 終わった後の tick は無視
        m.handle(Event::Tick(TimerKind::Round));
        assert_eq!(m.state(), RoundState::Summary);
    }

    #[test]
    fn generation_failure_uses_fallback_deck_with_notice() {
        let mut m = RoundMachine::new(settings(90));
        to_playing(&mut m, Err(GenerationError::MissingApiKey));

        assert_eq!(m.deck(), fallback_deck().as_slice());
        assert_eq!(m.advisory(), Some(OFFLINE_NOTICE));
        assert_eq!(m.current_card().unwrap().name, "Spiderman");
    }

    #[test]
    fn failed_image_still_makes_card_ready() {
        let mut m = RoundMachine::new(settings(90));
        to_playing(&mut m, Ok(generated_deck(4)));
        load_image(&mut m, loaded());
        m.handle(Event::MarkPass);

        assert_eq!(m.current_index(), 1);
        assert!(!m.is_card_ready());
        let fx = load_image(&mut m, ImageOutcome::Failed("HTTP 500".into()));

        assert!(m.is_card_ready());
        assert_eq!(fx, vec![Effect::StartTimer(TimerKind::Round)]);
        assert_eq!(m.image_outcome(), Some(&ImageOutcome::Failed("HTTP 500".into())));
    }

    #[test]
    fn marks_before_image_are_silently_rejected() {
        let mut m = RoundMachine::new(settings(30));
        to_playing(&mut m, Ok(generated_deck(4)));

        let before = (m.current_index(), m.results().clone(), m.time_left());
        assert!(m.handle(Event::MarkCorrect).is_empty());
        assert!(m.handle(Event::MarkPass).is_empty());
        assert!(m.handle(Event::Tick(TimerKind::Round)).is_empty());
        assert_eq!((m.current_index(), m.results().clone(), m.time_left()), before);
    }

    #[test]
    fn timer_pauses_while_next_card_loads() {
        let mut m = RoundMachine::new(settings(30));
        to_playing(&mut m, Ok(generated_deck(4)));
        load_image(&mut m, loaded());
        m.handle(Event::Tick(TimerKind::Round));
        m.handle(Event::Tick(TimerKind::Round));
        assert_eq!(m.time_left(), 28);

        let fx = m.handle(Event::MarkCorrect);
        assert_eq!(fx[0], Effect::CancelTimer(TimerKind::Round));
        assert!(matches!(&fx[1], Effect::LoadImage { card, .. } if card.id == "card-42-1"));

        // 次の画像が来るまで減らない
        m.handle(Event::Tick(TimerKind::Round));
        assert_eq!(m.time_left(), 28);

        load_image(&mut m, loaded());
        m.handle(Event::Tick(TimerKind::Round));
        assert_eq!(m.time_left(), 27);
    }

    #[test]
    fn countdown_hands_over_to_playing() {
        let mut m = RoundMachine::new(settings(30));
        m.handle(Event::Start);
        let fx = m.handle(Event::DeckFetched {
            round: m.round_id(),
            result: Ok(generated_deck(2)),
        });
        assert_eq!(fx, vec![Effect::StartTimer(TimerKind::Countdown)]);
        assert_eq!(m.countdown(), 3);

        // カウントダウン中のラウンド tick は無視
        m.handle(Event::Tick(TimerKind::Round));
        assert_eq!(m.time_left(), 30);

        for expected in [2, 1, 0] {
            assert!(m.handle(Event::Tick(TimerKind::Countdown)).is_empty());
            assert_eq!(m.countdown(), expected);
        }
        // GO! の間はまだカウントダウン
        assert_eq!(m.state(), RoundState::Countdown);
        let fx = m.handle(Event::Tick(TimerKind::Countdown));
        assert_eq!(fx[0], Effect::CancelTimer(TimerKind::Countdown));
        assert!(matches!(&fx[1], Effect::LoadImage { card, .. } if card.id == "card-42-0"));
        assert_eq!(m.state(), RoundState::Playing);
        assert!(!m.is_card_ready());
    }

    #[test]
    fn stale_results_from_previous_round_are_ignored() {
        let mut m = RoundMachine::new(settings(30));
        to_playing(&mut m, Err(GenerationError::EmptyDeck));
        let old_round = m.round_id();
        for _ in 0..4 {
            load_image(&mut m, loaded());
            m.handle(Event::MarkPass);
        }
        assert_eq!(m.state(), RoundState::Summary);

        let fx = m.handle(Event::PlayAgain);
        assert!(matches!(fx.as_slice(), [Effect::FetchDeck { .. }]));
        assert_eq!(m.state(), RoundState::Generating);
        assert!(m.results().skipped.is_empty());

        m.handle(Event::DeckFetched {
            round: old_round,
            result: Ok(generated_deck(4)),
        });
        assert_eq!(m.state(), RoundState::Generating);

        m.handle(Event::DeckFetched {
            round: m.round_id(),
            result: Err(GenerationError::EmptyDeck),
        });
        for _ in 0..=COUNTDOWN_FROM {
            m.handle(Event::Tick(TimerKind::Countdown));
        }

        // 前のラウンドの同じID ("1") の画像は無視する
        m.handle(Event::ImageLoaded {
            round: old_round,
            card_id: "1".into(),
            outcome: loaded(),
        });
        assert!(!m.is_card_ready());
    }

    #[test]
    fn broken_fallback_is_a_critical_error() {
        let mut broken = fallback_deck();
        broken[2].hints.clear();
        let mut m = RoundMachine::with_fallback(settings(30), broken);

        m.handle(Event::Start);
        let fx = m.handle(Event::DeckFetched {
            round: m.round_id(),
            result: Err(GenerationError::EmptyResponse),
        });

        assert!(fx.is_empty());
        assert_eq!(m.state(), RoundState::Error);
        assert!(m.error_message().unwrap().starts_with("Critical error starting game"));

        m.handle(Event::Acknowledge);
        assert_eq!(m.state(), RoundState::Menu);
        assert_eq!(m.error_message(), None);
    }

    #[test]
    fn malformed_generated_deck_falls_back() {
        let mut deck = generated_deck(3);
        deck[1].id = deck[0].id.clone();
        let mut m = RoundMachine::new(settings(30));
        to_playing(&mut m, Ok(deck));
        assert_eq!(m.deck().len(), 4);
        assert_eq!(m.advisory(), Some(OFFLINE_NOTICE));
    }

    #[test]
    fn settings_only_change_in_menu() {
        let mut m = RoundMachine::new(settings(90));
        m.handle(Event::SelectCategory(Category::Animals));
        m.handle(Event::SelectDifficulty(Difficulty::Hard));
        m.handle(Event::SetDuration(0));
        m.handle(Event::SetDuration(60));
        assert_eq!(
            *m.settings(),
            Settings {
                category: Category::Animals,
                difficulty: Difficulty::Hard,
                duration: 60,
            }
        );

        let fx = m.handle(Event::Start);
        assert_eq!(
            fx,
            vec![Effect::FetchDeck {
                round: 1,
                category: Category::Animals,
                difficulty: Difficulty::Hard,
            }]
        );
        m.handle(Event::SelectCategory(Category::Jobs));
        assert_eq!(m.settings().category, Category::Animals);
    }

    #[test]
    fn summary_returns_to_menu() {
        let mut m = RoundMachine::new(settings(1));
        to_playing(&mut m, Ok(generated_deck(2)));
        load_image(&mut m, loaded());
        m.handle(Event::Tick(TimerKind::Round));
        assert_eq!(m.state(), RoundState::Summary);

        m.handle(Event::ReturnToMenu);
        assert_eq!(m.state(), RoundState::Menu);
    }

    #[test]
    fn random_play_keeps_invariants() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let cards = rng.random_range(1..8);
            let duration = rng.random_range(1..20);
            let mut m = RoundMachine::new(settings(duration));
            to_playing(&mut m, Ok(generated_deck(cards)));

            while m.state() == RoundState::Playing {
                let before = (m.current_index(), m.time_left());
                let ready = m.is_card_ready();
                match rng.random_range(0..4) {
                    0 => {
                        load_image(&mut m, loaded());
                    }
                    1 => {
                        m.handle(Event::Tick(TimerKind::Round));
                        if !ready {
                            assert_eq!(m.time_left(), before.1);
                        }
                    }
                    2 => {
                        m.handle(Event::MarkCorrect);
                    }
                    _ => {
                        m.handle(Event::MarkPass);
                    }
                }
                if !ready {
                    assert_eq!(m.current_index(), before.0);
                }
                if m.current_index() != before.0 && m.state() == RoundState::Playing {
                    assert!(!m.is_card_ready());
                }
                assert_invariants(&m);
            }

            let r = m.results();
            let answered = r.correct.len() + r.skipped.len();
            assert_eq!(answered == m.deck().len(), m.time_left() > 0);
        }
    }
}

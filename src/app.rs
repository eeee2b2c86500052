// ============================================
// src/app.rs
// 状態機械・タイマー・ワーカースレッドをつなぐ実行部分
// ============================================

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Instant;

use crossterm::event::KeyCode;
use log::debug;
use rand::seq::SliceRandom;

use crate::cards::{Card, Category};
use crate::deck_provider::DeckProvider;
use crate::image_gate::ImageRenderer;
use crate::round::{Effect, Event, RoundMachine, RoundState};
use crate::timer::Scheduler;

/// メニューで +/- したときの秒数
pub const DURATION_STEP: u32 = 15;

pub struct App {
    machine: RoundMachine,
    scheduler: Scheduler,

    provider: Arc<dyn DeckProvider>,
    renderer: Arc<dyn ImageRenderer>,

    /// ワーカースレッドからの結果 (デッキ・画像) はここに届く
    tx: Sender<Event>,
    rx: Receiver<Event>,

    cards_per_round: usize,
    shuffle: bool,

    pub should_quit: bool,
}

impl App {
    pub fn new(
        machine: RoundMachine,
        provider: Arc<dyn DeckProvider>,
        renderer: Arc<dyn ImageRenderer>,
        cards_per_round: usize,
        shuffle: bool,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            machine,
            scheduler: Scheduler::default(),
            provider,
            renderer,
            tx,
            rx,
            cards_per_round: cards_per_round.max(1),
            shuffle,
            should_quit: false,
        }
    }

    pub fn machine(&self) -> &RoundMachine {
        &self.machine
    }

    /// イベントを状態機械に渡し、返ってきた Effect を実行する
    pub fn dispatch(&mut self, event: Event, now: Instant) {
        let effects = self.machine.handle(event);
        if effects.is_empty() {
            return;
        }
        for effect in effects {
            self.apply(effect, now);
        }
        debug!(
            "round {} now {:?}, live timer {:?}",
            self.machine.round_id(),
            self.machine.state(),
            self.scheduler.live()
        );
    }

    /// 届いた結果とタイマーを処理する (メインループから毎回呼ぶ)
    pub fn pump(&mut self, now: Instant) {
        while let Ok(event) = self.rx.try_recv() {
            self.dispatch(event, now);
        }
        if let Some(kind) = self.scheduler.poll(now) {
            self.dispatch(Event::Tick(kind), now);
        }
    }

    pub fn handle_key(&mut self, code: KeyCode, now: Instant) {
        if code == KeyCode::Esc
            || (code == KeyCode::Char('q') && self.machine.state() == RoundState::Menu)
        {
            self.should_quit = true;
            return;
        }
        if let Some(event) = key_to_event(&self.machine, code) {
            self.dispatch(event, now);
        }
    }

    fn apply(&mut self, effect: Effect, now: Instant) {
        match effect {
            Effect::StartTimer(kind) => self.scheduler.start(kind, now),
            Effect::CancelTimer(kind) => self.scheduler.cancel(kind),
            Effect::FetchDeck {
                round,
                category,
                difficulty,
            } => {
                let provider = Arc::clone(&self.provider);
                let tx = self.tx.clone();
                let count = self.cards_per_round;
                let shuffle = self.shuffle;
                thread::spawn(move || {
                    let result = provider
                        .fetch_deck(category, difficulty, count)
                        .map(|mut deck| {
                            if shuffle {
                                deck.shuffle(&mut rand::rng());
                            }
                            deck
                        });
                    // 受け取り側がもういなければ捨てるだけ
                    let _ = tx.send(Event::DeckFetched { round, result });
                });
            }
            Effect::LoadImage { round, card } => self.spawn_image_load(round, card),
        }
    }

    fn spawn_image_load(&self, round: u64, card: Card) {
        debug!("loading image for {} ({})", card.name, card.id);
        let renderer = Arc::clone(&self.renderer);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = renderer.render(&card);
            let _ = tx.send(Event::ImageLoaded {
                round,
                card_id: card.id,
                outcome,
            });
        });
    }
}

/// 画面ごとのキー割り当て
pub fn key_to_event(machine: &RoundMachine, code: KeyCode) -> Option<Event> {
    let settings = machine.settings();
    match machine.state() {
        RoundState::Menu => match code {
            KeyCode::Right | KeyCode::Tab => Some(Event::SelectCategory(settings.category.next())),
            KeyCode::Left | KeyCode::BackTab => Some(Event::SelectCategory(settings.category.prev())),
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                Some(Event::SelectCategory(Category::ALL[idx]))
            }
            KeyCode::Char('d') | KeyCode::Up | KeyCode::Down => {
                Some(Event::SelectDifficulty(settings.difficulty.toggle()))
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                Some(Event::SetDuration(settings.duration.saturating_add(DURATION_STEP)))
            }
            KeyCode::Char('-') if settings.duration > DURATION_STEP => {
                Some(Event::SetDuration(settings.duration - DURATION_STEP))
            }
            KeyCode::Enter => Some(Event::Start),
            _ => None,
        },
        RoundState::Playing => match code {
            KeyCode::Right | KeyCode::Enter | KeyCode::Char('c') => Some(Event::MarkCorrect),
            KeyCode::Left | KeyCode::Char(' ') | KeyCode::Char('p') => Some(Event::MarkPass),
            _ => None,
        },
        RoundState::Summary => match code {
            KeyCode::Enter | KeyCode::Char('r') => Some(Event::PlayAgain),
            KeyCode::Char('m') => Some(Event::ReturnToMenu),
            _ => None,
        },
        RoundState::Error => match code {
            KeyCode::Enter | KeyCode::Char('m') => Some(Event::Acknowledge),
            _ => None,
        },
        RoundState::Generating | RoundState::Countdown => None,
    }
}

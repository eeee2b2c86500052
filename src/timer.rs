// ============================================
// src/timer.rs
// 1秒ごとのタイマー (カウントダウン用とラウンド用)
// ============================================

use std::time::{Duration, Instant};

use log::{debug, warn};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// どの状態のタイマーか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Countdown,
    Round,
}

#[derive(Debug)]
struct Scheduled {
    kind: TimerKind,
    next_fire: Instant,
}

/// 同時に動くタイマーは1つだけ。状態を抜けるときに必ず cancel する
#[derive(Debug, Default)]
pub struct Scheduler {
    live: Option<Scheduled>,
}

impl Scheduler {
    /// `now` から1秒後に最初の tick を出す
    pub fn start(&mut self, kind: TimerKind, now: Instant) {
        if let Some(old) = &self.live {
            warn!("starting {kind:?} timer while {:?} is still live", old.kind);
        }
        debug!("timer start: {kind:?}");
        self.live = Some(Scheduled {
            kind,
            next_fire: now + TICK_PERIOD,
        });
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if self.live.as_ref().is_some_and(|s| s.kind == kind) {
            debug!("timer cancel: {kind:?}");
            self.live = None;
        }
    }

    /// 期限が来ていれば tick を1つ返す (遅れていても1回の呼び出しで1つだけ)
    pub fn poll(&mut self, now: Instant) -> Option<TimerKind> {
        let live = self.live.as_mut()?;
        if now < live.next_fire {
            return None;
        }
        live.next_fire += TICK_PERIOD;
        Some(live.kind)
    }

    pub fn live(&self) -> Option<TimerKind> {
        self.live.as_ref().map(|s| s.kind)
    }
}

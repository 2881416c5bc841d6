use crate::bus::AttentionBus;
use crate::config::Config;
use crate::error::Result;
use crate::events::{AttentionEvent, EventKind, WindowInfo};
use crate::services::window_source::ActiveWindowSource;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;

use super::health::FailureStreak;
use super::patterns::classify;
use super::r#trait::{emit, DetectorTrait};

/// Итог классификации заголовков целевых окон за один опрос
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMatch {
    pub kind: EventKind,
    pub pattern: String,
    pub title: String,
}

impl TitleMatch {
    pub fn to_event(&self) -> AttentionEvent {
        let reason = format!("заголовок \"{}\" содержит \"{}\"", self.title, self.pattern);
        AttentionEvent::new(self.kind, "title", reason).clamp_reason()
    }
}

/// Классифицировать заголовки всех целевых окон; ожидание важнее завершения
pub fn classify_windows(windows: &[WindowInfo], config: &Config) -> Option<TitleMatch> {
    let settings = &config.detectors.title;

    windows
        .iter()
        .filter(|w| w.matches_any_pattern(&config.target.window_patterns))
        .filter_map(|w| {
            classify(&w.title, &settings.waiting_patterns, &settings.done_patterns).map(
                |(kind, pattern)| TitleMatch {
                    kind,
                    pattern: pattern.to_string(),
                    title: w.title.clone(),
                },
            )
        })
        .min_by_key(|m| match m.kind {
            EventKind::Waiting => 0,
            _ => 1,
        })
}

/// Гасит повторы: событие нужно только при смене классификации
#[derive(Debug, Default)]
pub struct TitleTracker {
    last: Option<EventKind>,
}

impl TitleTracker {
    pub fn observe(&mut self, kind: Option<EventKind>) -> bool {
        let changed = kind.is_some() && kind != self.last;
        self.last = kind;
        changed
    }
}

/// Ищет маркеры ожидания/завершения в заголовках окон приложения
pub struct TitleDetector {
    config: Arc<Config>,
    bus: AttentionBus,
    source: ActiveWindowSource,
    tracker: TitleTracker,
    streak: FailureStreak,
}

impl TitleDetector {
    pub fn new(config: Arc<Config>, bus: AttentionBus) -> Self {
        let streak = FailureStreak::new("title", config.detectors.max_consecutive_failures);
        Self {
            config,
            bus,
            source: ActiveWindowSource::new(),
            tracker: TitleTracker::default(),
            streak,
        }
    }

    async fn run_impl(mut self) -> Result<()> {
        info!(
            "TitleDetector запущен: {} паттернов ожидания, {} паттернов завершения",
            self.config.detectors.title.waiting_patterns.len(),
            self.config.detectors.title.done_patterns.len()
        );

        let period = Duration::from_millis(self.config.detectors.title.polling_interval_ms);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let windows = match self.source.list_windows().await {
                Ok(windows) => {
                    self.streak.record_success();
                    windows
                }
                Err(e) => {
                    self.streak.record_failure(e);
                    continue;
                }
            };

            let matched = classify_windows(&windows, &self.config);
            if self.tracker.observe(matched.as_ref().map(|m| m.kind)) {
                if let Some(m) = matched {
                    emit(&self.bus, m.to_event());
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl DetectorTrait for TitleDetector {
    fn name(&self) -> &'static str {
        "title"
    }

    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

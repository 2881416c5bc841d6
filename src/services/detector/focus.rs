use crate::bus::AttentionBus;
use crate::config::Config;
use crate::debug_if_enabled;
use crate::error::Result;
use crate::events::{AttentionEvent, WindowInfo};
use crate::services::window_source::ActiveWindowSource;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;

use super::health::FailureStreak;
use super::r#trait::{emit, DetectorTrait};

/// Отслеживает смену фокуса и сообщает, когда фокус пришёл на целевое окно
#[derive(Debug, Default)]
pub struct FocusTracker {
    current: Option<WindowInfo>,
    on_target: bool,
}

impl FocusTracker {
    /// Учесть активное окно. Возвращает `true` при переходе фокуса на цель.
    pub fn observe(&mut self, window: WindowInfo, patterns: &[String]) -> bool {
        if let Some(current) = &self.current {
            if current.same_window(&window) {
                return false;
            }
        }

        let is_target = window.matches_any_pattern(patterns);
        let entered = is_target && !self.on_target;

        debug_if_enabled!("Смена активного окна на {} (цель: {})", window, is_target);
        self.on_target = is_target;
        self.current = Some(window);
        entered
    }
}

pub struct FocusDetector {
    config: Arc<Config>,
    bus: AttentionBus,
    source: ActiveWindowSource,
    tracker: FocusTracker,
    streak: FailureStreak,
}

impl FocusDetector {
    pub fn new(config: Arc<Config>, bus: AttentionBus) -> Self {
        let streak = FailureStreak::new("focus", config.detectors.max_consecutive_failures);
        Self {
            config,
            bus,
            source: ActiveWindowSource::new(),
            tracker: FocusTracker::default(),
            streak,
        }
    }

    async fn run_impl(mut self) -> Result<()> {
        info!("FocusDetector запущен для среды: {:?}", self.source.desktop_env());

        let period = Duration::from_millis(self.config.detectors.focus.polling_interval_ms);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.source.active_window().await {
                Ok(window) => {
                    self.streak.record_success();
                    let title = window.title.clone();
                    if self.tracker.observe(window, &self.config.target.window_patterns) {
                        emit(
                            &self.bus,
                            AttentionEvent::clear("focus", format!("фокус на окне \"{}\"", title))
                                .clamp_reason(),
                        );
                    }
                }
                Err(e) => {
                    self.streak.record_failure(e);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl DetectorTrait for FocusDetector {
    fn name(&self) -> &'static str {
        "focus"
    }

    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

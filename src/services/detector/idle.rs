use crate::bus::AttentionBus;
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::events::AttentionEvent;
use crate::services::window_source::ActiveWindowSource;
use std::sync::Arc;
use tokio::process::Command;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};
use zbus::Connection;

use super::health::FailureStreak;
use super::r#trait::{emit, DetectorTrait};

const MUTTER_IDLE_DEST: &str = "org.gnome.Mutter.IdleMonitor";
const MUTTER_IDLE_PATH: &str = "/org/gnome/Mutter/IdleMonitor/Core";

/// Откуда берётся время простоя
enum IdleSource {
    Xprintidle,
    Mutter(Connection),
}

impl IdleSource {
    async fn detect() -> Result<Self> {
        if Self::query_xprintidle().await.is_ok() {
            info!("Время простоя читается через xprintidle");
            return Ok(IdleSource::Xprintidle);
        }

        let connection = Connection::session().await?;
        Self::query_mutter(&connection).await?;
        info!("Время простоя читается через GNOME Mutter IdleMonitor");
        Ok(IdleSource::Mutter(connection))
    }

    async fn idle_ms(&self) -> Result<u64> {
        match self {
            IdleSource::Xprintidle => Self::query_xprintidle().await,
            IdleSource::Mutter(connection) => Self::query_mutter(connection).await,
        }
    }

    async fn query_xprintidle() -> Result<u64> {
        let output = Command::new("xprintidle")
            .output()
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(format!("xprintidle не найден: {}", e)))?;

        if !output.status.success() {
            return Err(BridgeError::Internal("xprintidle вернул ошибку".to_string()));
        }

        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .map_err(|e| BridgeError::Internal(format!("xprintidle вернул не число: {}", e)))
    }

    async fn query_mutter(connection: &Connection) -> Result<u64> {
        let reply = connection
            .call_method(
                Some(MUTTER_IDLE_DEST),
                MUTTER_IDLE_PATH,
                Some(MUTTER_IDLE_DEST),
                "GetIdletime",
                &(),
            )
            .await?;
        Ok(reply.body().deserialize::<u64>()?)
    }
}

/// Следит за уходом и возвращением пользователя
#[derive(Debug)]
pub struct IdleTracker {
    threshold_ms: u64,
    away: bool,
    longest_idle_ms: u64,
}

impl IdleTracker {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            away: false,
            longest_idle_ms: 0,
        }
    }

    /// Учесть текущее время простоя.
    ///
    /// Возвращает длительность отсутствия, если пользователь только что вернулся.
    pub fn observe(&mut self, idle_ms: u64) -> Option<u64> {
        if idle_ms >= self.threshold_ms {
            if !self.away {
                debug!("Пользователь неактивен {} мс", idle_ms);
            }
            self.away = true;
            self.longest_idle_ms = self.longest_idle_ms.max(idle_ms);
            return None;
        }

        if self.away {
            self.away = false;
            return Some(std::mem::take(&mut self.longest_idle_ms));
        }
        None
    }
}

/// Снимает внимание, когда пользователь вернулся к целевому окну после простоя
pub struct IdleDetector {
    config: Arc<Config>,
    bus: AttentionBus,
    windows: ActiveWindowSource,
    idle_source: Option<IdleSource>,
    tracker: IdleTracker,
    streak: FailureStreak,
}

impl IdleDetector {
    pub fn new(config: Arc<Config>, bus: AttentionBus) -> Self {
        let tracker = IdleTracker::new(config.detectors.idle.idle_threshold_ms);
        let streak = FailureStreak::new("idle", config.detectors.max_consecutive_failures);
        Self {
            config,
            bus,
            windows: ActiveWindowSource::new(),
            idle_source: None,
            tracker,
            streak,
        }
    }

    async fn poll_idle(&mut self) -> Result<u64> {
        if self.idle_source.is_none() {
            self.idle_source = Some(IdleSource::detect().await?);
        }

        let source = self
            .idle_source
            .as_ref()
            .ok_or_else(|| crate::bridge_error!(internal, "источник простоя не выбран"))?;

        let result = source.idle_ms().await;
        if result.is_err() {
            self.idle_source = None;
        }
        result
    }

    async fn run_impl(mut self) -> Result<()> {
        info!(
            "IdleDetector запущен, порог простоя {} мс",
            self.config.detectors.idle.idle_threshold_ms
        );

        let period = Duration::from_millis(self.config.detectors.idle.polling_interval_ms);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let idle_ms = match self.poll_idle().await {
                Ok(idle_ms) => {
                    self.streak.record_success();
                    idle_ms
                }
                Err(e) => {
                    self.streak.record_failure(e);
                    continue;
                }
            };

            let Some(away_ms) = self.tracker.observe(idle_ms) else {
                continue;
            };

            match self.windows.active_window().await {
                Ok(window) if window.matches_any_pattern(&self.config.target.window_patterns) => {
                    let reason = format!("пользователь вернулся после {} с простоя", away_ms / 1000);
                    emit(&self.bus, AttentionEvent::clear("idle", reason));
                }
                Ok(window) => {
                    debug!("Пользователь вернулся, но активно окно {}", window);
                }
                Err(e) => {
                    debug!("Пользователь вернулся, активное окно неизвестно: {}", e);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl DetectorTrait for IdleDetector {
    fn name(&self) -> &'static str {
        "idle"
    }

    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_after_idle_reported_once() {
        let mut tracker = IdleTracker::new(60_000);

        assert_eq!(tracker.observe(1_000), None);
        assert_eq!(tracker.observe(61_000), None);
        assert_eq!(tracker.observe(90_000), None);
        assert_eq!(tracker.observe(200), Some(90_000));
        assert_eq!(tracker.observe(300), None);
    }

    #[test]
    fn test_short_pauses_ignored() {
        let mut tracker = IdleTracker::new(60_000);
        for idle in [0, 10_000, 59_999, 0] {
            assert_eq!(tracker.observe(idle), None);
        }
    }
}

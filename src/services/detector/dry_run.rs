use crate::bus::AttentionBus;
use crate::error::Result;
use crate::events::{AttentionEvent, EventKind};
use tokio::time::{interval, Duration};
use tracing::info;

use super::r#trait::{emit, DetectorTrait};

const DRY_RUN_SCRIPT: [(EventKind, &str); 4] = [
    (EventKind::Waiting, "Dry-run: запрос подтверждения"),
    (EventKind::Clear, "Dry-run: пользователь вернулся"),
    (EventKind::Done, "Dry-run: задача завершена"),
    (EventKind::Clear, "Dry-run: пользователь вернулся"),
];

/// Эмулирует детекторы, циклически публикуя сценарий событий
pub struct DryRunDetector {
    bus: AttentionBus,
    period: Duration,
}

impl DryRunDetector {
    pub fn new(bus: AttentionBus) -> Self {
        Self {
            bus,
            period: Duration::from_secs(10),
        }
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим - детекторы работают в режиме эмуляции");

        let mut ticker = interval(self.period);
        for (kind, reason) in DRY_RUN_SCRIPT.iter().cycle() {
            ticker.tick().await;
            info!("Dry-run: эмулируем событие {}", kind);
            emit(&self.bus, AttentionEvent::new(*kind, "dry-run", *reason));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl DetectorTrait for DryRunDetector {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

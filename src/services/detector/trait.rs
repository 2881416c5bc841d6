use crate::bus::{AttentionBus, PublishOutcome};
use crate::config::Config;
use crate::error::Result;
use crate::events::AttentionEvent;
use crate::utils::session::SessionReport;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::dry_run::DryRunDetector;
use super::focus::FocusDetector;
use super::idle::IdleDetector;
use super::notifications::NotificationDetector;
use super::title::TitleDetector;

/// Trait for attention detectors feeding the bus
#[async_trait::async_trait]
pub trait DetectorTrait {
    /// Short detector name, also used as the event origin
    fn name(&self) -> &'static str;

    /// Run the detector until the task is aborted
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create the enabled detectors, or a single dry-run one
pub fn create_detectors(
    config: Arc<Config>,
    bus: AttentionBus,
    session: &SessionReport,
    dry_run: bool,
) -> Vec<Box<dyn DetectorTrait + Send>> {
    if dry_run {
        return vec![Box::new(DryRunDetector::new(bus))];
    }

    let mut detectors: Vec<Box<dyn DetectorTrait + Send>> = Vec::new();
    let settings = &config.detectors;

    if session.graphical {
        if settings.focus.enabled {
            detectors.push(Box::new(FocusDetector::new(config.clone(), bus.clone())));
        }
        if settings.title.enabled {
            detectors.push(Box::new(TitleDetector::new(config.clone(), bus.clone())));
        }
        if settings.idle.enabled {
            detectors.push(Box::new(IdleDetector::new(config.clone(), bus.clone())));
        }
    } else if settings.focus.enabled || settings.title.enabled || settings.idle.enabled {
        warn!("Графическая сессия не найдена: детекторы окон и простоя отключены");
    }

    if settings.notifications.enabled {
        if session.dbus {
            detectors.push(Box::new(NotificationDetector::new(config.clone(), bus)));
        } else {
            warn!("Сессионная шина D-Bus недоступна: детектор уведомлений отключён");
        }
    }

    info!(
        "Детекторы: [{}]",
        detectors.iter().map(|d| d.name()).collect::<Vec<_>>().join(", ")
    );

    detectors
}

/// Опубликовать событие детектора; ошибки шины остаются внутри детектора
pub(super) fn emit(bus: &AttentionBus, event: AttentionEvent) {
    let description = event.to_string();
    match bus.publish(event) {
        Ok(PublishOutcome::Delivered { subscribers }) => {
            info!("Событие {} разослано {} подписчикам", description, subscribers);
        }
        Ok(PublishOutcome::Suppressed) => {
            crate::debug_if_enabled!("Событие {} подавлено шиной", description);
        }
        Err(e) => error!("Шина отклонила событие {}: {}", description, e),
    }
}

use crate::bus::AttentionBus;
use crate::config::{find_pattern, Config, NotificationConfig};
use crate::error::Result;
use crate::events::{AttentionEvent, EventKind};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use zbus::fdo::MonitoringProxy;
use zbus::zvariant::OwnedValue;
use zbus::{Connection, MatchRule, MessageStream};

use super::health::FailureStreak;
use super::patterns::classify;
use super::r#trait::{emit, DetectorTrait};

const NOTIFICATIONS_INTERFACE: &str = "org.freedesktop.Notifications";
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Аргументы `org.freedesktop.Notifications.Notify`
type NotifyArgs = (
    String,
    u32,
    String,
    String,
    String,
    Vec<String>,
    HashMap<String, OwnedValue>,
    i32,
);

/// Перехваченное уведомление
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub app_name: String,
    pub summary: String,
    pub body: String,
}

impl Notification {
    /// Превратить уведомление в событие, если оно от отслеживаемого приложения.
    ///
    /// Уведомления без маркера ожидания считаются информационными (`Done`).
    pub fn to_event(&self, settings: &NotificationConfig) -> Option<AttentionEvent> {
        let source = format!("{} {}", self.app_name, self.summary);
        find_pattern(&source, &settings.app_patterns)?;

        let text = format!("{} {}", self.summary, self.body);
        let kind = classify(&text, &settings.waiting_patterns, &settings.done_patterns)
            .map(|(kind, _)| kind)
            .unwrap_or(EventKind::Done);

        let reason = if self.body.is_empty() {
            self.summary.clone()
        } else {
            format!("{}: {}", self.summary, self.body)
        };

        Some(AttentionEvent::new(kind, "notifications", reason).clamp_reason())
    }
}

/// Слушает уведомления рабочего стола как монитор сессионной шины
pub struct NotificationDetector {
    config: Arc<Config>,
    bus: AttentionBus,
    streak: FailureStreak,
}

impl NotificationDetector {
    pub fn new(config: Arc<Config>, bus: AttentionBus) -> Self {
        let streak = FailureStreak::new("notifications", config.detectors.max_consecutive_failures);
        Self { config, bus, streak }
    }

    async fn run_impl(mut self) -> Result<()> {
        info!(
            "NotificationDetector запущен для приложений: {:?}",
            self.config.detectors.notifications.app_patterns
        );

        loop {
            match self.monitor().await {
                Ok(()) => warn!("Поток сообщений D-Bus закрыт, переподключаемся"),
                Err(e) => {
                    self.streak.record_failure(e);
                }
            }
            sleep(RECONNECT_DELAY).await;
        }
    }

    async fn monitor(&mut self) -> Result<()> {
        let connection = Connection::session().await?;

        let rule = MatchRule::builder()
            .msg_type(zbus::message::Type::MethodCall)
            .interface(NOTIFICATIONS_INTERFACE)?
            .member("Notify")?
            .build();

        MonitoringProxy::new(&connection)
            .await?
            .become_monitor(&[rule], 0)
            .await?;

        info!("Подключились к D-Bus как монитор {}", NOTIFICATIONS_INTERFACE);
        self.streak.record_success();

        let mut stream = MessageStream::from(&connection);
        while let Some(message) = stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    debug!("Ошибка чтения сообщения D-Bus: {}", e);
                    continue;
                }
            };

            let header = message.header();
            if header.member().map(|m| m.as_str()) != Some("Notify") {
                continue;
            }

            let args: NotifyArgs = match message.body().deserialize() {
                Ok(args) => args,
                Err(e) => {
                    debug!("Не удалось разобрать Notify: {}", e);
                    continue;
                }
            };

            let notification = Notification {
                app_name: args.0,
                summary: args.3,
                body: args.4,
            };
            crate::debug_if_enabled!("Уведомление: {:?}", notification);

            if let Some(event) = notification.to_event(&self.config.detectors.notifications) {
                emit(&self.bus, event);
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl DetectorTrait for NotificationDetector {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

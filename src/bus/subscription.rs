use crate::events::AttentionEvent;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Weak;
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver};

use super::aggregator::BusState;

/// Идентификатор подписки. Не переиспользуется в пределах процесса.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(super) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Очередь одного подписчика.
///
/// Живёт ровно столько, сколько соединение, которое её читает. При `Drop`
/// подписка снимается с шины автоматически.
pub struct Subscription {
    id: SubscriptionId,
    rx: UnboundedReceiver<AttentionEvent>,
    bus: Weak<Mutex<BusState>>,
}

impl Subscription {
    pub(super) fn new(
        id: SubscriptionId,
        rx: UnboundedReceiver<AttentionEvent>,
        bus: Weak<Mutex<BusState>>,
    ) -> Self {
        Self { id, rx, bus }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Дождаться следующего события.
    ///
    /// Возвращает `None`, когда подписка снята и очередь опустела.
    pub async fn recv(&mut self) -> Option<AttentionEvent> {
        self.rx.recv().await
    }

    /// Забрать событие без ожидания
    #[allow(dead_code)]
    pub fn try_recv(&mut self) -> Option<AttentionEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Все события, уже лежащие в очереди
    #[allow(dead_code)]
    pub fn drain(&mut self) -> Vec<AttentionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    fn detach(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.lock().remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

use crate::debug_if_enabled;
use crate::error::Result;
use crate::events::{AttentionEvent, EventKind, Mode, Snapshot};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info};

use super::subscription::{Subscription, SubscriptionId};

/// Результат публикации
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Событие принято и разослано `subscribers` подписчикам
    Delivered { subscribers: usize },
    /// Избыточный `Clear` в состоянии idle, событие отброшено
    Suppressed,
}

/// Всё изменяемое состояние шины под одним мьютексом
#[derive(Debug, Default)]
pub(super) struct BusState {
    mode: Mode,
    subscribers: HashMap<SubscriptionId, UnboundedSender<AttentionEvent>>,
    next_id: u64,
}

impl BusState {
    pub(super) fn remove(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }
}

/// Шина агрегации: единственный владелец агрегированного состояния.
///
/// Клонирование дёшево: все клоны разделяют одно состояние.
#[derive(Clone, Default)]
pub struct AttentionBus {
    state: Arc<Mutex<BusState>>,
}

impl AttentionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Зарегистрировать нового подписчика с пустой неограниченной очередью
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.state.lock();
            let id = SubscriptionId(state.next_id);
            state.next_id += 1;
            state.subscribers.insert(id, tx);
            id
        };

        debug!("Подписчик {} зарегистрирован", id);
        Subscription::new(id, rx, Arc::downgrade(&self.state))
    }

    /// Снять подписку. Повторный вызов ничего не делает.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.state.lock().remove(id) {
            debug!("Подписчик {} снят", id);
        }
    }

    /// Опубликовать событие.
    ///
    /// Проверка состояния, его изменение и раздача подписчикам выполняются
    /// под одним захватом мьютекса, поэтому все подписчики видят принятые
    /// события в одном и том же порядке.
    pub fn publish(&self, mut event: AttentionEvent) -> Result<PublishOutcome> {
        event.validate()?;

        let mut state = self.state.lock();

        let next_mode = match event.kind {
            EventKind::Waiting => Mode::Waiting,
            EventKind::Done => Mode::Done,
            EventKind::Clear if !state.mode.is_active() => {
                debug_if_enabled!("Избыточный Clear от {} отброшен", event.origin);
                return Ok(PublishOutcome::Suppressed);
            }
            EventKind::Clear => Mode::Idle,
        };

        event.timestamp.get_or_insert_with(Utc::now);

        let previous = std::mem::replace(&mut state.mode, next_mode);

        // Получатели закрытых подписок отбрасываются здесь же
        state
            .subscribers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
        let subscribers = state.subscribers.len();

        drop(state);

        if previous != next_mode {
            info!("Состояние: {} -> {} ({})", previous, next_mode, event);
        } else {
            debug_if_enabled!("Состояние {} подтверждено: {}", next_mode, event);
        }

        Ok(PublishOutcome::Delivered { subscribers })
    }

    /// Текущее агрегированное состояние
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from(self.state.lock().mode)
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn kinds(events: &[AttentionEvent]) -> Vec<EventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_clear_while_idle_is_dropped() {
        let bus = AttentionBus::new();
        let mut sub = bus.subscribe();

        let outcome = bus.publish(AttentionEvent::clear("focus", "focused")).unwrap();

        assert_eq!(outcome, PublishOutcome::Suppressed);
        assert_eq!(bus.snapshot(), Snapshot { active: false, mode: Mode::Idle });
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn test_last_writer_wins_on_attention_kind() {
        let bus = AttentionBus::new();
        let mut sub = bus.subscribe();

        bus.publish(AttentionEvent::waiting("title", "approval")).unwrap();
        bus.publish(AttentionEvent::done("notifications", "finished")).unwrap();

        assert_eq!(bus.snapshot(), Snapshot { active: true, mode: Mode::Done });
        assert_eq!(kinds(&sub.drain()), vec![EventKind::Waiting, EventKind::Done]);
    }

    #[test]
    fn test_repeated_waiting_is_delivered_twice() {
        let bus = AttentionBus::new();
        let mut sub = bus.subscribe();

        bus.publish(AttentionEvent::waiting("title", "a")).unwrap();
        bus.publish(AttentionEvent::waiting("notifications", "b")).unwrap();

        assert_eq!(kinds(&sub.drain()), vec![EventKind::Waiting, EventKind::Waiting]);
    }

    #[test]
    fn test_waiting_clear_clear_scenario() {
        let bus = AttentionBus::new();
        let mut early = bus.subscribe();

        bus.publish(AttentionEvent::waiting("title", "prompt")).unwrap();
        assert_eq!(bus.snapshot(), Snapshot { active: true, mode: Mode::Waiting });

        bus.publish(AttentionEvent::clear("focus", "focused")).unwrap();
        assert_eq!(bus.snapshot(), Snapshot { active: false, mode: Mode::Idle });

        let mut late = bus.subscribe();
        let outcome = bus.publish(AttentionEvent::clear("idle", "back")).unwrap();
        assert_eq!(outcome, PublishOutcome::Suppressed);
        assert_eq!(bus.snapshot(), Snapshot { active: false, mode: Mode::Idle });

        assert_eq!(kinds(&early.drain()), vec![EventKind::Waiting, EventKind::Clear]);
        assert!(late.drain().is_empty());
    }

    #[test]
    fn test_fan_out_reaches_every_subscriber() {
        let bus = AttentionBus::new();
        let mut subs: Vec<_> = (0..5).map(|_| bus.subscribe()).collect();

        let outcome = bus.publish(AttentionEvent::waiting("hook", "")).unwrap();
        assert_eq!(outcome, PublishOutcome::Delivered { subscribers: 5 });

        for sub in subs.iter_mut() {
            assert_eq!(kinds(&sub.drain()), vec![EventKind::Waiting]);
        }
    }

    #[test]
    fn test_late_subscriber_sees_only_new_events() {
        let bus = AttentionBus::new();
        bus.publish(AttentionEvent::waiting("title", "e1")).unwrap();
        bus.publish(AttentionEvent::done("title", "e2")).unwrap();

        let mut sub = bus.subscribe();
        assert!(sub.drain().is_empty());

        bus.publish(AttentionEvent::clear("focus", "e3")).unwrap();
        let events = sub.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, "e3");
    }

    #[test]
    fn test_unsubscribe_stops_delivery_and_is_idempotent() {
        let bus = AttentionBus::new();
        let mut sub = bus.subscribe();
        let id = sub.id();

        bus.unsubscribe(id);
        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);

        let outcome = bus.publish(AttentionEvent::waiting("title", "")).unwrap();
        assert_eq!(outcome, PublishOutcome::Delivered { subscribers: 0 });
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let bus = AttentionBus::new();
        let sub = bus.subscribe();
        let _other = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_invalid_event_leaves_state_untouched() {
        let bus = AttentionBus::new();
        let mut sub = bus.subscribe();

        assert!(bus.publish(AttentionEvent::waiting("", "no origin")).is_err());
        assert_eq!(bus.snapshot().mode, Mode::Idle);
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn test_timestamp_is_assigned_on_publish() {
        let bus = AttentionBus::new();
        let mut sub = bus.subscribe();
        let fixed = Utc::now() - chrono::Duration::seconds(30);

        bus.publish(AttentionEvent::waiting("title", "")).unwrap();
        bus.publish(AttentionEvent::done("hook", "").with_timestamp(fixed)).unwrap();

        let events = sub.drain();
        assert!(events[0].timestamp.is_some());
        assert_eq!(events[1].timestamp, Some(fixed));
    }

    #[test]
    fn test_concurrent_publishers_share_one_order() {
        let bus = AttentionBus::new();
        let mut subs: Vec<_> = (0..4).map(|_| bus.subscribe()).collect();

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let bus = bus.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        let origin = format!("producer{}", n);
                        let event = if i % 2 == 0 {
                            AttentionEvent::waiting(origin, i.to_string())
                        } else {
                            AttentionEvent::done(origin, i.to_string())
                        };
                        bus.publish(event).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let first = subs[0].drain();
        assert_eq!(first.len(), 800);
        for sub in subs.iter_mut().skip(1) {
            assert_eq!(sub.drain(), first);
        }

        // Внутри одного производителя порядок сохраняется
        let producer0: Vec<_> = first
            .iter()
            .filter(|e| e.origin == "producer0")
            .map(|e| e.reason.parse::<u32>().unwrap())
            .collect();
        assert!(producer0.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_snapshot_matches_last_delivered_event() {
        let bus = AttentionBus::new();
        let mut sub = bus.subscribe();

        let writer = {
            let bus = bus.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    let event = match i % 3 {
                        0 => AttentionEvent::waiting("w", ""),
                        1 => AttentionEvent::done("d", ""),
                        _ => AttentionEvent::clear("c", ""),
                    };
                    bus.publish(event).unwrap();
                }
            })
        };

        for _ in 0..500 {
            let snapshot = bus.snapshot();
            assert_eq!(snapshot.active, snapshot.mode != Mode::Idle);
        }
        writer.join().unwrap();

        let last = sub.drain().pop().unwrap();
        let expected = match last.kind {
            EventKind::Waiting => Mode::Waiting,
            EventKind::Done => Mode::Done,
            EventKind::Clear => Mode::Idle,
        };
        assert_eq!(bus.snapshot().mode, expected);
    }
}

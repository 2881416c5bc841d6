//! Шина агрегации событий внимания.
//!
//! Детекторы публикуют сырые события через [`AttentionBus::publish`], шина
//! сводит их в одно состояние (`idle` / `waiting` / `done`), отбрасывает
//! избыточные `Clear` и раздаёт принятые события всем подписчикам.
//!
//! ```text
//! focus ─────────┐
//! title ─────────┤                        ┌──► Subscription #1 ──► GET /events
//! notifications ─┼──► AttentionBus ───────┼──► Subscription #2 ──► GET /events
//! idle ──────────┤   (Mutex: mode +       └──► ...
//! POST /events ──┘    subscribers)
//! ```

mod aggregator;
mod subscription;

pub use aggregator::{AttentionBus, PublishOutcome};
pub use subscription::Subscription;

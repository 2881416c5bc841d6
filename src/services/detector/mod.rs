//! Детекторы внимания.
//!
//! Каждый детектор живёт в своей задаче tokio и общается с шиной только через
//! [`AttentionBus::publish`](crate::bus::AttentionBus::publish). Дребезг
//! гасится в самом детекторе: событие публикуется только при переходе.

mod dry_run;
mod focus;
mod health;
mod idle;
mod notifications;
mod patterns;
mod title;
mod r#trait;

pub use self::patterns::classify;
pub use self::r#trait::create_detectors;

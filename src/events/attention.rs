use crate::error::{BridgeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Максимальная длина имени источника
pub const MAX_ORIGIN_LEN: usize = 64;
/// Максимальная длина текстового обоснования
pub const MAX_REASON_LEN: usize = 1024;

/// Вид события внимания (закрытый набор)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Приложение заблокировано и ждёт подтверждения
    Waiting,
    /// Приложение закончило работу
    Done,
    /// Пользователь вернулся к приложению
    Clear,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Waiting => "Waiting",
            EventKind::Done => "Done",
            EventKind::Clear => "Clear",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "waiting" => Ok(EventKind::Waiting),
            "done" => Ok(EventKind::Done),
            "clear" => Ok(EventKind::Clear),
            _ => BridgeError::invalid_event(format!("неизвестный вид события: '{}'", s)),
        }
    }
}

/// Режим агрегированного состояния
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Idle,
    Waiting,
    Done,
}

impl Mode {
    pub fn is_active(&self) -> bool {
        !matches!(self, Mode::Idle)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Idle => f.write_str("idle"),
            Mode::Waiting => f.write_str("waiting"),
            Mode::Done => f.write_str("done"),
        }
    }
}

/// Моментальный снимок агрегированного состояния
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub active: bool,
    pub mode: Mode,
}

impl From<Mode> for Snapshot {
    fn from(mode: Mode) -> Self {
        Self {
            active: mode.is_active(),
            mode,
        }
    }
}

/// Событие внимания от одного из детекторов.
///
/// Значение неизменяемо после публикации; `timestamp` проставляется шиной,
/// если детектор его не указал.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionEvent {
    #[serde(rename = "event")]
    pub kind: EventKind,
    #[serde(rename = "source")]
    pub origin: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: String,
}

impl AttentionEvent {
    pub fn new(kind: EventKind, origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            origin: origin.into(),
            timestamp: None,
            reason: reason.into(),
        }
    }

    #[allow(dead_code)]
    pub fn waiting(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EventKind::Waiting, origin, reason)
    }

    #[allow(dead_code)]
    pub fn done(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EventKind::Done, origin, reason)
    }

    pub fn clear(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EventKind::Clear, origin, reason)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Обрезать обоснование до `MAX_REASON_LEN` байт по границе символа.
    ///
    /// Детекторы берут текст из заголовков и уведомлений, длина которых не
    /// ограничена; наблюдение не должно теряться из-за длинного текста.
    pub fn clamp_reason(mut self) -> Self {
        if self.reason.len() > MAX_REASON_LEN {
            let mut end = MAX_REASON_LEN;
            while !self.reason.is_char_boundary(end) {
                end -= 1;
            }
            self.reason.truncate(end);
        }
        self
    }

    /// Проверить корректность полей перед публикацией
    pub fn validate(&self) -> Result<()> {
        let origin = self.origin.trim();
        if origin.is_empty() {
            return Err(crate::bridge_error!(invalid_event, "пустой источник события"));
        }
        if origin.len() > MAX_ORIGIN_LEN {
            return Err(crate::bridge_error!(
                invalid_event,
                "источник длиннее {} символов",
                MAX_ORIGIN_LEN
            ));
        }
        if origin.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(crate::bridge_error!(
                invalid_event,
                "недопустимые символы в источнике '{}'",
                origin.escape_debug()
            ));
        }
        if self.reason.len() > MAX_REASON_LEN {
            return Err(crate::bridge_error!(
                invalid_event,
                "обоснование длиннее {} байт",
                MAX_REASON_LEN
            ));
        }
        Ok(())
    }
}

impl fmt::Display for AttentionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} от {}", self.kind, self.origin)?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_reason_keeps_char_boundary() {
        // "a" сдвигает двухбайтовые символы: граница на MAX_REASON_LEN - 1
        let long = format!("a{}", "я".repeat(MAX_REASON_LEN));
        let event = AttentionEvent::waiting("title", long).clamp_reason();
        assert_eq!(event.reason.len(), MAX_REASON_LEN - 1);
        assert!(event.reason.starts_with("aя"));
        assert!(event.validate().is_ok());

        let short = AttentionEvent::done("title", "готово").clamp_reason();
        assert_eq!(short.reason, "готово");
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Waiting".parse::<EventKind>().unwrap(), EventKind::Waiting);
        assert_eq!("done".parse::<EventKind>().unwrap(), EventKind::Done);
        assert_eq!("CLEAR".parse::<EventKind>().unwrap(), EventKind::Clear);
        assert!("toast".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_snapshot_follows_mode() {
        assert_eq!(Snapshot::from(Mode::Idle), Snapshot { active: false, mode: Mode::Idle });
        assert!(Snapshot::from(Mode::Waiting).active);
        assert!(Snapshot::from(Mode::Done).active);
    }

    #[test]
    fn test_snapshot_json() {
        let json = serde_json::to_string(&Snapshot::from(Mode::Waiting)).unwrap();
        assert_eq!(json, r#"{"active":true,"mode":"waiting"}"#);
    }

    #[test]
    fn test_event_validation() {
        assert!(AttentionEvent::waiting("title", "prompt").validate().is_ok());
        assert!(AttentionEvent::waiting("", "prompt").validate().is_err());
        assert!(AttentionEvent::waiting("bad origin", "").validate().is_err());
        assert!(AttentionEvent::waiting("a".repeat(MAX_ORIGIN_LEN + 1), "").validate().is_err());
        assert!(AttentionEvent::done("hook", "x".repeat(MAX_REASON_LEN + 1)).validate().is_err());
    }

    #[test]
    fn test_event_deserialize_wire_names() {
        let json = r#"{"event":"Done","source":"hook","reason":"finished"}"#;
        let event: AttentionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventKind::Done);
        assert_eq!(event.origin, "hook");
        assert_eq!(event.timestamp, None);
    }
}

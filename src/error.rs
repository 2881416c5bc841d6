use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка D-Bus: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Ошибка D-Bus (fdo): {0}")]
    DBusFdo(#[from] zbus::fdo::Error),

    #[error("Ошибка JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Некорректное событие: {0}")]
    InvalidEvent(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn invalid_event<T>(msg: impl Into<String>) -> Result<T> {
        Err(BridgeError::InvalidEvent(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! bridge_error {
    (invalid_event, $($arg:tt)*) => {
        $crate::error::BridgeError::InvalidEvent(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::BridgeError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::BridgeError::Internal(format!($($arg)*))
    };
}

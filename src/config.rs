use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub target: TargetConfig,
    pub detectors: DetectorsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    /// Директивы EnvFilter; если заданы, перекрывают `level`
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_body_bytes: usize,
    /// Сколько ждать полный запрос (заголовки и тело), мс
    pub request_timeout_ms: u64,
}

/// Какие окна считаются окнами отслеживаемого приложения
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    pub window_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorsConfig {
    /// Сколько промахов подряд до предупреждения о деградации
    pub max_consecutive_failures: u32,
    pub focus: FocusConfig,
    pub title: TitleConfig,
    pub notifications: NotificationConfig,
    pub idle: IdleConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FocusConfig {
    pub enabled: bool,
    pub polling_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TitleConfig {
    pub enabled: bool,
    pub polling_interval_ms: u64,
    pub waiting_patterns: Vec<String>,
    pub done_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub app_patterns: Vec<String>,
    pub waiting_patterns: Vec<String>,
    pub done_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdleConfig {
    pub enabled: bool,
    pub polling_interval_ms: u64,
    pub idle_threshold_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            filter: String::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9410".to_string(),
            max_body_bytes: 8 * 1024,
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            window_patterns: vec!["claude".to_string()],
        }
    }
}

impl Default for DetectorsConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 10,
            focus: FocusConfig::default(),
            title: TitleConfig::default(),
            notifications: NotificationConfig::default(),
            idle: IdleConfig::default(),
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            polling_interval_ms: 500,
        }
    }
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            polling_interval_ms: 1000,
            waiting_patterns: vec![
                "waiting for".to_string(),
                "permission".to_string(),
                "approve".to_string(),
            ],
            done_patterns: vec!["done".to_string(), "finished".to_string()],
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_patterns: vec!["claude".to_string()],
            waiting_patterns: vec![
                "permission".to_string(),
                "needs your".to_string(),
                "approve".to_string(),
            ],
            done_patterns: vec!["waiting for your input".to_string(), "finished".to_string()],
        }
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            polling_interval_ms: 1000,
            idle_threshold_ms: 60_000,
        }
    }
}

impl Config {
    /// Загрузить конфигурацию: значения по умолчанию, затем TOML, затем `ATTN_*`.
    ///
    /// Отсутствующий файл не является ошибкой.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("ATTN_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация сервера
        self.bind_addr()?;
        if self.server.max_body_bytes == 0 {
            anyhow::bail!("server.max_body_bytes должно быть больше 0");
        }
        if self.server.request_timeout_ms == 0 {
            anyhow::bail!("server.request_timeout_ms должно быть больше 0");
        }

        if self.target.window_patterns.iter().all(|p| p.trim().is_empty()) {
            anyhow::bail!("target.window_patterns не должен быть пустым");
        }

        // Валидация детекторов
        let intervals = [
            ("focus", self.detectors.focus.polling_interval_ms),
            ("title", self.detectors.title.polling_interval_ms),
            ("idle", self.detectors.idle.polling_interval_ms),
        ];
        for (name, interval) in intervals {
            if interval < 100 {
                anyhow::bail!("detectors.{}.polling_interval_ms должно быть минимум 100", name);
            }
        }

        if self.detectors.max_consecutive_failures == 0 {
            anyhow::bail!("detectors.max_consecutive_failures должно быть больше 0");
        }

        if self.detectors.idle.idle_threshold_ms < self.detectors.idle.polling_interval_ms {
            anyhow::bail!("detectors.idle.idle_threshold_ms не может быть меньше интервала опроса");
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("Неверный адрес сервера: {}", self.server.bind))
    }

    /// Есть ли хоть один включённый детектор
    pub fn any_detector_enabled(&self) -> bool {
        let d = &self.detectors;
        d.focus.enabled || d.title.enabled || d.notifications.enabled || d.idle.enabled
    }
}

/// Регистронезависимый поиск первого совпавшего паттерна
pub fn find_pattern<'a>(haystack: &str, patterns: &'a [String]) -> Option<&'a str> {
    let haystack_lower = haystack.to_lowercase();
    patterns
        .iter()
        .map(String::as_str)
        .filter(|p| !p.is_empty())
        .find(|p| haystack_lower.contains(&p.to_lowercase()))
}

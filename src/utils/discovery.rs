//! Режим `--discover`: показать окна так, как их видят детекторы.
//!
//! Помогает подобрать `target.window_patterns` и паттерны заголовков.

use crate::config::Config;
use crate::error::Result;
use crate::events::WindowInfo;
use crate::services::detector::classify;
use crate::services::window_source::ActiveWindowSource;
use tracing::warn;

/// Строка отчёта об одном окне
pub fn describe_window(window: &WindowInfo, config: &Config) -> String {
    let is_target = window.matches_any_pattern(&config.target.window_patterns);
    let marker = if is_target { "*" } else { " " };

    let verdict = if is_target {
        let title = &config.detectors.title;
        match classify(&window.title, &title.waiting_patterns, &title.done_patterns) {
            Some((kind, pattern)) => format!("  -> {} (\"{}\")", kind, pattern),
            None => "  -> нет маркеров".to_string(),
        }
    } else {
        String::new()
    };

    format!("{} {}{}", marker, window, verdict)
}

pub async fn run(config: &Config) -> Result<()> {
    let mut source = ActiveWindowSource::new();
    println!("Среда рабочего стола: {:?}", source.desktop_env());

    match source.active_window().await {
        Ok(window) => println!("Активное окно: {}", describe_window(&window, config)),
        Err(e) => warn!("Не удалось получить активное окно: {}", e),
    }

    let windows = source.list_windows().await?;
    println!("Окна ({}), * = цель {:?}:", windows.len(), config.target.window_patterns);
    for window in &windows {
        println!("  {}", describe_window(window, config));
    }

    Ok(())
}

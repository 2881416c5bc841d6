use crate::error::{BridgeError, Result};
use crate::events::WindowInfo;
use std::process::Command;
use tracing::{debug, info, warn};

use super::kdotool::KdotoolClient;
use super::sway::SwayClient;
use super::wmctrl::WmctrlClient;
use super::xdotool::XdotoolClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopEnvironment {
    KDE,
    GNOME,
    X11Generic,
    WaylandGeneric,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingMethod {
    Kdotool,
    Xdotool,
    Wmctrl,
    Sway,
}

impl DesktopEnvironment {
    /// Порядок опроса утилит для данной среды
    fn candidates(&self) -> &'static [WorkingMethod] {
        use WorkingMethod::*;
        match self {
            DesktopEnvironment::KDE => &[Kdotool, Xdotool, Wmctrl],
            DesktopEnvironment::GNOME | DesktopEnvironment::X11Generic => &[Xdotool, Wmctrl],
            DesktopEnvironment::WaylandGeneric => &[Sway, Kdotool, Xdotool],
            DesktopEnvironment::Unknown => &[Kdotool, Xdotool, Wmctrl, Sway],
        }
    }
}

/// Источник активного окна и списка окон.
///
/// Рабочая утилита выбирается один раз и переопределяется, как только
/// перестаёт отвечать.
pub struct ActiveWindowSource {
    desktop_env: DesktopEnvironment,
    working_method: Option<WorkingMethod>,

    // Детекторы утилит
    kdotool: KdotoolClient,
    xdotool: XdotoolClient,
    wmctrl: WmctrlClient,
    sway: SwayClient,
}

impl ActiveWindowSource {
    pub fn new() -> Self {
        let desktop_env = Self::detect_desktop_environment();
        debug!("Обнаружена среда рабочего стола: {:?}", desktop_env);

        Self {
            desktop_env,
            working_method: None,
            kdotool: KdotoolClient::new(),
            xdotool: XdotoolClient::new(),
            wmctrl: WmctrlClient::new(),
            sway: SwayClient::new(),
        }
    }

    pub fn desktop_env(&self) -> DesktopEnvironment {
        self.desktop_env
    }

    pub fn detect_desktop_environment() -> DesktopEnvironment {
        if let Ok(desktop) = std::env::var("XDG_CURRENT_DESKTOP") {
            match desktop.to_lowercase().as_str() {
                d if d.contains("kde") => return DesktopEnvironment::KDE,
                d if d.contains("gnome") => return DesktopEnvironment::GNOME,
                _ => {}
            }
        }

        if let Ok(session) = std::env::var("XDG_SESSION_TYPE") {
            match session.as_str() {
                "wayland" => return DesktopEnvironment::WaylandGeneric,
                "x11" => return DesktopEnvironment::X11Generic,
                _ => {}
            }
        }

        if let Ok(output) = Command::new("pgrep").arg("-f").arg("kwin").output() {
            if !output.stdout.is_empty() {
                return DesktopEnvironment::KDE;
            }
        }

        if let Ok(output) = Command::new("pgrep").arg("-f").arg("gnome-shell").output() {
            if !output.stdout.is_empty() {
                return DesktopEnvironment::GNOME;
            }
        }

        DesktopEnvironment::Unknown
    }

    async fn detect_working_method(&self) -> Result<WorkingMethod> {
        debug!("Определяем рабочий метод детекции окон...");

        for method in self.desktop_env.candidates() {
            let works = match method {
                WorkingMethod::Kdotool => self.kdotool.test().await.is_ok(),
                WorkingMethod::Xdotool => self.xdotool.test().await.is_ok(),
                WorkingMethod::Wmctrl => self.wmctrl.test().await.is_ok(),
                WorkingMethod::Sway => self.sway.test().await.is_ok(),
            };
            if works {
                info!("Используем {:?} для детекции окон", method);
                return Ok(*method);
            }
        }

        Err(BridgeError::ServiceUnavailable(
            "Ни один метод детекции окон не работает".to_string(),
        ))
    }

    /// Текущее активное окно
    pub async fn active_window(&mut self) -> Result<WindowInfo> {
        let method = match self.working_method {
            Some(method) => method,
            None => {
                let method = self.detect_working_method().await?;
                self.working_method = Some(method);
                method
            }
        };

        let result = match method {
            WorkingMethod::Kdotool => self.kdotool.get_active_window().await,
            WorkingMethod::Xdotool => self.xdotool.get_active_window().await,
            WorkingMethod::Wmctrl => self.wmctrl.get_active_window().await,
            WorkingMethod::Sway => self.sway.get_active_window().await,
        };

        if let Err(e) = &result {
            warn!("Рабочий метод {:?} перестал работать: {}. Переопределим на следующем опросе", method, e);
            self.working_method = None;
        }

        result
    }

    /// Все окна: wmctrl для X11/XWayland, swaymsg для sway
    pub async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        if self.desktop_env == DesktopEnvironment::WaylandGeneric {
            if let Ok(windows) = self.sway.list_windows().await {
                return Ok(windows);
            }
        }

        match self.wmctrl.list_windows().await {
            Ok(windows) => Ok(windows),
            Err(e) => {
                debug!("wmctrl не вернул список окон: {}", e);
                self.sway.list_windows().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_cover_every_environment() {
        for env in [
            DesktopEnvironment::KDE,
            DesktopEnvironment::GNOME,
            DesktopEnvironment::X11Generic,
            DesktopEnvironment::WaylandGeneric,
            DesktopEnvironment::Unknown,
        ] {
            assert!(!env.candidates().is_empty());
        }
        assert_eq!(DesktopEnvironment::KDE.candidates()[0], WorkingMethod::Kdotool);
        assert_eq!(DesktopEnvironment::WaylandGeneric.candidates()[0], WorkingMethod::Sway);
    }
}

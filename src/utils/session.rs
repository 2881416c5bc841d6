use tracing::{info, warn};

/// Что доступно детекторам в текущей сессии
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    /// Есть X11 или Wayland дисплей
    pub graphical: bool,
    /// Есть адрес сессионной шины D-Bus
    pub dbus: bool,
}

/// Проверить окружение сессии перед запуском детекторов
pub fn check_session() -> SessionReport {
    info!("Проверка окружения сессии...");

    let report = inspect(|name| std::env::var(name).ok());

    if !report.graphical {
        warn!("Не заданы DISPLAY и WAYLAND_DISPLAY: окна отслеживать не получится");
    }
    if !report.dbus {
        warn!("Не задан DBUS_SESSION_BUS_ADDRESS и нет /run/user/<uid>/bus");
    }

    check_not_root();

    info!("Окружение сессии: {:?}", report);
    report
}

fn inspect(var: impl Fn(&str) -> Option<String>) -> SessionReport {
    let set = |name: &str| var(name).map(|v| !v.is_empty()).unwrap_or(false);

    let runtime_bus = var("XDG_RUNTIME_DIR")
        .map(|dir| std::path::Path::new(&dir).join("bus").exists())
        .unwrap_or(false);

    SessionReport {
        graphical: set("DISPLAY") || set("WAYLAND_DISPLAY"),
        dbus: set("DBUS_SESSION_BUS_ADDRESS") || runtime_bus,
    }
}

fn check_not_root() {
    match std::env::var("USER") {
        Ok(user) if user == "root" && std::env::var("SUDO_USER").is_err() => {
            warn!("⚠️  Приложение запущено от имени root без SUDO_USER!");
            warn!("   Детекторы не увидят сессию пользователя: запускайте от обычного пользователя");
        }
        Ok(user) => {
            info!("Приложение запущено от имени пользователя: {}", user);
        }
        Err(_) => {
            warn!("Не удалось определить пользователя");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_full_session() {
        let report = inspect(env(&[
            ("WAYLAND_DISPLAY", "wayland-0"),
            ("DBUS_SESSION_BUS_ADDRESS", "unix:path=/run/user/1000/bus"),
        ]));
        assert_eq!(report, SessionReport { graphical: true, dbus: true });
    }

    #[test]
    fn test_headless_session() {
        let report = inspect(env(&[("DISPLAY", "")]));
        assert_eq!(report, SessionReport { graphical: false, dbus: false });
    }
}

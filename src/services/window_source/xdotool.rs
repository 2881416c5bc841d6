use crate::error::{BridgeError, Result};
use crate::events::WindowInfo;
use tokio::process::Command;
use tracing::debug;

/// Цепочка xdotool: заголовок и класс активного окна за один запуск
const ACTIVE_WINDOW_CHAIN: [&str; 3] = ["getactivewindow", "getwindowname", "getwindowclassname"];

/// Разобрать вывод цепочки: первая строка заголовок, вторая класс
fn parse_chain_output(stdout: &str) -> Option<WindowInfo> {
    let mut lines = stdout.lines();
    let title = lines.next()?.trim();
    let class = lines.next().map(str::trim).unwrap_or_default();
    Some(WindowInfo::new(title.to_string()).with_class(class.to_string()))
}

pub struct XdotoolClient;

impl XdotoolClient {
    pub fn new() -> Self {
        Self
    }

    pub async fn test(&self) -> Result<()> {
        self.get_active_window().await.map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<WindowInfo> {
        let output = Command::new("xdotool")
            .args(ACTIVE_WINDOW_CHAIN)
            .output()
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(format!("xdotool не найден: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("xdotool вернул ошибку: {}", stderr.trim());
            return Err(BridgeError::Internal(format!("xdotool вернул ошибку: {}", stderr.trim())));
        }

        parse_chain_output(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| crate::bridge_error!(internal, "xdotool не вернул активное окно"))
    }
}

use crate::error::{BridgeError, Result};
use crate::events::WindowInfo;
use tokio::process::Command;
use tracing::debug;

/// Клиент kdotool (KWin scripting, работает и под Wayland)
pub struct KdotoolClient;

impl KdotoolClient {
    pub fn new() -> Self {
        Self
    }

    async fn run(args: &[&str]) -> Result<String> {
        let output = Command::new("kdotool")
            .args(args)
            .output()
            .await
            .map_err(|e| BridgeError::ServiceUnavailable(format!("kdotool не найден: {}", e)))?;

        if !output.status.success() {
            debug!("kdotool {:?}: {}", args, String::from_utf8_lossy(&output.stderr).trim());
            return Err(BridgeError::Internal(format!("kdotool {} завершился с ошибкой", args[0])));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub async fn test(&self) -> Result<()> {
        Self::run(&["getactivewindow"]).await.map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<WindowInfo> {
        let window_id = Self::run(&["getactivewindow"]).await?;
        if window_id.is_empty() {
            return Err(BridgeError::Internal("kdotool: нет активного окна".to_string()));
        }

        // Окно могло закрыться между вызовами, тогда ошибка уйдёт в следующий опрос
        let title = Self::run(&["getwindowname", &window_id]).await?;
        let class = Self::run(&["getwindowclassname", &window_id])
            .await
            .unwrap_or_default();

        Ok(WindowInfo::new(title).with_class(class))
    }
}

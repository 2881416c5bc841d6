use crate::events::WindowInfo;
use crate::error::{BridgeError, Result};
use tokio::process::Command;

pub struct WmctrlClient;

impl WmctrlClient {
    pub fn new() -> Self {
        Self
    }

    pub async fn test(&self) -> Result<()> {
        let output = Command::new("wmctrl").args(["-l"]).output().await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(BridgeError::Internal("wmctrl failed".to_string()))
        }
    }

    /// Активное окно по `_NET_ACTIVE_WINDOW`
    pub async fn get_active_window(&self) -> Result<WindowInfo> {
        let output = Command::new("xprop")
            .args(["-root", "_NET_ACTIVE_WINDOW"])
            .output()
            .await
            .map_err(|e| BridgeError::Internal(format!("xprop не найден: {}", e)))?;

        if !output.status.success() {
            return Err(BridgeError::Internal("xprop вернул ошибку".to_string()));
        }

        let active_id = parse_active_window_id(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| BridgeError::Internal("Активное окно не найдено".to_string()))?;

        self.list_windows_with_ids()
            .await?
            .into_iter()
            .find(|(id, _)| *id == active_id)
            .map(|(_, window)| window)
            .ok_or_else(|| BridgeError::Internal("Активное окно не найдено в списке wmctrl".to_string()))
    }

    /// Все окна, известные оконному менеджеру
    pub async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(self
            .list_windows_with_ids()
            .await?
            .into_iter()
            .map(|(_, window)| window)
            .collect())
    }

    async fn list_windows_with_ids(&self) -> Result<Vec<(u64, WindowInfo)>> {
        let output = Command::new("wmctrl")
            .args(["-lx"])
            .output()
            .await
            .map_err(|e| BridgeError::Internal(format!("wmctrl не найден: {}", e)))?;

        if !output.status.success() {
            return Err(BridgeError::Internal("wmctrl вернул ошибку".to_string()));
        }

        Ok(parse_window_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Разбор вывода `wmctrl -lx`: `<id> <desktop> <class> <host> <title...>`
fn parse_window_list(stdout: &str) -> Vec<(u64, WindowInfo)> {
    stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return None;
            }
            let id = parse_hex(parts[0])?;
            let class = parts[2].rsplit('.').next().unwrap_or(parts[2]).to_string();
            let title = parts[4..].join(" ");
            Some((id, WindowInfo::new(title).with_class(class)))
        })
        .collect()
}

/// Разбор `_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3a00007`
fn parse_active_window_id(stdout: &str) -> Option<u64> {
    stdout
        .rsplit('#')
        .next()
        .and_then(|rest| rest.split(',').next())
        .and_then(|id| parse_hex(id.trim()))
        .filter(|id| *id != 0)
}

fn parse_hex(value: &str) -> Option<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16).ok()
}

use crate::events::WindowInfo;
use crate::error::{BridgeError, Result};
use serde_json::Value;
use tokio::process::Command;

pub struct SwayClient;

impl SwayClient {
    pub fn new() -> Self {
        Self
    }

    pub async fn test(&self) -> Result<()> {
        let output = Command::new("swaymsg").args(["-t", "get_tree"]).output().await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(BridgeError::Internal("sway failed".to_string()))
        }
    }

    pub async fn get_active_window(&self) -> Result<WindowInfo> {
        let tree = self.get_tree().await?;
        let mut windows = Vec::new();
        collect_windows(&tree, &mut windows);

        windows
            .into_iter()
            .find(|(focused, _)| *focused)
            .map(|(_, window)| window)
            .ok_or_else(|| BridgeError::Internal("Активное окно в Sway не найдено".to_string()))
    }

    pub async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let tree = self.get_tree().await?;
        let mut windows = Vec::new();
        collect_windows(&tree, &mut windows);
        Ok(windows.into_iter().map(|(_, window)| window).collect())
    }

    async fn get_tree(&self) -> Result<Value> {
        let output = Command::new("swaymsg")
            .args(["-t", "get_tree"])
            .output()
            .await
            .map_err(|e| BridgeError::Internal(format!("swaymsg не найден: {}", e)))?;

        if !output.status.success() {
            return Err(BridgeError::Internal("swaymsg вернул ошибку".to_string()));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Обход дерева sway: окнами считаются узлы с `pid`
fn collect_windows(node: &Value, out: &mut Vec<(bool, WindowInfo)>) {
    if node.get("pid").is_some() {
        if let Some(title) = node.get("name").and_then(Value::as_str) {
            let class = node
                .get("app_id")
                .and_then(Value::as_str)
                .or_else(|| {
                    node.pointer("/window_properties/class")
                        .and_then(Value::as_str)
                })
                .unwrap_or_default();
            let focused = node.get("focused").and_then(Value::as_bool).unwrap_or(false);
            out.push((focused, WindowInfo::new(title.to_string()).with_class(class.to_string())));
        }
    }

    for key in ["nodes", "floating_nodes"] {
        if let Some(children) = node.get(key).and_then(Value::as_array) {
            for child in children {
                collect_windows(child, out);
            }
        }
    }
}

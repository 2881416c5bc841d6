use serde::{Deserialize, Serialize};
use std::fmt;

/// Информация об окне
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowInfo {
    pub title: String,
    pub class: String,
}

impl WindowInfo {
    pub fn new(title: String) -> Self {
        Self {
            title,
            class: String::new(),
        }
    }

    pub fn with_class(mut self, class: String) -> Self {
        self.class = class;
        self
    }

    /// Проверить, соответствует ли окно паттерну (регистронезависимо)
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        if pattern.is_empty() {
            return false;
        }
        let pattern_lower = pattern.to_lowercase();
        self.title.to_lowercase().contains(&pattern_lower)
            || self.class.to_lowercase().contains(&pattern_lower)
    }

    /// Проверить, соответствует ли окно любому из паттернов
    pub fn matches_any_pattern(&self, patterns: &[String]) -> bool {
        patterns.iter().any(|pattern| self.matches_pattern(pattern))
    }

    /// Одно и то же окно с точки зрения детекторов фокуса
    pub fn same_window(&self, other: &WindowInfo) -> bool {
        self.title == other.title && self.class == other.class
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class.is_empty() {
            write!(f, "\"{}\"", self.title)
        } else {
            write!(f, "\"{}\" ({})", self.title, self.class)
        }
    }
}

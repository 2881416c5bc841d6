//! Источники информации об окнах.
//!
//! Этот модуль отвечает ТОЛЬКО за получение активного окна и списка окон
//! через внешние утилиты (kdotool, xdotool, wmctrl, swaymsg). Решения о том,
//! требует ли приложение внимания, принимают детекторы в `services::detector`.

mod active_window;
mod kdotool;
mod sway;
mod wmctrl;
mod xdotool;

pub use self::active_window::ActiveWindowSource;

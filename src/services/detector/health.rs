use std::fmt::Display;
use tracing::{debug, info, warn};

/// Счётчик промахов подряд.
///
/// Единичные сбои пишутся в debug, устойчивый сбой даёт одно предупреждение
/// о деградации, восстановление тоже логируется один раз.
#[derive(Debug)]
pub struct FailureStreak {
    detector: &'static str,
    threshold: u32,
    misses: u32,
    degraded: bool,
}

impl FailureStreak {
    pub fn new(detector: &'static str, threshold: u32) -> Self {
        Self {
            detector,
            threshold: threshold.max(1),
            misses: 0,
            degraded: false,
        }
    }

    /// Учесть сбой. Возвращает `true`, если детектор только что деградировал.
    pub fn record_failure(&mut self, error: impl Display) -> bool {
        self.misses = self.misses.saturating_add(1);
        debug!("Детектор {}: сбой #{}: {}", self.detector, self.misses, error);

        if !self.degraded && self.misses >= self.threshold {
            self.degraded = true;
            warn!(
                "Детектор {} деградировал: {} сбоев подряд, последний: {}",
                self.detector, self.misses, error
            );
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        if self.degraded {
            info!("Детектор {} восстановился после {} сбоев", self.detector, self.misses);
        }
        self.misses = 0;
        self.degraded = false;
    }

    #[allow(dead_code)]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

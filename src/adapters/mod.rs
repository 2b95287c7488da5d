pub mod broker;
pub mod mail_source;
pub mod mailer;
pub mod ocr;

use std::time::Duration;

/// Exponential backoff with a cap, shared by adapters that retry transient
/// transport failures (§4.B: initial 500ms, factor 2, cap 8s).
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base_ms: u64,
    cap_ms: u64,
    max_attempts: u32,
}

impl Backoff {
    pub const fn new(base_ms: u64, cap_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_ms,
            cap_ms,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay.min(self.cap_ms))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        // initial 500ms, factor 2, cap 8s, max 4 attempts (§4.B).
        Self::new(500, 8_000, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let b = Backoff::default();
        assert_eq!(b.delay_for(0), Duration::from_millis(500));
        assert_eq!(b.delay_for(1), Duration::from_millis(1000));
        assert_eq!(b.delay_for(2), Duration::from_millis(2000));
        assert_eq!(b.delay_for(4), Duration::from_millis(8000));
        assert_eq!(b.delay_for(10), Duration::from_millis(8000));
    }
}

use chrono::Utc;

/// Wall-clock source for session timing.
pub trait Clock: Send + Sync {
    fn now_epoch_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

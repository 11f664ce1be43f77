use chrono::{DateTime, Local};

/// Time source for backup filenames and dump headers. Injected so tests can
/// pin the timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub struct MockClock(parking_lot::Mutex<DateTime<Utc>>);

#[cfg(test)]
impl MockClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self(parking_lot::Mutex::new(time))
    }

    pub fn advance(&self, by: std::time::Duration) {
        let mut now = self.0.lock();
        *now += chrono::Duration::from_std(by).unwrap();
    }

    /// Steps the clock backwards, as a wall-clock correction would.
    pub fn rewind(&self, by: std::time::Duration) {
        let mut now = self.0.lock();
        *now -= chrono::Duration::from_std(by).unwrap();
    }
}

#[cfg(test)]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

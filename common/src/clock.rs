//! Monotonic wall-clock access behind a trait so tests can inject a fixed
//! or stepped clock instead of reading real time.

use chrono::DateTime;
use chrono::Utc;

/// A source of the current time. Production code uses [`SystemClock`];
/// tests can substitute a fixed clock to make timestamp assertions exact.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// A clock that advances by a fixed step each time it is read, so
    /// ordering assertions in tests don't depend on wall-clock timing.
    #[derive(Debug)]
    pub struct SteppingClock {
        next: Mutex<DateTime<Utc>>,
        step: chrono::Duration,
    }

    impl SteppingClock {
        pub fn new(start: DateTime<Utc>, step: chrono::Duration) -> Self {
            Self {
                next: Mutex::new(start),
                step,
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut guard = match self.next.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let current = *guard;
            *guard = current + self.step;
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::test_support::SteppingClock;

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn stepping_clock_advances_deterministically() {
        let start = Utc::now();
        let clock = SteppingClock::new(start, chrono::Duration::seconds(1));
        let a = clock.now();
        let b = clock.now();
        assert_eq!(b - a, chrono::Duration::seconds(1));
    }
}

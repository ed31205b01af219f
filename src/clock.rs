//! Clock abstraction for real and simulated time.
//!
//! The session never reads the system time directly. It is handed a
//! [`Clock`], so a night can be replayed at any speed against a dry-run
//! camera, and tests can step through boundaries deterministically.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration as StdDuration, Instant};

pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Block for `duration` (or pretend to).
    fn sleep(&self, duration: StdDuration);

    fn is_simulated(&self) -> bool;

    /// Whether a simulation has run out of time. Always false for real time.
    fn is_ended(&self) -> bool {
        false
    }
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_chrono(duration: StdDuration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}

/// Simulated time between a start and an end instant.
///
/// Two modes:
/// - Fast-forward (`multiplier == 0`): sleeping jumps time forward instantly.
/// - Accelerated: time flows at `multiplier` simulated seconds per real second.
///
/// Time never moves past the end instant; once there, [`Clock::is_ended`]
/// reports true.
pub struct SimulatedClock {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    multiplier: f64,
    /// Simulated time already slept through.
    elapsed: Mutex<ChronoDuration>,
    /// Real start and simulated length of a sleep in progress (accelerated mode).
    in_progress: Mutex<Option<(Instant, ChronoDuration)>>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, multiplier: f64) -> Self {
        Self {
            start,
            end,
            multiplier: if multiplier.is_finite() && multiplier > 0.0 {
                multiplier
            } else {
                0.0
            },
            elapsed: Mutex::new(ChronoDuration::zero()),
            in_progress: Mutex::new(None),
        }
    }

    /// Clock that jumps instantly through every sleep.
    pub fn fast_forward(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new(start, end, 0.0)
    }

    pub fn is_fast_forward(&self) -> bool {
        self.multiplier == 0.0
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    fn remaining(&self) -> ChronoDuration {
        (self.end - self.start - *lock(&self.elapsed)).max(ChronoDuration::zero())
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        let mut elapsed = *lock(&self.elapsed);
        if let Some((started, length)) = *lock(&self.in_progress) {
            let real = started.elapsed().as_secs_f64() * self.multiplier;
            elapsed += to_chrono(StdDuration::from_secs_f64(real)).min(length);
        }
        (self.start + elapsed).min(self.end)
    }

    fn sleep(&self, duration: StdDuration) {
        let step = to_chrono(duration).min(self.remaining());
        if step <= ChronoDuration::zero() {
            return;
        }

        if !self.is_fast_forward() {
            *lock(&self.in_progress) = Some((Instant::now(), step));
            let real_secs = step.num_milliseconds() as f64 / 1000.0 / self.multiplier;
            std::thread::sleep(StdDuration::from_secs_f64(real_secs.max(0.0)));
            *lock(&self.in_progress) = None;
        }
        *lock(&self.elapsed) += step;
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn is_ended(&self) -> bool {
        self.now() >= self.end
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS` as a local time in `tz`.
pub fn parse_datetime_in_tz(s: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("invalid datetime '{s}', expected YYYY-MM-DD HH:MM:SS"))?;
    tz.from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("'{s}' is ambiguous or does not exist in timezone {tz}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 8, 23, 22, 0, 0).unwrap()
    }

    #[test]
    fn test_fast_forward_advances_by_sleep() {
        let clock = SimulatedClock::fast_forward(start(), start() + ChronoDuration::hours(1));
        assert_eq!(clock.now(), start());

        clock.sleep(StdDuration::from_secs(90));
        assert_eq!(clock.now(), start() + ChronoDuration::seconds(90));
        assert!(clock.is_simulated());
        assert!(!clock.is_ended());
    }

    #[test]
    fn test_fast_forward_stops_at_end() {
        let end = start() + ChronoDuration::minutes(10);
        let clock = SimulatedClock::fast_forward(start(), end);

        clock.sleep(StdDuration::from_secs(3600));
        assert_eq!(clock.now(), end);
        assert!(clock.is_ended());

        clock.sleep(StdDuration::from_secs(1));
        assert_eq!(clock.now(), end);
    }

    #[test]
    fn test_accelerated_clock_scales_real_time() {
        let clock = SimulatedClock::new(start(), start() + ChronoDuration::hours(1), 600.0);
        clock.sleep(StdDuration::from_secs(6)); // 10ms of real time
        assert_eq!(clock.now(), start() + ChronoDuration::seconds(6));
    }

    #[test]
    fn test_system_clock_is_not_simulated() {
        let clock = SystemClock;
        assert!(!clock.is_simulated());
        assert!(!clock.is_ended());
    }

    #[test]
    fn test_parse_datetime_in_tz() {
        let parsed = parse_datetime_in_tz("2013-08-23 12:00:00", chrono_tz::Pacific::Honolulu).unwrap();
        assert_eq!(parsed, start());
        assert!(parse_datetime_in_tz("2013-08-23", chrono_tz::Pacific::Honolulu).is_err());
        // Skipped by the spring-forward gap
        assert!(parse_datetime_in_tz("2024-03-10 02:30:00", chrono_tz::America::New_York).is_err());
    }
}

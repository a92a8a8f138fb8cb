//! Latency profile of the simulated tape mechanics.

use std::thread;
use std::time::Duration;

/// Physical action a latency charge corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    /// Reading the cell under the head.
    Read,
    /// Writing the cell under the head.
    Write,
    /// Moving the medium by one cell.
    Shift,
}

/// Per-primitive latencies of a tape device. Immutable after construction;
/// zero durations are legal and charge nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delays {
    read: Duration,
    write: Duration,
    shift: Duration,
}

impl Delays {
    pub fn new(read: Duration, write: Duration, shift: Duration) -> Self {
        Delays { read, write, shift }
    }

    pub fn from_millis(read: u64, write: u64, shift: u64) -> Self {
        Delays {
            read: Duration::from_millis(read),
            write: Duration::from_millis(write),
            shift: Duration::from_millis(shift),
        }
    }

    pub fn zero() -> Self {
        Delays::default()
    }

    /// Suspends the calling thread for the latency of the given action.
    pub fn sleep_for(&self, kind: DelayKind) {
        let delay = match kind {
            DelayKind::Read => self.read,
            DelayKind::Write => self.write,
            DelayKind::Shift => self.shift,
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use rstest::*;

    use super::{DelayKind, Delays};

    #[rstest]
    fn test_zero_delays_do_not_sleep() {
        let delays = Delays::zero();

        let started = Instant::now();
        for _ in 0..1000 {
            delays.sleep_for(DelayKind::Read);
            delays.sleep_for(DelayKind::Write);
            delays.sleep_for(DelayKind::Shift);
        }

        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[rstest]
    #[case(DelayKind::Read)]
    #[case(DelayKind::Write)]
    #[case(DelayKind::Shift)]
    fn test_sleep_charges_configured_latency(#[case] kind: DelayKind) {
        let delays = Delays::from_millis(20, 20, 20);

        let started = Instant::now();
        delays.sleep_for(kind);

        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[rstest]
    fn test_kinds_charge_independently() {
        let delays = Delays::from_millis(0, 50, 0);

        let started = Instant::now();
        delays.sleep_for(DelayKind::Read);
        delays.sleep_for(DelayKind::Shift);
        assert!(started.elapsed() < Duration::from_millis(50));

        let started = Instant::now();
        delays.sleep_for(DelayKind::Write);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}

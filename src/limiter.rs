use parking_lot::{Condvar, Mutex};

/// Counting semaphore bounding how many tile operations run at once.
///
/// Also records the high-water mark of outstanding permits so callers can
/// check the bound held.
#[derive(Debug)]
pub struct Limiter {
    capacity: usize,
    state: Mutex<State>,
    cvar: Condvar,
}

#[derive(Debug, Default)]
struct State {
    in_flight: usize,
    peak: usize,
}

/// Slot held for the lifetime of one tile operation. Released on drop.
#[derive(Debug)]
pub struct Permit<'a> {
    limiter: &'a Limiter,
}

impl Limiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(State::default()),
            cvar: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Blocks until a slot is free.
    pub fn acquire(&self) -> Permit<'_> {
        let mut state = self.state.lock();
        while state.in_flight >= self.capacity {
            self.cvar.wait(&mut state);
        }
        state.in_flight += 1;
        state.peak = state.peak.max(state.in_flight);
        Permit { limiter: self }
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    pub fn peak(&self) -> usize {
        self.state.lock().peak
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        self.cvar.notify_one();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn acquire_release_tracks_peak() {
        let limiter = Limiter::new(3);
        let a = limiter.acquire();
        let b = limiter.acquire();
        assert_eq!(limiter.in_flight(), 2);
        drop(a);
        drop(b);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.peak(), 2);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(Limiter::new(0).capacity(), 1);
    }

    #[test]
    fn waiter_wakes_after_drop() {
        let limiter = Limiter::new(1);
        let (tx, rx) = mpsc::channel();
        let held = limiter.acquire();

        thread::scope(|s| {
            s.spawn(|| {
                let _permit = limiter.acquire();
                tx.send(()).unwrap();
            });
            assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
            drop(held);
            rx.recv_timeout(Duration::from_secs(1))
                .expect("waiter should acquire after release");
        });
        assert_eq!(limiter.peak(), 1);
    }
}

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flight {
    Idle,
    Busy,
}

/// Allows at most one transform to be in progress.
///
/// Frames compete with [`SingleFlight::try_acquire`] and are dropped when
/// busy. Explicit requests use [`SingleFlight::acquire`] and wait instead.
pub(crate) struct SingleFlight {
    state: Mutex<Flight>,
    idle: Condvar,
}

/// Proof of being the one transform in flight. Dropping it frees the slot.
pub(crate) struct FlightPermit<'a> {
    owner: &'a SingleFlight,
}

impl SingleFlight {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(Flight::Idle),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Flight> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the slot if it is free.
    pub(crate) fn try_acquire(&self) -> Option<FlightPermit<'_>> {
        let mut state = self.lock();
        match *state {
            Flight::Busy => None,
            Flight::Idle => {
                *state = Flight::Busy;
                Some(FlightPermit { owner: self })
            }
        }
    }

    /// Wait until the slot is free, then take it.
    pub(crate) fn acquire(&self) -> FlightPermit<'_> {
        let mut state = self
            .idle
            .wait_while(self.lock(), |s| *s == Flight::Busy)
            .unwrap_or_else(PoisonError::into_inner);
        *state = Flight::Busy;
        FlightPermit { owner: self }
    }

    #[cfg(test)]
    pub(crate) fn is_busy(&self) -> bool {
        *self.lock() == Flight::Busy
    }
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        *self.owner.lock() = Flight::Idle;
        self.owner.idle.notify_one();
    }
}

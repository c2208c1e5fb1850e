use ais_core::{CoreResult, Error};
use snafu::Snafu;

use crate::MemoryAdapter;

#[derive(Snafu, Debug)]
#[snafu(display("Injected store failure"))]
pub struct InjectedFailure;

#[derive(Debug, Default)]
pub(crate) struct Faults {
    remaining: usize,
    transient: bool,
}

impl Faults {
    pub(crate) fn check(&mut self) -> CoreResult<()> {
        if self.remaining == 0 {
            return Ok(());
        }
        self.remaining -= 1;
        if self.transient {
            Err(Error::unavailable(InjectedFailure))
        } else {
            Err(Error::unexpected(InjectedFailure))
        }
    }
}

impl MemoryAdapter {
    /// Makes the next `count` calls to `add_positions` fail without touching the store.
    pub fn fail_next_inserts(&self, count: usize, transient: bool) {
        let mut faults = self.faults.lock();
        faults.remaining = count;
        faults.transient = transient;
    }
}

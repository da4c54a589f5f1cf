//! Hardware seams
//!
//! Two traits mark the boundary below which nothing is reimplemented: the
//! coprocessor's instruction-issue primitive and the cycle counter
//! peripheral. Everything above them is portable; the emulator implements
//! [`CopPort`] for CI, a bare-metal build would implement it with the
//! machine instruction itself.

use nopu_cop::CommandWord;
use std::time::Instant;

/// The instruction-issue primitive.
///
/// Issues one fixed command word with up to two input register values and
/// returns up to one output register value (0 for write-form commands,
/// which produce none). The device processes commands in issue order and
/// at most one is outstanding — enforced by `&mut self`, not a lock.
pub trait CopPort {
    /// Issue `word` with `reg_a` (address slot) and `reg_b` (value slot);
    /// returns the output register for read-form words.
    fn issue(&mut self, word: CommandWord, reg_a: u32, reg_b: u32) -> u32;
}

impl<P: CopPort + ?Sized> CopPort for &mut P {
    fn issue(&mut self, word: CommandWord, reg_a: u32, reg_b: u32) -> u32 {
        (**self).issue(word, reg_a, reg_b)
    }
}

/// The cycle counter peripheral, used only to instrument inference.
pub trait CycleCounter {
    /// Reset the count to zero.
    fn reset(&mut self);
    /// Elapsed cycles since the last reset.
    fn read(&self) -> u32;
}

/// Host-clock stand-in for the cycle counter: one "cycle" per microsecond.
#[derive(Debug)]
pub struct WallCounter {
    epoch: Instant,
}

impl WallCounter {
    /// Counter starting now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for WallCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleCounter for WallCounter {
    fn reset(&mut self) {
        self.epoch = Instant::now();
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read(&self) -> u32 {
        self.epoch.elapsed().as_micros() as u32
    }
}

/// Completion-wait policy for [`crate::CopDevice::wait_idle`].
///
/// The firmware busy-waits without bound; that stays the default. A
/// bounded policy turns a wedged device into a [`crate::CopError::DeviceHang`]
/// instead of a silent stall — meant for harnesses and diagnostics, not as
/// a statement about hardware timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPolicy {
    /// Spin until the status register reads zero, however long that takes.
    #[default]
    Unbounded,
    /// Give up after `max_polls` consecutive busy reads.
    Bounded {
        /// Busy polls tolerated before reporting a hang.
        max_polls: u64,
    },
}

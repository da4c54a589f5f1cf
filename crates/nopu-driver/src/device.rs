//! Device control primitives
//!
//! Thin, blocking wrappers over the command protocol: each primitive is one
//! command issue, most followed by a completion wait. The device's single
//! command/result register pair admits one outstanding command; `&mut self`
//! throughout keeps that true without a lock.
//!
//! Write placement is normalized: every memory and configuration write is
//! followed by `wait_idle`. The firmware was inconsistent about this;
//! always waiting is the deterministic choice and should be validated
//! against silicon before anything starts relying on looser timing.

use crate::error::{CopError, Result};
use crate::port::{CopPort, CycleCounter, PollPolicy};
use nopu_cop::{cfg, cmd, ConfigField};
use tracing::trace;

/// Handle to one coprocessor behind a [`CopPort`].
#[derive(Debug)]
pub struct CopDevice<P> {
    port: P,
    poll: PollPolicy,
}

impl<P: CopPort> CopDevice<P> {
    /// Wrap a port with the default (unbounded) completion wait.
    pub fn new(port: P) -> Self {
        Self {
            port,
            poll: PollPolicy::default(),
        }
    }

    /// Replace the completion-wait policy.
    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// The active completion-wait policy.
    pub const fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Borrow the underlying port.
    pub const fn port(&self) -> &P {
        &self.port
    }

    /// Mutably borrow the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Unwrap back into the port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Reset the device: any in-flight run is abandoned and state returns
    /// to idle. Waits for the device to report idle before returning.
    ///
    /// # Errors
    ///
    /// Returns [`CopError::DeviceHang`] under a bounded poll policy.
    pub fn reset(&mut self) -> Result<()> {
        self.port.issue(cmd::RESET, 0, 0);
        self.wait_idle()?;
        Ok(())
    }

    /// Poll the status register until it reads zero.
    ///
    /// Returns the number of busy polls observed; returns as soon as a
    /// poll reads zero, never before.
    ///
    /// # Errors
    ///
    /// Returns [`CopError::DeviceHang`] once a bounded policy's poll
    /// budget is exhausted. Unbounded (the default) spins forever on a
    /// wedged device, exactly like the firmware.
    pub fn wait_idle(&mut self) -> Result<u64> {
        let mut polls: u64 = 0;
        loop {
            let status = self.port.issue(cmd::READ_STATUS, 0, 0);
            if status == 0 {
                return Ok(polls);
            }
            polls += 1;
            if let PollPolicy::Bounded { max_polls } = self.poll {
                if polls >= max_polls {
                    return Err(CopError::DeviceHang { polls });
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Start one inference over the configured topology and bound image;
    /// blocks until the device reports idle.
    ///
    /// # Errors
    ///
    /// Returns [`CopError::DeviceHang`] under a bounded poll policy.
    pub fn run(&mut self) -> Result<()> {
        self.port.issue(cmd::RUN, 0, 0);
        let polls = self.wait_idle()?;
        trace!(polls, "run complete");
        Ok(())
    }

    /// [`run`](Self::run) bracketed by cycle-counter reset/read.
    ///
    /// # Errors
    ///
    /// Returns [`CopError::DeviceHang`] under a bounded poll policy.
    pub fn run_timed<C: CycleCounter>(&mut self, counter: &mut C) -> Result<u32> {
        counter.reset();
        self.run()?;
        Ok(counter.read())
    }

    /// Fetch the result register.
    ///
    /// Valid after a completed [`run`](Self::run) or a
    /// [`mem_read`](Self::mem_read); before that the device's latch
    /// contents are undefined, and nothing here checks.
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_result(&mut self) -> i32 {
        self.port.issue(cmd::READ_RESULT, 0, 0) as i32
    }

    /// Write one word to raw device memory.
    ///
    /// # Errors
    ///
    /// Returns [`CopError::DeviceHang`] under a bounded poll policy.
    #[allow(clippy::cast_sign_loss)]
    pub fn mem_write(&mut self, addr: u32, value: i32) -> Result<()> {
        self.port.issue(cmd::MEM_WRITE, addr, value as u32);
        self.wait_idle()?;
        Ok(())
    }

    /// Latch one word of device memory into the result register.
    ///
    /// The read and the result fetch are two separate commands: the device
    /// latches into the same register inference results use. Follow with
    /// [`read_result`](Self::read_result), or use
    /// [`read_mem`](Self::read_mem) to chain both.
    ///
    /// # Errors
    ///
    /// Returns [`CopError::DeviceHang`] under a bounded poll policy.
    pub fn mem_read(&mut self, addr: u32) -> Result<()> {
        self.port.issue(cmd::MEM_READ, addr, 0);
        self.wait_idle()?;
        Ok(())
    }

    /// Read one word of device memory.
    ///
    /// # Errors
    ///
    /// Returns [`CopError::DeviceHang`] under a bounded poll policy.
    pub fn read_mem(&mut self, addr: u32) -> Result<i32> {
        self.mem_read(addr)?;
        Ok(self.read_result())
    }

    /// Write one per-layer configuration field.
    ///
    /// Rides the same opcode as [`mem_write`](Self::mem_write) with the
    /// composed `(layer << 8) | field` address; the device disambiguates
    /// by address range.
    ///
    /// # Errors
    ///
    /// Returns [`CopError::DeviceHang`] under a bounded poll policy.
    pub fn config_write(&mut self, layer: u8, field: ConfigField, value: i32) -> Result<()> {
        let addr = cfg::config_addr(layer, field);
        trace!(layer, field = field.id(), value, "config write");
        self.mem_write(addr, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::CopEmulator;

    #[test]
    fn wait_idle_returns_on_first_zero_poll() {
        let mut dev = CopDevice::new(CopEmulator::new().with_busy_polls(4));
        dev.port_mut().issue(cmd::RUN, 0, 0);
        // Exactly four busy polls, then idle.
        assert_eq!(dev.wait_idle().unwrap(), 4);
        // Already idle: zero busy polls.
        assert_eq!(dev.wait_idle().unwrap(), 0);
    }

    #[test]
    fn bounded_policy_surfaces_hang() {
        let mut dev = CopDevice::new(CopEmulator::new())
            .with_poll_policy(PollPolicy::Bounded { max_polls: 16 });
        dev.port_mut().wedge();
        match dev.run() {
            Err(CopError::DeviceHang { polls }) => assert_eq!(polls, 16),
            other => panic!("expected DeviceHang, got {other:?}"),
        }
    }

    #[test]
    fn memory_roundtrip_through_result_register() {
        let mut dev = CopDevice::new(CopEmulator::new());
        dev.mem_write(800, 0x1122_3344).unwrap();
        dev.mem_read(800).unwrap();
        assert_eq!(dev.read_result(), 0x1122_3344);
        // Convenience form.
        assert_eq!(dev.read_mem(800).unwrap(), 0x1122_3344);
    }

    #[test]
    fn config_write_composes_address() {
        let mut dev = CopDevice::new(CopEmulator::new());
        dev.config_write(3, ConfigField::InputShape, 576).unwrap();
        assert_eq!(dev.port().config(3, ConfigField::InputShape), Some(576));
        // Same opcode, same address space: visible through a raw read too.
        assert_eq!(dev.read_mem(0x304).unwrap(), 576);
    }

    #[test]
    fn reset_returns_device_to_idle() {
        let mut dev = CopDevice::new(CopEmulator::new().with_busy_polls(2));
        dev.reset().unwrap();
        assert_eq!(dev.wait_idle().unwrap(), 0);
    }
}

//! Protocol emulator
//!
//! [`CopEmulator`] implements [`CopPort`] with a software model of the
//! device's command surface: flat word memory, the decoded configuration
//! view, the busy/idle status latch, and the shared result register. The
//! accelerator's arithmetic is a black box and stays one — `RUN` returns
//! scripted results, falling back to a wrapping checksum of the bound
//! image window so end-to-end tests get a deterministic, input-dependent
//! answer.
//!
//! This is what makes the full suite run in CI with no silicon and no
//! network: the firmware's own emulator flow, behind the same port trait
//! a bare-metal build would implement with the machine instruction.

use crate::error::Result;
use crate::ingest::{Datagram, Transport};
use crate::port::CopPort;
use nopu_cop::{cmd, CommandWord, ConfigField};
use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use bytes::Bytes;

/// Software model of the coprocessor's command surface.
#[derive(Debug, Default)]
pub struct CopEmulator {
    mem: BTreeMap<u32, i32>,
    config: BTreeMap<(u8, u8), i32>,
    /// Busy polls injected after each state-changing command.
    busy_polls: u32,
    pending_busy: u32,
    wedged: bool,
    result: i32,
    scripted: VecDeque<i32>,
    image_window: usize,
    writes: Vec<(u32, i32)>,
    runs: u32,
    resets: u32,
}

impl CopEmulator {
    /// Idle emulator with empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report busy for `polls` status reads after each state-changing
    /// command, modeling device latency.
    #[must_use]
    pub fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    /// Set the sample count the checksum fallback sums from the bound
    /// image pointer.
    #[must_use]
    pub fn with_image_window(mut self, samples: usize) -> Self {
        self.image_window = samples;
        self
    }

    /// Queue a result for the next `RUN`; queued results take precedence
    /// over the checksum fallback.
    pub fn push_result(&mut self, result: i32) {
        self.scripted.push_back(result);
    }

    /// Simulate unresponsive silicon: status never clears again.
    pub fn wedge(&mut self) {
        self.wedged = true;
    }

    /// Word at `addr`, 0 if never written.
    #[must_use]
    pub fn mem(&self, addr: u32) -> i32 {
        self.mem.get(&addr).copied().unwrap_or(0)
    }

    /// Configuration field as the device decoded it.
    #[must_use]
    pub fn config(&self, layer: u8, field: ConfigField) -> Option<i32> {
        self.config.get(&(layer, field.id())).copied()
    }

    /// Snapshot of the decoded configuration space.
    #[must_use]
    pub fn config_snapshot(&self) -> BTreeMap<(u8, u8), i32> {
        self.config.clone()
    }

    /// Every `MEM_WRITE` in issue order, `(addr, value)`.
    #[must_use]
    pub fn writes(&self) -> &[(u32, i32)] {
        &self.writes
    }

    /// Number of `MEM_WRITE` commands issued.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// `RUN` commands issued.
    #[must_use]
    pub fn run_count(&self) -> u32 {
        self.runs
    }

    /// `RESET` commands issued.
    #[must_use]
    pub fn reset_count(&self) -> u32 {
        self.resets
    }

    fn begin_busy(&mut self) {
        if !self.wedged {
            self.pending_busy = self.busy_polls;
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn infer(&mut self) -> i32 {
        if let Some(result) = self.scripted.pop_front() {
            return result;
        }
        // Stand-in for the black-box arithmetic: wrapping sum over the
        // bound image window.
        let base = self
            .config
            .get(&(0, ConfigField::Image.id()))
            .copied()
            .unwrap_or(0) as u32;
        (0..self.image_window as u32)
            .map(|offset| self.mem(base + offset))
            .fold(0i32, i32::wrapping_add)
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
impl CopPort for CopEmulator {
    fn issue(&mut self, word: CommandWord, reg_a: u32, reg_b: u32) -> u32 {
        match word {
            cmd::RESET => {
                self.resets += 1;
                self.config.clear();
                self.result = 0;
                self.begin_busy();
                0
            }
            cmd::RUN => {
                self.runs += 1;
                self.result = self.infer();
                self.begin_busy();
                0
            }
            cmd::MEM_WRITE => {
                let value = reg_b as i32;
                self.writes.push((reg_a, value));
                self.mem.insert(reg_a, value);
                // The device's address-range multiplexing: low addresses
                // with a small field id double as configuration slots.
                if reg_a < 0x1_0000 && (reg_a & 0xFF) < 9 {
                    self.config
                        .insert(((reg_a >> 8) as u8, (reg_a & 0xFF) as u8), value);
                }
                self.begin_busy();
                0
            }
            cmd::MEM_READ => {
                self.result = self.mem(reg_a);
                self.begin_busy();
                0
            }
            cmd::READ_STATUS => {
                if self.wedged {
                    return 1;
                }
                if self.pending_busy > 0 {
                    self.pending_busy -= 1;
                    1
                } else {
                    0
                }
            }
            cmd::READ_RESULT => self.result as u32,
            _ => 0,
        }
    }
}

/// Scripted [`Transport`]: queued inbound frames, recorded outbound
/// datagrams. The network-side counterpart of [`CopEmulator`].
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    inbound: VecDeque<Option<Datagram>>,
    /// Everything sent, in order.
    pub sent: Vec<(SocketAddr, Bytes)>,
}

impl ScriptedTransport {
    /// Empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a validated datagram.
    pub fn queue(&mut self, datagram: Datagram) {
        self.inbound.push_back(Some(datagram));
    }

    /// Queue a frame consumed below UDP (`None`), e.g. an answered ARP.
    pub fn queue_frame(&mut self, frame: Option<Datagram>) {
        self.inbound.push_back(frame);
    }
}

impl Transport for ScriptedTransport {
    fn recv(&mut self) -> Result<Option<Datagram>> {
        match self.inbound.pop_front() {
            Some(frame) => Ok(frame),
            // A blocking receive with nothing scripted is a test bug;
            // fail fast instead of spinning.
            None => Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "transport script exhausted",
            )
            .into()),
        }
    }

    fn send(&mut self, dest: SocketAddr, payload: &[u8]) -> Result<()> {
        self.sent.push((dest, Bytes::copy_from_slice(payload)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_models_busy_latency() {
        let mut emu = CopEmulator::new().with_busy_polls(2);
        emu.issue(cmd::RUN, 0, 0);
        assert_eq!(emu.issue(cmd::READ_STATUS, 0, 0), 1);
        assert_eq!(emu.issue(cmd::READ_STATUS, 0, 0), 1);
        assert_eq!(emu.issue(cmd::READ_STATUS, 0, 0), 0);
    }

    #[test]
    fn mem_read_latches_into_result_register() {
        let mut emu = CopEmulator::new();
        emu.issue(cmd::MEM_WRITE, 5, 65_537);
        emu.issue(cmd::MEM_READ, 5, 0);
        assert_eq!(emu.issue(cmd::READ_RESULT, 0, 0), 65_537);
    }

    #[test]
    fn scripted_results_take_precedence() {
        let mut emu = CopEmulator::new().with_image_window(4);
        emu.push_result(7);
        emu.issue(cmd::RUN, 0, 0);
        assert_eq!(emu.issue(cmd::READ_RESULT, 0, 0), 7);
        // Queue drained: next run falls back to the (empty) checksum.
        emu.issue(cmd::RUN, 0, 0);
        assert_eq!(emu.issue(cmd::READ_RESULT, 0, 0), 0);
    }

    #[test]
    fn reset_clears_configuration_but_not_memory() {
        let mut emu = CopEmulator::new();
        emu.issue(cmd::MEM_WRITE, 0x0004, 42); // layer 0, input shape
        emu.issue(cmd::MEM_WRITE, 2_000, 9);
        emu.issue(cmd::RESET, 0, 0);
        assert_eq!(emu.config(0, ConfigField::InputShape), None);
        assert_eq!(emu.mem(2_000), 9);
    }
}

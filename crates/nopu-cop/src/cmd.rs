//! Coprocessor command-word encoding.
//!
//! Every operation on the coprocessor is one 32-bit unpredicated command
//! word issued through the CPU's coprocessor port. The bit layout is fixed
//! at build time; only the contents of the pinned operand registers vary at
//! call time, so the whole codec collapses to six constants.
//!
//! ```text
//! COP_WRITE:  pref[31:22]=01101  func[21:17]  regA[16:12]  regB[11:7]  post[6:0]=0000001
//! COP_READ:   pref[31:22]=01101  regD[21:17]  regA[16:12]  func[11:7]  post[6:0]=0000011
//! ```
//!
//! Operand slots are pinned by convention: r16 carries the address, r17 the
//! value, r18 receives status, r19 receives results. Above the issue
//! boundary these are plain typed parameters; no register allocation
//! concern leaks upward.

/// Instruction-class prefix shared by every coprocessor word.
pub const PREFIX: u32 = 0b01101;

/// Postfix tag for the write form.
pub const POST_WRITE: u32 = 0b000_0001;
/// Postfix tag for the read form.
pub const POST_READ: u32 = 0b000_0011;

/// Pinned operand register slots.
pub mod slot {
    /// Address operand (regA).
    pub const ADDR: u32 = 16;
    /// Value operand (regB).
    pub const VALUE: u32 = 17;
    /// Status destination (regD).
    pub const STATUS: u32 = 18;
    /// Result destination (regD).
    pub const RESULT: u32 = 19;
}

/// Function selectors.
pub mod func {
    /// Abandon any in-flight run, return to idle.
    pub const RESET: u32 = 0;
    /// Read the busy/idle status register.
    pub const STATUS: u32 = 1;
    /// Start one inference over the configured topology.
    pub const RUN: u32 = 2;
    /// Write one word to device memory (or the configuration space).
    pub const MEM_WRITE: u32 = 3;
    /// Read the latched result register.
    pub const RESULT: u32 = 4;
    /// Latch one word of device memory into the result register.
    pub const MEM_READ: u32 = 5;
}

/// One encoded 32-bit coprocessor command.
///
/// Opaque to everything above the codec; the issue primitive passes it to
/// hardware verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandWord(u32);

impl CommandWord {
    /// Encode a `COP_WRITE`-form command.
    #[must_use]
    pub const fn write_form(func: u32, reg_a: u32, reg_b: u32) -> Self {
        Self(PREFIX << 22 | func << 17 | reg_a << 12 | reg_b << 7 | POST_WRITE)
    }

    /// Encode a `COP_READ`-form command.
    #[must_use]
    pub const fn read_form(func: u32, reg_a: u32, reg_d: u32) -> Self {
        Self(PREFIX << 22 | reg_d << 17 | reg_a << 12 | func << 7 | POST_READ)
    }

    /// The raw 32-bit word.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Function selector carried by this word.
    #[must_use]
    pub const fn func(self) -> u32 {
        if self.0 & POST_READ == POST_READ {
            (self.0 >> 7) & 0x1F
        } else {
            (self.0 >> 17) & 0x1F
        }
    }
}

impl std::fmt::Display for CommandWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#09x}", self.0)
    }
}

/// `RESET` — abandon in-flight work, return to idle.
pub const RESET: CommandWord = CommandWord::write_form(func::RESET, 0, 0);

/// `RUN` — start one inference.
pub const RUN: CommandWord = CommandWord::write_form(func::RUN, 0, 0);

/// `MEM_WRITE` — write r17 to the address in r16. Configuration writes use
/// this same word; the device disambiguates by address range.
pub const MEM_WRITE: CommandWord =
    CommandWord::write_form(func::MEM_WRITE, slot::ADDR, slot::VALUE);

/// `MEM_READ` — latch the word at the address in r16 into the result register.
pub const MEM_READ: CommandWord = CommandWord::write_form(func::MEM_READ, slot::ADDR, 0);

/// `READ_STATUS` — busy/idle status into r18 (0 = idle).
pub const READ_STATUS: CommandWord = CommandWord::read_form(func::STATUS, 0, slot::STATUS);

/// `READ_RESULT` — latched result into r19.
pub const READ_RESULT: CommandWord = CommandWord::read_form(func::RESULT, 0, slot::RESULT);

#[cfg(test)]
mod tests {
    use super::*;

    // The firmware issues these exact words as hand-assembled `.word`
    // constants; the encoder must reproduce them bit for bit.
    #[test]
    fn fixed_words_match_observed_encodings() {
        assert_eq!(RESET.raw(), 0x0340_0001);
        assert_eq!(READ_STATUS.raw(), 0x0364_0083);
        assert_eq!(RUN.raw(), 0x0344_0001);
        assert_eq!(MEM_WRITE.raw(), 0x0347_0881);
        assert_eq!(READ_RESULT.raw(), 0x0366_0203);
        assert_eq!(MEM_READ.raw(), 0x034B_0001);
    }

    #[test]
    fn func_roundtrips_through_both_forms() {
        assert_eq!(RESET.func(), func::RESET);
        assert_eq!(RUN.func(), func::RUN);
        assert_eq!(MEM_WRITE.func(), func::MEM_WRITE);
        assert_eq!(MEM_READ.func(), func::MEM_READ);
        assert_eq!(READ_STATUS.func(), func::STATUS);
        assert_eq!(READ_RESULT.func(), func::RESULT);
    }

    #[test]
    fn read_and_write_postfix_disjoint() {
        assert_eq!(RESET.raw() & 0x7F, POST_WRITE);
        assert_eq!(READ_STATUS.raw() & 0x7F, POST_READ);
        assert_eq!(READ_RESULT.raw() & 0x7F, POST_READ);
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(format!("{RUN}"), "0x3440001");
    }
}

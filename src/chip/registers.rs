//! C352 Register Definitions
//!
//! The chip exposes a 16-bit register bus. Addresses below 0x100 select one
//! of eight 16-bit fields per voice (`address / 8` = voice, `address % 8` =
//! field); 0x200/0x201 are free-form global control words and 0x202 is the
//! key-on/key-off commit strobe.

use std::fmt;

use bitflags::bitflags;

/// Per-voice register field, in bus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceReg {
    /// Front volume pair (left in the high byte, right in the low byte)
    VolFront = 0x00,
    /// Rear volume pair (left in the high byte, right in the low byte)
    VolRear = 0x01,
    /// Frequency step added to the 17-bit sample counter every output sample
    Freq = 0x02,
    /// Flag word (see [`VoiceFlags`])
    Flags = 0x03,
    /// Wave bank (upper 16 bits of the sample address)
    WaveBank = 0x04,
    /// Wave start offset within the bank
    WaveStart = 0x05,
    /// Wave end offset
    WaveEnd = 0x06,
    /// Wave loop offset
    WaveLoop = 0x07,
}

impl VoiceReg {
    /// Decode a bus address into its per-voice field.
    ///
    /// Only the low three bits participate, matching the hardware's
    /// `address % 8` field select.
    pub fn from_addr(addr: u16) -> Self {
        match addr & 7 {
            0 => VoiceReg::VolFront,
            1 => VoiceReg::VolRear,
            2 => VoiceReg::Freq,
            3 => VoiceReg::Flags,
            4 => VoiceReg::WaveBank,
            5 => VoiceReg::WaveStart,
            6 => VoiceReg::WaveEnd,
            _ => VoiceReg::WaveLoop,
        }
    }

    /// Bus address of this field for the given voice.
    pub fn addr(self, voice: usize) -> u16 {
        (voice as u16) * 8 + self as u16
    }
}

impl fmt::Display for VoiceReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceReg::VolFront => write!(f, "volume front"),
            VoiceReg::VolRear => write!(f, "volume rear"),
            VoiceReg::Freq => write!(f, "frequency"),
            VoiceReg::Flags => write!(f, "flags"),
            VoiceReg::WaveBank => write!(f, "wave bank"),
            VoiceReg::WaveStart => write!(f, "wave start"),
            VoiceReg::WaveEnd => write!(f, "wave end"),
            VoiceReg::WaveLoop => write!(f, "wave loop"),
        }
    }
}

bitflags! {
    /// Voice flag word.
    ///
    /// `KEYON`/`KEYOFF` are pending requests; they only take effect on the
    /// 0x202 commit strobe. `BUSY`, `LDIR` and `LOOPHIST` are maintained by
    /// the chip itself but live in the same word and read back over the bus.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VoiceFlags: u16 {
        /// Voice is playing
        const BUSY = 0x8000;
        /// Key-on pending (cleared by the commit)
        const KEYON = 0x4000;
        /// Key-off pending (cleared by the commit)
        const KEYOFF = 0x2000;
        /// Loop trigger (firmware bookkeeping bit, not used by synthesis)
        const LOOPTRG = 0x1000;
        /// Set once the voice has passed its loop point
        const LOOPHIST = 0x0800;
        /// Phase invert, rear left
        const PHASERL = 0x0200;
        /// Phase invert, front right (the hardware also applies this one to
        /// the rear right channel)
        const PHASEFR = 0x0100;
        /// Phase invert, front left
        const PHASEFL = 0x0080;
        /// Current ping-pong direction (set = backwards)
        const LDIR = 0x0040;
        /// On loop, retarget the bank from the wave start register
        const LINK = 0x0020;
        /// Play the noise generator instead of sample data
        const NOISE = 0x0010;
        /// Decode samples through the mu-law table
        const MULAW = 0x0008;
        /// Disable interpolation; also snaps the volume ramp
        const FILTER = 0x0004;
        /// Play backwards
        const REVERSE = 0x0002;
        /// Loop between the loop offset and the end offset
        const LOOP = 0x0001;

        // Undefined bits must survive a write/read round trip.
        const _ = !0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_decode_matches_bus_arithmetic() {
        assert_eq!(VoiceReg::from_addr(0x00), VoiceReg::VolFront);
        assert_eq!(VoiceReg::from_addr(0x0b), VoiceReg::Flags);
        assert_eq!(VoiceReg::from_addr(0xff), VoiceReg::WaveLoop);
        assert_eq!(VoiceReg::Freq.addr(3), 0x1a);
    }

    #[test]
    fn unknown_flag_bits_are_retained() {
        let f = VoiceFlags::from_bits_retain(0x0400 | 0x0001);
        assert_eq!(f.bits(), 0x0401);
        assert!(f.contains(VoiceFlags::LOOP));
    }
}

//! # c352
//!
//! Cycle-faithful emulation of the Namco C352 PCM sound chip together with
//! the voice-modulation layer of the sound driver firmware that ran on top
//! of it in Namco's System 2 / System 21 era arcade boards.
//!
//! The crate has two halves:
//!
//! - [`chip`] — the C352 itself: 32 PCM voices with 8-bit linear and mu-law
//!   sample decoding, per-voice looping, ping-pong and link modes, a noise
//!   generator, and a four-channel (front/rear, left/right) output mix.
//!   Replay output is bit-exact with the real chip, including its known
//!   hardware quirks.
//! - [`driver`] — the firmware's per-tick voice state machines: quadrant
//!   pan and X/Y position conversion, byte-coded pan envelopes, pitch
//!   envelopes with coupled tremolo, and portamento. Firmware bugs that
//!   games audibly depend on are reproduced, not fixed.
//!
//! ## Example
//!
//! ```
//! use c352::chip::{C352, VoiceFlags, VoiceReg};
//!
//! let mut chip = C352::new(24_576_000);
//! chip.set_wave(vec![0x10; 0x1000]);
//!
//! // Program voice 0: full volume, mid pitch, keyed on.
//! chip.write(VoiceReg::VolFront.addr(0), 0xffff);
//! chip.write(VoiceReg::Freq.addr(0), 0x4000);
//! chip.write(VoiceReg::WaveEnd.addr(0), 0x0fff);
//! chip.write(
//!     VoiceReg::Flags.addr(0),
//!     (VoiceFlags::KEYON | VoiceFlags::PHASEFL).bits(),
//! );
//! chip.write(0x202, 0); // commit pending key events
//!
//! let [fl, fr, rl, rr] = chip.update();
//! # let _ = (fl, fr, rl, rr);
//! ```

#![warn(missing_docs)]

pub mod chip;
pub mod driver;

pub use chip::{MulawType, RegisterTap, VoiceFlags, VoiceReg, C352};
pub use driver::{
    AmplitudeSink, DriverConfig, DriverSession, DriverType, McuVersion, RomImage, SoundData,
    WordOrder,
};

/// Errors reported by this crate.
#[derive(Debug, thiserror::Error)]
pub enum C352Error {
    /// I/O failure while loading a ROM or data image
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid session or chip configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result type used throughout the crate.
pub type Result<T> = std::result::Result<T, C352Error>;

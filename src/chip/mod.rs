//! C352 chip emulation domain
//!
//! Register-level emulation of the 32-voice PCM mixer: bus decode, key
//! commit, sample fetch with loop/link/ping-pong policy, mu-law expansion,
//! interpolation, volume ramping and the four-channel downmix.
//!
//! Implementation:
//! - `c352` - the chip core
//! - `registers` - bus field enum and voice flag word
//! - `mulaw` - closed-form decode table construction

pub mod c352;
pub mod mulaw;
pub mod registers;

// Re-export public API
pub use c352::{RegisterTap, Voice, C352, DEVICE_ID, VOICE_COUNT};
pub use mulaw::MulawType;
pub use registers::{VoiceFlags, VoiceReg};

//! Sound-driver voice management
//!
//! The firmware layers a per-tick voice driver on top of the raw chip: pan
//! and position conversion, byte-coded pan envelopes, pitch envelopes and
//! portamento. [`DriverSession`] binds those state machines to a [`C352`]
//! instance and a sound data image; the host sequencer pokes the public
//! fields from its track commands and calls the per-tick updates.

pub mod channel;
pub mod memory;
pub mod pan;
pub mod pitch;
pub mod tables;

pub use channel::{Channel, TrackRef};
pub use memory::{RomImage, SoundData, WordOrder};
pub use pan::{pan_mode, PanState, PanVoice};
pub use pitch::{AmplitudeSink, PitchVoice};
pub use tables::DriverTables;

use crate::chip::C352;

/// Firmware revision of the driver MCU. Later revisions change a few
/// behaviors; the ordering matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum McuVersion {
    /// Revisions before Q00
    #[default]
    Early,
    /// Q00 and later
    Q00,
}

/// Which board family the driver targets. The NA hardware runs a slightly
/// different build of the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverType {
    /// System 2 / System 21 driver build
    #[default]
    System2,
    /// NA-1 / NA-2 driver build
    Na,
}

/// Static driver parameters, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// Pan resolution mask; 0 collapses every position to centre
    pub pan_mask: u8,
    /// Firmware revision, gates the retrigger suppression check
    pub mcu_ver: McuVersion,
    /// Board family, selects the pitch envelope end behavior
    pub driver_type: DriverType,
    /// Base offset of the sound data bank
    pub data_base: u32,
    /// Offset of the pan envelope index table
    pub pan_table_offset: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            pan_mask: 0xff,
            mcu_ver: McuVersion::default(),
            driver_type: DriverType::default(),
            data_base: 0,
            pan_table_offset: 0,
        }
    }
}

/// A chip plus the per-voice driver state machines.
///
/// The session owns the [`C352`]; the host reads mixed samples through
/// [`DriverSession::chip`] and runs the pan/pitch updates once per driver
/// tick per active voice.
pub struct DriverSession<M: SoundData> {
    /// The chip the state machines program
    pub chip: C352,
    pub(crate) mem: M,
    pub(crate) config: DriverConfig,
    pub(crate) tables: DriverTables,
    pub(crate) registers: [u16; 0x100],
    pub(crate) channels: Vec<Channel>,
    pub(crate) pan: Vec<PanVoice>,
    pub(crate) pitch: Vec<PitchVoice>,
}

impl<M: SoundData> DriverSession<M> {
    /// Create a session with `voices` logical voices.
    pub fn new(chip: C352, mem: M, config: DriverConfig, voices: usize) -> Self {
        DriverSession {
            chip,
            mem,
            config,
            tables: DriverTables::new(),
            registers: [0; 0x100],
            channels: vec![Channel::default(); voices],
            pan: vec![PanVoice::default(); voices],
            pitch: vec![PitchVoice::default(); voices],
        }
    }

    /// Reset the chip and every driver state machine. The sound data image
    /// and configuration survive.
    pub fn reset(&mut self) {
        self.chip.reset();
        self.registers = [0; 0x100];
        for ch in &mut self.channels {
            *ch = Channel::default();
        }
        for v in &mut self.pan {
            *v = PanVoice::default();
        }
        for p in &mut self.pitch {
            *p = PitchVoice::default();
        }
    }

    /// Number of logical voices this session drives.
    pub fn voices(&self) -> usize {
        self.pan.len()
    }

    /// The sound data image the envelope interpreters read.
    pub fn memory(&self) -> &M {
        &self.mem
    }

    /// Session configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Driver work register, readable by register-linked pan modes.
    pub fn register(&self, index: u8) -> u16 {
        self.registers[index as usize]
    }

    /// Write a driver work register.
    pub fn set_register(&mut self, index: u8, value: u16) {
        self.registers[index as usize] = value;
    }

    /// Channel mirror for a logical voice.
    pub fn channel(&self, voice: usize) -> &Channel {
        &self.channels[voice]
    }

    /// Mutable channel mirror for a logical voice.
    pub fn channel_mut(&mut self, voice: usize) -> &mut Channel {
        &mut self.channels[voice]
    }

    /// Pan state for a logical voice.
    pub fn pan_voice(&self, voice: usize) -> &PanVoice {
        &self.pan[voice]
    }

    /// Mutable pan state for a logical voice.
    pub fn pan_voice_mut(&mut self, voice: usize) -> &mut PanVoice {
        &mut self.pan[voice]
    }

    /// Pitch state for a logical voice.
    pub fn pitch_voice(&self, voice: usize) -> &PitchVoice {
        &self.pitch[voice]
    }

    /// Mutable pitch state for a logical voice.
    pub fn pitch_voice_mut(&mut self, voice: usize) -> &mut PitchVoice {
        &mut self.pitch[voice]
    }
}

impl<M: SoundData + std::fmt::Debug> std::fmt::Debug for DriverSession<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverSession")
            .field("config", &self.config)
            .field("voices", &self.pan.len())
            .field("mem", &self.mem)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> DriverSession<RomImage> {
        DriverSession::new(
            C352::new(24_576_000),
            RomImage::new(vec![0u8; 0x100], WordOrder::LittleEndian),
            DriverConfig::default(),
            16,
        )
    }

    #[test]
    fn new_session_allocates_all_state_machines() {
        let s = session();
        assert_eq!(s.voices(), 16);
        assert_eq!(s.pan_voice(15).state(), PanState::Set);
        assert!(s.channel(0).track.is_none());
    }

    #[test]
    fn work_registers_round_trip() {
        let mut s = session();
        s.set_register(0x42, 0xbeef);
        assert_eq!(s.register(0x42), 0xbeef);
        assert_eq!(s.register(0x41), 0);
    }

    #[test]
    fn reset_clears_driver_state_but_keeps_config() {
        let mut s = session();
        s.set_register(1, 7);
        s.pan_voice_mut(3).pan = 0x55;
        s.pitch_voice_mut(3).target = 0x1234;
        s.reset();
        assert_eq!(s.register(1), 0);
        assert_eq!(s.pan_voice(3).pan, 0);
        assert_eq!(s.pitch_voice(3).target, 0);
        assert_eq!(s.config().pan_mask, 0xff);
    }

    #[test]
    fn revision_ordering_reflects_release_history() {
        assert!(McuVersion::Early < McuVersion::Q00);
    }
}

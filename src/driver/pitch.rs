//! Pitch envelope and portamento
//!
//! Melodic voices carry a pitch state machine that runs once per tick. It has
//! two halves: a table-driven pitch envelope (vibrato and pitch-bend shapes,
//! optionally with a coupled tremolo) and a linear portamento that slides the
//! base pitch toward the commanded note. Both produce 8.8 fixed-point pitch
//! words; the caller adds [`PitchVoice::env_mod`] on top of the slid value
//! when it programs the chip frequency.

use super::memory::SoundData;
use super::{DriverSession, DriverType};

/// Receives tremolo attenuation derived from the pitch envelope.
///
/// The envelope only produces the attenuation delta; the sink adds its own
/// fade level before writing hardware.
pub trait AmplitudeSink {
    /// Apply `attenuation` on top of the sink's own fade level.
    fn write_volume(&mut self, attenuation: u16);
}

/// Per-voice pitch state.
///
/// `value` and `target` are 8.8 fixed-point note numbers. The sequencer
/// writes the public fields from track commands; the tick update owns the
/// rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct PitchVoice {
    /// Current slid pitch
    pub value: u16,
    /// Commanded pitch the slide moves toward
    pub target: u16,
    /// Portamento speed (0 disables in practice, see [`PitchVoice::update`])
    pub portamento: u8,
    /// Portamento enable, armed by the note reset path
    pub porta_flag: bool,
    /// Envelope number, 1-based; 0 means no envelope
    pub env_no: u8,
    /// Bank-relative base of the envelope index table
    pub env_base: u32,
    /// Envelope playback speed (counter increment per tick)
    pub env_speed: u8,
    /// Pitch modulation depth
    pub env_depth: u8,
    /// Tremolo depth; 0 disables the volume coupling
    pub vol_depth: u8,
    /// Pitch offset produced by the envelope, 8.8 fixed point
    pub env_mod: u16,

    env_pos: u32,
    env_loop: u32,
    env_counter: u8,
    env_value: u16,
    vol_mod: u8,
    vol_base: u8,
}

impl PitchVoice {
    /// Reset the envelope for a new note. Clears the modulation output and,
    /// when an envelope is selected, seats the read cursor on its first
    /// record.
    pub fn env_set(&mut self, mem: &impl SoundData) {
        self.env_mod = 0;

        if self.env_no == 0 {
            return;
        }

        self.env_set_pos(mem);
        self.env_counter = 0;
        self.vol_base = 0;
    }

    /// Seat the cursor on envelope `env_no` via the bank's index table. The
    /// bank is the upper bits of `env_base`; the table offset is read from
    /// the base itself.
    fn env_set_pos(&mut self, mem: &impl SoundData) {
        self.env_pos = self.env_base & 0xffff00;
        self.env_pos = self.env_pos.wrapping_add(u32::from(mem.read_word(
            self.env_pos
                .wrapping_add(u32::from(mem.read_word(self.env_base)))
                .wrapping_add(2 * u32::from(self.env_no)),
        )));
        self.env_loop = self.env_pos;
    }

    fn env_update(
        &mut self,
        mem: &impl SoundData,
        driver_type: DriverType,
        sink: Option<&mut dyn AmplitudeSink>,
    ) {
        if self.env_no == 0 {
            return;
        }

        let counter = u16::from(self.env_counter) + u16::from(self.env_speed);
        if counter > 0xff {
            self.env_pos = self.env_pos.wrapping_add(1);
        }

        let data = mem.read_byte(self.env_pos);
        let target = i16::from(mem.read_byte(self.env_pos.wrapping_add(1)));

        self.env_counter = (counter & 0xff) as u8;
        let counter = counter & 0xff;

        if target == 0xfd {
            // chain into the next envelope
            self.env_no = self.env_no.wrapping_add(1);
            self.env_set_pos(mem);
            self.env_counter = 0;
            return;
        } else if target == 0xfe {
            // loop
            self.env_pos = self.env_loop;
            self.env_counter = 0;
            return;
        } else if target > 0xf0 {
            // end: hold the final value. The NA driver keeps the fractional
            // part, the System 2 one clears it.
            self.env_value = if driver_type == DriverType::Na {
                (u16::from(data) << 8) | (self.env_value & 0xff)
            } else {
                u16::from(data) << 8
            };
            self.env_set_mod();
            self.env_no = 0;
            return;
        }

        // Interpolate from data toward target by the fractional counter.
        let step = ((target - i16::from(data)) as i32 * i32::from(counter)) as u16;
        self.env_value = (u16::from(data) << 8).wrapping_add(step);
        self.vol_mod = (self.env_value >> 8) as u8;
        self.env_set_vol(sink);
        self.env_set_mod();
    }

    /// Recompute the pitch offset from the envelope value. The envelope is
    /// centered on note 100; depth scales the excursion.
    fn env_set_mod(&mut self) {
        let depth = self.env_depth;
        let val = ((i32::from(self.env_value) - 0x6400) >> 1) as i16;
        let m = (i32::from(val) * i32::from(depth)) >> 8;
        self.env_mod = m as u16;
    }

    fn env_set_vol(&mut self, sink: Option<&mut dyn AmplitudeSink>) {
        if self.vol_depth == 0 {
            return;
        }

        let m = self.vol_base.wrapping_sub(self.vol_mod) as i8;
        let mut d: u16 = 0;
        if m < 0 {
            self.vol_base = self.vol_mod;
        } else {
            d = ((i32::from(m) * i32::from(self.vol_depth)) >> 9) as u16;
        }

        if let Some(sink) = sink {
            sink.write_volume(d);
        }
    }

    /// Per-tick update: run the envelope, then slide `value` toward `target`.
    /// Returns the slid pitch (without `env_mod`).
    ///
    /// A note keyed on with a delay gets no portamento: the enable flag is
    /// armed by the reset path, which the original firmware only reaches once
    /// the delay counter hits zero, so the first updates run with the flag
    /// clear and snap straight to the target. Dirt Fox does not sound right
    /// without this.
    pub fn update(
        &mut self,
        mem: &impl SoundData,
        driver_type: DriverType,
        sink: Option<&mut dyn AmplitudeSink>,
    ) -> u16 {
        self.env_update(mem, driver_type, sink);

        if !self.porta_flag {
            self.value = self.target;
            return self.value;
        }

        let difference = self.target.wrapping_sub(self.value) as i16;
        let mut step = difference >> 8;
        if difference < 0 {
            step -= 1;
        } else {
            step += 1;
        }

        let val =
            (i32::from(self.value) + (i32::from(step) * i32::from(self.portamento)) / 2) as u16;

        // Sign flip between the remaining distance and the original
        // difference means the slide overshot: stop without taking the step.
        if ((i32::from(self.target) - i32::from(val)) ^ i32::from(difference)) < 0 {
            self.porta_flag = false;
        } else {
            self.value = val;
        }
        self.value
    }
}

impl<M: SoundData> DriverSession<M> {
    /// Reset a voice's pitch envelope for a new note.
    pub fn pitch_env_set(&mut self, voice: usize) {
        assert!(
            voice < self.pitch.len(),
            "pitch reset on unconfigured voice {voice}"
        );
        let Self { pitch, mem, .. } = self;
        pitch[voice].env_set(mem);
    }

    /// Per-tick pitch update for a voice. Returns the slid pitch.
    pub fn pitch_update(
        &mut self,
        voice: usize,
        sink: Option<&mut dyn AmplitudeSink>,
    ) -> u16 {
        assert!(
            voice < self.pitch.len(),
            "pitch update on unconfigured voice {voice}"
        );
        let Self {
            pitch, mem, config, ..
        } = self;
        pitch[voice].update(mem, config.driver_type, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::super::memory::{RomImage, WordOrder};
    use super::*;

    fn rom(bytes: &[(usize, u8)]) -> RomImage {
        let mut data = vec![0u8; 0x100];
        for &(at, b) in bytes {
            data[at] = b;
        }
        RomImage::new(data, WordOrder::LittleEndian)
    }

    // Envelope layout used below (little-endian words, env_base = 0):
    //   0x0000: word 0x0010  -> index table at 0x10
    //   0x0012: word 0x0020  -> envelope 1 records at 0x20
    fn env_rom(records: &[u8]) -> RomImage {
        let mut data = vec![0u8; 0x100];
        data[0x00] = 0x10;
        data[0x12] = 0x20;
        data[0x20..0x20 + records.len()].copy_from_slice(records);
        RomImage::new(data, WordOrder::LittleEndian)
    }

    struct Recorder(Vec<u16>);

    impl AmplitudeSink for Recorder {
        fn write_volume(&mut self, attenuation: u16) {
            self.0.push(attenuation);
        }
    }

    #[test]
    fn portamento_approaches_the_target_without_passing_it() {
        let mem = rom(&[]);
        let mut p = PitchVoice {
            value: 0x1000,
            target: 0x4000,
            portamento: 8,
            porta_flag: true,
            ..Default::default()
        };

        let mut last = p.value;
        for _ in 0..2000 {
            let v = p.update(&mem, DriverType::System2, None);
            assert!(v >= last, "slide moved away from the target");
            assert!(v <= 0x4000, "slide passed the target");
            last = v;
            if !p.porta_flag {
                break;
            }
        }
        assert!(!p.porta_flag, "slide never arrived");
    }

    #[test]
    fn portamento_slides_downward_too() {
        let mem = rom(&[]);
        let mut p = PitchVoice {
            value: 0x4000,
            target: 0x1000,
            portamento: 8,
            porta_flag: true,
            ..Default::default()
        };

        let first = p.update(&mem, DriverType::System2, None);
        assert!(first < 0x4000);
        assert!(first >= 0x1000);
    }

    #[test]
    fn delayed_note_snaps_to_the_target_instantly() {
        // The enable flag is still clear while the note delay runs down, so
        // the first update jumps rather than slides.
        let mem = rom(&[]);
        let mut p = PitchVoice {
            value: 0x1000,
            target: 0x4000,
            portamento: 8,
            porta_flag: false,
            ..Default::default()
        };
        assert_eq!(p.update(&mem, DriverType::System2, None), 0x4000);
    }

    #[test]
    fn env_set_seats_the_cursor_through_the_index_table() {
        let mem = env_rom(&[0x64, 0x64]);
        let mut p = PitchVoice {
            env_no: 1,
            env_base: 0,
            env_mod: 0x1234,
            ..Default::default()
        };
        p.env_set(&mem);
        assert_eq!(p.env_mod, 0);
        assert_eq!(p.env_pos, 0x20);
        assert_eq!(p.env_loop, 0x20);
    }

    #[test]
    fn envelope_interpolates_and_centres_on_note_100() {
        // Flat records at the centre note, closed by a loop marker so the
        // cursor never runs past them: modulation must stay zero.
        let mem = env_rom(&[0x64, 0x64, 0x64, 0xfe]);
        let mut p = PitchVoice {
            env_no: 1,
            env_speed: 0x40,
            env_depth: 0x80,
            ..Default::default()
        };
        p.env_set(&mem);
        for _ in 0..8 {
            p.update(&mem, DriverType::System2, None);
        }
        assert_eq!(p.env_mod, 0);
    }

    #[test]
    fn envelope_above_centre_raises_the_pitch() {
        let mem = env_rom(&[0x70, 0x70]);
        let mut p = PitchVoice {
            env_no: 1,
            env_speed: 0x40,
            env_depth: 0x80,
            ..Default::default()
        };
        p.env_set(&mem);
        p.update(&mem, DriverType::System2, None);
        // (0x7000 - 0x6400) >> 1 scaled by depth 0x80 / 256.
        assert_eq!(p.env_mod, (((0x7000 - 0x6400) >> 1) * 0x80 >> 8) as u16);
    }

    #[test]
    fn end_record_holds_the_value_and_stops_the_envelope() {
        // data 0x70, terminator 0xff.
        let mem = env_rom(&[0x70, 0xff]);
        let mut p = PitchVoice {
            env_no: 1,
            env_speed: 0x40,
            env_depth: 0xff,
            ..Default::default()
        };
        p.env_set(&mem);
        p.update(&mem, DriverType::System2, None);
        assert_eq!(p.env_no, 0);
        let held = p.env_mod;
        // With the envelope stopped the modulation no longer changes.
        p.update(&mem, DriverType::System2, None);
        assert_eq!(p.env_mod, held);
    }

    #[test]
    fn end_record_keeps_the_fraction_on_the_na_driver() {
        let mem = env_rom(&[0x70, 0xff]);
        let mut base = PitchVoice {
            env_no: 1,
            env_speed: 0x40,
            env_depth: 0xff,
            ..Default::default()
        };
        base.env_set(&mem);

        let mut s2 = base;
        s2.update(&mem, DriverType::System2, None);
        let mut na = base;
        na.env_value = 0x0042;
        na.update(&mem, DriverType::Na, None);

        assert_eq!(s2.env_value, 0x7000);
        assert_eq!(na.env_value, 0x7042);
    }

    #[test]
    fn loop_record_rewinds_the_cursor() {
        // One real record, then a loop marker pointing back at it. The speed
        // pushes the cursor forward every tick, the 0xfe record must pull it
        // back to the start.
        let mem = env_rom(&[0x70, 0x70, 0x70, 0xfe]);
        let mut p = PitchVoice {
            env_no: 1,
            env_speed: 0xff,
            ..Default::default()
        };
        p.env_set(&mem);
        for _ in 0..16 {
            p.update(&mem, DriverType::System2, None);
            assert!(p.env_no != 0, "loop must never terminate the envelope");
            assert!(p.env_pos >= 0x20 && p.env_pos <= 0x23);
        }
    }

    #[test]
    fn chain_record_advances_to_the_next_envelope() {
        // Envelope 1 immediately chains (0xfd); the index table routes
        // envelope 2 to a flat record elsewhere.
        let mut data = vec![0u8; 0x100];
        data[0x00] = 0x10; // index table at 0x10
        data[0x12] = 0x20; // envelope 1 -> 0x20
        data[0x14] = 0x30; // envelope 2 -> 0x30
        data[0x20] = 0x00;
        data[0x21] = 0xfd;
        data[0x30] = 0x64;
        data[0x31] = 0x64;
        let mem = RomImage::new(data, WordOrder::LittleEndian);

        let mut p = PitchVoice {
            env_no: 1,
            env_speed: 0x40,
            ..Default::default()
        };
        p.env_set(&mem);
        p.update(&mem, DriverType::System2, None);
        assert_eq!(p.env_no, 2);
        assert_eq!(p.env_pos, 0x30);
        assert_eq!(p.env_counter, 0);
    }

    #[test]
    fn tremolo_writes_attenuation_through_the_sink() {
        // Envelope swings below the running volume base so the depth path
        // produces a nonzero attenuation.
        let mem = env_rom(&[0x40, 0x20, 0x20, 0x40, 0xfe]);
        let mut p = PitchVoice {
            env_no: 1,
            env_speed: 0x80,
            vol_depth: 0x80,
            ..Default::default()
        };
        p.env_set(&mem);
        // Seed a volume base above the envelope values.
        p.vol_base = 0x60;

        let mut sink = Recorder(Vec::new());
        for _ in 0..6 {
            p.update(&mem, DriverType::System2, Some(&mut sink));
        }
        assert!(!sink.0.is_empty());
        assert!(sink.0.iter().any(|&d| d > 0));
    }

    #[test]
    fn rising_tremolo_rebases_instead_of_attenuating() {
        let mem = env_rom(&[0x40, 0x40]);
        let mut p = PitchVoice {
            env_no: 1,
            env_speed: 0x40,
            vol_depth: 0x80,
            ..Default::default()
        };
        p.env_set(&mem);
        p.vol_base = 0x00; // envelope value 0x40 is louder than the base

        let mut sink = Recorder(Vec::new());
        p.update(&mem, DriverType::System2, Some(&mut sink));
        assert_eq!(sink.0, vec![0]);
        assert_eq!(p.vol_base, 0x40);
    }

    #[test]
    fn zero_tremolo_depth_never_touches_the_sink() {
        let mem = env_rom(&[0x40, 0x40]);
        let mut p = PitchVoice {
            env_no: 1,
            env_speed: 0x40,
            vol_depth: 0,
            ..Default::default()
        };
        p.env_set(&mem);
        let mut sink = Recorder(Vec::new());
        p.update(&mem, DriverType::System2, Some(&mut sink));
        assert!(sink.0.is_empty());
    }
}

//! C352 PCM chip emulation
//!
//! 32-voice sample playback chip with a four-channel (front/rear stereo)
//! output stage. Each voice runs a 17-bit fixed-point sample counter, fetches
//! 8-bit signed PCM (optionally mu-law compressed) or LFSR noise, applies
//! loop / link / ping-pong policy, linear interpolation, and a one-unit
//! per-update volume ramp before being mixed.
//!
//! The quirks of the real part are reproduced deliberately: disabling the
//! interpolation filter also disables the volume ramp, and the rear-right mix
//! path tests the front-right phase-invert flag.

use super::mulaw::{self, MulawType};
use super::registers::{VoiceFlags, VoiceReg};

/// Number of hardware voices.
pub const VOICE_COUNT: usize = 32;

/// Device id reported to a [`RegisterTap`] for every bus write.
pub const DEVICE_ID: u8 = 0xe1;

/// Sink for mirrored register writes (record/replay tooling).
///
/// This is a pure side channel: nothing fed to the tap flows back into
/// emulation state.
pub trait RegisterTap {
    /// One bus write, as it was issued.
    fn register_write(&mut self, device: u8, addr: u16, data: u16);
}

/// One hardware voice.
#[derive(Debug, Clone, Copy, Default)]
pub struct Voice {
    /// Front volume pair, attenuation codes packed `left << 8 | right`
    pub vol_front: u16,
    /// Rear volume pair
    pub vol_rear: u16,
    /// Frequency step
    pub freq: u16,
    /// Flag word
    pub flags: VoiceFlags,
    /// Wave bank (upper address bits)
    pub wave_bank: u16,
    /// Wave start offset
    pub wave_start: u16,
    /// Wave end offset
    pub wave_end: u16,
    /// Wave loop offset
    pub wave_loop: u16,

    pos: u32,
    counter: u16,
    sample: i16,
    last_sample: i16,
    latch_flags: VoiceFlags,
    curr_vol: [u8; 4],
}

impl Voice {
    fn reg_write(&mut self, reg: VoiceReg, data: u16) {
        match reg {
            VoiceReg::VolFront => self.vol_front = data,
            VoiceReg::VolRear => self.vol_rear = data,
            VoiceReg::Freq => self.freq = data,
            VoiceReg::Flags => self.flags = VoiceFlags::from_bits_retain(data),
            VoiceReg::WaveBank => self.wave_bank = data,
            VoiceReg::WaveStart => self.wave_start = data,
            VoiceReg::WaveEnd => self.wave_end = data,
            VoiceReg::WaveLoop => self.wave_loop = data,
        }
    }

    fn reg_read(&self, reg: VoiceReg) -> u16 {
        match reg {
            VoiceReg::VolFront => self.vol_front,
            VoiceReg::VolRear => self.vol_rear,
            VoiceReg::Freq => self.freq,
            VoiceReg::Flags => self.flags.bits(),
            VoiceReg::WaveBank => self.wave_bank,
            VoiceReg::WaveStart => self.wave_start,
            VoiceReg::WaveEnd => self.wave_end,
            VoiceReg::WaveLoop => self.wave_loop,
        }
    }

    /// Current playback position (bank in the upper bits).
    pub fn position(&self) -> u32 {
        self.pos
    }

    /// Flags as latched at the last key-on.
    pub fn latched_flags(&self) -> VoiceFlags {
        self.latch_flags
    }

    /// Current ramped amplitudes (FL, FR, RL, RR).
    pub fn ramped_volumes(&self) -> [u8; 4] {
        self.curr_vol
    }
}

/// C352 chip state: 32 voices, wave memory, mix accumulators.
pub struct C352 {
    voices: [Voice; VOICE_COUNT],
    out: [i16; 4],
    wave: Vec<u8>,
    wave_mask: u32,
    mulaw_table: [i16; 256],
    mulaw_type: MulawType,
    control1: u16,
    control2: u16,
    random: u16,
    mute_mask: u32,
    rate: u32,
    tap: Option<Box<dyn RegisterTap + Send>>,
}

impl C352 {
    /// Create a chip clocked at `clock` Hz with the default C352 mu-law.
    ///
    /// The output sample rate is `clock / 288`.
    pub fn new(clock: u32) -> Self {
        Self::with_mulaw(clock, MulawType::default())
    }

    /// Create a chip with an explicit mu-law family.
    pub fn with_mulaw(clock: u32, mulaw_type: MulawType) -> Self {
        Self {
            voices: [Voice::default(); VOICE_COUNT],
            out: [0; 4],
            wave: Vec::new(),
            wave_mask: 0,
            mulaw_table: mulaw::build_table(mulaw_type),
            mulaw_type,
            control1: 0,
            control2: 0,
            random: 0x1234,
            mute_mask: 0,
            rate: clock / 288,
            tap: None,
        }
    }

    /// Reset all voices and control state; wave memory and mu-law table keep.
    pub fn reset(&mut self) {
        self.voices = [Voice::default(); VOICE_COUNT];
        self.out = [0; 4];
        self.control1 = 0;
        self.control2 = 0;
        self.random = 0x1234;
        self.mute_mask = 0;
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.rate
    }

    /// Switch the mu-law decode family (rebuilds the table).
    pub fn set_mulaw_type(&mut self, mulaw_type: MulawType) {
        self.mulaw_type = mulaw_type;
        self.mulaw_table = mulaw::build_table(mulaw_type);
    }

    /// Active mu-law decode family.
    pub fn mulaw_type(&self) -> MulawType {
        self.mulaw_type
    }

    /// Attach sample memory. Fetches wrap at the next power of two above the
    /// image length; bytes past the image end read as zero.
    pub fn set_wave(&mut self, wave: Vec<u8>) {
        self.wave_mask = wave.len().next_power_of_two().wrapping_sub(1) as u32;
        self.wave = wave;
    }

    /// Per-voice mute bitmask. A muted voice keeps advancing, it is only
    /// dropped from the mix.
    pub fn set_mute_mask(&mut self, mask: u32) {
        self.mute_mask = mask;
    }

    /// Mute or unmute a single voice.
    pub fn set_voice_mute(&mut self, voice: usize, mute: bool) {
        if voice < VOICE_COUNT {
            if mute {
                self.mute_mask |= 1 << voice;
            } else {
                self.mute_mask &= !(1 << voice);
            }
        }
    }

    /// Mirror every register write to `tap`.
    pub fn set_register_tap(&mut self, tap: Option<Box<dyn RegisterTap + Send>>) {
        self.tap = tap;
    }

    /// Inspect a voice.
    pub fn voice(&self, voice: usize) -> &Voice {
        &self.voices[voice]
    }

    /// Write one bus register.
    ///
    /// Writes below 0x100 land in the addressed voice field immediately;
    /// 0x202 commits all pending key-on/key-off requests atomically across
    /// the voice array.
    pub fn write(&mut self, addr: u16, data: u16) {
        if let Some(tap) = self.tap.as_mut() {
            tap.register_write(DEVICE_ID, addr, data);
        }

        if addr < 0x100 {
            self.voices[(addr / 8) as usize].reg_write(VoiceReg::from_addr(addr), data);
        } else if addr == 0x200 {
            self.control1 = data;
        } else if addr == 0x201 {
            self.control2 = data;
        } else if addr == 0x202 {
            self.commit_keys();
        }
    }

    /// Read one bus register. Only the voice block reads back; everything
    /// else returns 0.
    pub fn read(&self, addr: u16) -> u16 {
        if addr < 0x100 {
            self.voices[(addr / 8) as usize].reg_read(VoiceReg::from_addr(addr))
        } else {
            0
        }
    }

    fn commit_keys(&mut self) {
        for v in &mut self.voices {
            if v.flags.contains(VoiceFlags::KEYON) {
                v.pos = (u32::from(v.wave_bank) << 16) | u32::from(v.wave_start);
                // Primed so the first step fetches immediately.
                v.counter = 0xffff;

                v.flags.insert(VoiceFlags::BUSY);
                v.flags.remove(VoiceFlags::KEYON | VoiceFlags::LOOPHIST);
                v.latch_flags = v.flags;

                v.curr_vol = [0; 4];
            }
            if v.flags.contains(VoiceFlags::KEYOFF) {
                v.flags.remove(VoiceFlags::BUSY | VoiceFlags::KEYOFF);
                v.counter = 0xffff;
            }
        }
    }

    fn fetch_sample(&mut self, i: usize) {
        let Self {
            voices,
            wave,
            wave_mask,
            mulaw_table,
            random,
            ..
        } = self;
        let v = &mut voices[i];
        v.last_sample = v.sample;

        if !v.flags.contains(VoiceFlags::BUSY) {
            v.sample = 0;
        } else if v.flags.contains(VoiceFlags::NOISE) {
            *random = (*random >> 1) ^ ((*random & 1).wrapping_neg() & 0xfff6);
            v.sample = *random as i16;
        } else {
            let s = wave
                .get((v.pos & *wave_mask) as usize)
                .copied()
                .unwrap_or(0) as i8;

            v.sample = if v.flags.contains(VoiceFlags::MULAW) {
                mulaw_table[s as u8 as usize]
            } else {
                i16::from(s) << 8
            };

            let pos = (v.pos & 0xffff) as u16;

            if v.flags.contains(VoiceFlags::LOOP) && v.flags.contains(VoiceFlags::REVERSE) {
                // Ping-pong: flip direction exactly at the two boundaries.
                if v.flags.contains(VoiceFlags::LDIR) && pos == v.wave_loop {
                    v.flags.remove(VoiceFlags::LDIR);
                } else if !v.flags.contains(VoiceFlags::LDIR) && pos == v.wave_end {
                    v.flags.insert(VoiceFlags::LDIR);
                }

                v.pos = if v.flags.contains(VoiceFlags::LDIR) {
                    v.pos.wrapping_sub(1)
                } else {
                    v.pos.wrapping_add(1)
                };
            } else if pos == v.wave_end {
                if v.flags.contains(VoiceFlags::LINK) && v.flags.contains(VoiceFlags::LOOP) {
                    v.pos = (u32::from(v.wave_start) << 16) | u32::from(v.wave_loop);
                    v.flags.insert(VoiceFlags::LOOPHIST);
                } else if v.flags.contains(VoiceFlags::LOOP) {
                    v.pos = (v.pos & 0xff0000) | u32::from(v.wave_loop);
                    v.flags.insert(VoiceFlags::LOOPHIST);
                } else {
                    v.flags.insert(VoiceFlags::KEYOFF);
                    v.flags.remove(VoiceFlags::BUSY);
                }
            } else {
                v.pos = if v.flags.contains(VoiceFlags::REVERSE) {
                    v.pos.wrapping_sub(1)
                } else {
                    v.pos.wrapping_add(1)
                };
            }
        }
    }

    fn update_volume(v: &mut Voice, ch: usize, target: u8) {
        // Disabling the filter also disables the volume ramp.
        if v.latch_flags.contains(VoiceFlags::FILTER) {
            v.curr_vol[ch] = target;
        }

        // Ramp one unit toward target to suppress clicks.
        let delta = i16::from(v.curr_vol[ch]) - i16::from(target);
        if delta != 0 {
            v.curr_vol[ch] = if delta > 0 {
                v.curr_vol[ch].wrapping_sub(1)
            } else {
                v.curr_vol[ch].wrapping_add(1)
            };
        }
    }

    fn update_voice(&mut self, i: usize) -> i16 {
        let counter = self.voices[i].counter;
        let next_counter = u32::from(counter) + u32::from(self.voices[i].freq);

        if next_counter & 0x10000 != 0 {
            self.fetch_sample(i);
        }

        if (next_counter ^ u32::from(counter)) & 0x18000 != 0 {
            let v = &mut self.voices[i];
            let (vol_f, vol_r) = (v.vol_front, v.vol_rear);
            Self::update_volume(v, 0, (vol_f >> 8) as u8);
            Self::update_volume(v, 1, (vol_f & 0xff) as u8);
            Self::update_volume(v, 2, (vol_r >> 8) as u8);
            Self::update_volume(v, 3, (vol_r & 0xff) as u8);
        }

        let v = &mut self.voices[i];
        v.counter = (next_counter & 0xffff) as u16;

        let mut temp = i32::from(v.sample);
        // Interpolate between the last two raw samples using the fractional
        // counter, unless the filter is latched off.
        if !v.latch_flags.contains(VoiceFlags::FILTER) {
            temp = i32::from(v.last_sample)
                + ((i32::from(v.counter) * (i32::from(v.sample) - i32::from(v.last_sample))) >> 16);
        }

        temp as i16
    }

    /// Advance every voice by one output sample and return the mixed
    /// (FL, FR, RL, RR) frame.
    pub fn update(&mut self) -> [i16; 4] {
        let mut out = [0i32; 4];

        for i in 0..VOICE_COUNT {
            let s = i32::from(self.update_voice(i));

            if self.mute_mask & (1 << i) == 0 {
                let v = &self.voices[i];
                let flags = v.latch_flags;
                let inv = |f: VoiceFlags| if flags.contains(f) { -s } else { s };

                // Left
                out[0] += (inv(VoiceFlags::PHASEFL) * i32::from(v.curr_vol[0])) >> 10;
                out[2] += (inv(VoiceFlags::PHASERL) * i32::from(v.curr_vol[2])) >> 10;
                // Right (the rear path reuses the front-right invert flag)
                out[1] += (inv(VoiceFlags::PHASEFR) * i32::from(v.curr_vol[1])) >> 10;
                out[3] += (inv(VoiceFlags::PHASEFR) * i32::from(v.curr_vol[3])) >> 10;
            }
        }

        self.out = [out[0] as i16, out[1] as i16, out[2] as i16, out[3] as i16];
        self.out
    }

    /// Last mixed frame.
    pub fn output(&self) -> [i16; 4] {
        self.out
    }

    /// Global control word 1 (stored, not interpreted).
    pub fn control1(&self) -> u16 {
        self.control1
    }

    /// Global control word 2 (stored, not interpreted).
    pub fn control2(&self) -> u16 {
        self.control2
    }
}

impl std::fmt::Debug for C352 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("C352")
            .field("rate", &self.rate)
            .field("mulaw_type", &self.mulaw_type)
            .field("mute_mask", &self.mute_mask)
            .field("wave_len", &self.wave.len())
            .finish_non_exhaustive()
    }
}

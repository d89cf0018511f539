//! Voice panning and volume conversion
//!
//! The firmware positions each logical voice on a four-speaker circle. Two
//! conversion rules exist: `convert_pan` splits the circular pan table into
//! four quadrants and attenuates one channel of the active pair while the
//! partner stays at full volume; `convert_position` treats X/Y independently,
//! attenuates only the channels on each axis' negative side and saturates
//! where the axes combine.
//!
//! On top of the conversions sits a per-voice state machine driven once per
//! tick, with a byte-coded envelope interpreter for animated pans. Several
//! firmware quirks live here and are kept on purpose; replay output must
//! match the original board bit for bit. They are called out inline.

use super::memory::SoundData;
use super::tables::DriverTables;
use super::{DriverSession, McuVersion};
use crate::chip::VoiceReg;

/// Pan mode command bytes.
///
/// Any byte not listed here doubles as the Y coordinate of an immediate
/// position pan, except 0x40..0x80 which the firmware ignores outright.
pub mod pan_mode {
    /// Immediate pan value
    pub const IMM: u8 = 0x00;
    /// Pan follows a driver work register
    pub const REG: u8 = 0x01;
    /// Pan envelope (running)
    pub const ENV: u8 = 0x02;
    /// Pan envelope (freshly commanded)
    pub const ENV_SET: u8 = 0x03;
    /// Position follows a driver work register (X low byte, Y high byte)
    pub const POSREG: u8 = 0x04;
    /// Position envelope (running)
    pub const POSENV: u8 = 0x05;
    /// Position envelope (freshly commanded)
    pub const POSENV_SET: u8 = 0x06;
}

/// Pan state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanState {
    /// Static: the resolved pair is written as-is every tick
    #[default]
    Set,
    /// Re-resolved from a work register every tick
    Reg,
    /// Re-resolved from a packed X/Y work register every tick
    PosReg,
    /// Envelope: read the next byte-code record when the delay runs out
    Env,
    /// Envelope slide, value rising toward a 16-bit overflow
    EnvLeft,
    /// Envelope slide, value falling toward a 16-bit underflow
    EnvRight,
    /// Position envelope. Only the initial value is ever resolved; the
    /// tick update deliberately does not advance this state.
    PosEnv,
}

/// Per-logical-voice pan state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanVoice {
    /// Pan command parameter (pan value, register index or envelope id,
    /// depending on the mode)
    pub pan: u8,
    /// Pan mode byte (see [`pan_mode`])
    pub pan_mode: u8,
    /// Attenuation added on top of the pan pair (track volume / fade)
    pub volume_mod: u16,
    /// Resolved front volume pair
    pub volume_front: u16,
    /// Resolved rear volume pair
    pub volume_rear: u16,

    pub(crate) pan_mode2: u8,
    pub(crate) state: PanState,
    pub(crate) pan_source: u8,
    pub(crate) update_flag: u8,
    pub(crate) env_delay: u8,
    pub(crate) env_value: u16,
    pub(crate) env_target: u16,
    pub(crate) env_delta: u16,
    pub(crate) env_value2: u16,
    pub(crate) env_pos: u32,
    pub(crate) env_loop: u32,
}

impl PanVoice {
    /// Current state machine state.
    pub fn state(&self) -> PanState {
        self.state
    }

    /// Shared reload step of envelope opcodes 0x83 and 0x84: read the next
    /// value byte and restart the loop window behind it.
    fn env_reload(&mut self, mem: &impl SoundData) {
        let e = mem.read_byte(self.env_pos);
        self.env_pos = self.env_pos.wrapping_add(1);
        self.env_value = (self.env_value & 0xff00) | u16::from(e);
        self.env_target = u16::from(e) << 8;
        self.env_loop = self.env_pos;
    }
}

/// Convert an 8-bit signed pan into a front/rear attenuation pair.
///
/// The offset is biased by a quarter turn and masked to the configured pan
/// resolution; the quadrant selects which speaker pair is active, and the
/// mirrored table lookups guarantee one channel of that pair stays at full
/// volume. The inactive pair is fully attenuated.
pub(crate) fn convert_pan(tables: &DriverTables, pan_mask: u8, pan: i8) -> (u16, u16) {
    let (mut fl, mut fr, mut rl, mut rr) = (0xffu8, 0xffu8, 0xffu8, 0xffu8);

    let offset = (pan as u8).wrapping_add(0x20) & pan_mask;
    let pan_l = tables.pan[(offset & 0x3f) as usize];
    let pan_r = tables.pan[((offset ^ 0x3f) & 0x3f) as usize];

    if offset < 0x40 {
        fr = pan_r;
        fl = pan_l;
    } else if offset < 0x80 {
        rr = pan_r;
        fr = pan_l;
    } else if offset < 0xc0 {
        rl = pan_r;
        rr = pan_l;
    } else {
        fl = pan_r;
        rl = pan_l;
    }

    (
        (u16::from(fl) << 8) | u16::from(fr),
        (u16::from(rl) << 8) | u16::from(rr),
    )
}

/// Convert independent X/Y positions into a front/rear attenuation pair.
///
/// Each axis attenuates only the channels on its negative side; where both
/// axes hit the same channel the attenuations add and clamp at the maximum
/// code. Unlike `convert_pan` this can attenuate both channels of a pair and
/// never silences the opposite side by construction.
pub(crate) fn convert_position(
    tables: &DriverTables,
    pan_mask: u8,
    xpos: i8,
    ypos: i8,
) -> (u16, u16) {
    if pan_mask == 0 {
        return convert_pan(tables, pan_mask, 0);
    }

    let (mut fl, mut fr, mut rl, mut rr): (u16, u16, u16, u16) = (0, 0, 0, 0);

    if xpos < 0 {
        // attenuate the right channels
        let offset = (xpos as u8) ^ 0xff;
        fr = u16::from(offset) << 2;
        rr = fr;
    } else {
        // attenuate the left channels
        fl = u16::from(xpos as u8) << 2;
        rl = fl;
    }

    if ypos < 0 {
        // attenuate the front speakers; the shift runs in an 8-bit firmware
        // register, so the top bits fall off before the add
        let offset = u16::from(((ypos as u8) ^ 0xff) << 2);
        fl = (fl + offset).min(0xff);
        fr = (fr + offset).min(0xff);
    } else {
        // attenuate the rear speakers
        let offset = u16::from((ypos as u8) << 2);
        rl = (rl + offset).min(0xff);
        rr = (rr + offset).min(0xff);
    }

    ((fl << 8) | (fr & 0xff), (rl << 8) | (rr & 0xff))
}

impl<M: SoundData> DriverSession<M> {
    /// Convert a pan value using the session's tables and pan resolution.
    pub fn convert_pan(&self, pan: i8) -> (u16, u16) {
        convert_pan(&self.tables, self.config.pan_mask, pan)
    }

    /// Convert an X/Y position pair.
    pub fn convert_position(&self, xpos: i8, ypos: i8) -> (u16, u16) {
        convert_position(&self.tables, self.config.pan_mask, xpos, ypos)
    }

    /// Resolve the pan mode at (re)trigger time and prime the state machine.
    ///
    /// Called by the sequencer when a note keys on or the pan command
    /// changes.
    pub fn pan_key_on(&mut self, voice: usize) {
        assert!(
            voice < self.pan.len(),
            "pan trigger on unconfigured voice {voice}"
        );
        let Self {
            mem,
            config,
            tables,
            pan,
            channels,
            ..
        } = self;
        let v = &mut pan[voice];
        let ch = &mut channels[voice];

        match v.pan_mode {
            pan_mode::IMM => {
                let (f, r) = convert_pan(tables, config.pan_mask, v.pan as i8);
                v.volume_front = f;
                v.volume_rear = r;
                v.state = PanState::Set;
            }
            pan_mode::REG => {
                v.pan_source = v.pan;
                v.state = PanState::Reg;
            }
            pan_mode::POSREG => {
                v.pan_source = v.pan;
                v.state = PanState::PosReg;
            }
            pan_mode::POSENV | pan_mode::POSENV_SET => {
                let mut pos = config.data_base.wrapping_add(u32::from(mem.read_word(
                    config
                        .pan_table_offset
                        .wrapping_add(u32::from(v.pan.wrapping_sub(1)) * 2),
                )));
                pos = pos.wrapping_add(1);
                // Position envelopes resolve their initial value only; the
                // tick update never advances them.
                let (f, r) = convert_position(
                    tables,
                    config.pan_mask,
                    mem.read_byte(pos.wrapping_add(1)) as i8,
                    mem.read_byte(pos) as i8,
                );
                v.volume_front = f;
                v.volume_rear = r;
                v.state = PanState::Set;
            }
            pan_mode::ENV | pan_mode::ENV_SET => {
                // Envelope id 0 resolves to table index 0xff, which is
                // garbage. Dirt Dash song 0x26 does exactly that and nearly
                // mutes its snares; the id is accepted regardless.
                let mut pos = config.data_base.wrapping_add(u32::from(mem.read_word(
                    config
                        .pan_table_offset
                        .wrapping_add(u32::from(v.pan.wrapping_sub(1)) * 2),
                )));
                let d = mem.read_byte(pos);
                pos = pos.wrapping_add(1);

                let mut suppressed = false;
                if d == 0 {
                    // always reset
                    v.env_delay = 1;
                } else if d == 0xff {
                    // Later drivers skip the retrigger suppression when the
                    // envelope was freshly commanded.
                    let check = config.mcu_ver < McuVersion::Q00
                        || (v.pan_mode != pan_mode::ENV_SET
                            && v.pan_mode != pan_mode::POSENV_SET);
                    if check && v.update_flag == v.pan {
                        suppressed = true;
                    } else {
                        if v.pan_mode == pan_mode::ENV_SET {
                            v.pan_mode = pan_mode::ENV;
                        } else if v.pan_mode == pan_mode::POSENV_SET {
                            v.pan_mode = pan_mode::POSENV;
                        }
                        ch.pan_mode = v.pan_mode;
                        v.pan_mode2 = v.pan_mode;
                        v.env_delay = 1;
                    }
                } else {
                    v.env_delay = d;
                }

                if !suppressed {
                    let e = mem.read_byte(pos);
                    pos = pos.wrapping_add(1);
                    v.env_target = u16::from(e) << 8;
                    v.env_value = u16::from(e);

                    if v.pan_mode == pan_mode::ENV_SET || v.pan_mode == pan_mode::ENV {
                        v.state = PanState::Env;
                    } else {
                        v.env_value2 = u16::from(mem.read_byte(pos)) << 8;
                        pos = pos.wrapping_add(1);
                        v.state = PanState::PosEnv;
                    }
                    v.env_pos = pos;
                    v.env_loop = pos;
                }
            }
            other => {
                if !(0x40..0x80).contains(&other) {
                    let (f, r) =
                        convert_position(tables, config.pan_mask, v.pan as i8, other as i8);
                    v.volume_front = f;
                    v.volume_rear = r;
                    v.state = PanState::Set;
                }
            }
        }

        v.update_flag = v.pan;
    }

    /// Per-tick pan update: resolve the current pair and push it to the chip.
    pub fn pan_update(&mut self, voice: usize) {
        assert!(
            voice < self.pan.len(),
            "pan update on unconfigured voice {voice}"
        );
        match self.pan[voice].state {
            PanState::Set => {
                let (f, r) = (self.pan[voice].volume_front, self.pan[voice].volume_rear);
                self.voice_set_volume(voice, f, r);
            }
            PanState::Reg => {
                let val = self.registers[self.pan[voice].pan_source as usize];
                let (f, r) = convert_pan(&self.tables, self.config.pan_mask, val as u8 as i8);
                self.voice_set_volume(voice, f, r);
            }
            PanState::PosReg => {
                let val = self.registers[self.pan[voice].pan_source as usize];
                let (f, r) = convert_position(
                    &self.tables,
                    self.config.pan_mask,
                    (val & 0xff) as u8 as i8,
                    (val >> 8) as u8 as i8,
                );
                self.voice_set_volume(voice, f, r);
            }
            PanState::Env | PanState::EnvLeft | PanState::EnvRight => self.pan_env_update(voice),
            // Read-once: never advanced.
            PanState::PosEnv => {}
        }
    }

    /// Combine a front/rear pair with the voice's volume offset and write the
    /// chip volume registers.
    pub fn voice_set_volume(&mut self, voice: usize, volume_f: u16, volume_r: u16) {
        let base = self.pan[voice].volume_mod;
        let fl = base.wrapping_add(volume_f >> 8);
        let fr = base.wrapping_add(volume_f & 0xff);
        let rl = base.wrapping_add(volume_r >> 8);
        let rr = base.wrapping_add(volume_r & 0xff);

        let cfl = self.tables.volume_lookup(fl);
        let cfr = self.tables.volume_lookup(fr);
        let crl = self.tables.volume_lookup(rl);
        let crr = self.tables.volume_lookup(rr);

        self.chip.write(
            VoiceReg::VolFront.addr(voice),
            (u16::from(cfl) << 8) | u16::from(cfr),
        );
        self.chip.write(
            VoiceReg::VolRear.addr(voice),
            (u16::from(crl) << 8) | u16::from(crr),
        );
    }

    /// Resolve an envelope-produced pan and push it (used by the envelope
    /// update every tick, including during the initial delay).
    fn pan_set_volume(&mut self, voice: usize, pan: i8) {
        let (f, r) = convert_pan(&self.tables, self.config.pan_mask, pan);
        self.pan[voice].volume_front = f;
        self.pan[voice].volume_rear = r;
        self.voice_set_volume(voice, f, r);
    }

    fn pan_env_update(&mut self, voice: usize) {
        if self.pan[voice].env_delay != 0 {
            self.pan[voice].env_delay -= 1;
        } else {
            match self.pan[voice].state {
                PanState::Env => self.pan_env_read(voice),
                PanState::EnvLeft => {
                    let p =
                        i32::from(self.pan[voice].env_value) + i32::from(self.pan[voice].env_delta);
                    self.pan[voice].env_value = p as u16;
                    if p > 0xffff {
                        self.pan_env_read(voice);
                    }
                }
                PanState::EnvRight => {
                    let p =
                        i32::from(self.pan[voice].env_value) - i32::from(self.pan[voice].env_delta);
                    self.pan[voice].env_value = p as u16;
                    if p < 0 {
                        self.pan_env_read(voice);
                    }
                }
                _ => {}
            }
            // End of envelope: the last converted pair stays frozen.
            if self.pan[voice].state == PanState::Set {
                return;
            }
        }
        let pan = ((i32::from(self.pan[voice].env_target) - i32::from(self.pan[voice].env_value))
            >> 8) as i8;
        self.pan_set_volume(voice, pan);
    }

    /// Read byte-code records until one hands control back to the slide (or
    /// ends the envelope).
    fn pan_env_read(&mut self, voice: usize) {
        let Self {
            mem,
            tables,
            pan,
            channels,
            ..
        } = self;
        let v = &mut pan[voice];
        let ch = &mut channels[voice];

        v.env_value = 0x8000 | (v.env_value & 0xff);

        loop {
            let d = mem.read_byte(v.env_pos);
            v.env_pos = v.env_pos.wrapping_add(1);

            match d {
                // end envelope
                0x80 => {
                    v.state = PanState::Set;
                    return;
                }
                // continue to the next record and set a new loop point
                0x81 => {
                    v.env_pos = v.env_pos.wrapping_add(2);
                    v.env_loop = v.env_pos;
                }
                // jump to the loop point
                0x82 => {
                    v.env_pos = v.env_loop;
                }
                // chain to the next envelope id, then reload parameters
                0x83 => {
                    ch.pan = ch.pan.wrapping_add(1);
                    v.pan = v.update_flag.wrapping_add(1);
                    let e = mem.read_byte(v.env_pos);
                    v.env_pos = v.env_pos.wrapping_add(1);
                    if e != 0xff {
                        v.pan_mode = pan_mode::ENV_SET;
                        v.env_delay = e;
                    }
                    v.env_reload(mem);
                }
                // rewind to the loop point and reload
                0x84 => {
                    v.env_delay = 0;
                    v.env_pos = v.env_loop.wrapping_sub(1);
                    v.env_reload(mem);
                }
                // anything else is a slide command
                d => {
                    let e = mem.read_byte(v.env_pos);
                    v.env_pos = v.env_pos.wrapping_add(1);
                    v.env_value = (u16::from(e) << 8).wrapping_sub(v.env_target);
                    v.env_target = u16::from(e) << 8;

                    if d & 0x80 != 0 {
                        // Left slide. Mach Breakers song 0x23d issues one
                        // with a positive delta; the original driver plays it
                        // that way, so no correction is applied.
                        v.env_delta = tables.env_rate[d.wrapping_neg() as usize];
                        v.state = PanState::EnvLeft;
                    } else {
                        // right slide
                        v.env_delta = tables.env_rate[d as usize];
                        v.state = PanState::EnvRight;
                    }
                    return;
                }
            }
        }
    }
}

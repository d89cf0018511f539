//! Driver lookup tables
//!
//! The firmware keeps three small ROM tables next to its code: the pan-angle
//! table, the volume (attenuation) conversion table and the envelope slide
//! rate table. They are pure data, built once per session.
//!
//! All three feed integer pipelines; the constructions below pin down the
//! properties the modulation code depends on (monotonicity, zero points,
//! saturation behavior), see DESIGN.md for the exact curve choices.

/// Pan / volume / envelope-rate tables, built once at session construction.
#[derive(Debug, Clone)]
pub struct DriverTables {
    /// 64-entry quadrant pan table: attenuation offset for the fading side.
    /// Zero through the first half (the held-at-full-volume side), then a
    /// linear rise, so panning attenuates one channel of the active pair
    /// without ever boosting the other.
    pub pan: [u8; 64],
    /// Attenuation code -> 8-bit chip amplitude, exponential over ~72 dB.
    /// Index 0 is full scale; codes at or past the end mean silence.
    pub volume: [u8; 256],
    /// Slide-rate index -> per-tick delta applied to the 16-bit envelope
    /// value. Index 0 is zero: a malformed zero-rate slide stalls rather
    /// than being rejected.
    pub env_rate: [u16; 256],
}

impl DriverTables {
    /// Build all tables.
    pub fn new() -> Self {
        let mut pan = [0u8; 64];
        for (i, p) in pan.iter_mut().enumerate() {
            if i >= 0x20 {
                *p = ((i - 0x1f) << 2) as u8;
            }
        }

        let mut volume = [0u8; 256];
        for (i, v) in volume.iter_mut().enumerate() {
            // 72 dB across the table; volume[0] = 0xff, tail decays to 0.
            *v = (255.0 * 10f64.powf(-(i as f64) * 72.0 / 255.0 / 20.0)).floor() as u8;
        }

        let mut env_rate = [0u16; 256];
        for (i, r) in env_rate.iter_mut().enumerate() {
            *r = (i as u16) << 4;
        }

        Self {
            pan,
            volume,
            env_rate,
        }
    }

    /// Attenuation code to chip amplitude; out-of-range codes are silence.
    pub fn volume_lookup(&self, code: u16) -> u8 {
        if code < 0x100 {
            self.volume[code as usize]
        } else {
            0
        }
    }
}

impl Default for DriverTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_table_holds_one_side_at_full_volume() {
        let t = DriverTables::new();
        assert_eq!(t.pan[0], 0);
        // For every quadrant offset, exactly one of the mirrored pair is at
        // full volume (offset 0).
        for off in 0u8..0x40 {
            let l = t.pan[(off & 0x3f) as usize];
            let r = t.pan[((off ^ 0x3f) & 0x3f) as usize];
            assert!(
                (l == 0) ^ (r == 0),
                "offset {off:#x}: both sides attenuated or both full ({l}, {r})"
            );
        }
    }

    #[test]
    fn pan_table_is_monotonic() {
        let t = DriverTables::new();
        for i in 1..64 {
            assert!(t.pan[i] >= t.pan[i - 1]);
        }
    }

    #[test]
    fn volume_table_full_scale_and_decay() {
        let t = DriverTables::new();
        assert_eq!(t.volume[0], 0xff);
        assert_eq!(t.volume[255], 0);
        for i in 1..256 {
            assert!(t.volume[i] <= t.volume[i - 1], "volume table rose at {i}");
        }
    }

    #[test]
    fn out_of_range_attenuation_degrades_to_silence() {
        let t = DriverTables::new();
        assert_eq!(t.volume_lookup(0x100), 0);
        assert_eq!(t.volume_lookup(0xffff), 0);
        assert_eq!(t.volume_lookup(0x00), 0xff);
    }

    #[test]
    fn env_rate_zero_index_stalls() {
        let t = DriverTables::new();
        assert_eq!(t.env_rate[0], 0);
        for i in 1..256 {
            assert!(t.env_rate[i] > t.env_rate[i - 1]);
        }
    }
}

//! Mu-law decode tables
//!
//! Two related chip families share the register model but decode compressed
//! samples differently. Both tables are built by closed-form construction at
//! initialization; the C352 curve has been verified against Wii Virtual
//! Console rips (Starblade, Knuckle Heads).

/// Which mu-law expansion curve the chip uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MulawType {
    /// C352 (and C219) segmented law: five linear segments of increasing
    /// step size, mirrored into the negative half with `!x & 0xffe0`.
    #[default]
    C352,
    /// C140 law: 3-bit exponent in the low bits, 5-bit mantissa above.
    C140,
}

/// Build the 256-entry decode table for the given law.
pub fn build_table(mulaw_type: MulawType) -> [i16; 256] {
    let mut table = [0i16; 256];
    match mulaw_type {
        MulawType::C352 => {
            let mut j = 0u16;
            for i in 0..128usize {
                table[i] = (j << 5) as i16;
                j += match i {
                    0..=15 => 1,
                    16..=23 => 2,
                    24..=47 => 4,
                    48..=99 => 8,
                    _ => 16,
                };
            }
            for i in 128..256usize {
                table[i] = (!(table[i - 128] as u16) & 0xffe0) as i16;
            }
        }
        MulawType::C140 => {
            for i in 0..256usize {
                let j = i as i8 as i32;
                let s1 = j & 7;
                let s2 = (j >> 3).abs() & 31;

                let mut v = (0x80 << s1) & 0xff00;
                v += s2 << if s1 != 0 { s1 + 3 } else { 4 };

                // Code 0x87 lands exactly on 0x8000; the hardware table
                // stores it as the most negative sample either way.
                let v = v as i16;
                table[i] = if j < 0 { v.wrapping_neg() } else { v };
            }
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c352_law_positive_half_is_monotonic() {
        let t = build_table(MulawType::C352);
        for i in 1..128 {
            assert!(
                t[i] > t[i - 1],
                "c352 law not monotonic at {i}: {} <= {}",
                t[i],
                t[i - 1]
            );
        }
    }

    #[test]
    fn c352_law_negative_half_mirrors_positive() {
        let t = build_table(MulawType::C352);
        // Ones' complement mirror, masked to the 11 significant bits.
        for i in 0..128 {
            assert_eq!(t[i + 128] as u16, !(t[i] as u16) & 0xffe0);
        }
        assert_eq!(t[0], 0);
        assert!(t[128] < 0);
    }

    #[test]
    fn c140_law_known_values() {
        let t = build_table(MulawType::C140);
        assert_eq!(t[0x00], 0);
        // exponent 0, mantissa 1
        assert_eq!(t[0x08], 16);
        // exponent 7, mantissa 15
        assert_eq!(t[0x7f], 0x4000 + (15 << 10));
        // -128: exponent 0, mantissa 16, negated
        assert_eq!(t[0x80], -256);
    }

    #[test]
    fn c140_law_negative_codes_decode_non_positive() {
        let t = build_table(MulawType::C140);
        for i in 0x80..0x100usize {
            assert!(t[i] <= 0, "code {i:#x} decoded positive: {}", t[i]);
        }
    }
}

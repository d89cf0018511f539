//! Track channel mirror state
//!
//! The sequencer layer (outside this crate) owns the track channels; the
//! modulation state machines only touch a small mirror of them: the pan
//! command byte pair that envelope opcode 0x83 writes back, and the track
//! back-reference used for allocation bookkeeping.

/// Track back-reference with the firmware's stored-id-plus-one encoding.
///
/// The raw byte is `logical id + 1`; zero means "not allocated". The raw
/// encoding is kept because envelope and table indices elsewhere rely on the
/// same off-by-one convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackRef(u8);

impl TrackRef {
    /// No track allocated.
    pub const NONE: TrackRef = TrackRef(0);

    /// Reference to logical track `id`.
    pub fn new(id: u8) -> Self {
        TrackRef(id.wrapping_add(1))
    }

    /// Rebuild from the raw stored byte.
    pub fn from_raw(raw: u8) -> Self {
        TrackRef(raw)
    }

    /// Raw stored byte (`id + 1`, 0 when unallocated).
    pub fn raw(self) -> u8 {
        self.0
    }

    /// Logical track id, if allocated.
    pub fn get(self) -> Option<u8> {
        self.0.checked_sub(1)
    }

    /// True when no track is allocated.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Mirror of the sequencer channel state the pan machines write back into.
#[derive(Debug, Clone, Copy, Default)]
pub struct Channel {
    /// Pan command parameter
    pub pan: u8,
    /// Pan mode byte
    pub pan_mode: u8,
    /// Owning track, if any
    pub track: TrackRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_ref_keeps_the_off_by_one_raw_encoding() {
        assert_eq!(TrackRef::NONE.raw(), 0);
        assert!(TrackRef::NONE.is_none());
        assert_eq!(TrackRef::new(0).raw(), 1);
        assert_eq!(TrackRef::new(5).get(), Some(5));
        assert_eq!(TrackRef::from_raw(3).get(), Some(2));
    }
}

//! The per-batch input buffer

use crate::keys::KeyCode;

/// Upper bound on the assembled input, in key slots. Writes that would
/// extend the buffer past this are refused.
pub const MAXLEN: usize = 32;

/// State of one buffer slot.
///
/// `Unset` marks a position no fragment has covered; `Invalid` marks a byte
/// with no key mapping. Either blocks injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Unset,
    Invalid,
    Key(KeyCode),
}

/// Offset-indexed assembly buffer for one write batch.
///
/// Fixed capacity, grown on demand as fragments land; created fresh per
/// batch and discarded with it. Never reused across batches.
#[derive(Debug)]
pub struct InputBuffer {
    slots: [Slot; MAXLEN],
    len: usize,
}

impl InputBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            slots: [Slot::Unset; MAXLEN],
            len: 0,
        }
    }

    /// Number of slots the buffer has grown to cover
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no fragment has grown the buffer yet
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grow the buffer until it covers `end` slots; new slots stay `Unset`
    pub fn grow_to(&mut self, end: usize) {
        debug_assert!(end <= MAXLEN);
        self.len = self.len.max(end);
    }

    /// Set the slot at `index`, which must already be covered
    pub fn set(&mut self, index: usize, slot: Slot) {
        debug_assert!(index < self.len);
        self.slots[index] = slot;
    }

    /// Resolve the buffer into a key code sequence.
    ///
    /// Returns `None` if any covered slot is still `Unset` or holds
    /// `Invalid`; an empty buffer resolves to an empty sequence.
    pub fn resolve(&self) -> Option<Vec<KeyCode>> {
        self.slots[..self.len]
            .iter()
            .map(|slot| match slot {
                Slot::Key(code) => Some(*code),
                Slot::Unset | Slot::Invalid => None,
            })
            .collect()
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

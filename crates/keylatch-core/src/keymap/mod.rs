//! 256-bit key membership sets and the virtual-key metadata table.
//!
//! A [`KeyMap`] answers one question in O(1): "is key code X in this set?".
//! The system keeps several independent families of them, one per concern:
//! interception filters, currently-depressed keys, and latch registrations.
//! Each family has four members, one per (code space × action) pair.
//!
//! # Why wrap instead of reject? (for beginners)
//!
//! Key codes arrive from hardware, from the OS, and from user logic.  Rather
//! than returning an error for a code above 255, every operation masks the
//! code down to its low 8 bits (see [`wrap_index`]).  `set(0x141)` therefore
//! marks the same bit as `set(0x41)`.  This keeps every operation total and
//! branch-free, which matters on the interception hot path.  Callers that want
//! strict validation (the host's binding layer) check ranges before they get
//! here.
//!
//! # Two representations
//!
//! - [`KeyMap`] is a plain value, owned by a single thread.
//! - [`SharedKeyMap`] is the same 256 bits laid out as eight atomic words so
//!   that one side of the interception boundary can write filter bits while the
//!   hook reads them.  Its address is handed across the boundary exactly once.

pub mod names;

use std::fmt;
use std::ops::Index;
use std::sync::atomic::{AtomicU32, Ordering};

use bitvec::prelude::*;

use crate::domain::event::{CodeSpace, KeyAction};

pub use names::{describe, lookup_name, name_of, VirtualKeyInfo};

/// A key code in either the virtual-key or the scancode space.
pub type KeyCode = u8;

/// Number of codes a key map can hold.
pub const KEY_MAP_BITS: usize = 256;

const WRAP_MASK: u32 = (KEY_MAP_BITS - 1) as u32;
const WORD_BITS: usize = 32;
const WORD_COUNT: usize = KEY_MAP_BITS / WORD_BITS;

/// The wrapping key-map index policy: any code is taken modulo 256.
///
/// Out-of-range codes silently alias into range instead of being rejected.
/// Every key map operation goes through this function.
#[inline]
pub const fn wrap_index(code: u32) -> usize {
    (code & WRAP_MASK) as usize
}

// ── KeyMap ────────────────────────────────────────────────────────────────────

/// A fixed-capacity set of 256 key codes stored as a packed bit vector.
#[derive(Clone, Copy)]
pub struct KeyMap {
    bits: BitArr!(for KEY_MAP_BITS, in u32, Lsb0),
}

impl KeyMap {
    /// An empty key map.
    pub const EMPTY: Self = Self {
        bits: BitArray::ZERO,
    };

    /// Creates an empty key map.
    pub fn new() -> Self {
        Self::EMPTY
    }

    /// Marks `code` as a member.
    #[inline]
    pub fn set(&mut self, code: impl Into<u32>) {
        self.bits.set(wrap_index(code.into()), true);
    }

    /// Removes `code` from the set.
    #[inline]
    pub fn clear(&mut self, code: impl Into<u32>) {
        self.bits.set(wrap_index(code.into()), false);
    }

    /// Returns `true` if `code` is a member.
    #[inline]
    pub fn is_set(&self, code: impl Into<u32>) -> bool {
        self.bits[wrap_index(code.into())]
    }

    /// Removes every member.
    pub fn clear_all(&mut self) {
        self.bits = BitArray::ZERO;
    }

    /// Always 256; a key map has a slot for every code.
    pub const fn len(&self) -> usize {
        KEY_MAP_BITS
    }

    /// Returns `true` if no code is set.
    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    /// Number of codes currently set.
    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Iterates the set codes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.bits.iter_ones().map(|i| i as KeyCode)
    }

    /// The raw words, least significant bit first.
    pub fn to_words(&self) -> [u32; WORD_COUNT] {
        self.bits.into_inner()
    }

    /// Builds a key map from raw words, least significant bit first.
    pub fn from_words(words: [u32; WORD_COUNT]) -> Self {
        Self {
            bits: BitArray::new(words),
        }
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PartialEq for KeyMap {
    fn eq(&self, other: &Self) -> bool {
        self.bits.as_raw_slice() == other.bits.as_raw_slice()
    }
}

impl Eq for KeyMap {}

impl Index<usize> for KeyMap {
    type Output = bool;

    fn index(&self, code: usize) -> &bool {
        if self.bits[wrap_index(code as u32)] {
            &true
        } else {
            &false
        }
    }
}

impl FromIterator<KeyCode> for KeyMap {
    fn from_iter<I: IntoIterator<Item = KeyCode>>(iter: I) -> Self {
        let mut map = Self::new();
        for code in iter {
            map.set(code);
        }
        map
    }
}

impl fmt::Debug for KeyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.iter().map(|c| format!("{c:#04x}")))
            .finish()
    }
}

/// Dumps the map as a 16-column table: the hex code when set, `..` when clear,
/// with ` -- ` between the two halves of each line.
impl fmt::Display for KeyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LINE: usize = 16;
        for code in 0..KEY_MAP_BITS {
            if self.bits[code] {
                write!(f, "{code:02x}")?;
            } else {
                f.write_str("..")?;
            }

            let col = (code + 1) % LINE;
            if code + 1 == KEY_MAP_BITS {
                break;
            } else if col == 0 {
                f.write_str("\n")?;
            } else if col == LINE / 2 {
                f.write_str(" -- ")?;
            } else {
                f.write_str(" ")?;
            }
        }
        Ok(())
    }
}

// ── SharedKeyMap ──────────────────────────────────────────────────────────────

#[allow(clippy::declare_interior_mutable_const)]
const ZERO_WORD: AtomicU32 = AtomicU32::new(0);

/// A key map whose bits may be read from another thread while being written.
///
/// Laid out as eight `u32` words so its address can cross an FFI boundary.
/// Bit writes are independent of each other; a reader only ever needs the
/// latest value of a single bit, so relaxed ordering is sufficient.
#[repr(C)]
pub struct SharedKeyMap {
    words: [AtomicU32; WORD_COUNT],
}

impl SharedKeyMap {
    /// Creates an empty shared key map.
    pub const fn new() -> Self {
        Self {
            words: [ZERO_WORD; WORD_COUNT],
        }
    }

    #[inline]
    fn locate(code: u32) -> (usize, u32) {
        let index = wrap_index(code);
        (index / WORD_BITS, 1u32 << (index % WORD_BITS))
    }

    /// Marks `code` as a member.
    #[inline]
    pub fn set(&self, code: impl Into<u32>) {
        let (word, mask) = Self::locate(code.into());
        self.words[word].fetch_or(mask, Ordering::Relaxed);
    }

    /// Removes `code` from the set.
    #[inline]
    pub fn clear(&self, code: impl Into<u32>) {
        let (word, mask) = Self::locate(code.into());
        self.words[word].fetch_and(!mask, Ordering::Relaxed);
    }

    /// Returns `true` if `code` is a member.
    #[inline]
    pub fn is_set(&self, code: impl Into<u32>) -> bool {
        let (word, mask) = Self::locate(code.into());
        self.words[word].load(Ordering::Relaxed) & mask != 0
    }

    /// Removes every member.
    pub fn clear_all(&self) {
        for word in &self.words {
            word.store(0, Ordering::Relaxed);
        }
    }

    /// A point-in-time copy of the bits.
    pub fn snapshot(&self) -> KeyMap {
        let mut words = [0u32; WORD_COUNT];
        for (dst, src) in words.iter_mut().zip(&self.words) {
            *dst = src.load(Ordering::Relaxed);
        }
        KeyMap::from_words(words)
    }
}

impl Default for SharedKeyMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedKeyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.snapshot(), f)
    }
}

/// The four interception filter maps, in the order the filter's
/// initialization contract takes them.
#[repr(C)]
#[derive(Debug, Default)]
pub struct InterceptionMaps {
    pub scancode_make: SharedKeyMap,
    pub scancode_break: SharedKeyMap,
    pub virtual_key_make: SharedKeyMap,
    pub virtual_key_break: SharedKeyMap,
}

impl InterceptionMaps {
    pub const fn new() -> Self {
        Self {
            scancode_make: SharedKeyMap::new(),
            scancode_break: SharedKeyMap::new(),
            virtual_key_make: SharedKeyMap::new(),
            virtual_key_break: SharedKeyMap::new(),
        }
    }

    /// The map for one (code space × action) pair.
    pub fn get(&self, space: CodeSpace, action: KeyAction) -> &SharedKeyMap {
        match (space, action) {
            (CodeSpace::Scancode, KeyAction::Make) => &self.scancode_make,
            (CodeSpace::Scancode, KeyAction::Break) => &self.scancode_break,
            (CodeSpace::VirtualKey, KeyAction::Make) => &self.virtual_key_make,
            (CodeSpace::VirtualKey, KeyAction::Break) => &self.virtual_key_break,
        }
    }
}

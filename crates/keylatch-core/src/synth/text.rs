//! Text-to-keystroke support: bounded UTF-8 chunk decoding and modifier
//! reconciliation.
//!
//! # Why chunk at all? (for beginners)
//!
//! Injected text is converted to UTF-16 code units because that is what the
//! OS key-scan facility (`VkKeyScanW`) consumes.  The conversion writes into a
//! fixed buffer of [`UTF16_BUFFER_UNITS`] units, so a long string is decoded a
//! piece at a time.  A piece must never end in the middle of a multi-byte
//! UTF-8 sequence: the chunker backs up to the nearest code-point boundary
//! before decoding, and if the decoded piece still does not fit it halves the
//! piece and tries again, at most [`BOUNDARY_RETRIES`] times.

use std::str;

use crate::domain::event::KeyAction;
use crate::synth::{DecodeFailure, SynthError, VK_CONTROL, VK_MENU, VK_OEM_AUTO, VK_SHIFT};

/// Capacity of the UTF-16 output buffer, in code units.
pub const UTF16_BUFFER_UNITS: usize = 2048;

/// How many times a chunk may be halved before decoding gives up.
pub const BOUNDARY_RETRIES: u32 = 3;

// ── UTF-8 chunking ────────────────────────────────────────────────────────────

/// Continuation bytes that can follow one lead byte.
const MAX_CONTINUATION_BYTES: usize = 3;

#[inline]
fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// Splits a UTF-8 byte string into bounded, boundary-aligned UTF-16 chunks.
pub struct Utf8Chunker<'a> {
    bytes: &'a [u8],
    offset: usize,
    chunk_bytes: usize,
    output_units: usize,
}

impl<'a> Utf8Chunker<'a> {
    /// A chunker sized for the standard output buffer.
    ///
    /// One UTF-8 byte never produces more than one UTF-16 unit, so a third of
    /// the buffer is a conservative byte budget per chunk.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_limits(bytes, UTF16_BUFFER_UNITS / 3, UTF16_BUFFER_UNITS)
    }

    /// A chunker with explicit byte and output budgets.
    pub fn with_limits(bytes: &'a [u8], chunk_bytes: usize, output_units: usize) -> Self {
        Self {
            bytes,
            offset: 0,
            chunk_bytes: chunk_bytes.max(1),
            output_units: output_units.max(1),
        }
    }

    /// Byte offset of the next undecoded byte.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Adjusts `length` so the chunk ends on a code-point boundary.
    fn align(&self, length: usize) -> usize {
        let end = self.offset + length;
        if end >= self.bytes.len() || !is_continuation(self.bytes[end]) {
            return length;
        }

        let mut back = length;
        while back > 0 && is_continuation(self.bytes[self.offset + back]) {
            back -= 1;
        }
        if back > 0 {
            return back;
        }

        // A single code point is wider than the budget; take all of it, but
        // never more than one code point's worth of continuation bytes.
        let limit = (length + MAX_CONTINUATION_BYTES).min(self.bytes.len() - self.offset);
        let mut forward = length;
        while forward < limit && is_continuation(self.bytes[self.offset + forward]) {
            forward += 1;
        }
        forward
    }

    /// Length of the run of continuation bytes starting at `self.offset`.
    fn stray_run(&self) -> usize {
        self.bytes[self.offset..]
            .iter()
            .take_while(|&&b| is_continuation(b))
            .count()
    }

    /// Decodes the next chunk into `out`, replacing its contents.
    ///
    /// Returns `None` once every byte has been consumed.  On a decode failure
    /// the offending bytes are skipped so the next call makes progress.
    pub fn next_into(&mut self, out: &mut Vec<u16>) -> Option<Result<usize, SynthError>> {
        out.clear();
        let remaining = self.bytes.len().checked_sub(self.offset).filter(|&n| n > 0)?;

        let start = self.offset;

        // Continuation bytes with no lead byte: skip the whole run as one
        // failure.
        let stray = self.stray_run();
        if stray > 0 {
            self.offset = start + stray;
            return Some(Err(SynthError::Decode {
                offset: start,
                reason: DecodeFailure::InvalidSequence,
            }));
        }

        let mut length = self.align(remaining.min(self.chunk_bytes));
        let mut retries = BOUNDARY_RETRIES;

        loop {
            let chunk = &self.bytes[start..start + length];

            match str::from_utf8(chunk) {
                Ok(text) => {
                    out.extend(text.encode_utf16());
                    if out.len() <= self.output_units {
                        self.offset = start + length;
                        return Some(Ok(out.len()));
                    }
                    out.clear();
                    if retries == 0 {
                        self.offset = start + length;
                        return Some(Err(SynthError::Decode {
                            offset: start,
                            reason: DecodeFailure::InsufficientBuffer,
                        }));
                    }
                    retries -= 1;
                    length = self.align((length / 2).max(1));
                }
                Err(e) if e.valid_up_to() > 0 => {
                    // Decode the valid prefix; the bad bytes lead the next chunk.
                    length = e.valid_up_to();
                }
                Err(e) => {
                    let skip = e.error_len().unwrap_or(length);
                    self.offset = start + skip;
                    return Some(Err(SynthError::Decode {
                        offset: start,
                        reason: DecodeFailure::InvalidSequence,
                    }));
                }
            }
        }
    }
}

// ── Modifier reconciliation ───────────────────────────────────────────────────

/// The four modifiers a text-injection session can hold down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    /// Hankaku, also used to reach AltGr-style layers.
    pub hankaku: bool,
}

impl ModifierState {
    /// Every modifier released.
    pub const RELEASED: Self = Self {
        shift: false,
        control: false,
        alt: false,
        hankaku: false,
    };

    /// Decodes the modifier byte of a `VkKeyScanW` result.
    pub fn from_scan_bits(bits: u8) -> Self {
        Self {
            shift: bits & 0x1 != 0,
            control: bits & 0x2 != 0,
            alt: bits & 0x4 != 0,
            hankaku: bits & 0x8 != 0,
        }
    }

    pub fn is_released(&self) -> bool {
        *self == Self::RELEASED
    }

    /// Moves this state to `target`, emitting one make or break per modifier
    /// that differs.  Order is always shift, control, alt, hankaku.
    pub fn reconcile(&mut self, target: ModifierState, mut emit: impl FnMut(u16, KeyAction)) {
        let wanted = [target.shift, target.control, target.alt, target.hankaku];
        let current = [
            (VK_SHIFT, &mut self.shift),
            (VK_CONTROL, &mut self.control),
            (VK_MENU, &mut self.alt),
            (VK_OEM_AUTO, &mut self.hankaku),
        ];

        for ((vk, held), want) in current.into_iter().zip(wanted) {
            if *held != want {
                emit(vk, if want { KeyAction::Make } else { KeyAction::Break });
                *held = want;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(chunker: &mut Utf8Chunker<'_>) -> Vec<Result<Vec<u16>, SynthError>> {
        let mut out = Vec::new();
        let mut chunks = Vec::new();
        while let Some(result) = chunker.next_into(&mut out) {
            chunks.push(result.map(|_| out.clone()));
        }
        chunks
    }

    #[test]
    fn test_short_ascii_is_one_chunk() {
        let mut chunker = Utf8Chunker::new(b"hello");
        let chunks = drain(&mut chunker);
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].as_ref().ok(),
            Some(&"hello".encode_utf16().collect::<Vec<_>>())
        );
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let mut chunker = Utf8Chunker::new(b"");
        assert!(drain(&mut chunker).is_empty());
    }

    #[test]
    fn test_chunks_never_split_a_code_point() {
        // Arrange: "é" is two bytes, so a 3-byte budget lands mid-character.
        let text = "aéé";
        let mut chunker = Utf8Chunker::with_limits(text.as_bytes(), 3, 16);

        // Act
        let decoded: Vec<u16> = drain(&mut chunker)
            .into_iter()
            .flat_map(|c| c.expect("valid input"))
            .collect();

        // Assert
        assert_eq!(String::from_utf16_lossy(&decoded), text);
    }

    #[test]
    fn test_code_point_wider_than_budget_is_taken_whole() {
        let text = "😀x";
        let mut chunker = Utf8Chunker::with_limits(text.as_bytes(), 1, 16);

        let chunks = drain(&mut chunker);

        assert_eq!(chunks.len(), 2);
        let first = chunks[0].as_ref().expect("emoji chunk");
        assert_eq!(String::from_utf16_lossy(first), "😀");
    }

    #[test]
    fn test_large_input_is_split_into_bounded_chunks() {
        let text = "ab".repeat(1000);
        let mut chunker = Utf8Chunker::new(text.as_bytes());

        let chunks = drain(&mut chunker);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            let units = chunk.as_ref().expect("ascii decodes");
            assert!(units.len() <= UTF16_BUFFER_UNITS / 3);
        }
        let total: usize = chunks.iter().map(|c| c.as_ref().map_or(0, Vec::len)).sum();
        assert_eq!(total, 2000);
    }

    #[test]
    fn test_invalid_bytes_are_reported_and_skipped() {
        // Arrange
        let bytes = [b'a', 0xFF, b'b'];
        let mut chunker = Utf8Chunker::new(&bytes);

        // Act
        let chunks = drain(&mut chunker);

        // Assert
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].as_ref().ok(), Some(&vec![u16::from(b'a')]));
        assert!(matches!(
            chunks[1],
            Err(SynthError::Decode {
                offset: 1,
                reason: DecodeFailure::InvalidSequence
            })
        ));
        assert_eq!(chunks[2].as_ref().ok(), Some(&vec![u16::from(b'b')]));
    }

    #[test]
    fn test_stray_continuation_byte_is_skipped() {
        let bytes = [b'a', 0x80, b'b'];
        let mut chunker = Utf8Chunker::new(&bytes);

        let chunks = drain(&mut chunker);

        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].is_err());
        assert_eq!(chunks[2].as_ref().ok(), Some(&vec![u16::from(b'b')]));
    }

    #[test]
    fn test_run_of_stray_continuation_bytes_is_one_failure() {
        // Arrange
        let mut bytes = vec![b'a'];
        bytes.extend(std::iter::repeat(0x80).take(200_000));
        bytes.push(b'b');
        let mut chunker = Utf8Chunker::new(&bytes);

        // Act
        let chunks = drain(&mut chunker);

        // Assert
        assert_eq!(chunks.len(), 3);
        assert!(matches!(
            chunks[1],
            Err(SynthError::Decode {
                offset: 1,
                reason: DecodeFailure::InvalidSequence
            })
        ));
        assert_eq!(chunks[2].as_ref().ok(), Some(&vec![u16::from(b'b')]));
        assert_eq!(chunker.offset(), bytes.len());
    }

    #[test]
    fn test_oversized_code_point_takes_at_most_three_continuation_bytes() {
        // "\u{2000}" is E2 80 80; the remaining continuation bytes are stray.
        let mut bytes = vec![0xE2];
        bytes.extend(std::iter::repeat(0x80).take(5000));
        let mut chunker = Utf8Chunker::with_limits(&bytes, 1, 16);

        let chunks = drain(&mut chunker);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().ok(), Some(&vec![0x2000]));
        assert!(matches!(
            chunks[1],
            Err(SynthError::Decode {
                offset: 3,
                reason: DecodeFailure::InvalidSequence
            })
        ));
    }

    #[test]
    fn test_output_overflow_halves_then_gives_up() {
        // 16 -> 8 -> 4 -> 2 units all overflow a 1-unit buffer, so the retry
        // budget runs out and the chunk is reported.
        let mut chunker = Utf8Chunker::with_limits(b"abcdefghijklmnop", 16, 1);
        let mut out = Vec::new();

        let first = chunker.next_into(&mut out);

        assert!(matches!(
            first,
            Some(Err(SynthError::Decode {
                reason: DecodeFailure::InsufficientBuffer,
                ..
            }))
        ));
        assert!(chunker.offset() > 0, "chunker must make progress");
    }

    #[test]
    fn test_output_overflow_recovers_within_retries() {
        let mut chunker = Utf8Chunker::with_limits(b"abcdefgh", 8, 4);
        let mut out = Vec::new();

        let first = chunker.next_into(&mut out);

        assert!(matches!(first, Some(Ok(4))));
        assert_eq!(chunker.offset(), 4);
    }

    #[test]
    fn test_from_scan_bits() {
        assert_eq!(ModifierState::from_scan_bits(0), ModifierState::RELEASED);
        let all = ModifierState::from_scan_bits(0xF);
        assert!(all.shift && all.control && all.alt && all.hankaku);
        let altgr = ModifierState::from_scan_bits(0x6);
        assert!(!altgr.shift && altgr.control && altgr.alt && !altgr.hankaku);
    }

    #[test]
    fn test_reconcile_emits_only_differences() {
        // Arrange
        let mut state = ModifierState {
            shift: true,
            ..ModifierState::RELEASED
        };
        let target = ModifierState {
            shift: true,
            control: true,
            ..ModifierState::RELEASED
        };
        let mut emitted = Vec::new();

        // Act
        state.reconcile(target, |vk, action| emitted.push((vk, action)));

        // Assert
        assert_eq!(emitted, vec![(VK_CONTROL, KeyAction::Make)]);
        assert_eq!(state, target);
    }

    #[test]
    fn test_reconcile_to_released_breaks_in_fixed_order() {
        let mut state = ModifierState::from_scan_bits(0xF);
        let mut emitted = Vec::new();

        state.reconcile(ModifierState::RELEASED, |vk, action| emitted.push((vk, action)));

        assert_eq!(
            emitted,
            vec![
                (VK_SHIFT, KeyAction::Break),
                (VK_CONTROL, KeyAction::Break),
                (VK_MENU, KeyAction::Break),
                (VK_OEM_AUTO, KeyAction::Break),
            ]
        );
        assert!(state.is_released());
    }
}

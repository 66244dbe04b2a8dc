//! Fixed-capacity batching of synthesized input records.

use crate::synth::{InputInjector, KeyInput, SynthError};

/// Maximum number of records submitted in one injection call.
///
/// Kept even so make/break pairs never straddle two batches.
pub const INPUT_BATCH_CAPACITY: usize = 32;

const _: () = assert!(INPUT_BATCH_CAPACITY % 2 == 0);

/// An ordered buffer of up to [`INPUT_BATCH_CAPACITY`] input records.
#[derive(Debug)]
pub struct InputBatch {
    records: Vec<KeyInput>,
}

impl InputBatch {
    pub fn new() -> Self {
        Self {
            records: Vec::with_capacity(INPUT_BATCH_CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= INPUT_BATCH_CAPACITY
    }

    /// Appends one record.  The caller flushes when [`is_full`](Self::is_full).
    pub fn push(&mut self, input: KeyInput) {
        debug_assert!(!self.is_full());
        self.records.push(input);
    }

    /// Submits the buffered records if the batch is full, or unconditionally
    /// when `force` is set.  An empty batch is never submitted.
    ///
    /// The batch is emptied even when injection fails; the failed records are
    /// not retried.
    pub fn flush(&mut self, injector: &dyn InputInjector, force: bool) -> Result<(), SynthError> {
        if self.records.is_empty() || (!force && !self.is_full()) {
            return Ok(());
        }
        let result = injector.inject(&self.records);
        self.records.clear();
        result
    }
}

impl Default for InputBatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::KeyAction;
    use crate::synth::mock::MockInputInjector;

    fn record(vk: u16) -> KeyInput {
        KeyInput::virtual_key(vk, 0, KeyAction::Make)
    }

    #[test]
    fn test_partial_batch_waits_for_force() {
        // Arrange
        let injector = MockInputInjector::new();
        let mut batch = InputBatch::new();
        batch.push(record(0x41));

        // Act
        batch.flush(&injector, false).expect("no-op flush");

        // Assert
        assert!(injector.batches().is_empty());
        assert_eq!(batch.len(), 1);

        batch.flush(&injector, true).expect("forced flush");
        assert_eq!(injector.batches(), vec![vec![record(0x41)]]);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_full_batch_flushes_without_force() {
        let injector = MockInputInjector::new();
        let mut batch = InputBatch::new();
        for vk in 0..INPUT_BATCH_CAPACITY as u16 {
            batch.push(record(vk));
        }
        assert!(batch.is_full());

        batch.flush(&injector, false).expect("full flush");

        assert_eq!(injector.batches().len(), 1);
        assert_eq!(injector.batches()[0].len(), INPUT_BATCH_CAPACITY);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_empty_batch_is_never_submitted() {
        let injector = MockInputInjector::new();
        let mut batch = InputBatch::new();

        batch.flush(&injector, true).expect("empty flush");

        assert!(injector.batches().is_empty());
    }

    #[test]
    fn test_failed_flush_still_empties_batch() {
        let injector = MockInputInjector::failing();
        let mut batch = InputBatch::new();
        batch.push(record(0x41));

        let result = batch.flush(&injector, true);

        assert!(matches!(result, Err(SynthError::Injection { .. })));
        assert!(batch.is_empty());
    }
}

//! The write-batch handler
//!
//! Assembles the fragments of one write transaction into an [`InputBuffer`],
//! validates it, and types the resolved key sequence exactly once per
//! successful batch. Processing is stateless across batches: nothing a batch
//! leaves behind influences the next one.

use super::buffer::{InputBuffer, Slot, MAXLEN};
use crate::att::error::AttErrorCode;
use crate::att::server::{WriteFragment, WriteSink};
use crate::keys::{digit_code, type_sequence, KeyEventSink};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons a write batch is rejected.
///
/// Malformed input and injection failure are kept distinct here even though
/// both surface as `InvalidPdu` on the wire: validation failures are
/// side-effect free, an injection failure may already have typed a prefix.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchError {
    #[error("write addressed to an unknown characteristic")]
    UnknownHandle,

    #[error("empty characteristic value")]
    EmptyValue,

    #[error("write extends past the input buffer limit")]
    OffsetOutOfRange,

    #[error("input contains bytes with no key mapping")]
    UnmappedInput,

    #[error("key event synthesis failed")]
    InjectionFailed,
}

impl BatchError {
    /// The ATT error code reported to the central
    pub fn error_code(self) -> AttErrorCode {
        match self {
            BatchError::UnknownHandle => AttErrorCode::AttributeNotFound,
            BatchError::EmptyValue => AttErrorCode::InvalidAttributeValueLength,
            BatchError::OffsetOutOfRange => AttErrorCode::InvalidOffset,
            BatchError::UnmappedInput => AttErrorCode::InvalidPdu,
            BatchError::InjectionFailed => AttErrorCode::InvalidPdu,
        }
    }
}

/// Turns write batches addressed to the keypad characteristic into typed
/// key sequences.
pub struct KeypadHandler<S> {
    value_handle: u16,
    pub(crate) sink: S,
}

impl<S: KeyEventSink> KeypadHandler<S> {
    /// Create a handler serving the given characteristic value handle
    pub fn new(value_handle: u16, sink: S) -> Self {
        Self { value_handle, sink }
    }

    /// Process one write batch.
    ///
    /// Fragments are applied in order; the first structural failure aborts
    /// the whole batch. A batch that assembles into a complete digit
    /// sequence is typed (followed by Enter) before this returns.
    pub fn process_batch(&mut self, requests: &[WriteFragment]) -> Result<(), BatchError> {
        let mut input = InputBuffer::new();

        for request in requests {
            if request.handle != self.value_handle {
                return Err(BatchError::UnknownHandle);
            }

            if request.value.is_empty() {
                return Err(BatchError::EmptyValue);
            }

            let end = request.offset + request.value.len();
            if end > MAXLEN {
                return Err(BatchError::OffsetOutOfRange);
            }

            input.grow_to(end);
            for (i, &byte) in request.value.iter().enumerate() {
                input.set(
                    request.offset + i,
                    match digit_code(byte) {
                        Some(code) => Slot::Key(code),
                        None => Slot::Invalid,
                    },
                );
            }
        }

        if input.is_empty() {
            return Err(BatchError::EmptyValue);
        }

        let codes = input.resolve().ok_or(BatchError::UnmappedInput)?;

        type_sequence(&mut self.sink, &codes).map_err(|e| {
            warn!(error = %e, "aborted key injection");
            BatchError::InjectionFailed
        })?;

        info!(digits = codes.len(), "typed received code");
        Ok(())
    }
}

impl<S: KeyEventSink> WriteSink for KeypadHandler<S> {
    fn process(&mut self, requests: &[WriteFragment]) -> Result<(), AttErrorCode> {
        self.process_batch(requests).map_err(|e| {
            debug!(error = %e, "rejected write batch");
            e.error_code()
        })
    }
}

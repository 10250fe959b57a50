//! Keystroke synthesis
//!
//! The mapping from input bytes to physical key codes, the sink interface
//! for posting key events, and the Linux uinput implementation behind it.

pub mod codes;
pub mod uinput;

pub use codes::{digit_code, KeyCode, KEY_ENTER};
pub use uinput::UinputKeyboard;

use thiserror::Error;
use tracing::debug;

/// Keystroke injection errors
#[derive(Error, Debug)]
pub enum InjectError {
    #[error("Failed to open uinput device: {0}")]
    Open(std::io::Error),

    #[error("Failed to set up virtual keyboard: {0}")]
    Setup(std::io::Error),

    #[error("Failed to emit input event: {0}")]
    Emit(std::io::Error),
}

/// Consumes synthesized key events.
///
/// One call posts one key transition; `pressed` selects key-down or key-up.
pub trait KeyEventSink {
    fn send_key(&mut self, code: KeyCode, pressed: bool) -> Result<(), InjectError>;
}

/// Types the given key codes in order, terminated by Enter.
///
/// Each code is posted as a key-down followed by a key-up, as two sequential
/// calls. The first failed synthesis aborts the sequence: no further codes
/// and no terminator are sent. Keys already posted cannot be retracted, so
/// a failure can leave a partially typed prefix on the host.
pub fn type_sequence<S: KeyEventSink + ?Sized>(
    sink: &mut S,
    codes: &[KeyCode],
) -> Result<(), InjectError> {
    for &code in codes {
        sink.send_key(code, true)?;
        sink.send_key(code, false)?;
    }

    sink.send_key(KEY_ENTER, true)?;
    sink.send_key(KEY_ENTER, false)?;

    debug!(keys = codes.len(), "typed key sequence");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sink recording transitions, optionally failing at the nth call
    #[derive(Default)]
    struct RecordingSink {
        events: Vec<(KeyCode, bool)>,
        fail_at: Option<usize>,
    }

    impl KeyEventSink for RecordingSink {
        fn send_key(&mut self, code: KeyCode, pressed: bool) -> Result<(), InjectError> {
            if self.fail_at == Some(self.events.len()) {
                return Err(InjectError::Emit(std::io::Error::other("synthetic")));
            }
            self.events.push((code, pressed));
            Ok(())
        }
    }

    #[test]
    fn test_sequence_is_down_up_pairs_plus_enter() {
        let mut sink = RecordingSink::default();
        let codes = [KeyCode(2), KeyCode(3)];

        type_sequence(&mut sink, &codes).unwrap();

        assert_eq!(
            sink.events,
            vec![
                (KeyCode(2), true),
                (KeyCode(2), false),
                (KeyCode(3), true),
                (KeyCode(3), false),
                (KEY_ENTER, true),
                (KEY_ENTER, false),
            ]
        );
    }

    #[test]
    fn test_empty_sequence_still_sends_enter() {
        let mut sink = RecordingSink::default();
        type_sequence(&mut sink, &[]).unwrap();
        assert_eq!(sink.events, vec![(KEY_ENTER, true), (KEY_ENTER, false)]);
    }

    #[test]
    fn test_failure_aborts_without_terminator() {
        let mut sink = RecordingSink {
            fail_at: Some(3),
            ..Default::default()
        };
        let codes = [KeyCode(2), KeyCode(3), KeyCode(4)];

        assert!(type_sequence(&mut sink, &codes).is_err());

        // The second key-up failed; nothing after it was posted
        assert_eq!(
            sink.events,
            vec![
                (KeyCode(2), true),
                (KeyCode(2), false),
                (KeyCode(3), true),
            ]
        );
        assert!(!sink.events.contains(&(KEY_ENTER, true)));
    }
}

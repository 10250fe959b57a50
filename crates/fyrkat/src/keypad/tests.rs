//! Unit tests for the keypad write-batch handler

use crate::att::error::AttErrorCode;
use crate::att::server::WriteFragment;
use crate::keypad::handler::{BatchError, KeypadHandler};
use crate::keys::{digit_code, InjectError, KeyCode, KeyEventSink, KEY_ENTER};

const HANDLE: u16 = 3;
const OTHER_HANDLE: u16 = 9;

/// Sink recording every transition, optionally failing from the nth call on
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

fn handler() -> KeypadHandler<RecordingSink> {
    KeypadHandler::new(HANDLE, RecordingSink::default())
}

fn fragment(offset: usize, value: &[u8]) -> WriteFragment {
    WriteFragment {
        handle: HANDLE,
        offset,
        value: value.to_vec(),
    }
}

/// The transitions typing `digits` must produce: down+up per digit, then Enter
fn expected_events(digits: &[u8]) -> Vec<(KeyCode, bool)> {
    let mut events = Vec::new();
    for &digit in digits {
        let code = digit_code(digit).unwrap();
        events.push((code, true));
        events.push((code, false));
    }
    events.push((KEY_ENTER, true));
    events.push((KEY_ENTER, false));
    events
}

#[test]
fn test_digit_payloads_of_every_length_inject_in_order() {
    for len in 1..=32usize {
        let payload: Vec<u8> = (0..len).map(|i| b'0' + (i % 10) as u8).collect();
        let mut handler = handler();

        let result = handler.process_batch(&[fragment(0, &payload)]);

        assert_eq!(result, Ok(()), "length {len}");
        assert_eq!(handler.sink.events, expected_events(&payload), "length {len}");
    }
}

#[test]
fn test_non_digit_anywhere_rejects_without_injection() {
    for position in [0, 3, 7] {
        let mut payload = b"12345678".to_vec();
        payload[position] = b'x';
        let mut handler = handler();

        let result = handler.process_batch(&[fragment(0, &payload)]);

        assert_eq!(result, Err(BatchError::UnmappedInput));
        assert!(handler.sink.events.is_empty());
    }
}

#[test]
fn test_write_past_buffer_limit_is_invalid_offset() {
    let mut handler = handler();

    // 31 + 2 > 32, content is all digits
    let result = handler.process_batch(&[fragment(31, b"12")]);
    assert_eq!(result, Err(BatchError::OffsetOutOfRange));

    // Content does not matter for the bound check
    let result = handler.process_batch(&[fragment(30, b"xyz")]);
    assert_eq!(result, Err(BatchError::OffsetOutOfRange));

    assert!(handler.sink.events.is_empty());
}

#[test]
fn test_write_ending_exactly_at_limit_is_accepted() {
    let mut handler = handler();
    let result = handler.process_batch(&[fragment(0, b"11"), fragment(2, &[b'2'; 30])]);
    assert_eq!(result, Ok(()));
}

#[test]
fn test_empty_payload_is_invalid_length() {
    let mut handler = handler();
    let result = handler.process_batch(&[fragment(0, b"")]);

    assert_eq!(result, Err(BatchError::EmptyValue));
    assert!(handler.sink.events.is_empty());
}

#[test]
fn test_empty_batch_is_invalid_length() {
    let mut handler = handler();
    let result = handler.process_batch(&[]);

    assert_eq!(result, Err(BatchError::EmptyValue));
    assert!(handler.sink.events.is_empty());
}

#[test]
fn test_unrelated_handle_is_rejected_before_buffer_mutation() {
    let mut handler = handler();
    let batch = [
        WriteFragment {
            handle: OTHER_HANDLE,
            offset: 0,
            value: b"1234".to_vec(),
        },
        fragment(0, b"56"),
    ];

    let result = handler.process_batch(&batch);

    assert_eq!(result, Err(BatchError::UnknownHandle));
    assert!(handler.sink.events.is_empty());
}

#[test]
fn test_two_fragments_assemble_in_offset_order() {
    let mut handler = handler();
    let result = handler.process_batch(&[fragment(0, b"12"), fragment(2, b"34")]);

    assert_eq!(result, Ok(()));
    assert_eq!(handler.sink.events, expected_events(b"1234"));
}

#[test]
fn test_overlapping_fragments_last_write_wins() {
    let mut handler = handler();
    let result = handler.process_batch(&[fragment(0, b"999"), fragment(0, b"12")]);

    assert_eq!(result, Ok(()));
    assert_eq!(handler.sink.events, expected_events(b"129"));
}

#[test]
fn test_uncovered_leading_slots_reject_the_batch() {
    let mut handler = handler();
    let result = handler.process_batch(&[fragment(2, b"34")]);

    assert_eq!(result, Err(BatchError::UnmappedInput));
    assert!(handler.sink.events.is_empty());
}

#[test]
fn test_identical_batches_inject_independently() {
    let mut handler = handler();

    assert_eq!(handler.process_batch(&[fragment(0, b"0042")]), Ok(()));
    assert_eq!(handler.process_batch(&[fragment(0, b"0042")]), Ok(()));

    let mut twice = expected_events(b"0042");
    twice.extend(expected_events(b"0042"));
    assert_eq!(handler.sink.events, twice);
}

#[test]
fn test_rejected_batch_leaves_no_state_for_the_next() {
    let mut handler = handler();

    assert_eq!(
        handler.process_batch(&[fragment(2, b"34")]),
        Err(BatchError::UnmappedInput)
    );

    // The earlier fragment's slots are gone; this batch stands alone
    assert_eq!(handler.process_batch(&[fragment(0, b"7")]), Ok(()));
    assert_eq!(handler.sink.events, expected_events(b"7"));
}

#[test]
fn test_injection_failure_aborts_and_maps_to_invalid_pdu() {
    let mut handler = KeypadHandler::new(
        HANDLE,
        RecordingSink {
            fail_at: Some(2), // second key-down
            ..Default::default()
        },
    );

    let result = handler.process_batch(&[fragment(0, b"12")]);

    assert_eq!(result, Err(BatchError::InjectionFailed));
    assert_eq!(BatchError::InjectionFailed.error_code(), AttErrorCode::InvalidPdu);

    // The first digit was already typed; nothing after the failure, no Enter
    let one = digit_code(b'1').unwrap();
    assert_eq!(handler.sink.events, vec![(one, true), (one, false)]);
}

#[test]
fn test_error_code_mapping() {
    assert_eq!(
        BatchError::UnknownHandle.error_code(),
        AttErrorCode::AttributeNotFound
    );
    assert_eq!(
        BatchError::EmptyValue.error_code(),
        AttErrorCode::InvalidAttributeValueLength
    );
    assert_eq!(
        BatchError::OffsetOutOfRange.error_code(),
        AttErrorCode::InvalidOffset
    );
    assert_eq!(BatchError::UnmappedInput.error_code(), AttErrorCode::InvalidPdu);
}

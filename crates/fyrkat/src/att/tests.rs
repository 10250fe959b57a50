//! Unit tests for the ATT server

use crate::att::constants::*;
use crate::att::database::AttributeDatabase;
use crate::att::error::AttErrorCode;
use crate::att::server::{AttServer, WriteFragment, WriteSink};
use crate::att::types::*;
use crate::uuid::Uuid;
use std::cell::RefCell;
use std::rc::Rc;

const SERVICE: u128 = 0xB670003C_0079_465C_9BA7_6C0539CCD67F;
const CHARACTERISTIC: u128 = 0xF4186B06_D796_4327_AF39_AC22C50BDCA8;

/// Sink that records delivered batches and returns a programmed result
#[derive(Default)]
struct RecordingSink {
    batches: Rc<RefCell<Vec<Vec<WriteFragment>>>>,
    fail_with: Option<AttErrorCode>,
}

impl WriteSink for RecordingSink {
    fn process(&mut self, requests: &[WriteFragment]) -> Result<(), AttErrorCode> {
        self.batches.borrow_mut().push(requests.to_vec());
        match self.fail_with {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }
}

struct Fixture {
    server: AttServer,
    batches: Rc<RefCell<Vec<Vec<WriteFragment>>>>,
    value_handle: u16,
}

/// A keypad-shaped table: service declaration, characteristic declaration,
/// write-encrypted value attribute.
fn fixture(fail_with: Option<AttErrorCode>) -> Fixture {
    let mut database = AttributeDatabase::new();

    database
        .push_attribute(
            Uuid::from_u16(PRIMARY_SERVICE_UUID),
            Uuid::from_u128(SERVICE).bytes_le().to_vec(),
            AttPermissions::read_only(),
        )
        .unwrap();

    let mut declaration = vec![0x08, 0x00, 0x00]; // Write property, patched below
    declaration.extend_from_slice(&Uuid::from_u128(CHARACTERISTIC).bytes_le());
    let declaration_handle = database
        .push_attribute(
            Uuid::from_u16(CHARACTERISTIC_UUID),
            declaration,
            AttPermissions::read_only(),
        )
        .unwrap();

    let value_handle = database
        .push_attribute(
            Uuid::from_u128(CHARACTERISTIC),
            Vec::new(),
            AttPermissions::write_encrypted(),
        )
        .unwrap();

    let mut patched = database.get_attribute(declaration_handle).unwrap().value.clone();
    patched[1..3].copy_from_slice(&value_handle.to_le_bytes());
    database.set_value(declaration_handle, patched).unwrap();

    let batches = Rc::new(RefCell::new(Vec::new()));
    let sink = RecordingSink {
        batches: batches.clone(),
        fail_with,
    };

    let mut server = AttServer::new(database, Box::new(sink));
    server.set_security_level(SecurityLevel::EncryptionOnly);

    Fixture {
        server,
        batches,
        value_handle,
    }
}

fn write_request(handle: u16, value: &[u8]) -> Vec<u8> {
    WriteRequest {
        handle,
        value: value.to_vec(),
    }
    .serialize()
}

fn prepare_request(handle: u16, offset: u16, value: &[u8]) -> Vec<u8> {
    PrepareWriteRequest {
        handle,
        offset,
        value: value.to_vec(),
    }
    .serialize()
}

fn execute_request(flags: u8) -> Vec<u8> {
    ExecuteWriteRequest { flags }.serialize()
}

fn assert_error(response: &[u8], request_opcode: u8, handle: u16, code: AttErrorCode) {
    let error = ErrorResponse::parse(response).unwrap();
    assert_eq!(error.request_opcode, request_opcode);
    assert_eq!(error.handle, handle);
    assert_eq!(error.error_code, code);
}

#[test]
fn test_write_request_delivers_single_fragment_batch() {
    let mut fx = fixture(None);

    let response = fx
        .server
        .handle_pdu(&write_request(fx.value_handle, b"1234"))
        .unwrap();
    assert_eq!(response, vec![ATT_WRITE_RSP]);

    let batches = fx.batches.borrow();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0],
        vec![WriteFragment {
            handle: fx.value_handle,
            offset: 0,
            value: b"1234".to_vec(),
        }]
    );
}

#[test]
fn test_write_to_unknown_handle_is_refused_without_sink_call() {
    let mut fx = fixture(None);

    let response = fx.server.handle_pdu(&write_request(0x1234, b"1")).unwrap();
    assert_error(
        &response,
        ATT_WRITE_REQ,
        0x1234,
        AttErrorCode::AttributeNotFound,
    );
    assert!(fx.batches.borrow().is_empty());
}

#[test]
fn test_write_on_unencrypted_link_is_refused() {
    let mut fx = fixture(None);
    fx.server.set_security_level(SecurityLevel::None);

    let response = fx
        .server
        .handle_pdu(&write_request(fx.value_handle, b"1"))
        .unwrap();
    assert_error(
        &response,
        ATT_WRITE_REQ,
        fx.value_handle,
        AttErrorCode::InsufficientEncryption,
    );
    assert!(fx.batches.borrow().is_empty());
}

#[test]
fn test_sink_failure_becomes_error_response() {
    let mut fx = fixture(Some(AttErrorCode::InvalidPdu));

    let response = fx
        .server
        .handle_pdu(&write_request(fx.value_handle, b"12a4"))
        .unwrap();
    assert_error(
        &response,
        ATT_WRITE_REQ,
        fx.value_handle,
        AttErrorCode::InvalidPdu,
    );
}

#[test]
fn test_prepare_execute_commits_one_batch_in_arrival_order() {
    let mut fx = fixture(None);

    let response = fx
        .server
        .handle_pdu(&prepare_request(fx.value_handle, 0, b"12"))
        .unwrap();
    let echoed = PrepareWriteResponse::parse(&response).unwrap();
    assert_eq!(echoed.handle, fx.value_handle);
    assert_eq!(echoed.offset, 0);
    assert_eq!(echoed.value, b"12");

    fx.server
        .handle_pdu(&prepare_request(fx.value_handle, 2, b"34"))
        .unwrap();
    assert!(fx.batches.borrow().is_empty()); // nothing delivered yet

    let response = fx
        .server
        .handle_pdu(&execute_request(ATT_EXEC_WRITE_COMMIT))
        .unwrap();
    assert_eq!(response, vec![ATT_EXECUTE_WRITE_RSP]);

    let batches = fx.batches.borrow();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[0][0].offset, 0);
    assert_eq!(batches[0][1].offset, 2);
    assert_eq!(batches[0][1].value, b"34");
}

#[test]
fn test_execute_cancel_discards_queue_without_sink_call() {
    let mut fx = fixture(None);

    fx.server
        .handle_pdu(&prepare_request(fx.value_handle, 0, b"12"))
        .unwrap();
    let response = fx
        .server
        .handle_pdu(&execute_request(ATT_EXEC_WRITE_CANCEL))
        .unwrap();
    assert_eq!(response, vec![ATT_EXECUTE_WRITE_RSP]);
    assert!(fx.batches.borrow().is_empty());

    // A later commit finds an empty queue
    fx.server
        .handle_pdu(&execute_request(ATT_EXEC_WRITE_COMMIT))
        .unwrap();
    assert_eq!(fx.batches.borrow()[0], Vec::<WriteFragment>::new());
}

#[test]
fn test_batch_failure_is_routed_to_first_fragment_handle() {
    let mut fx = fixture(Some(AttErrorCode::InvalidOffset));

    fx.server
        .handle_pdu(&prepare_request(fx.value_handle, 0, b"12"))
        .unwrap();
    fx.server
        .handle_pdu(&prepare_request(fx.value_handle, 30, b"34"))
        .unwrap();

    let response = fx
        .server
        .handle_pdu(&execute_request(ATT_EXEC_WRITE_COMMIT))
        .unwrap();
    assert_error(
        &response,
        ATT_EXECUTE_WRITE_REQ,
        fx.value_handle,
        AttErrorCode::InvalidOffset,
    );
}

#[test]
fn test_empty_commit_reports_against_handle_zero() {
    let mut fx = fixture(Some(AttErrorCode::InvalidAttributeValueLength));

    let response = fx
        .server
        .handle_pdu(&execute_request(ATT_EXEC_WRITE_COMMIT))
        .unwrap();
    assert_error(
        &response,
        ATT_EXECUTE_WRITE_REQ,
        0,
        AttErrorCode::InvalidAttributeValueLength,
    );
}

#[test]
fn test_prepare_queue_capacity() {
    let mut fx = fixture(None);

    for _ in 0..ATT_PREPARE_WRITE_QUEUE_SIZE {
        let response = fx
            .server
            .handle_pdu(&prepare_request(fx.value_handle, 0, b"1"))
            .unwrap();
        assert_eq!(response[0], ATT_PREPARE_WRITE_RSP);
    }

    let response = fx
        .server
        .handle_pdu(&prepare_request(fx.value_handle, 0, b"1"))
        .unwrap();
    assert_error(
        &response,
        ATT_PREPARE_WRITE_REQ,
        fx.value_handle,
        AttErrorCode::PrepareQueueFull,
    );
}

#[test]
fn test_disconnect_clears_prepared_writes() {
    let mut fx = fixture(None);

    fx.server
        .handle_pdu(&prepare_request(fx.value_handle, 0, b"12"))
        .unwrap();
    fx.server.reset_connection();
    fx.server.set_security_level(SecurityLevel::EncryptionOnly);

    fx.server
        .handle_pdu(&execute_request(ATT_EXEC_WRITE_COMMIT))
        .unwrap();
    assert_eq!(fx.batches.borrow()[0], Vec::<WriteFragment>::new());
}

#[test]
fn test_mtu_exchange_clamps_to_server_mtu() {
    let mut fx = fixture(None);

    let response = fx
        .server
        .handle_pdu(&ExchangeMtuRequest { client_mtu: 517 }.serialize())
        .unwrap();
    let parsed = ExchangeMtuResponse::parse(&response).unwrap();
    assert_eq!(parsed.server_mtu, ATT_SERVER_MTU);
    assert_eq!(fx.server.mtu(), ATT_SERVER_MTU);

    let response = fx
        .server
        .handle_pdu(&ExchangeMtuRequest { client_mtu: 23 }.serialize())
        .unwrap();
    assert!(ExchangeMtuResponse::parse(&response).is_ok());
    assert_eq!(fx.server.mtu(), 23);
}

#[test]
fn test_primary_service_discovery() {
    let mut fx = fixture(None);

    let request = ReadByGroupTypeRequest {
        start_handle: ATT_HANDLE_MIN,
        end_handle: ATT_HANDLE_MAX,
        group_type: Uuid::from_u16(PRIMARY_SERVICE_UUID),
    };
    let response = fx.server.handle_pdu(&request.serialize()).unwrap();
    let parsed = ReadByGroupTypeResponse::parse(&response).unwrap();

    assert_eq!(parsed.data.len(), 1);
    assert_eq!(parsed.data[0].handle, 1);
    assert_eq!(parsed.data[0].end_group_handle, fx.value_handle);
    assert_eq!(parsed.data[0].value, Uuid::from_u128(SERVICE).bytes_le());
}

#[test]
fn test_characteristic_value_is_not_readable() {
    let mut fx = fixture(None);

    let response = fx
        .server
        .handle_pdu(
            &ReadRequest {
                handle: fx.value_handle,
            }
            .serialize(),
        )
        .unwrap();
    assert_error(
        &response,
        ATT_READ_REQ,
        fx.value_handle,
        AttErrorCode::ReadNotPermitted,
    );
}

#[test]
fn test_unsupported_request_gets_error_response() {
    let mut fx = fixture(None);

    // Read Blob Request is not served
    let response = fx.server.handle_pdu(&[0x0C, 0x03, 0x00, 0x00, 0x00]).unwrap();
    assert_error(&response, 0x0C, 0, AttErrorCode::RequestNotSupported);
}

#[test]
fn test_unsupported_commands_are_ignored() {
    let mut fx = fixture(None);

    // Signed Write Command carries the command bit; no response is due
    assert!(fx.server.handle_pdu(&[0xD2, 0x00, 0x00]).is_none());
    assert!(fx
        .server
        .handle_pdu(&WriteCommand {
            handle: fx.value_handle,
            value: b"1".to_vec(),
        }
        .serialize())
        .is_none());
    assert!(fx.batches.borrow().is_empty());
}

#[test]
fn test_inverted_range_is_invalid_handle() {
    let mut fx = fixture(None);

    let request = FindInformationRequest {
        start_handle: 5,
        end_handle: 2,
    };
    let response = fx.server.handle_pdu(&request.serialize()).unwrap();
    assert_error(&response, ATT_FIND_INFO_REQ, 5, AttErrorCode::InvalidHandle);
}

//! ATT Server implementation
//!
//! Serves the request opcodes a GATT peripheral needs and converts write
//! transactions into batches for a registered [`WriteSink`]. A Write Request
//! is a one-fragment batch; a prepare/execute sequence is delivered as one
//! multi-fragment batch when the central commits it. Exactly one response is
//! produced per transaction, addressed to the first fragment's handle no
//! matter which fragment caused a failure.
//!
//! The server is transport-agnostic: `handle_pdu` takes one inbound PDU and
//! returns the response PDU to send back, if any. The run loop owns the
//! delivery order, so no two transactions are ever processed concurrently.

use super::constants::*;
use super::database::AttributeDatabase;
use super::error::AttErrorCode;
use super::types::*;
use crate::uuid::Uuid;
use tracing::{debug, trace, warn};

/// One characteristic write taken from a write transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFragment {
    /// Attribute handle the fragment addresses
    pub handle: u16,
    /// Offset of the fragment within the assembled value
    pub offset: usize,
    /// Fragment payload
    pub value: Vec<u8>,
}

/// Receives complete write transactions.
///
/// An error aborts the whole batch and is reported to the central as the
/// returned ATT error code.
pub trait WriteSink {
    fn process(&mut self, requests: &[WriteFragment]) -> Result<(), AttErrorCode>;
}

/// ATT Server configuration
#[derive(Debug, Clone)]
pub struct AttServerConfig {
    /// Server Rx MTU announced during MTU exchange
    pub mtu: u16,
}

impl Default for AttServerConfig {
    fn default() -> Self {
        Self {
            mtu: ATT_SERVER_MTU,
        }
    }
}

/// ATT Server
pub struct AttServer {
    /// Attribute database
    database: AttributeDatabase,
    /// Server configuration
    config: AttServerConfig,
    /// Write transaction consumer
    sink: Box<dyn WriteSink>,
    /// Negotiated MTU for the current connection
    mtu: u16,
    /// Security level of the current link
    security: SecurityLevel,
    /// Prepared writes awaiting execution, in arrival order
    prepared: Vec<PrepareWriteRequest>,
}

impl AttServer {
    /// Create a new ATT server over a populated database
    pub fn new(database: AttributeDatabase, sink: Box<dyn WriteSink>) -> Self {
        Self {
            database,
            config: AttServerConfig::default(),
            sink,
            mtu: ATT_DEFAULT_MTU,
            security: SecurityLevel::None,
            prepared: Vec::new(),
        }
    }

    /// Set server configuration
    pub fn set_config(&mut self, config: AttServerConfig) {
        self.config = config;
    }

    /// The attribute database backing this server
    pub fn database(&self) -> &AttributeDatabase {
        &self.database
    }

    /// Negotiated MTU for the current connection
    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Update the security level of the link
    pub fn set_security_level(&mut self, level: SecurityLevel) {
        debug!(?level, "link security level changed");
        self.security = level;
    }

    /// Reset per-connection state (negotiated MTU, prepared writes, security)
    pub fn reset_connection(&mut self) {
        self.mtu = ATT_DEFAULT_MTU;
        self.security = SecurityLevel::None;
        self.prepared.clear();
    }

    /// Handle a received ATT PDU; returns the response PDU, if one is due
    pub fn handle_pdu(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        let opcode = match data.first() {
            Some(&opcode) => opcode,
            None => {
                warn!("empty ATT PDU");
                return None;
            }
        };

        trace!(opcode, "att pdu");

        match opcode {
            ATT_EXCHANGE_MTU_REQ => Some(self.handle_exchange_mtu(data)),
            ATT_FIND_INFO_REQ => Some(self.handle_find_information(data)),
            ATT_READ_BY_TYPE_REQ => Some(self.handle_read_by_type(data)),
            ATT_READ_BY_GROUP_TYPE_REQ => Some(self.handle_read_by_group_type(data)),
            ATT_READ_REQ => Some(self.handle_read(data)),
            ATT_WRITE_REQ => Some(self.handle_write(data)),
            ATT_PREPARE_WRITE_REQ => Some(self.handle_prepare_write(data)),
            ATT_EXECUTE_WRITE_REQ => Some(self.handle_execute_write(data)),
            ATT_WRITE_CMD => {
                // No attribute here permits Write Without Response; commands
                // are dropped per the ATT rules for unsupported writes.
                debug!("ignoring write command");
                None
            }
            // Commands (bit 6 set) never get a response; unknown requests do.
            opcode if opcode & 0x40 != 0 => {
                debug!(opcode, "ignoring unsupported command");
                None
            }
            _ => Some(error_response(opcode, 0, AttErrorCode::RequestNotSupported)),
        }
    }

    /// Handle Exchange MTU Request
    fn handle_exchange_mtu(&mut self, data: &[u8]) -> Vec<u8> {
        let request = match ExchangeMtuRequest::parse(data) {
            Ok(req) => req,
            Err(e) => return error_response(ATT_EXCHANGE_MTU_REQ, 0, e.to_error_code()),
        };

        let client_mtu = request.client_mtu.max(ATT_DEFAULT_MTU);
        self.mtu = client_mtu.min(self.config.mtu);
        debug!(mtu = self.mtu, "negotiated MTU");

        ExchangeMtuResponse {
            server_mtu: self.config.mtu,
        }
        .serialize()
    }

    /// Handle Find Information Request
    fn handle_find_information(&mut self, data: &[u8]) -> Vec<u8> {
        let request = match FindInformationRequest::parse(data) {
            Ok(req) => req,
            Err(e) => return error_response(ATT_FIND_INFO_REQ, 0, e.to_error_code()),
        };

        if request.start_handle > request.end_handle || request.start_handle == 0 {
            return error_response(
                ATT_FIND_INFO_REQ,
                request.start_handle,
                AttErrorCode::InvalidHandle,
            );
        }

        let info = self
            .database
            .find_information(request.start_handle, request.end_handle);

        if info.is_empty() {
            return error_response(
                ATT_FIND_INFO_REQ,
                request.start_handle,
                AttErrorCode::AttributeNotFound,
            );
        }

        // The format of the first entry decides the format of the response;
        // entries of the other width wait for the next request.
        let use_16bit = info[0].1.as_u16().is_some();
        let format = if use_16bit {
            ATT_FIND_INFO_RSP_FORMAT_16BIT
        } else {
            ATT_FIND_INFO_RSP_FORMAT_128BIT
        };
        let entry_len = if use_16bit { 4 } else { 18 };

        let mut information_data = Vec::new();
        let mut used = 2;
        for (handle, uuid) in info {
            if uuid.as_u16().is_some() != use_16bit || used + entry_len > self.mtu as usize {
                break;
            }
            information_data.push(match uuid.as_u16() {
                Some(uuid16) => HandleUuidPair::Uuid16(handle, uuid16),
                None => HandleUuidPair::Uuid128(handle, uuid),
            });
            used += entry_len;
        }

        FindInformationResponse {
            format,
            information_data,
        }
        .serialize()
    }

    /// Handle Read By Type Request
    fn handle_read_by_type(&mut self, data: &[u8]) -> Vec<u8> {
        let request = match ReadByTypeRequest::parse(data) {
            Ok(req) => req,
            Err(e) => return error_response(ATT_READ_BY_TYPE_REQ, 0, e.to_error_code()),
        };

        if request.start_handle > request.end_handle || request.start_handle == 0 {
            return error_response(
                ATT_READ_BY_TYPE_REQ,
                request.start_handle,
                AttErrorCode::InvalidHandle,
            );
        }

        let attributes = self.database.read_by_type(
            request.start_handle,
            request.end_handle,
            &request.attribute_type,
            self.security,
        );

        if attributes.is_empty() {
            return error_response(
                ATT_READ_BY_TYPE_REQ,
                request.start_handle,
                AttErrorCode::AttributeNotFound,
            );
        }

        // Entries must share one length; stop at the first mismatch. Values
        // are capped so each entry fits the negotiated MTU.
        let value_len = attributes[0].1.len().min(self.mtu as usize - 4);
        let entry_len = 2 + value_len;

        let mut entries = Vec::new();
        let mut used = 2;
        for (handle, value) in attributes {
            if value.len() < value_len || used + entry_len > self.mtu as usize {
                break;
            }
            entries.push(HandleValue {
                handle,
                value: value[..value_len].to_vec(),
            });
            used += entry_len;
        }

        ReadByTypeResponse {
            length: entry_len as u8,
            data: entries,
        }
        .serialize()
    }

    /// Handle Read By Group Type Request
    fn handle_read_by_group_type(&mut self, data: &[u8]) -> Vec<u8> {
        let request = match ReadByGroupTypeRequest::parse(data) {
            Ok(req) => req,
            Err(e) => return error_response(ATT_READ_BY_GROUP_TYPE_REQ, 0, e.to_error_code()),
        };

        if request.start_handle > request.end_handle || request.start_handle == 0 {
            return error_response(
                ATT_READ_BY_GROUP_TYPE_REQ,
                request.start_handle,
                AttErrorCode::InvalidHandle,
            );
        }

        let primary = Uuid::from_u16(PRIMARY_SERVICE_UUID);
        let secondary = Uuid::from_u16(SECONDARY_SERVICE_UUID);
        if request.group_type != primary && request.group_type != secondary {
            return error_response(
                ATT_READ_BY_GROUP_TYPE_REQ,
                request.start_handle,
                AttErrorCode::UnsupportedGroupType,
            );
        }

        let groups = self.database.get_group_handles(
            request.start_handle,
            request.end_handle,
            &request.group_type,
            self.security,
        );

        if groups.is_empty() {
            return error_response(
                ATT_READ_BY_GROUP_TYPE_REQ,
                request.start_handle,
                AttErrorCode::AttributeNotFound,
            );
        }

        let value_len = groups[0].2.len();
        let entry_len = 4 + value_len;

        let mut entries = Vec::new();
        let mut used = 2;
        for (handle, end_handle, value) in groups {
            if value.len() != value_len || used + entry_len > self.mtu as usize {
                break;
            }
            entries.push(AttributeData {
                handle,
                end_group_handle: end_handle,
                value,
            });
            used += entry_len;
        }

        ReadByGroupTypeResponse {
            length: entry_len as u8,
            data: entries,
        }
        .serialize()
    }

    /// Handle Read Request
    fn handle_read(&mut self, data: &[u8]) -> Vec<u8> {
        let request = match ReadRequest::parse(data) {
            Ok(req) => req,
            Err(e) => return error_response(ATT_READ_REQ, 0, e.to_error_code()),
        };

        let value = match self.database.read_by_handle(request.handle, self.security) {
            Ok(value) => value,
            Err(e) => return error_response(ATT_READ_REQ, request.handle, e.to_error_code()),
        };

        let max_len = self.mtu as usize - 1;
        let value = if value.len() > max_len {
            value[..max_len].to_vec()
        } else {
            value
        };

        ReadResponse { value }.serialize()
    }

    /// Handle Write Request
    fn handle_write(&mut self, data: &[u8]) -> Vec<u8> {
        let request = match WriteRequest::parse(data) {
            Ok(req) => req,
            Err(e) => return error_response(ATT_WRITE_REQ, 0, e.to_error_code()),
        };

        if let Err(code) = self.check_writable(request.handle) {
            return error_response(ATT_WRITE_REQ, request.handle, code);
        }

        let batch = [WriteFragment {
            handle: request.handle,
            offset: 0,
            value: request.value,
        }];

        match self.sink.process(&batch) {
            Ok(()) => WriteResponse.serialize(),
            Err(code) => error_response(ATT_WRITE_REQ, batch[0].handle, code),
        }
    }

    /// Handle Prepare Write Request
    fn handle_prepare_write(&mut self, data: &[u8]) -> Vec<u8> {
        let request = match PrepareWriteRequest::parse(data) {
            Ok(req) => req,
            Err(e) => return error_response(ATT_PREPARE_WRITE_REQ, 0, e.to_error_code()),
        };

        if let Err(code) = self.check_writable(request.handle) {
            return error_response(ATT_PREPARE_WRITE_REQ, request.handle, code);
        }

        if self.prepared.len() >= ATT_PREPARE_WRITE_QUEUE_SIZE {
            return error_response(
                ATT_PREPARE_WRITE_REQ,
                request.handle,
                AttErrorCode::PrepareQueueFull,
            );
        }

        let response = PrepareWriteResponse {
            handle: request.handle,
            offset: request.offset,
            value: request.value.clone(),
        };

        self.prepared.push(request);

        response.serialize()
    }

    /// Handle Execute Write Request
    fn handle_execute_write(&mut self, data: &[u8]) -> Vec<u8> {
        let request = match ExecuteWriteRequest::parse(data) {
            Ok(req) => req,
            Err(e) => return error_response(ATT_EXECUTE_WRITE_REQ, 0, e.to_error_code()),
        };

        let prepared = std::mem::take(&mut self.prepared);

        if request.flags == ATT_EXEC_WRITE_CANCEL {
            return ExecuteWriteResponse.serialize();
        }

        let batch: Vec<WriteFragment> = prepared
            .into_iter()
            .map(|write| WriteFragment {
                handle: write.handle,
                offset: write.offset as usize,
                value: write.value,
            })
            .collect();

        // The response goes to the first fragment's handle regardless of
        // which fragment caused a failure.
        let first_handle = batch.first().map(|f| f.handle).unwrap_or(0);

        match self.sink.process(&batch) {
            Ok(()) => ExecuteWriteResponse.serialize(),
            Err(code) => error_response(ATT_EXECUTE_WRITE_REQ, first_handle, code),
        }
    }

    /// Check that a handle exists and is writable on the current link
    fn check_writable(&self, handle: u16) -> Result<(), AttErrorCode> {
        let attr = self
            .database
            .get_attribute(handle)
            .map_err(|e| e.to_error_code())?;

        attr.check_write(self.security)
            .map_err(|e| e.to_error_code())
    }
}

/// Build an Error Response PDU
fn error_response(request_opcode: u8, handle: u16, error_code: AttErrorCode) -> Vec<u8> {
    ErrorResponse::new(request_opcode, handle, error_code).serialize()
}

//! The peripheral run loop
//!
//! Owns the HCI socket and drives everything from it on a single thread:
//! advertising follows radio power state, ACL data flows through L2CAP
//! reassembly into the ATT server, and responses go back out. Write batches
//! are processed strictly in arrival order with no overlap, and a response
//! is not sent until key injection has finished or failed. A stall in event
//! posting therefore stalls the BLE response; there is no timeout and no way
//! to cancel injection once it has begun.

use crate::att::constants::ATT_CID;
use crate::att::server::AttServer;
use crate::att::types::SecurityLevel;
use crate::error::Error;
use crate::gap::types::{BdAddr, PowerState};
use crate::gap::Advertiser;
use crate::gatt::ServiceBuilder;
use crate::hci::constants::*;
use crate::hci::packet::{AclData, HciEvent, HciPacket};
use crate::hci::{HciCommand, HciSocket};
use crate::keypad::{self, KeypadHandler};
use crate::keys::KeyEventSink;
use crate::l2cap::{L2capFrame, Reassembler};
use tracing::{debug, info, trace, warn};

/// Peripheral configuration
#[derive(Debug, Clone)]
pub struct PeripheralConfig {
    /// HCI adapter index (0 for hci0)
    pub device_id: u16,
    /// Device name carried in the scan response
    pub local_name: String,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            local_name: "fyrkat".into(),
        }
    }
}

/// State of the single tracked connection
#[derive(Debug)]
struct Connection {
    handle: u16,
    peer: BdAddr,
    reassembler: Reassembler,
}

/// The BLE keypad peripheral
pub struct Peripheral {
    socket: HciSocket,
    advertiser: Advertiser,
    att: AttServer,
    connection: Option<Connection>,
}

impl Peripheral {
    /// Open the adapter and assemble the keypad service around the given
    /// key event sink.
    pub fn new<S: KeyEventSink + 'static>(
        config: PeripheralConfig,
        keys: S,
    ) -> Result<Self, Error> {
        let socket = HciSocket::open(config.device_id)?;

        let mut builder = ServiceBuilder::new();
        let value_handle = keypad::register(&mut builder)?;
        let handler = KeypadHandler::new(value_handle, keys);

        let att = AttServer::new(builder.build(), Box::new(handler));
        let advertiser = Advertiser::new(keypad::SERVICE_UUID, config.local_name);

        Ok(Self {
            socket,
            advertiser,
            att,
            connection: None,
        })
    }

    /// Bring the controller up and serve until the socket fails.
    pub fn run(&mut self) -> Result<(), Error> {
        self.initialize()?;

        loop {
            match self.socket.read_packet()? {
                HciPacket::Event(event) => self.handle_event(event)?,
                HciPacket::AclData(acl) => self.handle_acl(acl)?,
            }
        }
    }

    fn initialize(&mut self) -> Result<(), Error> {
        self.socket.execute_command(&HciCommand::Reset)?;
        self.socket.execute_command(&HciCommand::SetEventMask {
            event_mask: EVENT_MASK_DEFAULT,
        })?;
        self.socket.execute_command(&HciCommand::LeSetEventMask {
            event_mask: LE_EVENT_MASK_DEFAULT,
        })?;

        let event = self.socket.execute_command(&HciCommand::ReadBdAddr)?;
        if let Some(addr) = BdAddr::from_slice(event.return_parameters()) {
            info!(address = %addr, "controller ready");
        }

        self.advertiser
            .on_power_state(&self.socket, PowerState::PoweredOn)?;

        Ok(())
    }

    fn handle_event(&mut self, event: HciEvent) -> Result<(), Error> {
        match event.event_code {
            EVT_LE_META_EVENT => self.handle_le_meta_event(&event)?,

            EVT_DISCONN_COMPLETE => {
                if let Some(conn) = self.connection.take() {
                    let reason = event.parameters.get(3).copied().unwrap_or(0);
                    info!(peer = %conn.peer, reason, "central disconnected");
                }

                self.att.reset_connection();

                // The link is gone; make the keypad reachable again
                self.advertiser.start(&self.socket)?;
            }

            EVT_ENCRYPTION_CHANGE => {
                if event.parameters.len() >= 4 {
                    let status = event.parameters[0];
                    let enabled = event.parameters[3];

                    let level = if status == 0 && enabled != 0 {
                        SecurityLevel::EncryptionOnly
                    } else {
                        SecurityLevel::None
                    };

                    info!(?level, "link encryption changed");
                    self.att.set_security_level(level);
                }
            }

            EVT_CMD_COMPLETE | EVT_CMD_STATUS => {
                trace!("stray command event");
            }

            _ => {
                trace!(code = event.event_code, "unhandled event");
            }
        }

        Ok(())
    }

    fn handle_le_meta_event(&mut self, event: &HciEvent) -> Result<(), Error> {
        let subevent = match event.parameters.first() {
            Some(&subevent) => subevent,
            None => return Ok(()),
        };

        match subevent {
            // Both layouts carry status, handle, and peer address at the
            // same offsets.
            EVT_LE_CONN_COMPLETE | EVT_LE_ENHANCED_CONN_COMPLETE => {
                if event.parameters.len() < 12 {
                    return Ok(());
                }

                let status = event.parameters[1];
                if status != 0 {
                    warn!(status, "connection attempt failed");
                    return Ok(());
                }

                let handle =
                    u16::from_le_bytes([event.parameters[2], event.parameters[3]]) & 0x0FFF;
                let peer = match BdAddr::from_slice(&event.parameters[6..12]) {
                    Some(peer) => peer,
                    None => return Ok(()),
                };

                info!(%peer, handle, "central connected");

                // The controller stopped advertising when it accepted the
                // connection.
                self.advertiser.mark_stopped();
                self.att.reset_connection();

                self.connection = Some(Connection {
                    handle,
                    peer,
                    reassembler: Reassembler::new(),
                });
            }

            _ => {
                trace!(subevent, "unhandled LE event");
            }
        }

        Ok(())
    }

    fn handle_acl(&mut self, acl: AclData) -> Result<(), Error> {
        let conn = match self.connection.as_mut() {
            Some(conn) if conn.handle == acl.handle => conn,
            _ => {
                debug!(handle = acl.handle, "ACL data for unknown connection");
                return Ok(());
            }
        };

        let frame = match conn.reassembler.feed(&acl) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!(error = %e, "dropping malformed L2CAP traffic");
                conn.reassembler.reset();
                return Ok(());
            }
        };

        let conn_handle = conn.handle;

        if frame.cid != ATT_CID {
            trace!(cid = frame.cid, "ignoring non-ATT channel");
            return Ok(());
        }

        // Batches are processed to completion here, one at a time; the
        // response leaves only after injection has finished or failed.
        if let Some(response) = self.att.handle_pdu(&frame.payload) {
            let frame = L2capFrame::new(ATT_CID, response);
            for packet in frame.fragments(conn_handle, LE_ACL_MTU) {
                self.socket.send_acl(&packet)?;
            }
        }

        Ok(())
    }
}

//! HCI Socket implementation for Bluetooth communication
//!
//! A wrapper around the raw HCI socket interface. The socket is opened on
//! the raw channel with a packet filter admitting events and ACL data, which
//! is everything the peripheral role consumes.

use crate::error::HciError;
use crate::hci::constants::*;
use crate::hci::packet::{AclData, HciCommand, HciPacket};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;
use tracing::trace;

// Bluetooth socket constants
const AF_BLUETOOTH: i32 = 31;
const BTPROTO_HCI: i32 = 1;
const HCI_CHANNEL_RAW: u16 = 0;
const SOL_HCI: i32 = 0;
const HCI_FILTER: i32 = 2;

/// Number of unrelated packets tolerated while waiting for a command to
/// complete before giving up.
const COMMAND_SKIP_LIMIT: usize = 16;

/// How long to wait for a command completion event.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Represents an HCI socket
#[derive(Debug)]
pub struct HciSocket {
    fd: RawFd,
}

// Socket address for HCI devices
#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

// Kernel-side packet filter for raw HCI sockets
#[repr(C)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciSocket {
    /// Gets the raw file descriptor for the socket
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    /// Opens a new HCI socket bound to the given device (0 for hci0).
    ///
    /// The socket filter is set to deliver all events plus ACL data.
    pub fn open(dev_id: u16) -> Result<Self, HciError> {
        let fd = unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_RAW, BTPROTO_HCI) };

        if fd < 0 {
            return Err(HciError::SocketError(std::io::Error::last_os_error()));
        }

        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: HCI_CHANNEL_RAW,
        };

        let result = unsafe {
            libc::bind(
                fd,
                &addr as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };

        if result < 0 {
            unsafe { libc::close(fd) };
            return Err(HciError::BindError(std::io::Error::last_os_error()));
        }

        let socket = HciSocket { fd };
        socket.set_filter()?;

        Ok(socket)
    }

    // Admit every event plus ACL data; without a filter the raw channel
    // delivers nothing on most kernels.
    fn set_filter(&self) -> Result<(), HciError> {
        let filter = HciFilter {
            type_mask: (1 << HCI_EVENT_PKT) | (1 << HCI_ACL_PKT),
            event_mask: [0xFFFF_FFFF, 0xFFFF_FFFF],
            opcode: 0,
        };

        let result = unsafe {
            libc::setsockopt(
                self.fd,
                SOL_HCI,
                HCI_FILTER,
                &filter as *const _ as *const libc::c_void,
                std::mem::size_of::<HciFilter>() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(HciError::FilterError(std::io::Error::last_os_error()));
        }

        Ok(())
    }

    /// Read one HCI packet (event or ACL data) from the socket
    pub fn read_packet(&self) -> Result<HciPacket, HciError> {
        let mut buffer = [0u8; 1024];

        let bytes_read = unsafe {
            libc::read(
                self.fd,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
            )
        };

        if bytes_read < 0 {
            return Err(HciError::ReceiveError(std::io::Error::last_os_error()));
        }

        if bytes_read < 2 {
            return Err(HciError::InvalidPacketFormat);
        }

        match HciPacket::parse(&buffer[..bytes_read as usize]) {
            Some(packet) => Ok(packet),
            None => Err(HciError::InvalidPacketFormat),
        }
    }

    /// Read one HCI packet from the socket with a timeout
    pub fn read_packet_timeout(&self, timeout: Option<Duration>) -> Result<HciPacket, HciError> {
        if let Some(timeout) = timeout {
            let mut read_fds: libc::fd_set = unsafe { std::mem::zeroed() };
            unsafe {
                libc::FD_ZERO(&mut read_fds);
                libc::FD_SET(self.fd, &mut read_fds);
            }

            let mut timeout_val = libc::timeval {
                tv_sec: timeout.as_secs() as libc::time_t,
                tv_usec: timeout.subsec_micros() as libc::suseconds_t,
            };

            let result = unsafe {
                libc::select(
                    self.fd + 1,
                    &mut read_fds,
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                    &mut timeout_val,
                )
            };

            if result < 0 {
                return Err(HciError::ReceiveError(std::io::Error::last_os_error()));
            }

            if result == 0 {
                return Err(HciError::ReceiveError(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "Timed out waiting for HCI packet",
                )));
            }
        }

        self.read_packet()
    }

    /// Sends an HCI command to the controller
    pub fn send_command(&self, command: &HciCommand) -> Result<(), HciError> {
        trace!(opcode = command.opcode(), "send command");
        self.write_packet(&command.to_packet())
    }

    /// Sends an ACL data packet to the controller
    pub fn send_acl(&self, acl: &AclData) -> Result<(), HciError> {
        trace!(handle = acl.handle, len = acl.data.len(), "send acl");
        self.write_packet(&acl.to_packet())
    }

    /// Sends a command and waits for its Command Complete event.
    ///
    /// Unrelated packets arriving in the meantime are dropped; this is only
    /// used during bring-up and advertising control, where no ATT traffic is
    /// in flight.
    pub fn execute_command(&self, command: &HciCommand) -> Result<crate::hci::HciEvent, HciError> {
        let opcode = command.opcode();
        self.send_command(command)?;

        for _ in 0..COMMAND_SKIP_LIMIT {
            let packet = self.read_packet_timeout(Some(COMMAND_TIMEOUT))?;

            if let HciPacket::Event(event) = packet {
                if event.is_command_complete(opcode) {
                    return match event.command_status() {
                        Some(0) => Ok(event),
                        Some(status) => Err(HciError::CommandFailed(opcode, status)),
                        None => Err(HciError::InvalidPacketFormat),
                    };
                }
            }
        }

        Err(HciError::CommandTimeout(opcode))
    }

    fn write_packet(&self, packet: &[u8]) -> Result<(), HciError> {
        match unsafe {
            libc::write(
                self.fd,
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
            )
        } {
            -1 => Err(HciError::SendError(std::io::Error::last_os_error())),
            _ => Ok(()),
        }
    }
}

impl AsRawFd for HciSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for HciSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

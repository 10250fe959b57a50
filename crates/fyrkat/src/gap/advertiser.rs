//! Peripheral advertising
//!
//! Mirrors the radio power state into LE advertising: powered on means the
//! keypad service is advertised as connectable, anything else means
//! advertising is off. No validation or profile logic lives here.

use crate::error::HciError;
use crate::gap::constants::*;
use crate::gap::types::PowerState;
use crate::hci::packet::ADV_DATA_MAX_LEN;
use crate::hci::{HciCommand, HciSocket};
use crate::uuid::Uuid;
use tracing::{debug, info};

/// Advertises one 128-bit service UUID and the local device name
pub struct Advertiser {
    service_uuid: Uuid,
    local_name: String,
    advertising: bool,
}

impl Advertiser {
    /// Create an advertiser for the given service
    pub fn new(service_uuid: Uuid, local_name: impl Into<String>) -> Self {
        Self {
            service_uuid,
            local_name: local_name.into(),
            advertising: false,
        }
    }

    /// Whether advertising is currently enabled
    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    /// The controller stops advertising itself when a central connects;
    /// record that without issuing a command.
    pub fn mark_stopped(&mut self) {
        self.advertising = false;
    }

    /// Mirror a radio power state change
    pub fn on_power_state(
        &mut self,
        socket: &HciSocket,
        state: PowerState,
    ) -> Result<(), HciError> {
        match state {
            PowerState::PoweredOn => self.start(socket),
            _ => self.stop(socket),
        }
    }

    /// Configure and enable advertising
    pub fn start(&mut self, socket: &HciSocket) -> Result<(), HciError> {
        if self.advertising {
            return Ok(());
        }

        socket.execute_command(&HciCommand::LeSetAdvertisingParameters {
            interval_min: ADV_INTERVAL_MIN,
            interval_max: ADV_INTERVAL_MAX,
            adv_type: ADV_IND,
            own_address_type: PUBLIC_DEVICE_ADDRESS,
            channel_map: ADV_CHANNEL_MAP_ALL,
            filter_policy: ADV_FILTER_POLICY_ANY,
        })?;

        socket.execute_command(&HciCommand::LeSetAdvertisingData {
            data: self.advertising_data(),
        })?;

        socket.execute_command(&HciCommand::LeSetScanResponseData {
            data: self.scan_response_data(),
        })?;

        socket.execute_command(&HciCommand::LeSetAdvertisingEnable { enable: true })?;

        self.advertising = true;
        info!(uuid = %self.service_uuid, "advertising started");

        Ok(())
    }

    /// Disable advertising
    pub fn stop(&mut self, socket: &HciSocket) -> Result<(), HciError> {
        if !self.advertising {
            return Ok(());
        }

        socket.execute_command(&HciCommand::LeSetAdvertisingEnable { enable: false })?;

        self.advertising = false;
        debug!("advertising stopped");

        Ok(())
    }

    /// Advertising data: flags plus the complete 128-bit service UUID list.
    /// The UUID structure fills most of the 31 bytes, so the name goes into
    /// the scan response instead.
    pub fn advertising_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(ADV_DATA_MAX_LEN);

        data.push(2);
        data.push(ADV_TYPE_FLAGS);
        data.push(ADV_FLAGS_LE_GENERAL_DISCOVERABLE | ADV_FLAGS_BREDR_NOT_SUPPORTED);

        data.push(17);
        data.push(ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE);
        data.extend_from_slice(&self.service_uuid.bytes_le());

        data
    }

    /// Scan response data: the local name, shortened if it does not fit
    pub fn scan_response_data(&self) -> Vec<u8> {
        let name = self.local_name.as_bytes();
        let max_name = ADV_DATA_MAX_LEN - 2;

        let (name_type, name) = if name.len() <= max_name {
            (ADV_TYPE_COMPLETE_LOCAL_NAME, name)
        } else {
            (ADV_TYPE_SHORT_LOCAL_NAME, &name[..max_name])
        };

        let mut data = Vec::with_capacity(2 + name.len());
        data.push(name.len() as u8 + 1);
        data.push(name_type);
        data.extend_from_slice(name);

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypad::SERVICE_UUID;

    #[test]
    fn test_advertising_data_layout() {
        let advertiser = Advertiser::new(SERVICE_UUID, "fyrkat");
        let data = advertiser.advertising_data();

        assert!(data.len() <= ADV_DATA_MAX_LEN);

        // Flags structure
        assert_eq!(&data[0..3], &[2, ADV_TYPE_FLAGS, 0x06]);

        // Complete 128-bit service UUID list
        assert_eq!(data[3], 17);
        assert_eq!(data[4], ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE);
        assert_eq!(&data[5..21], &SERVICE_UUID.bytes_le());
    }

    #[test]
    fn test_scan_response_carries_complete_name() {
        let advertiser = Advertiser::new(SERVICE_UUID, "fyrkat");
        let data = advertiser.scan_response_data();

        assert_eq!(data[0], 7);
        assert_eq!(data[1], ADV_TYPE_COMPLETE_LOCAL_NAME);
        assert_eq!(&data[2..], b"fyrkat");
    }

    #[test]
    fn test_long_name_is_shortened() {
        let long_name = "a".repeat(40);
        let advertiser = Advertiser::new(SERVICE_UUID, long_name);
        let data = advertiser.scan_response_data();

        assert_eq!(data.len(), ADV_DATA_MAX_LEN);
        assert_eq!(data[1], ADV_TYPE_SHORT_LOCAL_NAME);
    }
}

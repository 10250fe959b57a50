//! GATT service table construction
//!
//! Builds the attribute table the ATT server serves: service declarations,
//! characteristic declarations, and value attributes, with handles assigned
//! sequentially in registration order.

use super::types::{Characteristic, CharacteristicProperties, Service};
use crate::att::constants::{CHARACTERISTIC_UUID, PRIMARY_SERVICE_UUID, SECONDARY_SERVICE_UUID};
use crate::att::database::AttributeDatabase;
use crate::att::error::{AttError, AttResult};
use crate::att::types::AttPermissions;
use crate::uuid::Uuid;
use tracing::debug;

/// Builds an attribute database service by service.
///
/// Characteristics are attached to the most recently added service.
#[derive(Debug, Default)]
pub struct ServiceBuilder {
    database: AttributeDatabase,
    services: Vec<Service>,
    characteristics: Vec<Characteristic>,
}

impl ServiceBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service declaration; subsequent characteristics belong to it
    pub fn add_service(&mut self, uuid: Uuid, is_primary: bool) -> AttResult<u16> {
        let declaration_type = if is_primary {
            PRIMARY_SERVICE_UUID
        } else {
            SECONDARY_SERVICE_UUID
        };

        let handle = self.database.push_attribute(
            Uuid::from_u16(declaration_type),
            uuid.to_wire(),
            AttPermissions::read_only(),
        )?;

        debug!(%uuid, handle, "registered service");
        self.services.push(Service {
            uuid,
            is_primary,
            handle,
        });

        Ok(handle)
    }

    /// Add a characteristic to the current service; returns its value handle
    pub fn add_characteristic(
        &mut self,
        uuid: Uuid,
        properties: CharacteristicProperties,
        permissions: AttPermissions,
        initial_value: Vec<u8>,
    ) -> AttResult<u16> {
        if self.services.is_empty() {
            return Err(AttError::InvalidParameter(
                "characteristic added before any service".into(),
            ));
        }

        // Declaration value: properties, value handle placeholder, UUID.
        let mut declaration = Vec::with_capacity(3 + 16);
        declaration.push(properties.bits());
        declaration.extend_from_slice(&[0, 0]);
        declaration.extend_from_slice(&uuid.to_wire());

        let declaration_handle = self.database.push_attribute(
            Uuid::from_u16(CHARACTERISTIC_UUID),
            declaration.clone(),
            AttPermissions::read_only(),
        )?;

        let value_handle =
            self.database
                .push_attribute(uuid, initial_value, permissions)?;

        // Patch the placeholder now that the value handle is known
        declaration[1..3].copy_from_slice(&value_handle.to_le_bytes());
        self.database.set_value(declaration_handle, declaration)?;

        debug!(%uuid, declaration_handle, value_handle, "registered characteristic");
        self.characteristics.push(Characteristic {
            uuid,
            declaration_handle,
            value_handle,
            properties,
        });

        Ok(value_handle)
    }

    /// Services registered so far
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Characteristics registered so far
    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }

    /// Finish building and hand the table to an ATT server
    pub fn build(self) -> AttributeDatabase {
        self.database
    }
}

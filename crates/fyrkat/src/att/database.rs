//! Attribute database for the ATT server
use super::constants::*;
use super::error::{AttError, AttResult};
use super::types::{AttPermissions, SecurityLevel};
use crate::uuid::Uuid;
use std::collections::BTreeMap;

/// An attribute in the database
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Attribute handle
    pub handle: u16,
    /// Attribute type (UUID)
    pub attribute_type: Uuid,
    /// Attribute value
    pub value: Vec<u8>,
    /// Attribute permissions
    pub permissions: AttPermissions,
}

impl Attribute {
    /// Create a new attribute
    pub fn new(handle: u16, attribute_type: Uuid, value: Vec<u8>, permissions: AttPermissions) -> Self {
        Self {
            handle,
            attribute_type,
            value,
            permissions,
        }
    }

    /// Check if this attribute can be read at the given security level
    pub fn can_read(&self, security_level: SecurityLevel) -> bool {
        self.permissions.allows_read_with_security(security_level)
    }

    /// Check if this attribute can be written at the given security level
    pub fn can_write(&self, security_level: SecurityLevel) -> bool {
        self.permissions.allows_write_with_security(security_level)
    }

    /// Read the attribute value, or the reason it is not readable
    pub fn read(&self, security_level: SecurityLevel) -> AttResult<&[u8]> {
        if !self.can_read(security_level) {
            return Err(self.read_refusal(security_level));
        }

        Ok(&self.value)
    }

    /// The error a read at the given security level would produce
    fn read_refusal(&self, security_level: SecurityLevel) -> AttError {
        if !self.permissions.contains(AttPermissions::READ) {
            AttError::ReadNotPermitted
        } else if self.permissions.contains(AttPermissions::READ_AUTHENTICATED)
            && security_level < SecurityLevel::EncryptionWithAuthentication
        {
            AttError::InsufficientAuthentication
        } else {
            AttError::InsufficientEncryption
        }
    }

    /// Check that a write is allowed, or return the reason it is not
    pub fn check_write(&self, security_level: SecurityLevel) -> AttResult<()> {
        if self.can_write(security_level) {
            return Ok(());
        }

        if !self.permissions.contains(AttPermissions::WRITE) {
            Err(AttError::WriteNotPermitted)
        } else if self.permissions.contains(AttPermissions::WRITE_AUTHENTICATED)
            && security_level < SecurityLevel::EncryptionWithAuthentication
        {
            Err(AttError::InsufficientAuthentication)
        } else {
            Err(AttError::InsufficientEncryption)
        }
    }
}

/// Attribute database
///
/// A plain ordered table; the run loop is the only accessor, so there is no
/// interior locking.
#[derive(Debug, Default)]
pub struct AttributeDatabase {
    attributes: BTreeMap<u16, Attribute>,
    next_handle: u16,
}

impl AttributeDatabase {
    /// Create a new empty attribute database
    pub fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
            next_handle: ATT_HANDLE_MIN,
        }
    }

    /// Add an attribute with the next available handle, returning it
    pub fn push_attribute(
        &mut self,
        attribute_type: Uuid,
        value: Vec<u8>,
        permissions: AttPermissions,
    ) -> AttResult<u16> {
        if self.next_handle == ATT_HANDLE_MAX {
            return Err(AttError::InvalidParameter("attribute table full".into()));
        }

        let handle = self.next_handle;
        self.attributes
            .insert(handle, Attribute::new(handle, attribute_type, value, permissions));
        self.next_handle += 1;

        Ok(handle)
    }

    /// Replace the value of an existing attribute
    pub fn set_value(&mut self, handle: u16, value: Vec<u8>) -> AttResult<()> {
        let attr = self
            .attributes
            .get_mut(&handle)
            .ok_or(AttError::InvalidHandle(handle))?;
        attr.value = value;
        Ok(())
    }

    /// Get an attribute by handle
    pub fn get_attribute(&self, handle: u16) -> AttResult<&Attribute> {
        self.attributes
            .get(&handle)
            .ok_or(AttError::AttributeNotFound)
    }

    /// Check if an attribute exists
    pub fn has_attribute(&self, handle: u16) -> bool {
        self.attributes.contains_key(&handle)
    }

    /// The handle of the last attribute in the table
    pub fn last_handle(&self) -> u16 {
        self.attributes
            .keys()
            .next_back()
            .copied()
            .unwrap_or(ATT_HANDLE_MIN)
    }

    /// Find attribute information (handle + type) in a range
    pub fn find_information(
        &self,
        start_handle: u16,
        end_handle: u16,
    ) -> Vec<(u16, Uuid)> {
        self.attributes
            .range(start_handle..=end_handle)
            .map(|(&handle, attr)| (handle, attr.attribute_type))
            .collect()
    }

    /// Read attributes of the given type in a range
    pub fn read_by_type(
        &self,
        start_handle: u16,
        end_handle: u16,
        attribute_type: &Uuid,
        security_level: SecurityLevel,
    ) -> Vec<(u16, Vec<u8>)> {
        self.attributes
            .range(start_handle..=end_handle)
            .filter(|(_, attr)| attr.attribute_type == *attribute_type)
            .filter_map(|(&handle, attr)| {
                attr.read(security_level).ok().map(|v| (handle, v.to_vec()))
            })
            .collect()
    }

    /// Read an attribute value by handle
    pub fn read_by_handle(
        &self,
        handle: u16,
        security_level: SecurityLevel,
    ) -> AttResult<Vec<u8>> {
        let attr = self
            .attributes
            .get(&handle)
            .ok_or(AttError::InvalidHandle(handle))?;

        Ok(attr.read(security_level)?.to_vec())
    }

    /// Get the handle ranges and values of groups of the given type.
    ///
    /// A group runs from its declaration to the attribute before the next
    /// declaration of the same type, or to the end of the table.
    pub fn get_group_handles(
        &self,
        start_handle: u16,
        end_handle: u16,
        group_type: &Uuid,
        security_level: SecurityLevel,
    ) -> Vec<(u16, u16, Vec<u8>)> {
        let group_starts: Vec<u16> = self
            .attributes
            .values()
            .filter(|attr| attr.attribute_type == *group_type)
            .map(|attr| attr.handle)
            .collect();

        let mut results = Vec::new();
        for (i, &handle) in group_starts.iter().enumerate() {
            if handle < start_handle || handle > end_handle {
                continue;
            }

            let group_end = group_starts
                .get(i + 1)
                .map(|&next| next - 1)
                .unwrap_or_else(|| self.last_handle());

            let attr = &self.attributes[&handle];
            if let Ok(value) = attr.read(security_level) {
                results.push((handle, group_end, value.to_vec()));
            }
        }

        results
    }
}

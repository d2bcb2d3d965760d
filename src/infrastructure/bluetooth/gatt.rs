//! GATT service and characteristic definitions handed to the platform.

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicProperty {
    Read,
    Write,
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributePermission {
    Readable,
    Writeable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDescriptor {
    pub characteristic_id: Uuid,
    pub properties: Vec<CharacteristicProperty>,
    pub permissions: Vec<AttributePermission>,
    pub cached_value: Option<Vec<u8>>,
}

impl CharacteristicDescriptor {
    /// Read + Write + Notify characteristic with no initial value
    pub fn read_write_notify(characteristic_id: Uuid) -> Self {
        Self {
            characteristic_id,
            properties: vec![
                CharacteristicProperty::Read,
                CharacteristicProperty::Write,
                CharacteristicProperty::Notify,
            ],
            permissions: vec![AttributePermission::Readable, AttributePermission::Writeable],
            cached_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub service_id: Uuid,
    pub primary: bool,
    pub characteristics: Vec<CharacteristicDescriptor>,
}

impl ServiceDescriptor {
    pub fn primary(service_id: Uuid, characteristics: Vec<CharacteristicDescriptor>) -> Self {
        Self {
            service_id,
            primary: true,
            characteristics,
        }
    }

    pub fn characteristic(&self, id: Uuid) -> Option<&CharacteristicDescriptor> {
        self.characteristics
            .iter()
            .find(|c| c.characteristic_id == id)
    }

    pub fn characteristic_mut(&mut self, id: Uuid) -> Option<&mut CharacteristicDescriptor> {
        self.characteristics
            .iter_mut()
            .find(|c| c.characteristic_id == id)
    }
}

/// Advertising payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementData {
    pub service_uuids: Vec<Uuid>,
    pub local_name: String,
}

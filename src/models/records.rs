//! Field-service records
//!
//! One struct per table of the relational store. The tables form a tree
//! rooted at clients (client → facility → island → checkup → check item →
//! photo) plus the spare part catalog joined to check items.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{
    CheckItemId, CheckupId, ClientId, ContactId, FacilityId, IslandId, PhotoId, SparePartId,
    SparePartUsageId,
};

/// A row of one of the application tables
pub trait Record {
    /// Table name, also used as the file stem of the table file
    const TABLE: &'static str;

    /// Primary key
    fn key(&self) -> Uuid;
}

macro_rules! impl_record {
    ($ty:ty, $table:literal) => {
        impl Record for $ty {
            const TABLE: &'static str = $table;

            fn key(&self) -> Uuid {
                *self.id.as_uuid()
            }
        }
    };
}

/// A customer owning one or more facilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    #[serde(default)]
    pub vat_number: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Create a new client
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ClientId::new(),
            name: name.into(),
            vat_number: None,
            address: String::new(),
            notes: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// A site belonging to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub client_id: ClientId,
    pub name: String,
    #[serde(default)]
    pub address: String,
}

impl Facility {
    /// Create a new facility for a client
    pub fn new(client_id: ClientId, name: impl Into<String>) -> Self {
        Self {
            id: FacilityId::new(),
            client_id,
            name: name.into(),
            address: String::new(),
        }
    }
}

/// A person to talk to at a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub client_id: ClientId,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Contact {
    /// Create a new contact for a client
    pub fn new(client_id: ClientId, name: impl Into<String>) -> Self {
        Self {
            id: ContactId::new(),
            client_id,
            name: name.into(),
            role: String::new(),
            email: None,
            phone: None,
        }
    }
}

/// An installed machine cell inside a facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Island {
    pub id: IslandId,
    pub facility_id: FacilityId,
    pub serial_number: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub installed_on: Option<NaiveDate>,
}

impl Island {
    /// Create a new island inside a facility
    pub fn new(facility_id: FacilityId, serial_number: impl Into<String>) -> Self {
        Self {
            id: IslandId::new(),
            facility_id,
            serial_number: serial_number.into(),
            model: String::new(),
            installed_on: None,
        }
    }
}

/// Status of a checkup visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckupStatus {
    #[default]
    Draft,
    Completed,
    Exported,
}

/// Header of one checkup visit on an island
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckupHeader {
    pub id: CheckupId,
    pub island_id: IslandId,
    pub technician: String,
    #[serde(default)]
    pub status: CheckupStatus,
    pub performed_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

impl CheckupHeader {
    /// Start a new checkup on an island
    pub fn new(island_id: IslandId, technician: impl Into<String>) -> Self {
        Self {
            id: CheckupId::new(),
            island_id,
            technician: technician.into(),
            status: CheckupStatus::Draft,
            performed_at: Utc::now(),
            notes: String::new(),
        }
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    #[default]
    Pending,
    Ok,
    NotOk,
    NotApplicable,
}

/// One line of a checkup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckItem {
    pub id: CheckItemId,
    pub checkup_id: CheckupId,
    pub description: String,
    #[serde(default)]
    pub outcome: CheckOutcome,
    #[serde(default)]
    pub notes: String,
}

impl CheckItem {
    /// Create a new check item for a checkup
    pub fn new(checkup_id: CheckupId, description: impl Into<String>) -> Self {
        Self {
            id: CheckItemId::new(),
            checkup_id,
            description: description.into(),
            outcome: CheckOutcome::Pending,
            notes: String::new(),
        }
    }
}

/// Metadata of a photo attached to a check item
///
/// The image bytes live in the photo directory under `file_name`; the
/// thumbnail, when present, under `thumbnails/thumb_<file_name>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub check_item_id: CheckItemId,
    pub file_name: String,
    #[serde(default)]
    pub has_thumbnail: bool,
    #[serde(default)]
    pub caption: String,
    pub taken_at: DateTime<Utc>,
}

impl PhotoRecord {
    /// Create a new photo record
    pub fn new(check_item_id: CheckItemId, file_name: impl Into<String>) -> Self {
        Self {
            id: PhotoId::new(),
            check_item_id,
            file_name: file_name.into(),
            has_thumbnail: false,
            caption: String::new(),
            taken_at: Utc::now(),
        }
    }
}

/// A catalog entry for a replaceable part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparePart {
    pub id: SparePartId,
    pub code: String,
    pub name: String,
    /// Unit price in cents
    #[serde(default)]
    pub unit_price: i64,
}

impl SparePart {
    /// Create a new spare part
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: SparePartId::new(),
            code: code.into(),
            name: name.into(),
            unit_price: 0,
        }
    }
}

/// Association between a check item and the spare parts it consumed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparePartUsage {
    pub id: SparePartUsageId,
    pub check_item_id: CheckItemId,
    pub spare_part_id: SparePartId,
    pub quantity: u32,
}

impl SparePartUsage {
    /// Record that a check item used some spare parts
    pub fn new(check_item_id: CheckItemId, spare_part_id: SparePartId, quantity: u32) -> Self {
        Self {
            id: SparePartUsageId::new(),
            check_item_id,
            spare_part_id,
            quantity,
        }
    }
}

impl_record!(Client, "clients");
impl_record!(Facility, "facilities");
impl_record!(Contact, "contacts");
impl_record!(Island, "islands");
impl_record!(CheckupHeader, "checkups");
impl_record!(CheckItem, "check_items");
impl_record!(PhotoRecord, "photos");
impl_record!(SparePart, "spare_parts");
impl_record!(SparePartUsage, "spare_part_usages");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_matches_id() {
        let client = Client::new("ACME");
        assert_eq!(client.key(), *client.id.as_uuid());
        assert_eq!(Client::TABLE, "clients");
    }

    #[test]
    fn test_photo_record_defaults_on_read() {
        let item = CheckItemId::new();
        let json = format!(
            r#"{{"id":"{}","check_item_id":"{}","file_name":"a.jpg","taken_at":"2025-01-01T00:00:00Z"}}"#,
            uuid::Uuid::new_v4(),
            item.as_uuid()
        );
        let photo: PhotoRecord = serde_json::from_str(&json).unwrap();
        assert!(!photo.has_thumbnail);
        assert_eq!(photo.check_item_id, item);
    }
}

// Persistent search request control (draft-ietf-ldapext-psearch-03).

use crate::ber::{Class, Packet, TAG_INTEGER};
use crate::control::Control;
use crate::error::ControlError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CONTROL_OID_PERSISTENT_SEARCH: &str = "2.16.840.1.113730.3.4.3";

/// Kind of entry change a persistent search reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add = 1,
    Delete = 2,
    Modify = 4,
    ModDn = 8,
}

impl ChangeType {
    pub const ALL: [ChangeType; 4] = [ChangeType::Add, ChangeType::Delete, ChangeType::Modify, ChangeType::ModDn];

    /// Bitmask of every change type.
    pub const ANY: u8 = 15;

    pub fn bit(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ChangeType::Add => "add",
            ChangeType::Delete => "delete",
            ChangeType::Modify => "modify",
            ChangeType::ModDn => "moddn",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// Change types set in `mask`, in bit order.
    pub fn from_mask(mask: u8) -> Vec<ChangeType> {
        Self::ALL.into_iter().filter(|t| mask & t.bit() != 0).collect()
    }
}

impl TryFrom<i64> for ChangeType {
    type Error = i64;

    fn try_from(code: i64) -> Result<Self, i64> {
        match code {
            1 => Ok(ChangeType::Add),
            2 => Ok(ChangeType::Delete),
            4 => Ok(ChangeType::Modify),
            8 => Ok(ChangeType::ModDn),
            other => Err(other),
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request to keep a search open and stream later changes.
///
/// PersistentSearch ::= SEQUENCE {
///         changeTypes INTEGER,
///         changesOnly BOOLEAN,
///         returnECs   BOOLEAN }
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentSearch {
    /// Bitmask of [`ChangeType`] values.
    pub change_types: u8,
    pub changes_only: bool,
    /// Ask for an Entry Change Notification on each returned entry
    pub return_ecs: bool,
    pub critical: bool,
}

impl PersistentSearch {
    pub const NAME: &'static str = "Persistent Search";

    /// An empty `change_types` subscribes to every change type. The request
    /// is critical, as a server ignoring it would just run a plain search.
    pub fn new(change_types: &[ChangeType], changes_only: bool, return_ecs: bool) -> Self {
        let mask = if change_types.is_empty() {
            ChangeType::ANY
        } else {
            change_types.iter().fold(0, |mask, t| mask | t.bit())
        };
        Self {
            change_types: mask,
            changes_only,
            return_ecs,
            critical: true,
        }
    }

    pub fn includes(&self, change_type: ChangeType) -> bool {
        self.change_types & change_type.bit() != 0
    }

    pub fn add(&self) -> bool {
        self.includes(ChangeType::Add)
    }

    pub fn delete(&self) -> bool {
        self.includes(ChangeType::Delete)
    }

    pub fn modify(&self) -> bool {
        self.includes(ChangeType::Modify)
    }

    pub fn moddn(&self) -> bool {
        self.includes(ChangeType::ModDn)
    }

    pub fn change_type_list(&self) -> Vec<ChangeType> {
        ChangeType::from_mask(self.change_types)
    }

    pub(crate) fn encode_value(&self) -> Packet {
        Packet::sequence()
            .with_child(Packet::integer(Class::Universal, TAG_INTEGER, self.change_types as i64))
            .with_child(Packet::boolean(self.changes_only))
            .with_child(Packet::boolean(self.return_ecs))
    }
}

pub fn decode_persistent_search(
    _oid: &str,
    criticality: bool,
    value: Option<&Packet>,
) -> Result<Control, ControlError> {
    let value = value.ok_or(ControlError::MissingControlValue)?;
    let (types, changes_only, return_ecs) = match value.children() {
        [types, changes_only, return_ecs] if value.constructed => (types, changes_only, return_ecs),
        _ => return Err(ControlError::InvalidControlValue),
    };
    let types = types.as_i64().ok_or(ControlError::InvalidControlValue)?;
    let change_types = u8::try_from(types)
        .ok()
        .filter(|mask| *mask <= ChangeType::ANY)
        .ok_or_else(|| ControlError::field("change_types", format!("mask {} out of range", types)))?;

    Ok(Control::PersistentSearch(PersistentSearch {
        change_types,
        changes_only: changes_only.as_bool().ok_or(ControlError::InvalidControlValue)?,
        return_ecs: return_ecs.as_bool().ok_or(ControlError::InvalidControlValue)?,
        critical: criticality,
    }))
}

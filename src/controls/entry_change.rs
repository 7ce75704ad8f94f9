// Entry change notification response control (draft-ietf-ldapext-psearch-03),
// attached to entries returned by a persistent search.

use super::persistent_search::ChangeType;
use crate::ber::{Class, Packet, TAG_ENUMERATED, TAG_INTEGER, TAG_OCTET_STRING};
use crate::control::Control;
use crate::error::ControlError;
use serde::{Deserialize, Serialize};

pub const CONTROL_OID_ENTRY_CHANGE_NOTIFICATION: &str = "2.16.840.1.113730.3.4.7";

/// EntryChangeNotification ::= SEQUENCE {
///         changeType   ENUMERATED { add (1), delete (2), modify (4), modDN (8) },
///         previousDN   LDAPDN OPTIONAL,
///         changeNumber INTEGER OPTIONAL }
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryChangeNotification {
    pub change_type: ChangeType,
    /// DN before a modDN operation
    pub previous_dn: Option<String>,
    pub change_number: Option<i64>,
    pub critical: bool,
}

impl EntryChangeNotification {
    pub const NAME: &'static str = "Entry Change Notification";

    pub fn new(change_type: ChangeType) -> Self {
        Self {
            change_type,
            previous_dn: None,
            change_number: None,
            critical: false,
        }
    }

    pub(crate) fn encode_value(&self) -> Packet {
        let mut value = Packet::sequence().with_child(Packet::integer(
            Class::Universal,
            TAG_ENUMERATED,
            self.change_type.bit() as i64,
        ));
        if let Some(dn) = &self.previous_dn {
            value.push(Packet::string(dn));
        }
        if let Some(number) = self.change_number {
            value.push(Packet::integer(Class::Universal, TAG_INTEGER, number));
        }
        value
    }
}

/// The change type may come as ENUMERATED or INTEGER; the optional fields
/// must keep their order.
pub fn decode_entry_change_notification(
    _oid: &str,
    criticality: bool,
    value: Option<&Packet>,
) -> Result<Control, ControlError> {
    let value = value.ok_or(ControlError::MissingControlValue)?;
    if !value.constructed || value.children().len() > 3 {
        return Err(ControlError::InvalidControlValue);
    }
    let (change_type, rest) = value.children().split_first().ok_or(ControlError::InvalidControlValue)?;
    let code = change_type.as_i64().ok_or(ControlError::InvalidControlValue)?;
    let change_type = ChangeType::try_from(code)
        .map_err(|code| ControlError::field("change_type", format!("unknown change type {}", code)))?;

    let mut ctrl = EntryChangeNotification {
        critical: criticality,
        ..EntryChangeNotification::new(change_type)
    };
    for child in rest {
        if child.class != Class::Universal || child.constructed {
            return Err(ControlError::UnexpectedTag {
                context: "entry change notification",
                tag: child.tag,
            });
        }
        match child.tag {
            TAG_OCTET_STRING if ctrl.previous_dn.is_none() && ctrl.change_number.is_none() => {
                let dn = std::str::from_utf8(child.data()).map_err(|e| ControlError::field("previous_dn", e))?;
                ctrl.previous_dn = Some(dn.to_string());
            }
            TAG_INTEGER if ctrl.change_number.is_none() => {
                ctrl.change_number = Some(child.as_i64().ok_or(ControlError::InvalidControlValue)?);
            }
            TAG_OCTET_STRING | TAG_INTEGER => return Err(ControlError::InvalidControlValue),
            tag => {
                return Err(ControlError::UnexpectedTag {
                    context: "entry change notification",
                    tag,
                })
            }
        }
    }
    Ok(Control::EntryChangeNotification(ctrl))
}

// RFC 4527 Read Entry controls.
//
// Request value:  AttributeSelection ::= SEQUENCE OF selector LDAPString
// Response value: OCTET STRING containing a SearchResultEntry-like
//   SEQUENCE { objectName LDAPDN, attributes SEQUENCE OF PartialAttribute }
//
// Whether a value is a request or a result is decided by its tag alone.

use crate::ber::{Packet, TAG_OCTET_STRING, TAG_SEQUENCE};
use crate::control::Control;
use crate::error::ControlError;
use serde::{Deserialize, Serialize};

pub const CONTROL_OID_PRE_READ: &str = "1.3.6.1.1.13.1";
pub const CONTROL_OID_POST_READ: &str = "1.3.6.1.1.13.2";

/// Entry state before or after the update. Only selects the OID and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadKind {
    Pre,
    Post,
}

impl ReadKind {
    pub fn oid(self) -> &'static str {
        match self {
            ReadKind::Pre => CONTROL_OID_PRE_READ,
            ReadKind::Post => CONTROL_OID_POST_READ,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReadKind::Pre => "Pre Read - RFC 4527",
            ReadKind::Post => "Post Read - RFC 4527",
        }
    }

    pub fn from_oid(oid: &str) -> Option<Self> {
        match oid {
            CONTROL_OID_PRE_READ => Some(ReadKind::Pre),
            CONTROL_OID_POST_READ => Some(ReadKind::Post),
            _ => None,
        }
    }
}

/// One attribute of a read result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeSelection {
    #[serde(rename = "type")]
    pub attr_type: String,
    pub values: Vec<String>,
}

impl AttributeSelection {
    pub fn new(attr_type: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            attr_type: attr_type.into(),
            values,
        }
    }
}

/// Pre/Post Read request or result.
///
/// `is_request` picks the encoded shape: `attrs` for a request, `dn` and
/// `attr_vals` for a result. Keeping the other fields empty is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrePostRead {
    pub kind: ReadKind,
    pub is_request: bool,
    pub critical: bool,
    pub attrs: Vec<String>,
    pub dn: String,
    pub attr_vals: Vec<AttributeSelection>,
}

impl PrePostRead {
    pub fn request(kind: ReadKind, critical: bool, attrs: Vec<String>) -> Self {
        Self {
            kind,
            is_request: true,
            critical,
            attrs,
            dn: String::new(),
            attr_vals: Vec::new(),
        }
    }

    pub fn result(kind: ReadKind, critical: bool, dn: impl Into<String>, attr_vals: Vec<AttributeSelection>) -> Self {
        Self {
            kind,
            is_request: false,
            critical,
            attrs: Vec::new(),
            dn: dn.into(),
            attr_vals,
        }
    }

    pub fn pre_read_request(critical: bool, attrs: Vec<String>) -> Self {
        Self::request(ReadKind::Pre, critical, attrs)
    }

    pub fn pre_read_result(critical: bool, dn: impl Into<String>, attr_vals: Vec<AttributeSelection>) -> Self {
        Self::result(ReadKind::Pre, critical, dn, attr_vals)
    }

    pub fn post_read_request(critical: bool, attrs: Vec<String>) -> Self {
        Self::request(ReadKind::Post, critical, attrs)
    }

    pub fn post_read_result(critical: bool, dn: impl Into<String>, attr_vals: Vec<AttributeSelection>) -> Self {
        Self::result(ReadKind::Post, critical, dn, attr_vals)
    }

    pub(crate) fn encode_value(&self) -> Packet {
        if self.is_request {
            let mut value = Packet::sequence();
            for attr in &self.attrs {
                value.push(Packet::string(attr));
            }
            return value;
        }

        let mut attributes = Packet::sequence();
        for selection in &self.attr_vals {
            let mut values = Packet::sequence();
            for v in &selection.values {
                values.push(Packet::string(v));
            }
            attributes.push(
                Packet::sequence()
                    .with_child(Packet::string(&selection.attr_type))
                    .with_child(values),
            );
        }
        let entry = Packet::sequence()
            .with_child(Packet::string(&self.dn))
            .with_child(attributes);
        Packet::octet_string(entry.to_bytes())
    }
}

fn string_child(packet: Option<&Packet>) -> Result<String, ControlError> {
    packet
        .and_then(Packet::as_str)
        .map(str::to_string)
        .ok_or(ControlError::InvalidControlValue)
}

fn decode_attribute(packet: &Packet) -> Result<AttributeSelection, ControlError> {
    let attr_type = string_child(packet.child(0))?;
    let values = packet
        .child(1)
        .ok_or(ControlError::InvalidControlValue)?
        .children()
        .iter()
        .map(|v| string_child(Some(v)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(AttributeSelection { attr_type, values })
}

/// Handles both read OIDs.
pub fn decode_pre_post_read(oid: &str, criticality: bool, value: Option<&Packet>) -> Result<Control, ControlError> {
    let kind = ReadKind::from_oid(oid).ok_or_else(|| ControlError::UnsupportedOid {
        decoder: "pre/post read",
        oid: oid.to_string(),
    })?;
    let value = value.ok_or(ControlError::MissingControlValue)?;

    let read = match value.tag {
        TAG_SEQUENCE => {
            let attrs = value
                .children()
                .iter()
                .map(|c| string_child(Some(c)))
                .collect::<Result<Vec<_>, _>>()?;
            PrePostRead::request(kind, criticality, attrs)
        }
        TAG_OCTET_STRING => {
            let entry = Packet::from_bytes(&value.content())?;
            let dn = string_child(entry.child(0))?;
            let attr_vals = entry
                .child(1)
                .ok_or(ControlError::InvalidControlValue)?
                .children()
                .iter()
                .map(decode_attribute)
                .collect::<Result<Vec<_>, _>>()?;
            PrePostRead::result(kind, criticality, dn, attr_vals)
        }
        tag => {
            return Err(ControlError::UnexpectedTag {
                context: "pre/post read value",
                tag,
            })
        }
    };
    Ok(Control::PrePostRead(read))
}

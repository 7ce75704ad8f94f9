use crate::ber::{Class, Packet, TAG_INTEGER};
use crate::control::Control;
use crate::error::ControlError;
use serde::{Deserialize, Serialize};

/// RFC 2696 Simple Paged Results control OID
pub const CONTROL_OID_PAGING: &str = "1.2.840.113556.1.4.319";

/// Paged results request/response.
///
/// realSearchControlValue ::= SEQUENCE {
///         size            INTEGER (0..maxInt),
///         cookie          OCTET STRING }
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Paging {
    pub critical: bool,
    pub size: u32,
    /// Opaque server cookie; echo it back verbatim. Empty means no more pages.
    pub cookie: Vec<u8>,
}

impl Paging {
    pub const NAME: &'static str = "Paging";

    pub fn new(size: u32) -> Self {
        Self {
            critical: false,
            size,
            cookie: Vec::new(),
        }
    }

    pub fn set_cookie(&mut self, cookie: impl Into<Vec<u8>>) {
        self.cookie = cookie.into();
    }

    pub(crate) fn encode_value(&self) -> Packet {
        Packet::sequence()
            .with_child(Packet::integer(Class::Universal, TAG_INTEGER, self.size as i64))
            .with_child(Packet::octet_string(self.cookie.clone()))
    }
}

pub fn decode_paging(_oid: &str, criticality: bool, value: Option<&Packet>) -> Result<Control, ControlError> {
    let value = value.ok_or(ControlError::MissingControlValue)?;
    let (size, cookie) = match value.children() {
        [size, cookie] => (size, cookie),
        _ => return Err(ControlError::InvalidControlValue),
    };
    let size = size.as_i64().ok_or(ControlError::InvalidControlValue)?;
    let size = u32::try_from(size).map_err(|_| ControlError::InvalidControlValue)?;

    Ok(Control::Paging(Paging {
        critical: criticality,
        size,
        cookie: cookie.content(),
    }))
}

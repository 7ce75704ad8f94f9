// Netscape/VChu password policy response controls
// (draft-vchu-ldap-pwd-policy-00). Neither is ever critical.

use crate::ber::{Packet, TAG_OCTET_STRING};
use crate::control::Control;
use crate::error::ControlError;
use serde::{Deserialize, Serialize};

pub const CONTROL_OID_VCHU_PASSWORD_MUST_CHANGE: &str = "2.16.840.1.113730.3.4.4";
pub const CONTROL_OID_VCHU_PASSWORD_WARNING: &str = "2.16.840.1.113730.3.4.5";

/// Password must be changed. Presence alone carries the meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VChuPasswordMustChange(pub bool);

impl VChuPasswordMustChange {
    pub const NAME: &'static str = "VChu Password Policy - Password Must Change";

    pub(crate) fn encode_value(&self) -> Packet {
        Packet::sequence().with_child(Packet::string("0"))
    }
}

/// Password expires in the given number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VChuPasswordWarning(pub i64);

impl VChuPasswordWarning {
    pub const NAME: &'static str = "VChu Password Policy - Password Expires";

    pub fn expire_seconds(&self) -> i64 {
        self.0
    }

    /// The expiry travels as a decimal string, not a BER INTEGER.
    pub(crate) fn encode_value(&self) -> Packet {
        Packet::sequence().with_child(Packet::string(&self.0.to_string()))
    }
}

/// Handles both VChu OIDs.
pub fn decode_vchu_password(oid: &str, _criticality: bool, value: Option<&Packet>) -> Result<Control, ControlError> {
    match oid {
        CONTROL_OID_VCHU_PASSWORD_MUST_CHANGE => Ok(Control::VChuPasswordMustChange(VChuPasswordMustChange(true))),
        CONTROL_OID_VCHU_PASSWORD_WARNING => {
            let value = value.ok_or(ControlError::MissingControlValue)?;
            // Accept the value either wrapped in a SEQUENCE or as a bare OCTET STRING
            let expire = if value.constructed { value.child(0) } else { Some(value) };
            let expire = expire
                .filter(|p| p.tag == TAG_OCTET_STRING && !p.constructed)
                .ok_or(ControlError::InvalidControlValue)?;
            let text = std::str::from_utf8(expire.data()).map_err(|e| ControlError::field("expire", e))?;
            let seconds = text
                .parse::<i64>()
                .map_err(|e| ControlError::field("expire", format!("{:?}: {}", text, e)))?;
            Ok(Control::VChuPasswordWarning(VChuPasswordWarning(seconds)))
        }
        other => Err(ControlError::UnsupportedOid {
            decoder: "vchu password",
            oid: other.to_string(),
        }),
    }
}

use crate::ber::Packet;
use crate::control::Control;
use crate::error::ControlError;
use serde::{Deserialize, Serialize};

/// RFC 3296 ManageDsaIT control OID
pub const CONTROL_OID_MANAGE_DSA_IT: &str = "2.16.840.1.113730.3.4.2";

/// ManageDsaIT carries no value; the flag is the control's criticality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManageDsaIT(pub bool);

impl ManageDsaIT {
    pub const NAME: &'static str = "Manage DSA IT";
}

/// Criticality observed on the wire becomes the flag. Any value is ignored.
pub fn decode_manage_dsa_it(
    _oid: &str,
    criticality: bool,
    _value: Option<&Packet>,
) -> Result<Control, ControlError> {
    Ok(Control::ManageDsaIT(ManageDsaIT(criticality)))
}

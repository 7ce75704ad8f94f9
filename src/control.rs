// LDAP Control envelope and the Control value type.
//
// Control ::= SEQUENCE {
//      controlType     LDAPOID,
//      criticality     BOOLEAN DEFAULT FALSE,
//      controlValue    OPTIONAL }

use crate::ber::{Class, Packet, TAG_SEQUENCE};
use crate::controls::{
    BeheraPasswordPolicy, EntryChangeNotification, ManageDsaIT, Paging, PersistentSearch, PrePostRead,
    ProxiedAuthorization, VChuPasswordMustChange, VChuPasswordWarning,
};
use crate::error::ControlError;
use crate::registry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Context [0] constructed wrapper holding the controls of an LDAPMessage.
pub const CONTROLS_TAG: u8 = 0;

/// A decoded (or to-be-encoded) LDAP control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    ManageDsaIT(ManageDsaIT),
    Paging(Paging),
    BeheraPasswordPolicy(BeheraPasswordPolicy),
    ProxiedAuthorization(ProxiedAuthorization),
    VChuPasswordMustChange(VChuPasswordMustChange),
    VChuPasswordWarning(VChuPasswordWarning),
    PrePostRead(PrePostRead),
    PersistentSearch(PersistentSearch),
    EntryChangeNotification(EntryChangeNotification),
    /// Carried through untyped by an extension decoder; re-encodes as received.
    Opaque(OpaqueControl),
    /// No decoder was registered for the OID.
    Unknown(UnknownControl),
}

impl Control {
    pub fn oid(&self) -> &str {
        match self {
            Control::ManageDsaIT(_) => crate::controls::CONTROL_OID_MANAGE_DSA_IT,
            Control::Paging(_) => crate::controls::CONTROL_OID_PAGING,
            Control::BeheraPasswordPolicy(_) => crate::controls::CONTROL_OID_BEHERA_PASSWORD_POLICY,
            Control::ProxiedAuthorization(_) => crate::controls::CONTROL_OID_PROXIED_AUTHORIZATION,
            Control::VChuPasswordMustChange(_) => crate::controls::CONTROL_OID_VCHU_PASSWORD_MUST_CHANGE,
            Control::VChuPasswordWarning(_) => crate::controls::CONTROL_OID_VCHU_PASSWORD_WARNING,
            Control::PrePostRead(c) => c.kind.oid(),
            Control::PersistentSearch(_) => crate::controls::CONTROL_OID_PERSISTENT_SEARCH,
            Control::EntryChangeNotification(_) => crate::controls::CONTROL_OID_ENTRY_CHANGE_NOTIFICATION,
            Control::Opaque(c) => &c.oid,
            Control::Unknown(c) => &c.oid,
        }
    }

    pub fn criticality(&self) -> bool {
        match self {
            Control::ManageDsaIT(c) => c.0,
            Control::Paging(c) => c.critical,
            Control::BeheraPasswordPolicy(c) => c.critical,
            Control::ProxiedAuthorization(c) => c.critical,
            // The VChu controls are never critical
            Control::VChuPasswordMustChange(_) | Control::VChuPasswordWarning(_) => false,
            Control::PrePostRead(c) => c.critical,
            Control::PersistentSearch(c) => c.critical,
            Control::EntryChangeNotification(c) => c.critical,
            Control::Opaque(c) => c.critical,
            Control::Unknown(c) => c.critical,
        }
    }

    /// Human-readable label; never sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Control::ManageDsaIT(_) => ManageDsaIT::NAME,
            Control::Paging(_) => Paging::NAME,
            Control::BeheraPasswordPolicy(_) => BeheraPasswordPolicy::NAME,
            Control::ProxiedAuthorization(_) => ProxiedAuthorization::NAME,
            Control::VChuPasswordMustChange(_) => VChuPasswordMustChange::NAME,
            Control::VChuPasswordWarning(_) => VChuPasswordWarning::NAME,
            Control::PrePostRead(c) => c.kind.name(),
            Control::PersistentSearch(_) => PersistentSearch::NAME,
            Control::EntryChangeNotification(_) => EntryChangeNotification::NAME,
            Control::Opaque(_) => OpaqueControl::NAME,
            Control::Unknown(_) => UnknownControl::NAME,
        }
    }

    /// The controlValue element, if this control carries one.
    pub fn value(&self) -> Option<Packet> {
        match self {
            Control::ManageDsaIT(_) => None,
            Control::Paging(c) => Some(c.encode_value()),
            Control::BeheraPasswordPolicy(c) => c.encode_value(),
            Control::ProxiedAuthorization(c) => Some(c.encode_value()),
            Control::VChuPasswordMustChange(c) => Some(c.encode_value()),
            Control::VChuPasswordWarning(c) => Some(c.encode_value()),
            Control::PrePostRead(c) => Some(c.encode_value()),
            Control::PersistentSearch(c) => Some(c.encode_value()),
            Control::EntryChangeNotification(c) => Some(c.encode_value()),
            Control::Opaque(c) => c.value.clone(),
            Control::Unknown(_) => None,
        }
    }

    /// Encodes the full envelope. Returns `None` for [`Control::Unknown`], which
    /// has no wire representation of its own.
    pub fn encode(&self) -> Option<Packet> {
        if let Control::Unknown(_) = self {
            return None;
        }
        Some(encode_envelope(self.oid(), self.criticality(), self.value()))
    }
}

/// One-line summary for logs and the CLI, e.g.
/// `Control Type: Paging (1.2.840.113556.1.4.319), Criticality: false, Size: 100, Cookie: ""`.
impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Control Type: {} ({}), Criticality: {}",
            self.name(),
            self.oid(),
            self.criticality()
        )?;
        match self {
            Control::ManageDsaIT(_) | Control::VChuPasswordMustChange(_) | Control::Unknown(_) => Ok(()),
            Control::Paging(c) => write!(f, ", Size: {}, Cookie: {:?}", c.size, hex::encode(&c.cookie)),
            Control::BeheraPasswordPolicy(c) => write!(
                f,
                ", Expire: {}, Grace: {}, Error: {}, ErrorString: {:?}",
                c.expire,
                c.grace,
                c.error,
                c.error_string()
            ),
            Control::ProxiedAuthorization(c) => write!(f, ", AuthzId: {:?}", c.authz_id),
            Control::VChuPasswordWarning(c) => write!(f, ", Expire: {}", c.expire_seconds()),
            Control::PrePostRead(c) if c.is_request => write!(f, ", Attributes: [{}]", c.attrs.join(", ")),
            Control::PrePostRead(c) => {
                write!(f, ", DN: {:?}", c.dn)?;
                for attr in &c.attr_vals {
                    write!(f, ", {}: [{}]", attr.attr_type, attr.values.join(", "))?;
                }
                Ok(())
            }
            Control::PersistentSearch(c) => {
                let types: Vec<&str> = c.change_type_list().iter().map(|t| t.name()).collect();
                write!(
                    f,
                    ", Change Types: [{}], Changes Only: {}, Return ECs: {}",
                    types.join(", "),
                    c.changes_only,
                    c.return_ecs
                )
            }
            Control::EntryChangeNotification(c) => {
                write!(f, ", Change Type: {}", c.change_type)?;
                if let Some(dn) = &c.previous_dn {
                    write!(f, ", Previous DN: {:?}", dn)?;
                }
                if let Some(number) = c.change_number {
                    write!(f, ", Change Number: {}", number)?;
                }
                Ok(())
            }
            Control::Opaque(c) => match &c.value {
                Some(value) => write!(f, ", Value: {}", hex::encode(value.to_bytes())),
                None => Ok(()),
            },
        }
    }
}

macro_rules! impl_from_variant {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Control {
                fn from(c: $ty) -> Self {
                    Control::$variant(c)
                }
            }
        )*
    };
}

impl_from_variant! {
    ManageDsaIT => ManageDsaIT,
    Paging => Paging,
    BeheraPasswordPolicy => BeheraPasswordPolicy,
    ProxiedAuthorization => ProxiedAuthorization,
    VChuPasswordMustChange => VChuPasswordMustChange,
    VChuPasswordWarning => VChuPasswordWarning,
    PrePostRead => PrePostRead,
    PersistentSearch => PersistentSearch,
    EntryChangeNotification => EntryChangeNotification,
    OpaqueControl => Opaque,
    UnknownControl => Unknown,
}

/// Control seen on the wire without a registered decoder. Lets callers find
/// unknown controls marked critical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownControl {
    pub oid: String,
    pub critical: bool,
}

impl UnknownControl {
    pub const NAME: &'static str = "unknown";

    pub fn new(oid: impl Into<String>, critical: bool) -> Self {
        Self {
            oid: oid.into(),
            critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueControl {
    pub oid: String,
    pub critical: bool,
    pub value: Option<Packet>,
}

impl OpaqueControl {
    pub const NAME: &'static str = "opaque";
}

/// Transient view of a decoded envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub oid: &'a str,
    pub criticality: bool,
    pub value: Option<&'a Packet>,
}

/// Builds the envelope. Criticality is only written when true and the value
/// only when present; both absences are meaningful on the wire.
pub fn encode_envelope(oid: &str, criticality: bool, value: Option<Packet>) -> Packet {
    let mut packet = Packet::sequence().with_child(Packet::string(oid));
    if criticality {
        packet.push(Packet::boolean(true));
    }
    if let Some(value) = value {
        packet.push(value);
    }
    packet
}

/// Splits an envelope into OID, criticality and value.
///
/// With two children the second one is ambiguous: if it parses as a BOOLEAN it
/// is taken as the criticality, otherwise as the value. A value that happens to
/// be a universal BOOLEAN is therefore read as criticality.
pub fn parse_envelope(packet: &Packet) -> Result<Envelope<'_>, ControlError> {
    if !packet.constructed || packet.tag != TAG_SEQUENCE {
        return Err(ControlError::InvalidControlData);
    }
    let children = packet.children();
    let oid = match children.first() {
        Some(first) if children.len() <= 3 => first.as_str().ok_or(ControlError::InvalidControlData)?,
        _ => return Err(ControlError::InvalidControlData),
    };

    let (criticality, value) = match children {
        [_] => (false, None),
        [_, second] => match second.as_bool() {
            Some(crit) => (crit, None),
            None => (false, Some(second)),
        },
        [_, second, third] => {
            let crit = second.as_bool().ok_or(ControlError::InvalidControlData)?;
            (crit, Some(third))
        }
        _ => return Err(ControlError::InvalidControlData),
    };

    Ok(Envelope {
        oid,
        criticality,
        value,
    })
}

/// Decodes an envelope with the process-wide registry.
pub fn decode_control(packet: &Packet) -> Result<Control, ControlError> {
    registry::global().decode(packet)
}

/// Decodes a Controls wrapper with the process-wide registry.
pub fn decode_controls(packet: &Packet) -> Result<Vec<Control>, ControlError> {
    registry::global().decode_controls(packet)
}

/// Builds the context [0] Controls wrapper. Unknown controls are skipped.
pub fn encode_controls(controls: &[Control]) -> Packet {
    let mut wrapper = Packet::constructed(Class::Context, CONTROLS_TAG);
    for packet in controls.iter().filter_map(Control::encode) {
        wrapper.push(packet);
    }
    wrapper
}

/// First control with the given OID.
pub fn find_control<'a>(controls: &'a [Control], oid: &str) -> Option<&'a Control> {
    controls.iter().find(|c| c.oid() == oid)
}

/// Name of the built-in control type for `oid`.
pub fn control_name(oid: &str) -> Option<&'static str> {
    use crate::controls::*;

    let name = match oid {
        CONTROL_OID_MANAGE_DSA_IT => ManageDsaIT::NAME,
        CONTROL_OID_PAGING => Paging::NAME,
        CONTROL_OID_BEHERA_PASSWORD_POLICY => BeheraPasswordPolicy::NAME,
        CONTROL_OID_PROXIED_AUTHORIZATION => ProxiedAuthorization::NAME,
        CONTROL_OID_VCHU_PASSWORD_MUST_CHANGE => VChuPasswordMustChange::NAME,
        CONTROL_OID_VCHU_PASSWORD_WARNING => VChuPasswordWarning::NAME,
        CONTROL_OID_PERSISTENT_SEARCH => PersistentSearch::NAME,
        CONTROL_OID_ENTRY_CHANGE_NOTIFICATION => EntryChangeNotification::NAME,
        _ => return crate::controls::ReadKind::from_oid(oid).map(|k| k.name()),
    };
    Some(name)
}

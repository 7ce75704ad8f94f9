// Bridge to ldap3's RawControl, so controls can be attached to ldap3
// operations and response controls decoded through a registry.
//
// RawControl carries the controlValue OCTET STRING content as bytes. Here
// those bytes are the serialized value node.

use crate::ber::{Packet, TAG_OCTET_STRING};
use crate::control::Control;
use crate::controls::CONTROL_OID_PROXIED_AUTHORIZATION;
use crate::error::ControlError;
use crate::registry::ControlRegistry;
use ldap3::controls::RawControl;
use tracing::debug;

/// Converts a control into ldap3's representation. `None` for unknown controls.
pub fn to_raw_control(control: &Control) -> Option<RawControl> {
    if let Control::Unknown(_) = control {
        return None;
    }
    Some(RawControl {
        ctype: control.oid().to_string(),
        crit: control.criticality(),
        val: control.value().map(|v| v.to_bytes()),
    })
}

/// Converts a list of controls, dropping unknown ones.
pub fn to_raw_controls(controls: &[Control]) -> Vec<RawControl> {
    controls.iter().filter_map(to_raw_control).collect()
}

// RFC 4370 puts the authzId itself in the value, with no BER framing, and
// that is what ldap3's ProxyAuth sends. The bytes are only read as a packet
// when they are exactly the wrapped form `ProxiedAuthorization` emits.
fn proxied_authz_value(bytes: &[u8]) -> Packet {
    let wrapped = Packet::from_bytes(bytes).ok().filter(|packet| {
        packet.is_universal(TAG_OCTET_STRING)
            && packet.constructed
            && matches!(packet.children(), [inner] if inner.is_universal(TAG_OCTET_STRING) && !inner.constructed)
            && packet.to_bytes() == bytes
    });
    wrapped.unwrap_or_else(|| Packet::octet_string(bytes.to_vec()))
}

// Other values are a single BER element. Anything else is kept as the raw
// OCTET STRING the controlValue is on the wire.
fn value_packet(oid: &str, bytes: &[u8]) -> Packet {
    if oid == CONTROL_OID_PROXIED_AUTHORIZATION {
        return proxied_authz_value(bytes);
    }
    match Packet::from_bytes(bytes) {
        Ok(packet) => packet,
        Err(e) => {
            debug!("Value of control {} is not a BER element ({}), keeping raw bytes", oid, e);
            Packet::octet_string(bytes.to_vec())
        }
    }
}

impl ControlRegistry {
    /// Decodes an ldap3 response control with this registry's decoders.
    pub fn decode_raw(&self, raw: &RawControl) -> Result<Control, ControlError> {
        let value = raw.val.as_deref().map(|bytes| value_packet(&raw.ctype, bytes));
        self.dispatch(&raw.ctype, raw.crit, value.as_ref())
    }
}

/// Decodes an ldap3 control with the process-wide registry.
pub fn from_raw_control(raw: &RawControl) -> Result<Control, ControlError> {
    crate::registry::global().decode_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::UnknownControl;
    use crate::controls::{ManageDsaIT, Paging, ProxiedAuthorization, CONTROL_OID_PAGING};
    use ldap3::controls::{PagedResults, ProxyAuth};

    #[test]
    fn test_to_raw_control_paging() {
        let raw = to_raw_control(&Control::from(Paging::new(100))).unwrap();
        assert_eq!(raw.ctype, CONTROL_OID_PAGING);
        assert!(!raw.crit);
        // SEQUENCE { INTEGER 100, OCTET STRING "" }
        assert_eq!(raw.val, Some(vec![0x30, 0x05, 0x02, 0x01, 0x64, 0x04, 0x00]));
    }

    #[test]
    fn test_to_raw_control_without_value() {
        let raw = to_raw_control(&Control::from(ManageDsaIT(true))).unwrap();
        assert!(raw.crit);
        assert!(raw.val.is_none());
        assert!(to_raw_control(&Control::from(UnknownControl::new("1.2.3", true))).is_none());
    }

    #[test]
    fn test_decode_ldap3_paged_results() {
        let raw: RawControl = PagedResults {
            size: 100,
            cookie: vec![],
        }
        .into();
        let registry = ControlRegistry::new();
        let control = registry.decode_raw(&raw).unwrap();
        assert_eq!(control, Control::Paging(Paging::new(100)));
    }

    #[test]
    fn test_decode_raw_roundtrip() {
        let registry = ControlRegistry::new();
        let original = Control::from(ProxiedAuthorization::new("dn:cn=admin"));
        let raw = to_raw_control(&original).unwrap();
        assert_eq!(registry.decode_raw(&raw).unwrap(), original);
    }

    #[test]
    fn test_decode_raw_plain_bytes_value() {
        // RFC 4370 value: the authzId itself, no BER framing
        let raw = RawControl {
            ctype: CONTROL_OID_PROXIED_AUTHORIZATION.to_string(),
            crit: true,
            val: Some(b"u:bob".to_vec()),
        };
        let control = ControlRegistry::new().decode_raw(&raw).unwrap();
        assert_eq!(control, Control::ProxiedAuthorization(ProxiedAuthorization::new("u:bob")));
    }

    #[test]
    fn test_decode_ldap3_proxy_auth_keeps_identity() {
        // "u:" reads as [APPLICATION 21] with length 58, so the whole identity
        // is also a well-formed BER element
        let authzid = format!("u:A8{}", "x".repeat(56));
        let raw: RawControl = ProxyAuth {
            authzid: authzid.clone(),
        }
        .into();
        assert!(Packet::from_bytes(raw.val.as_deref().unwrap()).is_ok());

        match ControlRegistry::new().decode_raw(&raw).unwrap() {
            Control::ProxiedAuthorization(p) => assert_eq!(p.authz_id, authzid),
            other => panic!("expected ProxiedAuthorization, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_raw_proxied_authz_lookalike_wrapper() {
        // Constructed OCTET STRING holding a SEQUENCE is not the wrapped form
        let bytes = vec![0x24, 0x02, 0x30, 0x00];
        let raw = RawControl {
            ctype: CONTROL_OID_PROXIED_AUTHORIZATION.to_string(),
            crit: true,
            val: Some(bytes.clone()),
        };
        match ControlRegistry::new().decode_raw(&raw).unwrap() {
            Control::ProxiedAuthorization(p) => assert_eq!(p.authz_id.as_bytes(), &bytes[..]),
            other => panic!("expected ProxiedAuthorization, got {:?}", other),
        }
    }

    #[test]
    fn test_to_raw_controls_skips_unknown() {
        let controls = vec![
            Control::from(ManageDsaIT(false)),
            Control::from(UnknownControl::new("1.2.3", true)),
            Control::from(Paging::new(5)),
        ];
        let raw = to_raw_controls(&controls);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].ctype, "2.16.840.1.113730.3.4.2");
        assert_eq!(raw[1].ctype, CONTROL_OID_PAGING);
    }

    #[test]
    fn test_from_raw_control_uses_global_registry() {
        let controls = vec![Control::from(Paging::new(42)), Control::from(ManageDsaIT(true))];
        let decoded: Vec<Control> = to_raw_controls(&controls)
            .iter()
            .map(from_raw_control)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(decoded, controls);
    }

    #[test]
    fn test_decode_raw_unknown() {
        let raw = RawControl {
            ctype: "1.2.3".to_string(),
            crit: true,
            val: None,
        };
        assert_eq!(
            ControlRegistry::new().decode_raw(&raw).unwrap(),
            Control::Unknown(UnknownControl::new("1.2.3", true))
        );
    }
}

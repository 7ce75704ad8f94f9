use crate::ber::{Class, Packet, TAG_OCTET_STRING};
use crate::control::Control;
use crate::error::ControlError;
use serde::{Deserialize, Serialize};

/// RFC 4370 Proxied Authorization control OID
pub const CONTROL_OID_PROXIED_AUTHORIZATION: &str = "2.16.840.1.113730.3.4.18";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxiedAuthorization {
    pub critical: bool,
    /// Identity to act as, e.g. "dn:uid=someone,dc=example,dc=org"
    pub authz_id: String,
}

impl ProxiedAuthorization {
    pub const NAME: &'static str = "Proxied Authorization";

    /// RFC 4370 requires the control to be critical.
    pub fn new(authz_id: impl Into<String>) -> Self {
        Self {
            critical: true,
            authz_id: authz_id.into(),
        }
    }

    /// Constructed OCTET STRING wrapping one primitive OCTET STRING.
    pub(crate) fn encode_value(&self) -> Packet {
        Packet::constructed(Class::Universal, TAG_OCTET_STRING).with_child(Packet::string(&self.authz_id))
    }
}

pub fn decode_proxied_authorization(
    _oid: &str,
    criticality: bool,
    value: Option<&Packet>,
) -> Result<Control, ControlError> {
    let value = value.ok_or(ControlError::MissingControlValue)?;
    let raw = match value.children() {
        [inner] if inner.is_universal(TAG_OCTET_STRING) && !inner.constructed => inner.data().to_vec(),
        _ => value.content(),
    };
    let authz_id = String::from_utf8(raw).map_err(|e| ControlError::field("authz_id", e))?;
    Ok(Control::ProxiedAuthorization(ProxiedAuthorization {
        critical: criticality,
        authz_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxied_authz_new_is_critical() {
        let c = ProxiedAuthorization::new("dn:uid=someone,dc=example,dc=org");
        assert!(c.critical);
        assert!(Control::from(c).criticality());
    }

    #[test]
    fn test_proxied_authz_value_bytes() {
        let c = ProxiedAuthorization::new("u:bob");
        // 0x24 = universal constructed OCTET STRING
        assert_eq!(
            c.encode_value().to_bytes(),
            vec![0x24, 0x07, 0x04, 0x05, b'u', b':', b'b', b'o', b'b']
        );
    }

    #[test]
    fn test_decode_proxied_authz_wrapped() {
        let value = Packet::from_bytes(&[0x24, 0x07, 0x04, 0x05, b'u', b':', b'b', b'o', b'b']).unwrap();
        let c = decode_proxied_authorization(CONTROL_OID_PROXIED_AUTHORIZATION, true, Some(&value)).unwrap();
        assert_eq!(c, Control::ProxiedAuthorization(ProxiedAuthorization::new("u:bob")));
    }

    #[test]
    fn test_decode_proxied_authz_plain_octet_string() {
        // RFC 4370 form: the authzId is the raw value
        let value = Packet::string("dn:cn=x");
        let c = decode_proxied_authorization(CONTROL_OID_PROXIED_AUTHORIZATION, false, Some(&value)).unwrap();
        assert_eq!(
            c,
            Control::ProxiedAuthorization(ProxiedAuthorization {
                critical: false,
                authz_id: "dn:cn=x".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_proxied_authz_empty_identity() {
        // Empty authzId means anonymous
        let value = Packet::octet_string(vec![]);
        match decode_proxied_authorization(CONTROL_OID_PROXIED_AUTHORIZATION, true, Some(&value)).unwrap() {
            Control::ProxiedAuthorization(p) => assert_eq!(p.authz_id, ""),
            other => panic!("expected ProxiedAuthorization, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_proxied_authz_errors() {
        assert_eq!(
            decode_proxied_authorization(CONTROL_OID_PROXIED_AUTHORIZATION, true, None).unwrap_err(),
            ControlError::MissingControlValue
        );
        let bad = Packet::octet_string(vec![0xFF, 0xFE]);
        let err = decode_proxied_authorization(CONTROL_OID_PROXIED_AUTHORIZATION, true, Some(&bad)).unwrap_err();
        assert!(matches!(err, ControlError::InvalidField { field: "authz_id", .. }));
    }
}

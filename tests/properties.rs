use ldap_controls::ber::{encode_int64, parse_int64};
use ldap_controls::controls::{Paging, ProxiedAuthorization, VChuPasswordWarning};
use ldap_controls::{decode_control, decode_controls, encode_envelope, Control, ControlError, ControlRegistry, Packet};
use proptest::prelude::*;

fn any_oid() -> impl Strategy<Value = String> {
    prop::collection::vec(0u32..100_000, 2..8)
        .prop_map(|arcs| arcs.iter().map(|a| a.to_string()).collect::<Vec<_>>().join("."))
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(packet) = Packet::from_bytes(&bytes) {
            let _ = decode_control(&packet);
            let _ = decode_controls(&packet);
            let _ = packet.dump();
        }
    }

    #[test]
    fn arbitrary_values_under_known_oids_never_panic(
        oid in prop::sample::select(vec![
            "2.16.840.1.113730.3.4.2",
            "1.2.840.113556.1.4.319",
            "1.3.6.1.4.1.42.2.27.8.5.1",
            "2.16.840.1.113730.3.4.18",
            "2.16.840.1.113730.3.4.4",
            "2.16.840.1.113730.3.4.5",
            "1.3.6.1.1.13.1",
            "1.3.6.1.1.13.2",
        ]),
        critical in any::<bool>(),
        value in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        if let Ok(value) = Packet::from_bytes(&value) {
            let packet = encode_envelope(oid, critical, Some(value));
            let _ = decode_control(&packet);
        }
    }

    #[test]
    fn arbitrary_values_under_extended_oids_never_panic(
        oid in prop::sample::select(vec!["2.16.840.1.113730.3.4.3", "2.16.840.1.113730.3.4.7"]),
        critical in any::<bool>(),
        value in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let registry = ControlRegistry::new();
        registry.register_extended();
        if let Ok(value) = Packet::from_bytes(&value) {
            let result = registry.decode(&encode_envelope(oid, critical, Some(value)));
            prop_assert!(!matches!(result, Err(ControlError::DecoderPanic { .. })), "decoder panicked");
        }
    }

    #[test]
    fn int64_roundtrip(value in any::<i64>()) {
        let encoded = encode_int64(value);
        prop_assert!(!encoded.is_empty() && encoded.len() <= 8);
        prop_assert_eq!(parse_int64(&encoded), Ok(value));
    }

    #[test]
    fn paging_roundtrip(
        size in any::<u32>(),
        critical in any::<bool>(),
        cookie in prop::collection::vec(any::<u8>(), 0..32),
    ) {
        let mut paging = Paging::new(size);
        paging.critical = critical;
        paging.set_cookie(cookie);
        let control = Control::from(paging);
        let bytes = control.encode().unwrap().to_bytes();
        let decoded = decode_control(&Packet::from_bytes(&bytes).unwrap()).unwrap();
        prop_assert_eq!(decoded, control);
    }

    #[test]
    fn proxied_authz_roundtrip(authz_id in ".{0,40}", critical in any::<bool>()) {
        let mut proxied = ProxiedAuthorization::new(authz_id);
        proxied.critical = critical;
        let control = Control::from(proxied);
        let decoded = decode_control(&control.encode().unwrap()).unwrap();
        prop_assert_eq!(decoded, control);
    }

    #[test]
    fn vchu_warning_roundtrip(seconds in any::<i64>()) {
        let control = Control::from(VChuPasswordWarning(seconds));
        let decoded = decode_control(&control.encode().unwrap()).unwrap();
        prop_assert_eq!(decoded, control);
    }

    #[test]
    fn unknown_oid_keeps_criticality(oid in any_oid(), critical in any::<bool>()) {
        // Keep clear of the registered arcs
        let oid = format!("1.3.6.1.4.1.99999.{}", oid);
        let decoded = decode_control(&encode_envelope(&oid, critical, None)).unwrap();
        prop_assert_eq!(decoded.oid(), oid.as_str());
        prop_assert_eq!(decoded.criticality(), critical);
        prop_assert!(decoded.encode().is_none());
    }
}

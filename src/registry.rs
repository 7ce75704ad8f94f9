// Control decoder registry and decode dispatcher.
//
// The registry maps an OID to a decoder. A process-wide instance seeded with
// the built-in decoders backs the free functions; independent instances can be
// created and passed around explicitly.

use crate::ber::{Class, Packet};
use crate::control::{parse_envelope, Control, OpaqueControl, UnknownControl, CONTROLS_TAG};
use crate::controls::{
    decode_behera, decode_entry_change_notification, decode_manage_dsa_it, decode_paging, decode_persistent_search,
    decode_pre_post_read, decode_proxied_authorization, decode_vchu_password, CONTROL_OID_BEHERA_PASSWORD_POLICY,
    CONTROL_OID_ENTRY_CHANGE_NOTIFICATION, CONTROL_OID_MANAGE_DSA_IT, CONTROL_OID_PAGING,
    CONTROL_OID_PERSISTENT_SEARCH, CONTROL_OID_POST_READ, CONTROL_OID_PRE_READ, CONTROL_OID_PROXIED_AUTHORIZATION,
    CONTROL_OID_VCHU_PASSWORD_MUST_CHANGE, CONTROL_OID_VCHU_PASSWORD_WARNING,
};
use crate::error::ControlError;
use crate::metrics::CodecMetrics;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, warn};

type DecodeFn = dyn Fn(&str, bool, Option<&Packet>) -> Result<Control, ControlError> + Send + Sync;

/// Decoder for one or more control OIDs.
///
/// Called with the OID, the envelope criticality and the value element if
/// one was sent. Most decoders ignore the OID.
#[derive(Clone)]
pub struct Decoder(Arc<DecodeFn>);

impl Decoder {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, bool, Option<&Packet>) -> Result<Control, ControlError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn decode(&self, oid: &str, criticality: bool, value: Option<&Packet>) -> Result<Control, ControlError> {
        (self.0)(oid, criticality, value)
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Decoder(..)")
    }
}

/// Decoder that keeps the control untyped as [`OpaqueControl`].
pub fn opaque_decoder() -> Decoder {
    Decoder::new(|oid, criticality, value| {
        Ok(Control::Opaque(OpaqueControl {
            oid: oid.to_string(),
            critical: criticality,
            value: value.cloned(),
        }))
    })
}

fn builtin_decoders() -> Vec<(&'static str, Decoder)> {
    vec![
        (CONTROL_OID_MANAGE_DSA_IT, Decoder::new(decode_manage_dsa_it)),
        (CONTROL_OID_PAGING, Decoder::new(decode_paging)),
        (CONTROL_OID_BEHERA_PASSWORD_POLICY, Decoder::new(decode_behera)),
        (CONTROL_OID_PROXIED_AUTHORIZATION, Decoder::new(decode_proxied_authorization)),
        (CONTROL_OID_VCHU_PASSWORD_MUST_CHANGE, Decoder::new(decode_vchu_password)),
        (CONTROL_OID_VCHU_PASSWORD_WARNING, Decoder::new(decode_vchu_password)),
        (CONTROL_OID_PRE_READ, Decoder::new(decode_pre_post_read)),
        (CONTROL_OID_POST_READ, Decoder::new(decode_pre_post_read)),
    ]
}

// Shipped but not seeded into new registries.
fn extended_decoders() -> Vec<(&'static str, Decoder)> {
    vec![
        (CONTROL_OID_PERSISTENT_SEARCH, Decoder::new(decode_persistent_search)),
        (CONTROL_OID_ENTRY_CHANGE_NOTIFICATION, Decoder::new(decode_entry_change_notification)),
    ]
}

/// Thread-safe OID → decoder map plus the dispatcher that uses it.
///
/// The lock only covers map access; decoders run without it.
pub struct ControlRegistry {
    decoders: Mutex<HashMap<String, Decoder>>,
    metrics: CodecMetrics,
}

impl Default for ControlRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ControlRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlRegistry")
            .field("oids", &self.list_oids())
            .finish()
    }
}

impl ControlRegistry {
    /// Registry seeded with the built-in decoders.
    pub fn new() -> Self {
        let decoders = builtin_decoders()
            .into_iter()
            .map(|(oid, decoder)| (oid.to_string(), decoder))
            .collect();
        Self {
            decoders: Mutex::new(decoders),
            metrics: CodecMetrics::new(),
        }
    }

    /// Registry without any decoders; every control decodes as unknown.
    pub fn empty() -> Self {
        Self {
            decoders: Mutex::new(HashMap::new()),
            metrics: CodecMetrics::new(),
        }
    }

    // The map is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Decoder>> {
        self.decoders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `decoder` for `oid`, replacing any previous one.
    pub fn register(&self, oid: impl Into<String>, decoder: impl Into<Option<Decoder>>) -> Result<(), ControlError> {
        let decoder = decoder.into().ok_or(ControlError::MissingControlDecoder)?;
        let oid = oid.into();
        debug!("Registering control decoder for {}", oid);
        self.lock().insert(oid, decoder);
        Ok(())
    }

    /// Removes the decoder for `oid`, if any.
    pub fn unregister(&self, oid: &str) {
        if self.lock().remove(oid).is_some() {
            debug!("Unregistered control decoder for {}", oid);
        }
    }

    /// Adds the Persistent Search and Entry Change Notification decoders,
    /// replacing whatever was registered for their OIDs.
    pub fn register_extended(&self) {
        let mut decoders = self.lock();
        for (oid, decoder) in extended_decoders() {
            decoders.insert(oid.to_string(), decoder);
        }
        debug!("Registered extended control decoders");
    }

    pub fn lookup(&self, oid: &str) -> Option<Decoder> {
        self.lock().get(oid).cloned()
    }

    /// Snapshot of the registered OIDs, in no particular order.
    pub fn list_oids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn metrics(&self) -> &CodecMetrics {
        &self.metrics
    }

    /// Decodes one Control envelope. Unregistered OIDs yield [`Control::Unknown`].
    pub fn decode(&self, packet: &Packet) -> Result<Control, ControlError> {
        let envelope = parse_envelope(packet).map_err(|e| {
            self.metrics.inc_error(e.kind());
            e
        })?;
        self.dispatch(envelope.oid, envelope.criticality, envelope.value)
    }

    /// Decodes the context [0] Controls wrapper of an LDAPMessage.
    pub fn decode_controls(&self, packet: &Packet) -> Result<Vec<Control>, ControlError> {
        if packet.class != Class::Context || packet.tag != CONTROLS_TAG || !packet.constructed {
            return Err(ControlError::InvalidControlData);
        }
        packet.children().iter().map(|c| self.decode(c)).collect()
    }

    /// Looks up and runs the decoder for `oid`. A panicking decoder is reported
    /// as [`ControlError::DecoderPanic`] instead of unwinding into the caller.
    pub(crate) fn dispatch(
        &self,
        oid: &str,
        criticality: bool,
        value: Option<&Packet>,
    ) -> Result<Control, ControlError> {
        let decoder = match self.lookup(oid) {
            Some(decoder) => decoder,
            None => {
                debug!("No decoder registered for control {}, treating as unknown", oid);
                self.metrics.inc_unknown();
                return Ok(Control::Unknown(UnknownControl::new(oid, criticality)));
            }
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(oid, criticality, value)))
            .unwrap_or_else(|payload| {
                Err(ControlError::DecoderPanic {
                    oid: oid.to_string(),
                    message: panic_message(payload.as_ref()),
                })
            });

        match &result {
            Ok(control) => self.metrics.inc_decoded(control.name()),
            Err(e) => {
                warn!("Failed to decode control {}: {}", oid, e);
                self.metrics.inc_error(e.kind());
            }
        }
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

static GLOBAL_REGISTRY: OnceLock<ControlRegistry> = OnceLock::new();

/// Process-wide registry, seeded with the built-in decoders on first use.
pub fn global() -> &'static ControlRegistry {
    GLOBAL_REGISTRY.get_or_init(ControlRegistry::new)
}

/// Registers a decoder in the process-wide registry.
pub fn register_control(oid: impl Into<String>, decoder: impl Into<Option<Decoder>>) -> Result<(), ControlError> {
    global().register(oid, decoder)
}

pub fn unregister_control(oid: &str) {
    global().unregister(oid)
}

pub fn get_decoder(oid: &str) -> Option<Decoder> {
    global().lookup(oid)
}

pub fn control_oids() -> Vec<String> {
    global().list_oids()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{ManageDsaIT, Paging};
    use std::thread;

    #[test]
    fn test_new_registry_has_builtins() {
        let registry = ControlRegistry::new();
        let mut oids = registry.list_oids();
        oids.sort();
        assert_eq!(oids.len(), 8);
        for oid in [
            "2.16.840.1.113730.3.4.2",
            "1.2.840.113556.1.4.319",
            "1.3.6.1.4.1.42.2.27.8.5.1",
            "2.16.840.1.113730.3.4.18",
            "2.16.840.1.113730.3.4.4",
            "2.16.840.1.113730.3.4.5",
            "1.3.6.1.1.13.1",
            "1.3.6.1.1.13.2",
        ] {
            assert!(registry.lookup(oid).is_some(), "missing builtin {}", oid);
        }
    }

    #[test]
    fn test_register_extended() {
        use crate::controls::{ChangeType, EntryChangeNotification, PersistentSearch};

        let registry = ControlRegistry::new();
        assert!(registry.lookup(CONTROL_OID_PERSISTENT_SEARCH).is_none());
        assert!(registry.lookup(CONTROL_OID_ENTRY_CHANGE_NOTIFICATION).is_none());

        registry.register_extended();
        assert_eq!(registry.list_oids().len(), 10);

        let ps = Control::from(PersistentSearch::new(&[ChangeType::Delete], true, true));
        assert_eq!(registry.decode(&ps.encode().unwrap()).unwrap(), ps);

        let mut ecn = EntryChangeNotification::new(ChangeType::ModDn);
        ecn.previous_dn = Some("cn=old,dc=example".to_string());
        ecn.change_number = Some(1234);
        let ecn = Control::from(ecn);
        assert_eq!(registry.decode(&ecn.encode().unwrap()).unwrap(), ecn);
    }

    #[test]
    fn test_empty_registry() {
        let registry = ControlRegistry::empty();
        assert!(registry.list_oids().is_empty());
        let packet = Control::from(ManageDsaIT(true)).encode().unwrap();
        assert_eq!(
            registry.decode(&packet).unwrap(),
            Control::Unknown(UnknownControl::new(CONTROL_OID_MANAGE_DSA_IT, true))
        );
    }

    #[test]
    fn test_register_without_decoder() {
        let registry = ControlRegistry::empty();
        assert_eq!(
            registry.register("1.2.3", None).unwrap_err(),
            ControlError::MissingControlDecoder
        );
        assert!(registry.lookup("1.2.3").is_none());
    }

    #[test]
    fn test_register_overrides_and_unregister() {
        let registry = ControlRegistry::new();
        registry
            .register(
                CONTROL_OID_PAGING,
                Decoder::new(|_, crit, _| Ok(Control::ManageDsaIT(ManageDsaIT(crit)))),
            )
            .unwrap();
        let packet = Control::from(Paging::new(10)).encode().unwrap();
        assert_eq!(registry.decode(&packet).unwrap(), Control::ManageDsaIT(ManageDsaIT(false)));

        registry.unregister(CONTROL_OID_PAGING);
        assert!(matches!(registry.decode(&packet).unwrap(), Control::Unknown(_)));

        // Unregistering twice is a no-op
        registry.unregister(CONTROL_OID_PAGING);
        assert_eq!(registry.list_oids().len(), 7);
    }

    #[test]
    fn test_decoder_panic_is_contained() {
        let registry = ControlRegistry::empty();
        registry
            .register(
                "1.2.3",
                Decoder::new(|_, _, value| {
                    // Indexes a child that is not there
                    let children = value.map(Packet::children).unwrap_or(&[]);
                    let first = &children[0];
                    Ok(Control::Unknown(UnknownControl::new(first.as_str().unwrap_or(""), false)))
                }),
            )
            .unwrap();
        let packet = crate::control::encode_envelope("1.2.3", false, None);
        let err = registry.decode(&packet).unwrap_err();
        assert!(matches!(err, ControlError::DecoderPanic { ref oid, .. } if oid == "1.2.3"));
        assert_eq!(registry.metrics().panic_count(), 1);
    }

    #[test]
    fn test_opaque_decoder() {
        let registry = ControlRegistry::empty();
        registry.register("1.2.3", opaque_decoder()).unwrap();
        let value = Packet::string("payload");
        let packet = crate::control::encode_envelope("1.2.3", true, Some(value.clone()));
        let control = registry.decode(&packet).unwrap();
        assert_eq!(
            control,
            Control::Opaque(OpaqueControl {
                oid: "1.2.3".to_string(),
                critical: true,
                value: Some(value),
            })
        );
        assert_eq!(control.encode().unwrap().to_bytes(), packet.to_bytes());
    }

    #[test]
    fn test_decode_controls_wrapper() {
        let registry = ControlRegistry::new();
        let controls = vec![Control::from(ManageDsaIT(true)), Control::from(Paging::new(25))];
        let wrapper = crate::control::encode_controls(&controls);
        assert_eq!(registry.decode_controls(&wrapper).unwrap(), controls);

        assert_eq!(
            registry.decode_controls(&Packet::sequence()).unwrap_err(),
            ControlError::InvalidControlData
        );
    }

    #[test]
    fn test_concurrent_register_and_decode() {
        let registry = Arc::new(ControlRegistry::new());
        let packet = Control::from(Paging::new(7)).encode().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let packet = packet.clone();
                thread::spawn(move || {
                    let oid = format!("1.2.3.{}", i);
                    for _ in 0..100 {
                        registry.register(oid.clone(), opaque_decoder()).unwrap();
                        assert!(matches!(registry.decode(&packet).unwrap(), Control::Paging(_)));
                        registry.unregister(&oid);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.list_oids().len(), 8);
        assert_eq!(registry.metrics().decoded_count(Paging::NAME), 800);
    }

    #[test]
    fn test_global_registry_is_seeded() {
        assert!(get_decoder(CONTROL_OID_PRE_READ).is_some());
        assert!(control_oids().contains(&CONTROL_OID_POST_READ.to_string()));
    }
}

//! Built-in control codecs.
//!
//! Each codec exposes its value type, the OID constant(s) and a decoder with
//! the [`crate::registry::Decoder`] signature. Persistent Search and Entry
//! Change Notification are not registered by default, see
//! [`crate::registry::ControlRegistry::register_extended`].

mod behera;
mod entry_change;
mod managedsait;
mod paging;
mod persistent_search;
mod pre_post_read;
mod proxied_authz;
mod vchu_password;

pub use behera::{
    decode_behera, BeheraPasswordPolicy, BeheraPolicyError, CONTROL_OID_BEHERA_PASSWORD_POLICY,
};
pub use entry_change::{
    decode_entry_change_notification, EntryChangeNotification, CONTROL_OID_ENTRY_CHANGE_NOTIFICATION,
};
pub use managedsait::{decode_manage_dsa_it, ManageDsaIT, CONTROL_OID_MANAGE_DSA_IT};
pub use paging::{decode_paging, Paging, CONTROL_OID_PAGING};
pub use persistent_search::{
    decode_persistent_search, ChangeType, PersistentSearch, CONTROL_OID_PERSISTENT_SEARCH,
};
pub use pre_post_read::{
    decode_pre_post_read, AttributeSelection, PrePostRead, ReadKind, CONTROL_OID_POST_READ,
    CONTROL_OID_PRE_READ,
};
pub use proxied_authz::{
    decode_proxied_authorization, ProxiedAuthorization, CONTROL_OID_PROXIED_AUTHORIZATION,
};
pub use vchu_password::{
    decode_vchu_password, VChuPasswordMustChange, VChuPasswordWarning,
    CONTROL_OID_VCHU_PASSWORD_MUST_CHANGE, CONTROL_OID_VCHU_PASSWORD_WARNING,
};

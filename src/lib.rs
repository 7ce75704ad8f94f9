pub mod ber;
pub mod config;
pub mod control;
pub mod controls;
pub mod error;
pub mod interop;
pub mod metrics;
pub mod registry;

pub use ber::{BerError, Class, Packet};
pub use config::{Config, OutputFormat};
pub use control::{
    control_name, decode_control, decode_controls, encode_controls, encode_envelope, find_control, parse_envelope,
    Control, Envelope, OpaqueControl, UnknownControl,
};
pub use error::ControlError;
pub use interop::{from_raw_control, to_raw_control, to_raw_controls};
pub use metrics::CodecMetrics;
pub use registry::{
    control_oids, get_decoder, opaque_decoder, register_control, unregister_control, ControlRegistry, Decoder,
};

//! Error types for control encoding/decoding

use crate::ber::BerError;
use thiserror::Error;

/// Errors produced while decoding controls or maintaining the decoder registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// Malformed envelope: not a SEQUENCE, wrong child count, non-string OID.
    #[error("invalid control data")]
    InvalidControlData,

    /// A value is present but does not have the shape the control expects.
    #[error("invalid control value")]
    InvalidControlValue,

    /// The control requires a value and none was sent.
    #[error("missing control value")]
    MissingControlValue,

    /// Registration was attempted without a decoder.
    #[error("missing control decoder")]
    MissingControlDecoder,

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unexpected tag {tag} in {context}")]
    UnexpectedTag { context: &'static str, tag: u8 },

    #[error("{decoder} decoder cannot handle OID {oid}")]
    UnsupportedOid { decoder: &'static str, oid: String },

    #[error("decoder for {oid} panicked: {message}")]
    DecoderPanic { oid: String, message: String },

    #[error("malformed BER in control value: {0}")]
    Ber(#[from] BerError),
}

impl ControlError {
    pub(crate) fn field(field: &'static str, reason: impl ToString) -> Self {
        ControlError::InvalidField {
            field,
            reason: reason.to_string(),
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlError::InvalidControlData => "invalid_data",
            ControlError::InvalidControlValue => "invalid_value",
            ControlError::MissingControlValue => "missing_value",
            ControlError::MissingControlDecoder => "missing_decoder",
            ControlError::InvalidField { .. } => "invalid_field",
            ControlError::UnexpectedTag { .. } => "unexpected_tag",
            ControlError::UnsupportedOid { .. } => "unsupported_oid",
            ControlError::DecoderPanic { .. } => "decoder_panic",
            ControlError::Ber(_) => "ber",
        }
    }
}

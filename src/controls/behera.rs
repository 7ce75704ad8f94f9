// Password policy control, draft-behera-ldap-password-policy-10.

use crate::ber::{parse_int64, Class, Packet};
use crate::control::Control;
use crate::error::ControlError;
use serde::{Deserialize, Serialize};

pub const CONTROL_OID_BEHERA_PASSWORD_POLICY: &str = "1.3.6.1.4.1.42.2.27.8.5.1";

/// Sentinel for "field not present".
const ABSENT: i64 = -1;

const TAG_WARNING: u8 = 0;
const TAG_ERROR: u8 = 1;
const TAG_TIME_BEFORE_EXPIRATION: u8 = 0;
const TAG_GRACE_AUTHNS_REMAINING: u8 = 1;

/// Error codes of the `error` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeheraPolicyError {
    PasswordExpired = 0,
    AccountLocked = 1,
    ChangeAfterReset = 2,
    PasswordModNotAllowed = 3,
    MustSupplyOldPassword = 4,
    InsufficientPasswordQuality = 5,
    PasswordTooShort = 6,
    PasswordTooYoung = 7,
    PasswordInHistory = 8,
}

impl BeheraPolicyError {
    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn description(self) -> &'static str {
        match self {
            BeheraPolicyError::PasswordExpired => "Password expired",
            BeheraPolicyError::AccountLocked => "Account locked",
            BeheraPolicyError::ChangeAfterReset => "Password must be changed",
            BeheraPolicyError::PasswordModNotAllowed => "Policy prevents password modification",
            BeheraPolicyError::MustSupplyOldPassword => {
                "Policy requires old password in order to change password"
            }
            BeheraPolicyError::InsufficientPasswordQuality => "Password fails quality checks",
            BeheraPolicyError::PasswordTooShort => "Password is too short for policy",
            BeheraPolicyError::PasswordTooYoung => "Password has been changed too recently",
            BeheraPolicyError::PasswordInHistory => "New password is in list of old passwords",
        }
    }
}

impl TryFrom<i8> for BeheraPolicyError {
    type Error = i8;

    fn try_from(code: i8) -> Result<Self, i8> {
        match code {
            0 => Ok(BeheraPolicyError::PasswordExpired),
            1 => Ok(BeheraPolicyError::AccountLocked),
            2 => Ok(BeheraPolicyError::ChangeAfterReset),
            3 => Ok(BeheraPolicyError::PasswordModNotAllowed),
            4 => Ok(BeheraPolicyError::MustSupplyOldPassword),
            5 => Ok(BeheraPolicyError::InsufficientPasswordQuality),
            6 => Ok(BeheraPolicyError::PasswordTooShort),
            7 => Ok(BeheraPolicyError::PasswordTooYoung),
            8 => Ok(BeheraPolicyError::PasswordInHistory),
            other => Err(other),
        }
    }
}

/// Password policy request (all fields absent) or response.
///
/// -1 in `expire`, `grace` or `error` means the field is absent. The error
/// text is derived from `error`, see [`BeheraPasswordPolicy::error_string`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeheraPasswordPolicy {
    /// Seconds before the password expires
    pub expire: i64,
    /// Remaining authentications allowed with an expired password
    pub grace: i64,
    pub error: i8,
    pub critical: bool,
}

impl Default for BeheraPasswordPolicy {
    fn default() -> Self {
        Self {
            expire: ABSENT,
            grace: ABSENT,
            error: ABSENT as i8,
            critical: false,
        }
    }
}

impl BeheraPasswordPolicy {
    pub const NAME: &'static str = "Password Policy - Behera Draft";

    /// Request form: every field absent.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(mut self, error: BeheraPolicyError) -> Self {
        self.error = error.code();
        self
    }

    pub fn policy_error(&self) -> Option<BeheraPolicyError> {
        BeheraPolicyError::try_from(self.error).ok()
    }

    /// Description of `error`; empty when absent or not in the table.
    pub fn error_string(&self) -> &'static str {
        self.policy_error().map(BeheraPolicyError::description).unwrap_or("")
    }

    /// PasswordPolicyResponseValue ::= SEQUENCE {
    ///    warning [0] CHOICE {
    ///       timeBeforeExpiration [0] INTEGER (0 .. maxInt),
    ///       graceAuthNsRemaining [1] INTEGER (0 .. maxInt) } OPTIONAL,
    ///    error   [1] ENUMERATED { ... } OPTIONAL }
    ///
    /// Only one warning fits the CHOICE; expire wins over grace.
    pub(crate) fn encode_value(&self) -> Option<Packet> {
        if self.expire < 0 && self.grace < 0 && self.error < 0 {
            return None;
        }
        let mut value = Packet::sequence();

        if self.expire >= 0 || self.grace >= 0 {
            let choice = if self.expire >= 0 {
                Packet::integer(Class::Context, TAG_TIME_BEFORE_EXPIRATION, self.expire)
            } else {
                Packet::integer(Class::Context, TAG_GRACE_AUTHNS_REMAINING, self.grace)
            };
            value.push(Packet::constructed(Class::Context, TAG_WARNING).with_child(choice));
        }

        if self.error >= 0 {
            value.push(Packet::integer(Class::Context, TAG_ERROR, self.error as i64));
        }
        Some(value)
    }
}

/// A missing value is the client-to-server request form.
pub fn decode_behera(_oid: &str, criticality: bool, value: Option<&Packet>) -> Result<Control, ControlError> {
    let mut ctrl = BeheraPasswordPolicy {
        critical: criticality,
        ..BeheraPasswordPolicy::default()
    };
    let value = match value {
        Some(value) => value,
        None => return Ok(Control::BeheraPasswordPolicy(ctrl)),
    };

    for child in value.children() {
        match child.tag {
            TAG_WARNING => {
                let choice = child
                    .child(0)
                    .ok_or_else(|| ControlError::field("warning", "empty choice"))?;
                let val = parse_int64(choice.data()).map_err(|e| ControlError::field("warning", e))?;
                if val < 0 {
                    return Err(ControlError::field("warning", format!("negative value {}", val)));
                }
                match choice.tag {
                    TAG_TIME_BEFORE_EXPIRATION => ctrl.expire = val,
                    TAG_GRACE_AUTHNS_REMAINING => ctrl.grace = val,
                    tag => {
                        return Err(ControlError::UnexpectedTag {
                            context: "password policy warning",
                            tag,
                        })
                    }
                }
            }
            TAG_ERROR => {
                let val = parse_int64(child.data()).map_err(|e| ControlError::field("error", e))?;
                // Negative codes would collide with the absent sentinel
                ctrl.error = i8::try_from(val)
                    .ok()
                    .filter(|code| *code >= 0)
                    .ok_or_else(|| ControlError::field("error", format!("code {} out of range", val)))?;
            }
            tag => {
                return Err(ControlError::UnexpectedTag {
                    context: "password policy value",
                    tag,
                })
            }
        }
    }
    Ok(Control::BeheraPasswordPolicy(ctrl))
}

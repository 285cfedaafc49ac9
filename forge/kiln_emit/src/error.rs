//! Error types for the emitter protocol.
//!
//! Every variant here is a protocol violation: a programming error in
//! the recipe driving the emitter, signaled fast instead of corrupting
//! the output. The one exception is `Recipe`, the carrier for a
//! recipe's own domain failure surfaced through the protocol.

use kiln_unit::encode::EncodeError;
use kiln_unit::Label;
use std::fmt;

/// Result of an emission call.
pub type EmitResult<T = ()> = Result<T, EmitError>;

/// Error raised by the unit emitter protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmitError {
    /// An emission call arrived in a state that does not permit it.
    OutOfOrder {
        call: &'static str,
        state: &'static str,
    },
    /// An emission call arrived after `end()` closed the unit.
    AfterEnd { call: &'static str },
    /// A member was redeclared with a different shape. Members are
    /// keyed by name only; identical redeclaration is a no-op.
    MemberClash {
        name: String,
        existing: String,
        incoming: String,
    },
    /// A body-level call arrived while another body was still open,
    /// or the unit was closed over an open body.
    BodyOpen { member: String },
    /// A label was marked twice in one pass.
    LabelRemarked { label: Label },
    /// A jump references a label that was never marked in the pass.
    LabelUnmarked { label: Label },
    /// An instruction references a label that was never created.
    LabelUndeclared { label: Label },
    /// An incompatible frame description was recorded at a program
    /// point that already has a different one.
    FrameConflict { at: u32 },
    /// Local slot allocation exceeded the u16 slot space.
    SlotOverflow { requested: u32 },
    /// The encoder rejected the finished pass.
    Encode(EncodeError),
    /// A recipe-domain failure surfaced through the protocol.
    Recipe { message: String },
}

impl EmitError {
    /// Build a recipe-domain failure.
    pub fn recipe(message: impl Into<String>) -> Self {
        EmitError::Recipe {
            message: message.into(),
        }
    }
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitError::OutOfOrder { call, state } => {
                write!(f, "{call} is not legal while the emitter is {state}")
            }
            EmitError::AfterEnd { call } => {
                write!(f, "{call} called after end() closed the unit")
            }
            EmitError::MemberClash {
                name,
                existing,
                incoming,
            } => write!(
                f,
                "member '{name}' redeclared incompatibly: was {existing}, now {incoming}"
            ),
            EmitError::BodyOpen { member } => {
                write!(f, "body of member '{member}' is still open")
            }
            EmitError::LabelRemarked { label } => {
                write!(f, "label {label} marked twice in one pass")
            }
            EmitError::LabelUnmarked { label } => {
                write!(f, "label {label} referenced but never marked in this pass")
            }
            EmitError::LabelUndeclared { label } => {
                write!(f, "label {label} was never created in this pass")
            }
            EmitError::FrameConflict { at } => write!(
                f,
                "incompatible frame recorded at program point {at} (frames are monotonic per point)"
            ),
            EmitError::SlotOverflow { requested } => {
                write!(f, "local slot allocation overflowed: {requested} slots requested")
            }
            EmitError::Encode(err) => write!(f, "encoding failed: {err}"),
            EmitError::Recipe { message } => write!(f, "recipe failed: {message}"),
        }
    }
}

impl std::error::Error for EmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EmitError::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EncodeError> for EmitError {
    fn from(err: EncodeError) -> Self {
        // Unmarked labels keep their protocol-level identity; everything
        // else is an encoder rejection.
        match err {
            EncodeError::UnmarkedLabel { label } => EmitError::LabelUnmarked { label },
            other => EmitError::Encode(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = EmitError::OutOfOrder {
            call: "declare_member",
            state: "unopened",
        };
        assert!(err.to_string().contains("declare_member"));
        assert!(err.to_string().contains("unopened"));
    }

    #[test]
    fn test_unmarked_label_keeps_identity_through_from() {
        let err: EmitError = EncodeError::UnmarkedLabel { label: Label(9) }.into();
        assert_eq!(err, EmitError::LabelUnmarked { label: Label(9) });
    }

    #[test]
    fn test_recipe_factory() {
        let err = EmitError::recipe("schema mismatch");
        assert!(err.to_string().contains("schema mismatch"));
    }
}

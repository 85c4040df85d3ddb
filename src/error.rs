//! Rich diagnostic error types for the bridge.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know which side of the
//! boundary failed and what to do about it.

use miette::Diagnostic;
use thiserror::Error;

use crate::native::{ErrorCode, SortKind};

/// Top-level error type for the bridge.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum BridgeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Native(#[from] NativeEngineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Category(#[from] CategoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Numeral(#[from] NumeralError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Log(#[from] LogError),
}

impl BridgeError {
    /// The native error code, if this error came out of the engine.
    pub fn native_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Native(err) => Some(err.code),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Native engine errors
// ---------------------------------------------------------------------------

/// A native call left the engine's error register non-ok.
#[derive(Debug, Error, Diagnostic)]
#[error("native engine error ({code}): {message}")]
#[diagnostic(
    code(termbridge::native::call_failed),
    help(
        "The engine rejected the call. The session is still usable; \
         check the operand sorts and arguments, or whether the call was interrupted."
    )
)]
pub struct NativeEngineError {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Category errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CategoryError {
    #[error("wrong term category: expected {expected}, got {actual}")]
    #[diagnostic(
        code(termbridge::category::wrong),
        help(
            "This operation is only defined for one category of term. \
             Lift the term and match on its variant before calling it."
        )
    )]
    WrongCategory { expected: String, actual: SortKind },

    #[error("no term category registered for sort kind {kind}")]
    #[diagnostic(
        code(termbridge::category::unknown),
        help(
            "Only uninterpreted, bool, int, real, bit-vector and array terms can be lifted. \
             Use the untyped `Expr` for terms of other sorts."
        )
    )]
    UnknownCategory { kind: SortKind },
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("handle belongs to session {found}, but was used with session {expected}")]
    #[diagnostic(
        code(termbridge::session::foreign_handle),
        help(
            "Values never cross sessions. Rebuild the term in the target session \
             instead of combining handles from two sessions."
        )
    )]
    ForeignHandle { expected: u64, found: u64 },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration parameter: \"{key}\"")]
    #[diagnostic(
        code(termbridge::config::unknown_parameter),
        help("Supported parameters are: timeout, model, max_candidates, well_sorted_check, opt_horizon.")
    )]
    UnknownParameter { key: String },

    #[error("invalid value for \"{key}\": \"{value}\" ({reason})")]
    #[diagnostic(
        code(termbridge::config::invalid_value),
        help("Booleans are `true`/`false`; timeouts and limits are non-negative integers.")
    )]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("configuration pairs must come in key/value pairs, got {count} items")]
    #[diagnostic(
        code(termbridge::config::odd_pairs),
        help("Pass an even number of items: key1, value1, key2, value2, ...")
    )]
    OddPairs { count: usize },

    #[error("failed to read configuration file: {path}")]
    #[diagnostic(
        code(termbridge::config::io),
        help("Check that the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {message}")]
    #[diagnostic(
        code(termbridge::config::parse),
        help("The configuration file must be TOML with scalar values, optionally grouped in tables.")
    )]
    Parse { message: String },
}

// ---------------------------------------------------------------------------
// Numeral errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum NumeralError {
    #[error("engine returned a malformed numeral string: \"{text}\"")]
    #[diagnostic(
        code(termbridge::numeral::malformed),
        help("This is an engine contract violation. Numeral strings must be decimal.")
    )]
    Malformed { text: String },

    #[error("malformed rational literal: \"{text}\"")]
    #[diagnostic(
        code(termbridge::numeral::literal),
        help("Write rationals as `p/q` or `p` with decimal integers and a non-zero q.")
    )]
    Literal { text: String },
}

// ---------------------------------------------------------------------------
// Interaction log errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LogError {
    #[error("failed to open interaction log: {path}")]
    #[diagnostic(
        code(termbridge::log::io),
        help("Check that the parent directory exists and is writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for functions returning bridge results.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Convenience alias for configuration results.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_code_is_exposed() {
        let err: BridgeError = NativeEngineError {
            code: ErrorCode::SortError,
            message: "bad".into(),
        }
        .into();
        assert_eq!(err.native_code(), Some(ErrorCode::SortError));
        assert!(err.to_string().contains("sort error"));
    }

    #[test]
    fn category_error_mentions_kinds() {
        let err = CategoryError::WrongCategory {
            expected: "int or bit-vector".into(),
            actual: SortKind::Real,
        };
        assert_eq!(
            err.to_string(),
            "wrong term category: expected int or bit-vector, got real"
        );
        let wrapped: BridgeError = err.into();
        assert_eq!(wrapped.native_code(), None);
    }
}

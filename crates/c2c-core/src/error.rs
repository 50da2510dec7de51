// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;

/// Error taxonomy shared by every c2c crate.
///
/// Too few valid observations is not an error: the solver reports it as an
/// absent result so that batch runs can skip the series and keep going.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum C2cError {
    /// Malformed series, table, or configuration.
    InvalidInput(String),
    /// A caller-supplied argument violated an operation precondition.
    InvalidParameter(String),
    /// A guaranteed internal condition did not hold; indicates a defect.
    InternalInvariant(String),
    /// A counter or size computation overflowed.
    ResourceLimit(String),
}

impl C2cError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn internal_invariant(msg: impl Into<String>) -> Self {
        Self::InternalInvariant(msg.into())
    }

    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimit(msg.into())
    }

    /// Stable machine-readable code used in structured error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::InternalInvariant(_) => "internal_invariant",
            Self::ResourceLimit(_) => "resource_limit",
        }
    }

    /// Prefixes the message with extra context, keeping the variant.
    pub fn with_context(self, context: impl fmt::Display) -> Self {
        match self {
            Self::InvalidInput(msg) => Self::InvalidInput(format!("{context}: {msg}")),
            Self::InvalidParameter(msg) => Self::InvalidParameter(format!("{context}: {msg}")),
            Self::InternalInvariant(msg) => Self::InternalInvariant(format!("{context}: {msg}")),
            Self::ResourceLimit(msg) => Self::ResourceLimit(format!("{context}: {msg}")),
        }
    }
}

impl fmt::Display for C2cError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::InternalInvariant(msg) => write!(f, "internal invariant violated: {msg}"),
            Self::ResourceLimit(msg) => write!(f, "resource limit: {msg}"),
        }
    }
}

impl std::error::Error for C2cError {}

/// Increments a diagnostic counter, failing instead of wrapping.
pub fn checked_counter_increment(counter: &mut usize, name: &str) -> Result<(), C2cError> {
    *counter = counter
        .checked_add(1)
        .ok_or_else(|| C2cError::resource_limit(format!("{name} counter overflow")))?;
    Ok(())
}

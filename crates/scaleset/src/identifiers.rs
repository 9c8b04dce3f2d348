//! Newtype domain identifiers.
//!
//! Every concept the job-queue service hands out an identity for is a distinct
//! newtype. A [`RunnerRequestId`] can never be passed where a [`MessageId`] is
//! expected even though both are integers on the wire.
//!
//! All integer identifiers serialise transparently as plain JSON numbers so
//! they match the service's wire format.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (service-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub const fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — service-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies a runner scale set registered with the job-queue service.
    ScaleSetId
}

u64_id! {
    /// Identifies a message on a scale set's message queue.
    ///
    /// Message ids increase monotonically. The value `0` is reserved for the
    /// synthetic initial message built at startup; the service never issues it.
    MessageId
}

u64_id! {
    /// Identifies a runner request: one queued job waiting for, or bound to, a
    /// runner. This is the id passed to job acquisition.
    RunnerRequestId
}

u64_id! {
    /// Identifies a registered runner.
    RunnerId
}

impl MessageId {
    /// The id carried by the synthetic initial message.
    pub const INITIAL: MessageId = MessageId(0);

    /// Returns `true` for the synthetic initial message id.
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (service-generated)
// ---------------------------------------------------------------------------

/// Identifies a leased message session on a scale set.
///
/// The service generates this value when the session is created; the listener
/// treats it as opaque and only echoes it back on refresh and delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`SessionId`] from an existing UUID (e.g. deserialised from a response).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Short-lived bearer token granting access to a session's message queue.
///
/// `Debug` and `Display` never print the secret, so a session can be logged
/// freely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw token, for use in an authorisation header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

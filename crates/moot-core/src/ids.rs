//! Branded ID newtypes for type safety.
//!
//! Every entity in the moot system has a distinct ID type implemented as a
//! newtype wrapper around `String`. This prevents accidentally passing a
//! question ID where a session ID is expected.
//!
//! Generated IDs use the wire format the browser protocol fixes: a short
//! prefix (`ses_`, `q_`) followed by 8 lowercase-alphanumeric characters.
//! Branch IDs are caller-chosen and have no generator.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters used in generated ID suffixes.
const ID_CHARSET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of the random suffix after the prefix.
const ID_SUFFIX_LEN: usize = 8;

/// Generate a prefixed short ID (`<prefix><8 lowercase alphanumerics>`).
fn short_id(prefix: &str) -> String {
    let mut rng = rand::rng();
    let mut id = String::with_capacity(prefix.len() + ID_SUFFIX_LEN);
    id.push_str(prefix);
    for _ in 0..ID_SUFFIX_LEN {
        let idx = rng.random_range(0..ID_CHARSET.len());
        id.push(ID_CHARSET[idx] as char);
    }
    id
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };

    ($(#[$meta:meta])* $name:ident, prefix = $prefix:literal) => {
        branded_id!($(#[$meta])* $name);

        impl $name {
            /// Prefix for generated IDs of this type.
            pub const PREFIX: &'static str = $prefix;

            /// Create a new random ID (`$prefix` + 8 lowercase alphanumerics).
            #[must_use]
            pub fn generate() -> Self {
                Self(short_id($prefix))
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a live browser session.
    SessionId, prefix = "ses_"
}

branded_id! {
    /// Unique identifier for a question pushed to the browser.
    QuestionId, prefix = "q_"
}

branded_id! {
    /// Caller-chosen identifier for an exploration branch, unique within
    /// its brainstorm session.
    BranchId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

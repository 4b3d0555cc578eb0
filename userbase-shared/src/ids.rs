/// Actor identity
///
/// Every durable entity (user, account, the global system index) is owned by
/// exactly one actor instance, addressed by its kind plus an [`ActorId`].
///
/// # Id Forms
///
/// - **Named**: `ActorId::from_name("google:1234")` - SHA-256 hex of the name,
///   stable across processes (used for OAuth identities and the `global`
///   system instance)
/// - **Unique**: `ActorId::new_unique()` - random, used for new accounts
/// - **Parsed**: `ActorId::parse(s)` - ids received over the wire
///
/// # Example
///
/// ```
/// use userbase_shared::ids::ActorId;
///
/// let a = ActorId::from_name("google:1234");
/// let b = ActorId::from_name("google:1234");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
///
/// assert!(ActorId::parse("../etc/passwd").is_err());
/// ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Longest id accepted by [`ActorId::parse`]
pub const MAX_ID_LENGTH: usize = 128;

/// Name of the single system index instance
pub const SYSTEM_INSTANCE_NAME: &str = "global";

/// Errors produced when parsing an actor id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Empty id
    #[error("Actor id is empty")]
    Empty,

    /// Id longer than [`MAX_ID_LENGTH`]
    #[error("Actor id exceeds {MAX_ID_LENGTH} characters")]
    TooLong,

    /// Id contains a character outside `[A-Za-z0-9_-]`
    #[error("Actor id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// The three kinds of actors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    /// One human identity
    User,

    /// One tenant
    Account,

    /// The global, non-authoritative search index
    System,
}

impl ActorKind {
    /// Storage namespace name
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::User => "user",
            ActorKind::Account => "account",
            ActorKind::System => "system",
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated actor address within one [`ActorKind`]
///
/// The character set is restricted so ids are safe as file names and URL
/// path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Deterministic id derived from a name
    pub fn from_name(name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        ActorId(hex::encode(hasher.finalize()))
    }

    /// Fresh random id
    pub fn new_unique() -> Self {
        ActorId(Uuid::new_v4().simple().to_string())
    }

    /// Id of the system index instance
    pub fn system() -> Self {
        Self::from_name(SYSTEM_INSTANCE_NAME)
    }

    /// Validates an id received from a caller
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        if raw.is_empty() {
            return Err(IdError::Empty);
        }
        if raw.len() > MAX_ID_LENGTH {
            return Err(IdError::TooLong);
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(IdError::InvalidCharacter(c));
        }

        Ok(ActorId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ActorId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for ActorId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ActorId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for values the host hands to the driver.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Identifier of a file or folder on the remote drive
///
/// The remote uses numeric identifiers rendered as decimal strings
/// (`"0"` is the drive root), but the host treats them as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a new RemoteId
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains whitespace
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "Remote ID cannot be empty".to_string(),
            ));
        }

        if id.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidRemoteId(format!(
                "Remote ID contains whitespace: {id:?}"
            )));
        }

        Ok(Self(id))
    }

    /// The drive root (`"0"`)
    #[must_use]
    pub fn root() -> Self {
        Self("0".to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemoteId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}

/// Validates a file or folder name chosen by the host
///
/// Names must be non-blank and may not contain path separators.
///
/// # Errors
/// Returns [`DomainError::InvalidName`] when the name is unusable
pub fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::InvalidName("name cannot be blank".to_string()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(DomainError::InvalidName(format!(
            "name contains a path separator: {name}"
        )));
    }
    Ok(())
}

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::coerce::CoerceError;

/// Placeholder printed in place of secret values.
pub const REDACTED: &str = "<secret>";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("descriptor file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read descriptor file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse descriptor file '{path}': {source}")]
    Syntax {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("unknown descriptor kind {0:?}, expected Service, WorkerPool or Job")]
    UnknownKind(String),

    #[error("descriptor has {0} containers, expected between 1 and 10")]
    ContainerCount(usize),

    #[error("descriptor secret {key} has no matching config field")]
    UnboundSecret { key: String },

    #[error("descriptor entry {key} is a secret reference but field {field} is not tagged secret")]
    UntaggedSecret { key: String, field: &'static str },

    #[error("duplicate config key {key} in group {group}")]
    DuplicateKey { group: String, key: String },

    #[error("configuration already loaded")]
    AlreadyLoaded,

    #[error("required key {key} missing value")]
    MissingRequired { key: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Coarse classification of a [`ConfigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The descriptor or the registered structures are malformed.
    Structural,
    /// A required field resolved to no value.
    MissingRequiredValue,
    /// A present value failed type coercion.
    Parse,
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::MissingRequired { .. } => ErrorKind::MissingRequiredValue,
            ConfigError::Parse(_) => ErrorKind::Parse,
            _ => ErrorKind::Structural,
        }
    }
}

/// A present value that could not be coerced into its field.
///
/// For secret fields neither `Display`, `Debug` nor the error chain repeat
/// the raw value; `source` is still available to callers that ask for it.
pub struct ParseError {
    pub key: String,
    pub field: &'static str,
    pub type_name: String,
    pub value: String,
    pub(crate) secret: bool,
    pub source: CoerceError,
}

impl ParseError {
    pub fn is_secret(&self) -> bool {
        self.secret
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config parse error: assigning {} to {}: converting ",
            self.key, self.field
        )?;
        if self.secret {
            write!(f, "'{REDACTED}' to type {}: {}", self.type_name, self.source.summary())
        } else {
            write!(f, "'{}' to type {}: {}", self.value, self.type_name, self.source)
        }
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ParseError");
        debug
            .field("key", &self.key)
            .field("field", &self.field)
            .field("type_name", &self.type_name);
        if self.secret {
            debug
                .field("value", &REDACTED)
                .field("secret", &true)
                .field("source", &self.source.summary());
        } else {
            debug
                .field("value", &self.value)
                .field("secret", &false)
                .field("source", &self.source);
        }
        debug.finish()
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if self.secret {
            None
        } else {
            Some(&self.source)
        }
    }
}

/// Reference to a value held in a secret manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub name: String,
    pub key: String,
}

/// A candidate environment assignment extracted from a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvEntry {
    pub name: String,
    pub value: Option<String>,
    pub secret_ref: Option<SecretRef>,
}

impl EnvEntry {
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            secret_ref: None,
        }
    }

    pub fn secret(name: impl Into<String>, secret: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            secret_ref: Some(SecretRef {
                name: secret.into(),
                key: key.into(),
            }),
        }
    }

    pub fn is_secret(&self) -> bool {
        self.secret_ref.is_some()
    }
}

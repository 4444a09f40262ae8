//! Deployment descriptor extraction.
//!
//! A descriptor is a YAML manifest of a deployable revision. Its `kind`
//! selects where the container list lives; the first container's `env`
//! list becomes candidate environment entries.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::env::Environment;
use super::field::FieldDescriptor;
use super::source::{EnvEntry, SecretRef};
use super::ConfigError;

/// Largest container count a descriptor may declare.
pub const MAX_CONTAINERS: usize = 10;

/// Key under which `metadata.name` is published.
pub const SERVICE_NAME_KEY: &str = "K_SERVICE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    Service,
    WorkerPool,
    Job,
}

impl DescriptorKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Service" => Some(Self::Service),
            "WorkerPool" => Some(Self::WorkerPool),
            "Job" => Some(Self::Job),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Service => "Service",
            Self::WorkerPool => "WorkerPool",
            Self::Job => "Job",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Deserialize)]
struct Discriminator {
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct Document<S> {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    spec: S,
}

#[derive(Deserialize, Default)]
struct Metadata {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize, Default)]
struct Spec<T> {
    #[serde(default)]
    spec: T,
}

#[derive(Deserialize, Default)]
struct Template<T> {
    #[serde(default)]
    template: T,
}

#[derive(Deserialize, Default)]
struct PodSpec {
    #[serde(default)]
    containers: Vec<Container>,
}

#[derive(Deserialize)]
struct Container {
    #[serde(default)]
    env: Vec<RawEnv>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnv {
    name: String,
    #[serde(default)]
    value: Option<serde_yaml::Value>,
    #[serde(default)]
    value_from: Option<ValueFrom>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueFrom {
    #[serde(default)]
    secret_key_ref: Option<SecretKeySelector>,
}

#[derive(Deserialize)]
struct SecretKeySelector {
    name: String,
    key: String,
}

/// `spec.template.spec.containers`
type ServiceShape = Template<Spec<PodSpec>>;
/// `spec.template.spec.template.spec.containers`
type JobShape = Template<Spec<Template<Spec<PodSpec>>>>;

trait Containers {
    fn into_containers(self) -> Vec<Container>;
}

impl Containers for PodSpec {
    fn into_containers(self) -> Vec<Container> {
        self.containers
    }
}

impl<T: Containers> Containers for Spec<T> {
    fn into_containers(self) -> Vec<Container> {
        self.spec.into_containers()
    }
}

impl<T: Containers> Containers for Template<T> {
    fn into_containers(self) -> Vec<Container> {
        self.template.into_containers()
    }
}

impl RawEnv {
    fn into_entry(self) -> EnvEntry {
        if let Some(selector) = self.value_from.and_then(|from| from.secret_key_ref) {
            return EnvEntry {
                name: self.name,
                value: None,
                secret_ref: Some(SecretRef {
                    name: selector.name,
                    key: selector.key,
                }),
            };
        }
        let value = match self.value {
            Some(serde_yaml::Value::String(s)) => Some(s),
            Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
            Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
            Some(serde_yaml::Value::Null) | None => Some(String::new()),
            Some(_) => {
                debug!(key = %self.name, "ignoring non-scalar descriptor value");
                None
            }
        };
        EnvEntry {
            name: self.name,
            value,
            secret_ref: None,
        }
    }
}

/// A decoded deployment descriptor.
#[derive(Debug, Clone)]
pub struct Descriptor {
    path: PathBuf,
    kind: DescriptorKind,
    entries: Vec<EnvEntry>,
}

impl Descriptor {
    /// Reads and decodes the descriptor at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(path, &contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            }
            Err(e) => Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Decodes descriptor `contents`; `path` is used for error reporting.
    pub fn parse(path: impl AsRef<Path>, contents: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let discriminator: Discriminator = decode(path, contents)?;
        let kind = discriminator.kind.unwrap_or_default();
        let kind = DescriptorKind::from_name(&kind).ok_or(ConfigError::UnknownKind(kind))?;

        let (metadata, containers) = match kind {
            DescriptorKind::Service | DescriptorKind::WorkerPool => {
                split::<ServiceShape>(decode(path, contents)?)
            }
            DescriptorKind::Job => split::<JobShape>(decode(path, contents)?),
        };
        if containers.is_empty() || containers.len() > MAX_CONTAINERS {
            return Err(ConfigError::ContainerCount(containers.len()));
        }

        let mut entries = Vec::new();
        if let Some(name) = metadata.name.filter(|name| !name.is_empty()) {
            entries.push(EnvEntry::literal(SERVICE_NAME_KEY, name));
        }
        if let Some(first) = containers.into_iter().next() {
            entries.extend(first.env.into_iter().map(RawEnv::into_entry));
        }

        debug!(
            path = %path.display(),
            %kind,
            entries = entries.len(),
            "descriptor decoded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            kind,
            entries,
        })
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in document order, `K_SERVICE` first.
    pub fn entries(&self) -> &[EnvEntry] {
        &self.entries
    }

    /// Literal entries whose keys are absent from `env`.
    pub fn candidates(&self, env: &Environment) -> Vec<EnvEntry> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_secret())
            .filter(|entry| {
                let present = env.contains(&entry.name);
                if present {
                    debug!(key = %entry.name, "local environment overrides descriptor entry");
                }
                !present
            })
            .cloned()
            .collect()
    }

    /// Checks every secret reference against the collected fields: some
    /// field must share the entry's key and be tagged secret.
    pub fn validate_secret_refs(&self, fields: &[&FieldDescriptor]) -> Result<(), ConfigError> {
        for entry in self.entries.iter().filter(|entry| entry.is_secret()) {
            let mut matching = fields.iter().filter(|field| field.key() == entry.name).peekable();
            let Some(first) = matching.peek().copied() else {
                return Err(ConfigError::UnboundSecret {
                    key: entry.name.clone(),
                });
            };
            if !matching.any(|field| field.is_secret()) {
                return Err(ConfigError::UntaggedSecret {
                    key: entry.name.clone(),
                    field: first.name(),
                });
            }
        }
        Ok(())
    }
}

/// Reads the descriptor at `path` and returns its entries not already
/// present in `env`.
pub fn extract(path: impl AsRef<Path>, env: &Environment) -> Result<Vec<EnvEntry>, ConfigError> {
    Ok(Descriptor::from_file(path)?.candidates(env))
}

fn decode<T: DeserializeOwned>(path: &Path, contents: &str) -> Result<T, ConfigError> {
    serde_yaml::from_str(contents).map_err(|e| ConfigError::Syntax {
        path: path.to_path_buf(),
        source: e,
    })
}

fn split<S: Containers>(document: Document<S>) -> (Metadata, Vec<Container>) {
    (document.metadata, document.spec.into_containers())
}

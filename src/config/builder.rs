use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::descriptor::Descriptor;
use super::env::Environment;
use super::field::{collect_fields, ensure_unique_keys, Configurable, FieldDescriptor, Walker};
use super::platform::{MetadataProbe, Platform};
use super::resolve::Resolver;
use super::usage::{usage_row, write_table, GroupSnapshot, Renderer, Snapshot, USAGE_HEADER};
use super::ConfigError;

/// Key prefix baked in at compile time through `ENVBIND_PREFIX`.
pub const BUILD_PREFIX: Option<&str> = option_env!("ENVBIND_PREFIX");

/// Lifecycle of a [`Config`]. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FieldsCollected,
    DescriptorExtracted,
    SecretsValidated,
    EnvironmentLayered,
    FieldsResolved,
    Failed,
}

/// A named target structure and its collected fields.
pub struct ConfigGroup<'a> {
    name: String,
    target: &'a mut dyn Configurable,
    fields: Vec<FieldDescriptor>,
}

impl ConfigGroup<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

impl fmt::Debug for ConfigGroup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigGroup")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Binds environment values onto one or more configuration structures.
///
/// ## Example
///
/// ```no_run
/// use envbind::{Config, Configurable};
///
/// #[derive(Debug, Default, Configurable)]
/// struct Server {
///     #[config(default = "8080")]
///     port: u16,
///     #[config(env = "DATABASE_URL", required, secret)]
///     database_url: String,
/// }
///
/// let mut server = Server::default();
/// let mut config = Config::builder("server", &mut server)
///     .with_descriptor("service.yaml")
///     .build()?;
/// config.load()?;
/// # Ok::<(), envbind::ConfigError>(())
/// ```
pub struct Config<'a> {
    groups: Vec<ConfigGroup<'a>>,
    prefix: String,
    descriptor: Option<PathBuf>,
    optional_secrets: bool,
    environment: Option<Environment>,
    platform: Box<dyn Platform + 'a>,
    stage: Stage,
}

/// Builder for a [`Config`].
#[must_use = "builders do nothing until .build() is called"]
pub struct ConfigBuilder<'a> {
    groups: Vec<(String, &'a mut dyn Configurable)>,
    prefix: String,
    descriptor: Option<PathBuf>,
    optional_secrets: bool,
    environment: Option<Environment>,
    platform: Option<Box<dyn Platform + 'a>>,
}

impl<'a> Config<'a> {
    /// Starts a configuration whose primary group is `name`, bound to `spec`.
    pub fn builder<T: Configurable>(name: impl Into<String>, spec: &'a mut T) -> ConfigBuilder<'a> {
        ConfigBuilder {
            groups: vec![(name.into(), spec)],
            prefix: BUILD_PREFIX.unwrap_or_default().to_string(),
            descriptor: None,
            optional_secrets: false,
            environment: None,
            platform: None,
        }
    }
}

impl<'a> ConfigBuilder<'a> {
    /// Registers an additional group. Groups are resolved in registration order.
    pub fn with_group<T: Configurable>(mut self, name: impl Into<String>, spec: &'a mut T) -> Self {
        self.groups.push((name.into(), spec));
        self
    }

    /// Prefixes every computed key. Keys from `env` attributes are unaffected.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Layers the environment of a deployment descriptor under the local one.
    pub fn with_descriptor(mut self, path: impl AsRef<Path>) -> Self {
        self.descriptor = Some(path.as_ref().to_path_buf());
        self
    }

    /// Treats required secret fields as optional, for dry runs.
    pub fn with_optional_secrets(mut self, optional: bool) -> Self {
        self.optional_secrets = optional;
        self
    }

    /// Resolves against `environment` instead of the process environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_platform(mut self, platform: impl Platform + 'a) -> Self {
        self.platform = Some(Box::new(platform));
        self
    }

    /// Collects the fields of every group.
    ///
    /// Fails when a group repeats a key. A key shared by two groups is
    /// allowed and logged.
    pub fn build(self) -> Result<Config<'a>, ConfigError> {
        let mut groups = Vec::with_capacity(self.groups.len());
        for (name, target) in self.groups {
            let fields = collect_fields(&self.prefix, target)?;
            ensure_unique_keys(&name, &fields)?;
            groups.push(ConfigGroup {
                name,
                target,
                fields,
            });
        }

        let mut owners: HashMap<&str, &str> = HashMap::new();
        for group in &groups {
            for field in &group.fields {
                if let Some(first) = owners.insert(field.key(), group.name()) {
                    warn!(
                        key = field.key(),
                        first,
                        second = group.name(),
                        "config key registered by more than one group"
                    );
                }
            }
        }

        Ok(Config {
            groups,
            prefix: self.prefix,
            descriptor: self.descriptor,
            optional_secrets: self.optional_secrets,
            environment: self.environment,
            platform: self
                .platform
                .unwrap_or_else(|| Box::new(MetadataProbe::new())),
            stage: Stage::FieldsCollected,
        })
    }
}

impl<'a> Config<'a> {
    /// Resolves every field of every group. Runs at most once.
    ///
    /// On failure no group is considered valid and the configuration cannot
    /// be loaded again.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        if self.stage != Stage::FieldsCollected {
            return Err(ConfigError::AlreadyLoaded);
        }
        let result = self.run_load();
        if result.is_err() {
            self.stage = Stage::Failed;
        }
        result
    }

    fn run_load(&mut self) -> Result<(), ConfigError> {
        let mut env = self
            .environment
            .take()
            .unwrap_or_else(Environment::from_process);

        if let Some(path) = &self.descriptor {
            let descriptor = Descriptor::from_file(path)?;
            self.stage = Stage::DescriptorExtracted;

            let fields: Vec<&FieldDescriptor> =
                self.groups.iter().flat_map(|group| group.fields.iter()).collect();
            descriptor.validate_secret_refs(&fields)?;
            self.stage = Stage::SecretsValidated;

            let added = env.layer(&descriptor.candidates(&env));
            debug!(path = %path.display(), added, "descriptor environment layered");
        }
        self.stage = Stage::EnvironmentLayered;

        let result = self.resolve_groups(&env);
        self.environment = Some(env);
        result?;

        self.stage = Stage::FieldsResolved;
        info!(groups = self.groups.len(), "configuration loaded");
        Ok(())
    }

    fn resolve_groups(&mut self, env: &Environment) -> Result<(), ConfigError> {
        let mut resolver = Resolver::new(env, &*self.platform, self.optional_secrets);
        for group in &mut self.groups {
            group
                .target
                .walk(&mut Walker::new(self.prefix.as_str(), &mut resolver))?;
        }
        Ok(())
    }

    /// Renders the current value of every field, redacting secrets.
    pub fn snapshot(&mut self) -> Result<Snapshot, ConfigError> {
        let mut snapshot = Snapshot::default();
        for group in &mut self.groups {
            let mut renderer = Renderer::default();
            group
                .target
                .walk(&mut Walker::new(self.prefix.as_str(), &mut renderer))?;
            snapshot.groups.push(GroupSnapshot {
                name: group.name.clone(),
                values: renderer.values,
            });
        }
        Ok(snapshot)
    }

    /// Logs the redacted snapshot, one event per group.
    pub fn log_resolved(&mut self) -> Result<(), ConfigError> {
        for group in self.snapshot()?.groups {
            let values = group
                .values
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            info!(group = %group.name, %values, "resolved configuration");
        }
        Ok(())
    }

    /// Writes the usage table: one row per field, groups in registration order.
    pub fn print_usage<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        let rows = self
            .groups
            .iter()
            .flat_map(|group| group.fields.iter().map(move |field| usage_row(&group.name, field)));
        write_table(w, &USAGE_HEADER, rows)
    }

    pub fn groups(&self) -> &[ConfigGroup<'a>] {
        &self.groups
    }

    /// The environment used for resolution, once loaded.
    pub fn environment(&self) -> Option<&Environment> {
        match self.stage {
            Stage::FieldsCollected => None,
            _ => self.environment.as_ref(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }
}

impl fmt::Debug for Config<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("groups", &self.groups)
            .field("prefix", &self.prefix)
            .field("descriptor", &self.descriptor)
            .field("optional_secrets", &self.optional_secrets)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

//! Application context: runtime and application configuration, resolved once
//! at startup.

use std::io;

use tracing::info;

use crate::cli::ConfigArgs;
use crate::config::{Config, Environment, Platform};
use crate::runtime::RuntimeConfig;
use crate::{Configurable, Error};

/// Name of the group holding [`RuntimeConfig`].
pub const RUNTIME_GROUP: &str = "runtime";

/// Central application context holding the resolved configuration.
///
/// ## Example
///
/// ```no_run
/// use envbind::{AppContext, Configurable, Launch};
///
/// #[derive(Debug, Default, Configurable)]
/// struct MyConfig {
///     #[config(default = "info")]
///     log_level: String,
/// }
///
/// let ctx = match AppContext::builder()
///     .with_config("app", MyConfig::default())
///     .build()?
/// {
///     Launch::Run(ctx) => ctx,
///     Launch::Exit => return Ok(()),
/// };
///
/// let config = ctx.config();
/// let port = ctx.runtime().port;
/// # Ok::<(), envbind::Error>(())
/// ```
#[derive(Debug)]
pub struct AppContext<C> {
    config: C,
    runtime: RuntimeConfig,
}

impl<C> AppContext<C> {
    /// Returns a reference to the application configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Returns the platform runtime configuration.
    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    pub fn into_inner(self) -> (C, RuntimeConfig) {
        (self.config, self.runtime)
    }
}

impl AppContext<()> {
    /// Creates a new builder for constructing an `AppContext`.
    pub fn builder() -> AppContextBuilder<()> {
        AppContextBuilder {
            name: String::new(),
            config: (),
            args: ConfigArgs::default(),
            prefix: None,
            environment: None,
            platform: None,
        }
    }
}

/// Outcome of [`AppContextBuilder::build`].
#[derive(Debug)]
pub enum Launch<C> {
    /// Configuration resolved; the application should run.
    Run(AppContext<C>),
    /// Usage was printed or validation finished; the process should exit.
    Exit,
}

/// Builder for constructing an [`AppContext`].
///
/// The builder starts with no config (`AppContextBuilder<()>`) and transitions
/// to `AppContextBuilder<C>` when [`with_config`](Self::with_config) is called.
/// Only the latter can be built.
#[must_use = "builders do nothing until .build() is called"]
pub struct AppContextBuilder<C> {
    name: String,
    config: C,
    args: ConfigArgs,
    prefix: Option<String>,
    environment: Option<Environment>,
    platform: Option<Box<dyn Platform>>,
}

impl AppContextBuilder<()> {
    /// Attaches the application configuration, registered as group `name`.
    pub fn with_config<C>(self, name: impl Into<String>, config: C) -> AppContextBuilder<C> {
        AppContextBuilder {
            name: name.into(),
            config,
            args: self.args,
            prefix: self.prefix,
            environment: self.environment,
            platform: self.platform,
        }
    }
}

impl<C> AppContextBuilder<C> {
    /// Applies parsed command-line options.
    pub fn with_args(mut self, args: ConfigArgs) -> Self {
        self.args = args;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_platform(mut self, platform: Box<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }
}

impl<C: Configurable> AppContextBuilder<C> {
    /// Resolves the runtime and application configuration.
    ///
    /// With `--usage` the usage table is written to stdout and nothing is
    /// loaded; with `--validate` the configuration is loaded and checked but
    /// the application does not run.
    pub fn build(self) -> Result<Launch<C>, Error> {
        let mut runtime = RuntimeConfig::default();
        let mut app = self.config;
        {
            let mut builder =
                Config::builder(RUNTIME_GROUP, &mut runtime).with_group(self.name, &mut app);
            if let Some(prefix) = self.prefix {
                builder = builder.with_prefix(prefix);
            }
            if let Some(environment) = self.environment {
                builder = builder.with_environment(environment);
            }
            if let Some(platform) = self.platform {
                builder = builder.with_platform(platform);
            }
            let mut config = self.args.apply(builder).build()?;

            if self.args.usage {
                config.print_usage(&mut io::stdout().lock())?;
                return Ok(Launch::Exit);
            }
            config.load()?;
            config.log_resolved()?;
        }

        if self.args.validate {
            info!("configuration is valid");
            return Ok(Launch::Exit);
        }
        Ok(Launch::Run(AppContext {
            config: app,
            runtime,
        }))
    }
}

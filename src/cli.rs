//! Command-line options shared by every binary that loads configuration.

use std::path::PathBuf;

use clap::Args;

use crate::config::ConfigBuilder;

#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Deployment descriptor (YAML) whose container environment is layered
    /// under the local environment.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Validate the configuration and exit. Required secrets may be absent.
    #[arg(long)]
    pub validate: bool,

    /// Print the configuration usage table and exit.
    #[arg(long)]
    pub usage: bool,
}

impl ConfigArgs {
    /// Applies the descriptor path and the dry-run mode to `builder`.
    pub fn apply<'a>(&self, builder: ConfigBuilder<'a>) -> ConfigBuilder<'a> {
        let builder = builder.with_optional_secrets(self.validate);
        match &self.config {
            Some(path) => builder.with_descriptor(path),
            None => builder,
        }
    }
}

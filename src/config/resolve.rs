//! Per-field value precedence.
//!
//! A field takes, in order: the environment value bound to its key, its
//! `default` tag, then its `onGCE` tag when the platform probe succeeds.

use tracing::debug;

use super::capability::Slot;
use super::env::{Environment, Origin};
use super::error::ParseError;
use super::field::{FieldDescriptor, FieldVisitor};
use super::platform::Platform;
use super::ConfigError;

/// Which precedence tier supplied a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Environment(Origin),
    Default,
    OnGce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'v> {
    pub value: &'v str,
    pub source: Source,
}

/// Picks the winning raw value for `field`, or `None` when every tier is
/// empty. `on_gce` is only called when the `onGCE` tier is reached.
pub fn resolve_value<'v>(
    field: &'v FieldDescriptor,
    env: &'v Environment,
    on_gce: impl FnOnce() -> bool,
) -> Option<Resolved<'v>> {
    if let Some(var) = env.get(field.key()) {
        return Some(Resolved {
            value: &var.value,
            source: Source::Environment(var.origin),
        });
    }
    if let Some(value) = field.default_value() {
        return Some(Resolved {
            value,
            source: Source::Default,
        });
    }
    let value = field.on_gce_value()?;
    on_gce().then_some(Resolved {
        value,
        source: Source::OnGce,
    })
}

/// Visitor assigning resolved values into each leaf.
pub(crate) struct Resolver<'a> {
    env: &'a Environment,
    platform: &'a dyn Platform,
    on_gce: Option<bool>,
    optional_secrets: bool,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(env: &'a Environment, platform: &'a dyn Platform, optional_secrets: bool) -> Self {
        Self {
            env,
            platform,
            on_gce: None,
            optional_secrets,
        }
    }
}

impl FieldVisitor for Resolver<'_> {
    fn visit(&mut self, field: &FieldDescriptor, slot: &mut dyn Slot) -> Result<(), ConfigError> {
        let platform = self.platform;
        let cached = &mut self.on_gce;
        let resolved = resolve_value(field, self.env, || *cached.get_or_insert_with(|| platform.on_gce()));

        let Some(Resolved { value, source }) = resolved else {
            if field.is_required() && !(self.optional_secrets && field.is_secret()) {
                return Err(ConfigError::MissingRequired {
                    key: field.key().to_string(),
                });
            }
            return Ok(());
        };

        slot.assign(value).map_err(|err| ParseError {
            key: field.key().to_string(),
            field: field.name(),
            type_name: field.type_name().to_string(),
            value: value.to_string(),
            secret: field.is_secret(),
            source: err,
        })?;
        debug!(key = field.key(), ?source, "resolved config value");
        Ok(())
    }
}

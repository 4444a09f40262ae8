//! Field descriptors and the structure walk.
//!
//! `#[derive(Configurable)]` generates a static table of [`FieldMeta`] per
//! type and a [`Configurable::walk`] that visits fields in declaration order.
//! The [`Walker`] owns key computation: a field's key is
//! `UPPER(prefix + "_" + name)`, or `UPPER(env)` when an `env` tag is present
//! (the prefix is then ignored). Named nested structs extend the prefix with
//! their own key; flattened structs share the parent's prefix.

use std::borrow::Cow;
use std::collections::HashSet;

use super::capability::Slot;
use super::coerce::parse_bool;
use super::ConfigError;

/// Tag keys recognized on bindable fields.
pub mod tag {
    pub const ENV: &str = "env";
    pub const DEFAULT: &str = "default";
    pub const ON_GCE: &str = "onGCE";
    pub const REQUIRED: &str = "required";
    pub const SECRET: &str = "secret";
}

/// Ordered key-value metadata declared on a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tags(&'static [(&'static str, &'static str)]);

impl Tags {
    pub const fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Self(pairs)
    }

    pub fn get(&self, key: &str) -> Option<&'static str> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    /// Whether the tag is present and parses as a true boolean.
    pub fn is_true(&self, key: &str) -> bool {
        self.get(key).and_then(parse_bool).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.0.iter().copied()
    }
}

/// Compile-time description of one declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: &'static str,
    pub tags: Tags,
}

impl FieldMeta {
    pub const fn new(name: &'static str, tags: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            name,
            tags: Tags::new(tags),
        }
    }
}

/// One bindable configuration leaf, as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: &'static str,
    key: String,
    type_name: Cow<'static, str>,
    tags: Tags,
}

impl FieldDescriptor {
    /// The declared field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The upper-cased environment key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn tags(&self) -> Tags {
        self.tags
    }

    pub fn default_value(&self) -> Option<&'static str> {
        self.tags.get(tag::DEFAULT)
    }

    pub fn on_gce_value(&self) -> Option<&'static str> {
        self.tags.get(tag::ON_GCE)
    }

    pub fn is_required(&self) -> bool {
        self.tags.is_true(tag::REQUIRED)
    }

    pub fn is_secret(&self) -> bool {
        self.tags.is_true(tag::SECRET)
    }
}

/// A structure whose fields can be bound from configuration.
///
/// Implement with `#[derive(Configurable)]`.
pub trait Configurable {
    fn walk(&mut self, walker: &mut Walker<'_>) -> Result<(), ConfigError>;
}

// Optional nested groups are materialized before descent.
impl<T: Configurable + Default> Configurable for Option<T> {
    fn walk(&mut self, walker: &mut Walker<'_>) -> Result<(), ConfigError> {
        self.get_or_insert_with(T::default).walk(walker)
    }
}

impl<T: Configurable + ?Sized> Configurable for Box<T> {
    fn walk(&mut self, walker: &mut Walker<'_>) -> Result<(), ConfigError> {
        (**self).walk(walker)
    }
}

/// Receives every leaf of a walk, in declaration order.
pub trait FieldVisitor {
    fn visit(&mut self, field: &FieldDescriptor, slot: &mut dyn Slot) -> Result<(), ConfigError>;
}

/// Walk state: the current key prefix and the visitor receiving leaves.
pub struct Walker<'v> {
    prefix: String,
    visitor: &'v mut dyn FieldVisitor,
}

impl<'v> Walker<'v> {
    pub fn new(prefix: impl Into<String>, visitor: &'v mut dyn FieldVisitor) -> Self {
        Self {
            prefix: prefix.into(),
            visitor,
        }
    }

    fn key_for(&self, meta: &FieldMeta) -> String {
        if let Some(env) = meta.tags.get(tag::ENV).filter(|env| !env.is_empty()) {
            return env.to_uppercase();
        }
        if self.prefix.is_empty() {
            meta.name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, meta.name).to_uppercase()
        }
    }

    /// Visits a terminal field.
    pub fn leaf(&mut self, meta: &FieldMeta, slot: &mut dyn Slot) -> Result<(), ConfigError> {
        let field = FieldDescriptor {
            name: meta.name,
            key: self.key_for(meta),
            type_name: slot.type_name(),
            tags: meta.tags,
        };
        self.visitor.visit(&field, slot)
    }

    /// Descends into a named nested struct; its key becomes the new prefix.
    pub fn nested(
        &mut self,
        meta: &FieldMeta,
        target: &mut dyn Configurable,
    ) -> Result<(), ConfigError> {
        let mut inner = Walker {
            prefix: self.key_for(meta),
            visitor: &mut *self.visitor,
        };
        target.walk(&mut inner)
    }

    /// Descends into an embedded struct under the current prefix.
    pub fn flatten(&mut self, target: &mut dyn Configurable) -> Result<(), ConfigError> {
        target.walk(self)
    }
}

#[derive(Default)]
struct Collector {
    fields: Vec<FieldDescriptor>,
}

impl FieldVisitor for Collector {
    fn visit(&mut self, field: &FieldDescriptor, _slot: &mut dyn Slot) -> Result<(), ConfigError> {
        self.fields.push(field.clone());
        Ok(())
    }
}

/// Collects the ordered descriptor list of `target`.
///
/// Optional nested groups are allocated as a side effect.
pub fn collect_fields(
    prefix: &str,
    target: &mut dyn Configurable,
) -> Result<Vec<FieldDescriptor>, ConfigError> {
    let mut collector = Collector::default();
    target.walk(&mut Walker::new(prefix, &mut collector))?;
    Ok(collector.fields)
}

/// Rejects a group whose flattened field list repeats a key.
pub(crate) fn ensure_unique_keys(group: &str, fields: &[FieldDescriptor]) -> Result<(), ConfigError> {
    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        if !seen.insert(field.key()) {
            return Err(ConfigError::DuplicateKey {
                group: group.to_string(),
                key: field.key().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::capability::KindSlot;
    use super::*;

    // Hand-written impls, equivalent to what the derive generates.
    #[derive(Debug, Default)]
    struct Tls {
        cert: String,
    }

    impl Configurable for Tls {
        fn walk(&mut self, walker: &mut Walker<'_>) -> Result<(), ConfigError> {
            const FIELDS: &[FieldMeta] = &[FieldMeta::new("cert", &[])];
            walker.leaf(&FIELDS[0], &mut KindSlot(&mut self.cert))
        }
    }

    #[derive(Debug, Default)]
    struct Common {
        debug: bool,
    }

    impl Configurable for Common {
        fn walk(&mut self, walker: &mut Walker<'_>) -> Result<(), ConfigError> {
            const FIELDS: &[FieldMeta] = &[FieldMeta::new("debug", &[])];
            walker.leaf(&FIELDS[0], &mut KindSlot(&mut self.debug))
        }
    }

    #[derive(Debug, Default)]
    struct Server {
        common: Common,
        port: u16,
        host: String,
        tls: Option<Tls>,
        admin: Tls,
    }

    impl Configurable for Server {
        fn walk(&mut self, walker: &mut Walker<'_>) -> Result<(), ConfigError> {
            const FIELDS: &[FieldMeta] = &[
                FieldMeta::new("port", &[("default", "8080"), ("required", "true")]),
                FieldMeta::new("host", &[("env", "bind_host")]),
                FieldMeta::new("tls", &[]),
                FieldMeta::new("admin", &[("env", "ops")]),
            ];
            walker.flatten(&mut self.common)?;
            walker.leaf(&FIELDS[0], &mut KindSlot(&mut self.port))?;
            walker.leaf(&FIELDS[1], &mut KindSlot(&mut self.host))?;
            walker.nested(&FIELDS[2], &mut self.tls)?;
            walker.nested(&FIELDS[3], &mut self.admin)?;
            Ok(())
        }
    }

    fn keys(fields: &[FieldDescriptor]) -> Vec<&str> {
        fields.iter().map(FieldDescriptor::key).collect()
    }

    #[test]
    fn test_keys_without_prefix() {
        let mut server = Server::default();
        let fields = collect_fields("", &mut server).unwrap();
        assert_eq!(
            keys(&fields),
            vec!["DEBUG", "PORT", "BIND_HOST", "TLS_CERT", "OPS_CERT"]
        );
    }

    #[test]
    fn test_prefix_applies_except_for_env_override() {
        let mut server = Server::default();
        let fields = collect_fields("app", &mut server).unwrap();
        assert_eq!(
            keys(&fields),
            vec!["APP_DEBUG", "APP_PORT", "BIND_HOST", "APP_TLS_CERT", "OPS_CERT"]
        );
    }

    #[test]
    fn test_optional_nested_group_is_materialized() {
        let mut server = Server::default();
        assert!(server.tls.is_none());
        collect_fields("", &mut server).unwrap();
        assert!(server.tls.is_some());
    }

    #[test]
    fn test_descriptor_metadata() {
        let mut server = Server::default();
        let fields = collect_fields("", &mut server).unwrap();
        let port = &fields[1];
        assert_eq!(port.name(), "port");
        assert_eq!(port.type_name(), "u16");
        assert_eq!(port.default_value(), Some("8080"));
        assert!(port.is_required());
        assert!(!port.is_secret());
        assert_eq!(port.on_gce_value(), None);
    }

    #[test]
    fn test_tags_preserve_declaration_order() {
        let tags = Tags::new(&[("secret", "true"), ("env", "TOKEN"), ("required", "nope")]);
        let order: Vec<_> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["secret", "env", "required"]);
        assert!(tags.is_true("secret"));
        assert!(!tags.is_true("required"));
        assert!(!tags.is_true("ignored"));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut a = Tls::default();
        let mut fields = collect_fields("", &mut a).unwrap();
        fields.extend(fields.clone());
        let err = ensure_unique_keys("main", &fields).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey { ref key, .. } if key == "CERT"));
    }
}

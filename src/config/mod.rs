//! Binding of environment values onto typed configuration structures.

mod builder;
mod capability;
mod code;
mod coerce;
mod descriptor;
mod duration;
mod env;
mod error;
mod field;
mod platform;
mod resolve;
mod source;
mod usage;

pub use builder::{Config, ConfigBuilder, ConfigGroup, Stage, BUILD_PREFIX};
pub use capability::{BinarySlot, KindSlot, Setter, SetterSlot, Slot, TextSlot};
pub use code::Code;
pub use coerce::{BoxError, Coerce, CoerceError};
pub use descriptor::{extract, Descriptor, DescriptorKind, MAX_CONTAINERS, SERVICE_NAME_KEY};
pub use env::{EnvVar, Environment, Origin};
pub use error::{ConfigError, ErrorKind, ParseError, REDACTED};
pub use field::{collect_fields, tag, Configurable, FieldDescriptor, FieldMeta, FieldVisitor, Tags, Walker};
pub use platform::{MetadataProbe, Platform, METADATA_HOST_ENV};
pub use resolve::{resolve_value, Resolved, Source};
pub use source::{EnvEntry, SecretRef};
pub use usage::{write_table, GroupSnapshot, Snapshot};

//! Procedural macros for `envbind`.
//!
//! - `#[derive(Configurable)]` - generates the field table and walk of a
//!   configuration structure

mod config;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `envbind::config::Configurable` for a struct with named fields.
///
/// # Field attributes
///
/// Values:
///
/// - `#[config(env = "KEY")]` - Bind to `KEY` instead of the computed key.
///   The prefix is not applied.
/// - `#[config(default = "v")]` - Fallback when no environment value exists.
/// - `#[config(on_gce = "v")]` - Fallback used only on Google Cloud, when
///   there is neither an environment value nor a default.
/// - `#[config(required)]` - Fail the load when no value resolves.
/// - `#[config(secret)]` - Only descriptor secret references may supply the
///   value; it is redacted in diagnostics.
/// - `#[config(ignored)]` - Skip the field.
///
/// Structure:
///
/// - `#[config(nested)]` - Recurse into a `Configurable` field, using its key
///   as the prefix of its fields.
/// - `#[config(flatten)]` - Recurse into a `Configurable` field under the
///   current prefix.
///
/// Parsing capabilities, checked in this order:
///
/// - `#[config(setter)]` - The type implements `envbind::config::Setter`.
/// - `#[config(from_str)]` - The type implements `FromStr`.
/// - `#[config(from_bytes)]` - The type implements `TryFrom<&[u8]>`.
///
/// Every other field must implement `envbind::config::Coerce`.
///
/// Flags accept an optional `= true` / `= false`.
///
/// # Example
///
/// ```rust,ignore
/// use envbind::Configurable;
///
/// #[derive(Debug, Default, Configurable)]
/// pub struct Server {
///     #[config(default = "8080")]
///     pub port: u16,
///     #[config(nested)]
///     pub tls: Tls,
///     #[config(env = "API_TOKEN", required, secret)]
///     pub token: String,
/// }
/// ```
#[proc_macro_derive(Configurable, attributes(config))]
pub fn derive_configurable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match config::derive_configurable(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

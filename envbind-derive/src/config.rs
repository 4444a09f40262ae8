//! Implementation of `#[derive(Configurable)]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::spanned::Spanned;
use syn::{Attribute, Data, DeriveInput, Field, Fields, Lit, LitBool};

pub fn derive_configurable(input: &DeriveInput) -> syn::Result<TokenStream> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "Configurable requires a struct with named fields",
                ))
            }
        },
        Data::Enum(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Configurable cannot be derived for enums",
            ))
        }
        Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Configurable cannot be derived for unions",
            ))
        }
    };

    let mut metas = Vec::new();
    let mut steps = Vec::new();
    for field in fields {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.ignored {
            continue;
        }
        steps.push(field_step(field, &attrs, &mut metas)?);
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::envbind::config::Configurable for #name #ty_generics #where_clause {
            fn walk(
                &mut self,
                walker: &mut ::envbind::config::Walker<'_>,
            ) -> ::core::result::Result<(), ::envbind::ConfigError> {
                #[allow(dead_code)]
                const __FIELDS: &[::envbind::config::FieldMeta] = &[#(#metas),*];
                #(#steps)*
                ::core::result::Result::Ok(())
            }
        }
    })
}

// ============================================================================
// Code generation
// ============================================================================

fn field_step(field: &Field, attrs: &FieldAttrs, metas: &mut Vec<TokenStream>) -> syn::Result<TokenStream> {
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new(field.span(), "expected a named field"))?;

    if attrs.flatten {
        return Ok(quote! {
            walker.flatten(&mut self.#ident)?;
        });
    }

    let index = metas.len();
    let name = ident.unraw().to_string();
    let tags = attrs.tags.iter().map(|(key, value)| quote! { (#key, #value) });
    metas.push(quote! {
        ::envbind::config::FieldMeta::new(#name, &[#(#tags),*])
    });

    if attrs.nested {
        return Ok(quote! {
            walker.nested(&__FIELDS[#index], &mut self.#ident)?;
        });
    }

    let slot = match attrs.capability {
        Some(Capability::Setter) => quote! { ::envbind::config::SetterSlot },
        Some(Capability::FromStr) => quote! { ::envbind::config::TextSlot },
        Some(Capability::FromBytes) => quote! { ::envbind::config::BinarySlot },
        None => quote! { ::envbind::config::KindSlot },
    };
    Ok(quote! {
        walker.leaf(&__FIELDS[#index], &mut #slot(&mut self.#ident))?;
    })
}

// ============================================================================
// Attribute parsing
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum Capability {
    Setter,
    FromStr,
    FromBytes,
}

#[derive(Default)]
struct FieldAttrs {
    /// Tag pairs in declaration order.
    tags: Vec<(&'static str, String)>,
    ignored: bool,
    nested: bool,
    flatten: bool,
    capability: Option<Capability>,
}

impl FieldAttrs {
    fn set_tag(&mut self, key: &'static str, value: String) {
        match self.tags.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.tags.push((key, value)),
        }
    }

    fn add_capability(&mut self, capability: Capability) {
        // setter > from_str > from_bytes
        let rank = |c: Capability| match c {
            Capability::Setter => 0,
            Capability::FromStr => 1,
            Capability::FromBytes => 2,
        };
        match self.capability {
            Some(current) if rank(current) <= rank(capability) => {}
            _ => self.capability = Some(capability),
        }
    }
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();
    let mut span = None;

    for attr in attrs {
        if !attr.path().is_ident("config") {
            continue;
        }
        span.get_or_insert(attr.span());
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("env") {
                result.set_tag("env", string_value(&meta)?);
            } else if meta.path.is_ident("default") {
                result.set_tag("default", string_value(&meta)?);
            } else if meta.path.is_ident("on_gce") {
                result.set_tag("onGCE", string_value(&meta)?);
            } else if meta.path.is_ident("required") {
                if flag_value(&meta)? {
                    result.set_tag("required", "true".to_string());
                }
            } else if meta.path.is_ident("secret") {
                if flag_value(&meta)? {
                    result.set_tag("secret", "true".to_string());
                }
            } else if meta.path.is_ident("ignored") {
                result.ignored = flag_value(&meta)?;
            } else if meta.path.is_ident("nested") {
                result.nested = flag_value(&meta)?;
            } else if meta.path.is_ident("flatten") {
                result.flatten = flag_value(&meta)?;
            } else if meta.path.is_ident("setter") {
                if flag_value(&meta)? {
                    result.add_capability(Capability::Setter);
                }
            } else if meta.path.is_ident("from_str") {
                if flag_value(&meta)? {
                    result.add_capability(Capability::FromStr);
                }
            } else if meta.path.is_ident("from_bytes") {
                if flag_value(&meta)? {
                    result.add_capability(Capability::FromBytes);
                }
            } else {
                return Err(meta.error("unknown config attribute"));
            }
            Ok(())
        })?;
    }

    if let Some(span) = span {
        if result.nested && result.flatten {
            return Err(syn::Error::new(span, "`nested` and `flatten` are mutually exclusive"));
        }
        if (result.nested || result.flatten) && result.capability.is_some() {
            return Err(syn::Error::new(
                span,
                "a field with a parsing capability is a leaf and cannot be `nested` or `flatten`",
            ));
        }
    }
    Ok(result)
}

/// `key = "text"`; numeric literals contribute their base-10 digits without
/// any type suffix, booleans their keyword.
fn string_value(meta: &ParseNestedMeta<'_>) -> syn::Result<String> {
    match meta.value()?.parse::<Lit>()? {
        Lit::Str(s) => Ok(s.value()),
        Lit::Int(i) => Ok(i.base10_digits().to_string()),
        Lit::Float(f) => Ok(f.base10_digits().to_string()),
        Lit::Bool(b) => Ok(b.value.to_string()),
        other => Err(syn::Error::new(other.span(), "expected a string literal")),
    }
}

/// A bare flag, or `flag = true` / `flag = false`.
fn flag_value(meta: &ParseNestedMeta<'_>) -> syn::Result<bool> {
    if meta.input.peek(syn::Token![=]) {
        Ok(meta.value()?.parse::<LitBool>()?.value)
    } else {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(input: TokenStream) -> syn::Result<String> {
        let input: DeriveInput = syn::parse2(input)?;
        derive_configurable(&input).map(|tokens| tokens.to_string())
    }

    #[test]
    fn test_leaf_and_nested_tables() {
        let out = expand(quote! {
            struct Server {
                #[config(default = 8080, required)]
                port: u16,
                #[config(nested)]
                tls: Tls,
                #[config(flatten)]
                common: Common,
                #[config(ignored)]
                cache: Cache,
                #[config(from_str)]
                r#addr: IpAddr,
            }
        })
        .unwrap();
        assert!(out.contains(r#"FieldMeta :: new ("port" , & [("default" , "8080") , ("required" , "true")])"#));
        assert!(out.contains(r#"FieldMeta :: new ("addr" , & [])"#));
        assert!(out.contains("walker . nested (& __FIELDS [1usize] , & mut self . tls)"));
        assert!(out.contains("walker . flatten (& mut self . common)"));
        assert!(out.contains("TextSlot (& mut self . r#addr)"));
        assert!(!out.contains("cache"));
    }

    #[test]
    fn test_capability_priority() {
        let attrs: Vec<Attribute> = vec![syn::parse_quote!(#[config(from_bytes, setter, from_str)])];
        let parsed = parse_field_attrs(&attrs).unwrap();
        assert!(parsed.capability == Some(Capability::Setter));
    }

    #[test]
    fn test_on_gce_tag_key() {
        let attrs: Vec<Attribute> = vec![syn::parse_quote!(#[config(on_gce = "x", secret = false)])];
        let parsed = parse_field_attrs(&attrs).unwrap();
        assert_eq!(parsed.tags, vec![("onGCE", "x".to_string())]);
    }

    #[test]
    fn test_numeric_suffix_is_dropped() {
        let attrs: Vec<Attribute> =
            vec![syn::parse_quote!(#[config(default = 8080u16, on_gce = 0.5f32)])];
        let parsed = parse_field_attrs(&attrs).unwrap();
        assert_eq!(
            parsed.tags,
            vec![("default", "8080".to_string()), ("onGCE", "0.5".to_string())]
        );
    }

    #[test]
    fn test_rejections() {
        assert!(expand(quote! { struct T(u16); }).is_err());
        assert!(expand(quote! { enum E { A } }).is_err());
        assert!(expand(quote! { struct S { #[config(envv = "X")] a: u16 } }).is_err());
        assert!(expand(quote! { struct S { #[config(nested, flatten)] a: A } }).is_err());
        assert!(expand(quote! { struct S { #[config(nested, from_str)] a: A } }).is_err());
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr};

/// Type-level `#[persist(...)]` options.
#[derive(Default)]
struct TypeAttrs {
    name: Option<LitStr>,
    aliases: Vec<LitStr>,
}

/// Field- and variant-level `#[persist(...)]` options.
#[derive(Default)]
struct MemberAttrs {
    rename: Option<LitStr>,
    aliases: Vec<LitStr>,
    transient: bool,
}

fn persist_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("persist"))
}

fn type_attrs(attrs: &[Attribute]) -> syn::Result<TypeAttrs> {
    let mut out = TypeAttrs::default();
    for attr in persist_attrs(attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                out.name = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("alias") {
                out.aliases.push(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"` or `alias = \"...\"`"))
            }
        })?;
    }
    Ok(out)
}

fn member_attrs(attrs: &[Attribute]) -> syn::Result<MemberAttrs> {
    let mut out = MemberAttrs::default();
    for attr in persist_attrs(attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                out.rename = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("alias") {
                out.aliases.push(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("transient") {
                out.transient = true;
                Ok(())
            } else {
                Err(meta.error(
                    "expected `rename = \"...\"`, `alias = \"...\"` or `transient`",
                ))
            }
        })?;
    }
    Ok(out)
}

/// `#[derive(Persist)]` macro: generates `objgraph::Persist` (and
/// `objgraph::Record` for structs).
///
/// Supports:
/// - Structs with named fields (must implement `Default`); every field type
///   implements `Persist` unless the field is transient
/// - Fieldless enums (variants stored by name and discriminant)
///
/// Attributes:
/// - `#[persist(name = "pkg.Type")]`: qualified name (default:
///   `module_path!()::Type`)
/// - `#[persist(alias = "old.Type")]`: former type name, repeatable
/// - on fields: `rename = "..."`, `alias = "..."` (repeatable), `transient`
/// - on variants: `rename = "..."`
///
/// Example:
/// ```ignore
/// use objgraph::Persist;
///
/// #[derive(Default, Persist)]
/// #[persist(name = "demo.Sensor", alias = "demo.Probe")]
/// struct Sensor {
///     id: u32,
///     #[persist(alias = "label")]
///     name: String,
///     #[persist(transient)]
///     last_error: Option<String>,
/// }
/// ```
#[proc_macro_derive(Persist, attributes(persist))]
pub fn derive_persist(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(&input.generics, "generic types are not supported")
            .to_compile_error()
            .into();
    }

    let attrs = match type_attrs(&input.attrs) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };
    let name = &input.ident;
    let type_name = match &attrs.name {
        Some(lit) => quote! { #lit },
        None => quote! { concat!(module_path!(), "::", stringify!(#name)) },
    };
    let type_aliases = &attrs.aliases;

    let expanded = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => derive_record(name, &type_name, type_aliases, &fields.named),
            _ => Err(syn::Error::new_spanned(
                &input,
                "Only structs with named fields are supported",
            )),
        },
        Data::Enum(data) => derive_enum(name, &type_name, type_aliases, data),
        Data::Union(_) => Err(syn::Error::new_spanned(&input, "Unions are not supported")),
    };

    match expanded {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_record(
    name: &syn::Ident,
    type_name: &proc_macro2::TokenStream,
    type_aliases: &[LitStr],
    fields: &syn::punctuated::Punctuated<syn::Field, syn::token::Comma>,
) -> syn::Result<proc_macro2::TokenStream> {
    let mut descriptors = Vec::new();
    let mut dependencies = Vec::new();
    let mut writes = Vec::new();
    let mut reads = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let Some(ident) = field.ident.as_ref() else {
            return Err(syn::Error::new_spanned(field, "Field must have a name"));
        };
        let attrs = member_attrs(&field.attrs)?;
        let stored = attrs
            .rename
            .as_ref()
            .map_or_else(|| ident.unraw().to_string(), LitStr::value);
        let ty = &field.ty;

        if attrs.transient {
            descriptors.push(quote! {
                ::objgraph::MemberDescriptor::transient(#stored)
            });
            continue;
        }

        let aliases = &attrs.aliases;
        descriptors.push(quote! {
            ::objgraph::MemberDescriptor::new(#stored, <#ty as ::objgraph::Persist>::shape())
                #(.with_alias(#aliases))*
        });
        dependencies.push(quote! { registry.ensure::<#ty>(); });
        writes.push(quote! { writer.member(object, #stored, &self.#ident)?; });
        reads.push(quote! { #index => self.#ident = reader.read(value)?, });
    }

    Ok(quote! {
        impl ::objgraph::Persist for #name {
            fn shape() -> ::objgraph::Shape {
                ::objgraph::Shape::Record(
                    <Self as ::objgraph::Record>::TYPE_NAME.to_string(),
                )
            }

            fn descriptor() -> ::core::option::Option<::objgraph::TypeDescriptor> {
                ::core::option::Option::Some(
                    ::objgraph::TypeDescriptor::record(
                        <Self as ::objgraph::Record>::TYPE_NAME,
                        vec![#(#descriptors),*],
                    )
                    #(.with_alias(#type_aliases))*
                )
            }

            fn register_dependencies(registry: &::objgraph::TypeRegistry) {
                let _ = registry;
                #(#dependencies)*
            }

            fn to_value(
                &self,
                writer: &mut ::objgraph::GraphWriter<'_>,
            ) -> ::objgraph::Result<::objgraph::Value> {
                writer.record(self)
            }

            fn from_value(
                value: &::objgraph::Value,
                reader: &mut ::objgraph::GraphReader<'_>,
            ) -> ::objgraph::Result<Self> {
                reader.record(value)
            }
        }

        impl ::objgraph::Record for #name {
            const TYPE_NAME: &'static str = #type_name;

            fn write_members(
                &self,
                object: ::objgraph::ObjectId,
                writer: &mut ::objgraph::GraphWriter<'_>,
            ) -> ::objgraph::Result<()> {
                let _ = (&object, &writer);
                #(#writes)*
                Ok(())
            }

            fn read_member(
                &mut self,
                index: usize,
                value: &::objgraph::Value,
                reader: &mut ::objgraph::GraphReader<'_>,
            ) -> ::objgraph::Result<()> {
                let _ = (&value, &reader);
                match index {
                    #(#reads)*
                    _ => {}
                }
                Ok(())
            }
        }
    })
}

fn derive_enum(
    name: &syn::Ident,
    type_name: &proc_macro2::TokenStream,
    type_aliases: &[LitStr],
    data: &syn::DataEnum,
) -> syn::Result<proc_macro2::TokenStream> {
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            name,
            "Enums need at least one variant",
        ));
    }

    let mut variants = Vec::new();
    let mut to_stored = Vec::new();
    let mut from_stored = Vec::new();

    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Only fieldless enum variants are supported",
            ));
        }
        let attrs = member_attrs(&variant.attrs)?;
        if attrs.transient || !attrs.aliases.is_empty() {
            return Err(syn::Error::new_spanned(
                variant,
                "enum variants only accept `rename`",
            ));
        }
        let ident = &variant.ident;
        let stored = attrs
            .rename
            .as_ref()
            .map_or_else(|| ident.unraw().to_string(), LitStr::value);

        variants.push(quote! {
            ::objgraph::EnumVariant::new(#stored, #name::#ident as i64)
        });
        to_stored.push(quote! { #name::#ident => (#stored, #name::#ident as i64), });
        from_stored.push(quote! { #stored => ::core::result::Result::Ok(#name::#ident), });
    }

    Ok(quote! {
        impl ::objgraph::Persist for #name {
            fn shape() -> ::objgraph::Shape {
                ::objgraph::Shape::Enum((#type_name).to_string())
            }

            fn descriptor() -> ::core::option::Option<::objgraph::TypeDescriptor> {
                ::core::option::Option::Some(
                    ::objgraph::TypeDescriptor::enumeration(#type_name, vec![#(#variants),*])
                        #(.with_alias(#type_aliases))*
                )
            }

            fn to_value(
                &self,
                writer: &mut ::objgraph::GraphWriter<'_>,
            ) -> ::objgraph::Result<::objgraph::Value> {
                writer.registry().ensure::<Self>();
                let (variant, discriminant): (&str, i64) = match self {
                    #(#to_stored)*
                };
                ::core::result::Result::Ok(::objgraph::Value::Enum(::objgraph::EnumValue {
                    type_name: (#type_name).to_string(),
                    variant: variant.to_string(),
                    discriminant,
                }))
            }

            fn from_value(
                value: &::objgraph::Value,
                reader: &mut ::objgraph::GraphReader<'_>,
            ) -> ::objgraph::Result<Self> {
                let mismatch = |found: ::std::string::String| ::objgraph::Error::TypeMismatch {
                    expected: (#type_name).to_string(),
                    found,
                };
                let ::objgraph::Value::Enum(stored) = value else {
                    return ::core::result::Result::Err(mismatch(value.describe()));
                };
                let descriptor = reader
                    .registry()
                    .descriptor_of::<Self>()
                    .ok_or_else(|| ::objgraph::Error::UnresolvableType((#type_name).to_string()))?;
                if !descriptor.answers_to(&stored.type_name) {
                    if !reader.registry().contains(&stored.type_name) {
                        return ::core::result::Result::Err(
                            ::objgraph::Error::UnresolvableType(stored.type_name.clone()),
                        );
                    }
                    return ::core::result::Result::Err(mismatch(stored.type_name.clone()));
                }
                let current = descriptor
                    .resolve_variant(&stored.variant, stored.discriminant)
                    .ok_or_else(|| mismatch(format!("unknown variant {}", stored.variant)))?;
                match current.name.as_str() {
                    #(#from_stored)*
                    other => ::core::result::Result::Err(mismatch(format!("unknown variant {other}"))),
                }
            }
        }
    })
}

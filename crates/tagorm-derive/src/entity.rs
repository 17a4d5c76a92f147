//! Entity derive macro implementation

use crate::attrs::{field_attrs, table_name};
use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let table = table_name(&input)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let mut defs = Vec::new();
    let mut getters = Vec::new();
    let mut setters = Vec::new();

    for field in fields {
        let attrs = field_attrs(field)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };

        let index = defs.len();
        let ident_str = ident.unraw().to_string();
        let keys = attrs.tags.iter().map(|(k, _)| k);
        let values = attrs.tags.iter().map(|(_, v)| v);

        defs.push(quote! {
            ::tagorm::FieldDef::new(#ident_str, &[#((#keys, #values)),*])
        });
        getters.push(quote! {
            #index => ::std::option::Option::Some(&self.#ident as &dyn ::tagorm::ToColumn),
        });
        setters.push(quote! {
            #index => self.#ident = ::tagorm::FromSqlValue::from_sql_value(value)?,
        });
    }

    Ok(quote! {
        impl #impl_generics ::tagorm::Entity for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;

            const FIELDS: &'static [::tagorm::FieldDef] = &[#(#defs),*];

            fn field(&self, index: usize) -> ::std::option::Option<&dyn ::tagorm::ToColumn> {
                match index {
                    #(#getters)*
                    _ => ::std::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn scan_field(
                &mut self,
                index: usize,
                value: ::tagorm::SqlValue,
            ) -> ::std::result::Result<(), ::tagorm::ConvertError> {
                match index {
                    #(#setters)*
                    _ => {}
                }
                ::std::result::Result::Ok(())
            }
        }
    })
}

//! Procedural macros for ui-binding

use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, DeriveInput};

/// Container-level attributes for #[derive(Bindable)]
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(bindable), supports(struct_named))]
struct BindableOpts {
    ident: syn::Ident,
    generics: syn::Generics,
    data: darling::ast::Data<(), BindableField>,

    /// Method called after every assignment
    #[darling(default)]
    on_change: Option<String>,
}

/// Field-level attributes
#[derive(Debug, FromField)]
#[darling(attributes(bindable))]
struct BindableField {
    ident: Option<syn::Ident>,

    /// Holds the element value (`Option<Value>`)
    #[darling(default)]
    value: bool,

    /// Receives per-observer values (`Vec<Option<Value>>`)
    #[darling(default)]
    values: bool,

    /// Backs `render_changes()` (`bool`)
    #[darling(default)]
    render_changes: bool,
}

/// Pick the single field flagged by `flag`, erroring on duplicates
fn flagged<'a>(
    fields: &'a [BindableField],
    flag: impl Fn(&BindableField) -> bool,
    attr: &str,
) -> syn::Result<Option<&'a syn::Ident>> {
    let mut found = fields.iter().filter(|f| flag(f));
    let first = found.next();
    if let Some(second) = found.next() {
        return Err(syn::Error::new_spanned(
            &second.ident,
            format!("only one field can be marked #[bindable({attr})]"),
        ));
    }
    Ok(first.and_then(|f| f.ident.as_ref()))
}

/// Derive macro for the Bindable trait
///
/// The element value lives in the field marked `#[bindable(value)]`, or in a
/// field named `value` when none is marked. It must be an `Option<Value>`.
///
/// Optional attributes:
/// - `#[bindable(values)]` on a `Vec<Option<Value>>` field keeps the
///   per-observer values from `set_values`
/// - `#[bindable(render_changes)]` on a `bool` field backs `render_changes()`
/// - `#[bindable(on_change = "method")]` on the struct calls `self.method()`
///   after every assignment
///
/// # Example
/// ```ignore
/// use ui_binding::{Bindable, Value};
///
/// #[derive(Bindable, Default)]
/// #[bindable(on_change = "refresh")]
/// struct NumberField {
///     #[bindable(value)]
///     current: Option<Value>,
///     #[bindable(render_changes)]
///     flash: bool,
///     text: String,
/// }
///
/// impl NumberField {
///     fn refresh(&mut self) {
///         self.text = self.current.as_ref().map(ToString::to_string).unwrap_or_default();
///     }
/// }
/// ```
#[proc_macro_derive(Bindable, attributes(bindable))]
pub fn derive_bindable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let opts = match BindableOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(e) => return e.write_errors().into(),
    };

    match expand_bindable(&opts) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_bindable(opts: &BindableOpts) -> syn::Result<TokenStream2> {
    let name = &opts.ident;
    let (impl_generics, ty_generics, where_clause) = opts.generics.split_for_impl();

    let fields = match &opts.data {
        darling::ast::Data::Struct(fields) => &fields.fields,
        darling::ast::Data::Enum(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "Bindable can only be derived for structs with named fields",
            ));
        }
    };

    let value_field = match flagged(fields, |f| f.value, "value")? {
        Some(ident) => ident.clone(),
        None => fields
            .iter()
            .filter_map(|f| f.ident.as_ref())
            .find(|ident| *ident == "value")
            .cloned()
            .ok_or_else(|| {
                syn::Error::new_spanned(
                    name,
                    "Bindable needs a field marked #[bindable(value)] or named `value`",
                )
            })?,
    };

    let notify = opts.on_change.as_ref().map(|method| {
        let method = format_ident!("{}", method);
        quote! { self.#method(); }
    });

    let set_values = flagged(fields, |f| f.values, "values")?.map(|values_field| {
        quote! {
            fn set_values(
                &mut self,
                values: ::std::vec::Vec<::core::option::Option<::ui_binding::Value>>,
            ) {
                let shared = ::ui_binding::collapse_values(&values);
                self.#values_field = values;
                ::ui_binding::Bindable::set_value(self, shared);
            }
        }
    });

    let render_changes = flagged(fields, |f| f.render_changes, "render_changes")?.map(|field| {
        quote! {
            fn render_changes(&self) -> bool {
                self.#field
            }

            fn set_render_changes(&mut self, render_changes: bool) {
                self.#field = render_changes;
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::ui_binding::Bindable for #name #ty_generics #where_clause {
            fn value(&self) -> ::core::option::Option<::ui_binding::Value> {
                ::core::clone::Clone::clone(&self.#value_field)
            }

            fn set_value(&mut self, value: ::core::option::Option<::ui_binding::Value>) {
                self.#value_field = value;
                #notify
            }

            #set_values

            #render_changes
        }
    })
}

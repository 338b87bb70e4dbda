// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Attribute macro selecting items by concurrency model. See `natmap-concurrency`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Ident, Item,
    parse::{Parse, ParseStream},
    parse_macro_input,
};

struct ModeArg {
    mode: Ident,
}

impl Parse for ModeArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        Ok(ModeArg {
            mode: input.parse()?,
        })
    }
}

/// Keep an item only for the given concurrency model of the `concurrency` crate.
///
/// Usage: `#[concurrency_mode(std)]` or `#[concurrency_mode(shuttle)]`.
///
/// The crate using the attribute must depend on `natmap-concurrency` under the name
/// `concurrency`.
///
/// # Example
/// ```no_compile
/// use concurrency::concurrency_mode;
///
/// #[concurrency_mode(shuttle)]
/// mod shuttle_tests {
///     // explored with randomized schedules
/// }
/// ```
#[proc_macro_attribute]
pub fn concurrency_mode(attr: TokenStream, item: TokenStream) -> TokenStream {
    let arg = parse_macro_input!(attr as ModeArg);
    let item = parse_macro_input!(item as Item);

    let output = match arg.mode.to_string().as_str() {
        "std" => quote! {
            ::concurrency::with_std! {
                #item
            }
        },
        "shuttle" => quote! {
            ::concurrency::with_shuttle! {
                #item
            }
        },
        other => {
            return syn::Error::new_spanned(
                &arg.mode,
                format!("unknown concurrency mode '{other}', expected 'std' or 'shuttle'"),
            )
            .to_compile_error()
            .into();
        }
    };

    output.into()
}

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::str_to_string)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::option_if_let_else)]

mod fields;
mod helpers;
mod register_plugin;
use proc_macro::TokenStream;

/// Macro to use to register a plugin
///
/// See the `plugin` module in the main `dbauth` crate for examples.
#[proc_macro]
pub fn register_plugin(item: TokenStream) -> TokenStream {
    register_plugin::entry(item)
}

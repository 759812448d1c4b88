use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

pub fn derive_component(input: TokenStream) -> TokenStream {
    // Parse the input tokens into a syntax tree
    let ast = parse_macro_input!(input as DeriveInput);

    // Get the struct name we are annotating
    let struct_name = &ast.ident;

    // Use ::pulse_engine::ecs::Component, which works both inside and outside
    // the crate. Inside, it resolves through `extern crate self as
    // pulse_engine;` in lib.rs; outside, through the dependency.
    //
    // The trait requires Default + Clone, so a missing derive on the struct
    // surfaces as a bound error on this impl.
    TokenStream::from(quote! {
        impl ::pulse_engine::ecs::Component for #struct_name {
        }
    })
}

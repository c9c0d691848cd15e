//! Implementation of the `register_plugin!` macro
//!
//! Takes a declaration like
//!
//! ```ignore
//! register_plugin! {
//!     MyAuth,
//!     ptype: PluginType::Authentication,
//!     name: "my_auth",
//!     author: "...",
//!     description: "...",
//!     license: License::Gpl,
//!     maturity: Maturity::Experimental,
//!     version: "0.1",
//!     auth: MyAuth,
//!     client_plugin: "my_auth_client",
//! }
//! ```
//!
//! and emits the `st_auth_plugin` descriptor plus the no-mangle
//! declaration statics the server's loader scans a shared object for.

use proc_macro::TokenStream;
use proc_macro2::Span;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Error, Expr, FieldValue, Ident, Token};
use quote::quote;

use crate::fields;
use crate::helpers::{expect_litstr, version_int};

/// Entrypoint for this proc macro
pub fn entry(tokens: TokenStream) -> TokenStream {
    let input = parse_macro_input!(tokens as PluginInfo);
    let plugindef = input.to_auth_struct();
    match plugindef {
        Ok(ts) => ts.into_output(),
        Err(e) => e.into_compile_error().into(),
    }
}

/// A representation of the contents of a registration macro
#[derive(Clone, Debug)]
struct PluginInfo {
    /// The main type that has required methods implemented on it
    main_ty: Ident,
    span: Span,
    ptype: Option<Expr>,
    name: Option<Expr>,
    author: Option<Expr>,
    description: Option<Expr>,
    license: Option<Expr>,
    maturity: Option<Expr>,
    version: Option<Expr>,
    init: Option<Expr>,
    auth: Option<Expr>,
    client_plugin: Option<Expr>,
}

impl Parse for PluginInfo {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let main_ty = input.parse()?;
        // FIXME: span is only the beginning
        let span = input.span();
        let mut ret = Self::new(main_ty, span);
        let _: Token![,] = input.parse()?;

        let fields = Punctuated::<FieldValue, Token![,]>::parse_terminated(input)?;
        let mut field_order: Vec<String> = Vec::new();
        for field in fields.clone() {
            let syn::Member::Named(name) = &field.member else {
                return Err(Error::new_spanned(field, "missing field name"));
            };

            let name_str = name.to_string();
            let expr = field.expr;

            match name_str.as_str() {
                "ptype" => ret.ptype = Some(expr),
                "name" => ret.name = Some(expr),
                "author" => ret.author = Some(expr),
                "description" => ret.description = Some(expr),
                "license" => ret.license = Some(expr),
                "maturity" => ret.maturity = Some(expr),
                "version" => ret.version = Some(expr),
                "init" => ret.init = Some(expr),
                "auth" => ret.auth = Some(expr),
                "client_plugin" => ret.client_plugin = Some(expr),
                _ => {
                    return Err(Error::new_spanned(
                        name,
                        format!("unexpected field '{name_str}'"),
                    ))
                }
            }
            field_order.push(name_str);
        }

        if let Err(msg) = verify_field_order(field_order.as_slice()) {
            return Err(Error::new_spanned(fields, msg));
        }
        Ok(ret)
    }
}

impl PluginInfo {
    fn new(main_ty: Ident, span: Span) -> Self {
        Self {
            main_ty,
            span,
            ptype: None,
            name: None,
            author: None,
            description: None,
            license: None,
            maturity: None,
            version: None,
            init: None,
            auth: None,
            client_plugin: None,
        }
    }

    /// Ensure we have the fields that are required for all plugin types
    fn validate_correct_fields(
        &self,
        required: &[&str],
        optional: &[&str],
        ptype: &str,
    ) -> syn::Result<()> {
        let name_map = [
            (&self.ptype, "ptype"),
            (&self.name, "name"),
            (&self.author, "author"),
            (&self.description, "description"),
            (&self.license, "license"),
            (&self.maturity, "maturity"),
            (&self.version, "version"),
            (&self.init, "init"),
            (&self.auth, "auth"),
            (&self.client_plugin, "client_plugin"),
        ];

        let mut req = fields::plugin::REQ_FIELDS.to_vec();
        req.extend_from_slice(required);

        for req_field in req.iter() {
            let (field_val, fname) = name_map.iter().find(|f| f.1 == *req_field).unwrap();

            if field_val.is_none() {
                let msg = format!("field '{fname}' is expected for plugins of type {ptype}, but not provided\n(in macro 'register_plugin')");
                return Err(Error::new(self.span, msg));
            }
        }

        for (field, fname) in name_map {
            if field.is_some() && !req.contains(&fname) && !optional.contains(&fname) {
                let msg = format!("field '{fname}' is not expected for plugins of type {ptype}\n(in macro 'register_plugin')");
                return Err(Error::new_spanned(field.as_ref().unwrap(), msg));
            }
        }

        Ok(())
    }

    /// Ensure we have the fields required for an authentication plugin
    fn validate_as_auth(&self) -> syn::Result<()> {
        self.validate_correct_fields(
            fields::plugin::AUTH_REQ_FIELDS,
            fields::plugin::AUTH_OPT_FIELDS,
            "authentication",
        )?;
        Ok(())
    }

    /// Turn `self` into the `st_auth_plugin` descriptor plus the outer
    /// declaration struct
    fn to_auth_struct(self) -> syn::Result<PluginDef> {
        self.validate_as_auth()?;

        let main_ty = &self.main_ty;
        let name = expect_litstr(&self.name)?;
        let plugin_st_name = Ident::new(&format!("_ST_PLUGIN_{}", name.value()), Span::call_site());

        let auth_ty = self.auth.as_ref().unwrap();
        let wrap = quote! { ::dbauth::plugin::auth_wrapper };
        let auth_trait = quote! { ::dbauth::plugin::authentication::Authentication };
        let interface_version =
            quote! { ::dbauth::bindings::AUTH_INTERFACE_VERSION as ::std::ffi::c_int };

        let client_plugin = match &self.client_plugin {
            Some(_) => {
                let lit = expect_litstr(&self.client_plugin)?;
                quote! { ::dbauth::internals::cstr!(#lit).as_ptr() }
            }
            None => quote! { ::std::ptr::null() },
        };

        let info_struct = quote! {
            static #plugin_st_name: ::dbauth::internals::UnsafeSyncCell<
                ::dbauth::bindings::st_auth_plugin,
            > = unsafe {
                ::dbauth::internals::UnsafeSyncCell::new(
                    ::dbauth::bindings::st_auth_plugin {
                        interface_version: #interface_version,
                        client_auth_plugin: #client_plugin,
                        authenticate_user: Some(#wrap::wrap_authenticate_user::<#auth_ty>),
                        generate_authentication_string:
                            Some(#wrap::wrap_generate_authentication_string::<#auth_ty>),
                        validate_authentication_string:
                            Some(#wrap::wrap_validate_authentication_string::<#auth_ty>),
                        set_salt: Some(#wrap::wrap_set_salt::<#auth_ty>),
                        authentication_flags: <#auth_ty as #auth_trait>::FLAGS.to_raw(),
                    }
                )
            };

            impl ::dbauth::plugin::wrapper::PluginMeta for #main_ty {
                const NAME: &'static str = #name;
            }
        };

        let version_str = expect_litstr(&self.version)?;
        let version = version_int(&version_str.value())
            .map_err(|e| Error::new_spanned(&self.version, e))?;
        let author = expect_litstr(&self.author)?;
        let description = expect_litstr(&self.description)?;
        let license = self.license.unwrap();
        let maturity = self.maturity.unwrap();
        let ptype = self.ptype.unwrap();

        let (fn_init, fn_deinit);
        if let Some(init_ty) = self.init {
            fn_init = quote! {
                Some(::dbauth::plugin::wrapper::wrap_init_fn::<#main_ty, #init_ty>)
            };
            fn_deinit = quote! {
                Some(::dbauth::plugin::wrapper::wrap_deinit_fn::<#main_ty, #init_ty>)
            };
        } else {
            fn_init = quote! { Some(::dbauth::plugin::wrapper::default_init_notype::<#main_ty>) };
            fn_deinit =
                quote! { Some(::dbauth::plugin::wrapper::default_deinit_notype::<#main_ty>) };
        }

        let plugin_struct = quote! {
            ::dbauth::bindings::st_plugin_decl {
                type_: #ptype.to_ptype_registration(),
                info: #plugin_st_name.as_ptr().cast_mut().cast(),
                name: ::dbauth::internals::cstr!(#name).as_ptr(),
                author: ::dbauth::internals::cstr!(#author).as_ptr(),
                descr: ::dbauth::internals::cstr!(#description).as_ptr(),
                license: #license.to_license_registration(),
                init: #fn_init,
                deinit: #fn_deinit,
                version: #version as ::std::ffi::c_uint,
                version_info: ::dbauth::internals::cstr!(#version_str).as_ptr(),
                maturity: #maturity.to_maturity_registration(),
            },
        };

        Ok(PluginDef {
            info_struct,
            plugin_struct,
        })
    }
}

/// Contains a struct definition of type `st_auth_plugin`, plus the
/// `st_plugin_decl` declaration that references it
struct PluginDef {
    info_struct: proc_macro2::TokenStream,
    plugin_struct: proc_macro2::TokenStream,
}

impl PluginDef {
    fn into_output(self) -> TokenStream {
        let make_ident = |s| Ident::new(s, Span::call_site());
        let vers_idt = make_ident("_plugin_interface_version_");
        let size_idt = make_ident("_sizeof_struct_st_plugin_");
        let decl_idt = make_ident("_plugin_declarations_");

        let plugin_ty = quote! { ::dbauth::bindings::st_plugin_decl };
        let version_val =
            quote! { ::dbauth::bindings::PLUGIN_INTERFACE_VERSION as ::std::ffi::c_int };
        let size_val = quote! { ::std::mem::size_of::<#plugin_ty>() as ::std::ffi::c_int };

        let usynccell = quote! { ::dbauth::internals::UnsafeSyncCell };
        let null_ps = quote! { ::dbauth::plugin::wrapper::new_null_plugin_decl() };

        let is = self.info_struct;
        let ps = self.plugin_struct;

        let ret: TokenStream = quote! {
            #[no_mangle]
            static #vers_idt: ::std::ffi::c_int = #version_val;

            #[no_mangle]
            static #size_idt: ::std::ffi::c_int = #size_val;

            #[no_mangle]
            static #decl_idt: [#usynccell<#plugin_ty>; 2] = unsafe { [
                #usynccell::new(#ps),
                #usynccell::new(#null_ps),
            ] };

            #is
        }
        .into();

        ret
    }
}

/// Verify attribute order
fn verify_field_order(given: &[String]) -> Result<(), String> {
    let mut expected_order = fields::plugin::ALL_FIELDS.to_vec();
    expected_order.retain(|expected| given.iter().any(|f| f == expected));

    if expected_order != given {
        Err(format!(
            "fields not in expected order. reorder as:\n{:?}",
            expected_order
        ))
    } else {
        Ok(())
    }
}

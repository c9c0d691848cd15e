//! Parent module for all plugin types

use std::ffi::{c_int, c_uint};

use dbauth_sys as bindings;
pub mod authentication;
#[doc(hidden)]
pub mod auth_wrapper;
pub mod vio;
#[doc(hidden)]
pub mod wrapper;
pub use dbauth_macros::register_plugin;

/// Commonly used plugin types for reexport
pub mod prelude {
    pub use super::authentication::{
        AuthError, AuthFlags, AuthInfo, Authentication, PasswordUsed,
    };
    pub use super::vio::Vio;
    pub use super::{register_plugin, Init, InitError, License, Maturity, PluginType};
}

/// Defines possible licenses for plugins
#[non_exhaustive]
#[derive(Clone, Copy, Debug)]
pub enum License {
    Proprietary = bindings::PLUGIN_LICENSE_PROPRIETARY as isize,
    Gpl = bindings::PLUGIN_LICENSE_GPL as isize,
    Bsd = bindings::PLUGIN_LICENSE_BSD as isize,
}

impl License {
    #[doc(hidden)]
    pub const fn to_license_registration(self) -> c_int {
        self as c_int
    }
}

/// Defines a type of plugin. This determines the required implementation.
#[non_exhaustive]
pub enum PluginType {
    Authentication = bindings::PLUGIN_TYPE_AUTHENTICATION as isize,
    PasswordValidation = bindings::PLUGIN_TYPE_PASSWORD_VALIDATION as isize,
}

impl PluginType {
    #[doc(hidden)]
    pub const fn to_ptype_registration(self) -> c_int {
        self as c_int
    }
}

/// Defines the stability level a plugin declares for itself
#[non_exhaustive]
pub enum Maturity {
    Unknown = bindings::PLUGIN_MATURITY_UNKNOWN as isize,
    Experimental = bindings::PLUGIN_MATURITY_EXPERIMENTAL as isize,
    Alpha = bindings::PLUGIN_MATURITY_ALPHA as isize,
    Beta = bindings::PLUGIN_MATURITY_BETA as isize,
    Gamma = bindings::PLUGIN_MATURITY_GAMMA as isize,
    Stable = bindings::PLUGIN_MATURITY_STABLE as isize,
}

impl Maturity {
    #[doc(hidden)]
    pub const fn to_maturity_registration(self) -> c_uint {
        self as c_uint
    }
}

pub struct InitError;

/// Implement this trait if your plugin requires init or deinit functions
pub trait Init {
    fn init() -> Result<(), InitError> {
        Ok(())
    }

    fn deinit() -> Result<(), InitError> {
        Ok(())
    }
}

//! Requirements to implement an authentication plugin
//!
//! # Usage
//!
//! Implement [`Authentication`] on a marker type, then point the
//! `register_plugin!` macro at it. The server drives the five operations;
//! each call is one-shot and synchronous, and distinct connection attempts
//! may invoke them concurrently. Keep any cross-call state in your own
//! synchronized globals.
//!
//! # Implementation
//!
//! The registration macro fills a `st_auth_plugin` descriptor:
//!
//! - `interface_version`: int, set by macro
//! - `client_auth_plugin`: `char *`, the client plugin this plugin pairs
//!   with. Set by macro, null if unrestricted
//! - `authenticate_user`: function, wraps [`Authentication::authenticate`]
//! - `generate_authentication_string`: function, wraps
//!   [`Authentication::generate_auth_string`]
//! - `validate_authentication_string`: function, wraps
//!   [`Authentication::validate_auth_string`]
//! - `set_salt`: function, wraps [`Authentication::derive_salt`]
//! - `authentication_flags`: bitset built from [`Authentication::FLAGS`]

use std::ffi::{c_char, c_int, c_uchar, c_uint, c_ulong, CStr};
use std::{ptr, slice};

use dbauth_sys as bindings;

use super::vio::Vio;

/// Controls the wording of the server's "Authentication failed. Password
/// used: %s" message. Set it as appropriate or ignore at will.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordUsed {
    No = bindings::PASSWORD_USED_NO as isize,
    Yes = bindings::PASSWORD_USED_YES as isize,
    /// The message will not mention a password at all
    #[default]
    NotMentioned = bindings::PASSWORD_USED_NO_MENTION as isize,
}

impl PasswordUsed {
    pub(crate) const fn from_raw(value: c_int) -> Self {
        match value {
            bindings::PASSWORD_USED_NO => Self::No,
            bindings::PASSWORD_USED_YES => Self::Yes,
            _ => Self::NotMentioned,
        }
    }

    pub(crate) const fn to_raw(self) -> c_int {
        self as c_int
    }
}

/// Capabilities a plugin declares in its descriptor, by name rather than
/// bit position. Converted to the raw bitset at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthFlags {
    /// A sufficiently privileged user may change another account's
    /// password through this plugin without knowing the old one.
    pub privileged_password_change: bool,
    /// The plugin manages its own credential storage rather than relying
    /// on the server's built-in store.
    pub internal_storage: bool,
}

impl AuthFlags {
    pub const NONE: Self = Self {
        privileged_password_change: false,
        internal_storage: false,
    };

    #[doc(hidden)]
    pub const fn to_raw(self) -> c_ulong {
        let mut raw = 0;
        if self.privileged_password_change {
            raw |= bindings::AUTH_FLAG_PRIVILEGED_USER_FOR_PASSWORD_CHANGE;
        }
        if self.internal_storage {
            raw |= bindings::AUTH_FLAG_USES_INTERNAL_STORAGE;
        }
        raw
    }

    pub const fn from_raw(raw: c_ulong) -> Self {
        Self {
            privileged_password_change: raw
                & bindings::AUTH_FLAG_PRIVILEGED_USER_FOR_PASSWORD_CHANGE
                != 0,
            internal_storage: raw & bindings::AUTH_FLAG_USES_INTERNAL_STORAGE != 0,
        }
    }
}

/// Why an operation failed, on the Rust side.
///
/// The wire contract collapses all of these into a single nonzero status;
/// the distinction exists so implementations and logs can tell bad
/// credentials from misuse from channel trouble.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Credentials did not match
    AccessDenied,
    /// Input (digest, hash, packet) is not in the expected format
    Malformed,
    /// The caller-provided output buffer cannot hold the result. Nothing
    /// has been written to it.
    BufferTooSmall,
    /// The credential was rejected by policy before any digest was made
    PolicyViolation,
    /// The I/O channel failed or yielded no data
    Io,
}

impl From<super::vio::VioError> for AuthError {
    fn from(_: super::vio::VioError) -> Self {
        Self::Io
    }
}

/// Returned when a setter would overflow a fixed-capacity field. The
/// field is left unchanged; truncation is never silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncateError {
    pub capacity: usize,
    pub len: usize,
}

/// Per-attempt authentication context, owned by the server.
///
/// Lifetime is a single authentication attempt; no reference may be
/// retained after `authenticate` returns.
#[repr(transparent)]
pub struct AuthInfo(bindings::st_server_auth_info);

impl AuthInfo {
    /// # Safety
    ///
    /// `info` must point to a valid `st_server_auth_info` that outlives
    /// the returned reference, with no other live references to it.
    pub unsafe fn from_raw<'a>(info: *mut bindings::st_server_auth_info) -> &'a mut Self {
        &mut *info.cast::<Self>()
    }

    /// User name as sent by the client, or `None` if the packet carrying
    /// it has not been received yet. Do not assume this is populated.
    pub fn user_name(&self) -> Option<&[u8]> {
        if self.0.user_name.is_null() {
            return None;
        }
        // SAFETY: the server guarantees pointer/length validity for the
        // duration of the attempt
        Some(unsafe {
            slice::from_raw_parts(self.0.user_name.cast::<u8>(), self.0.user_name_length as usize)
        })
    }

    /// Stored credential material for the matched account. Read-only.
    pub fn auth_string(&self) -> &[u8] {
        if self.0.auth_string.is_null() {
            return &[];
        }
        // SAFETY: as `user_name`
        unsafe {
            slice::from_raw_parts(
                self.0.auth_string.cast::<u8>(),
                self.0.auth_string_length as usize,
            )
        }
    }

    /// Resolved client host, or its IP address as a fallback.
    pub fn host_or_ip(&self) -> &[u8] {
        if self.0.host_or_ip.is_null() {
            return &[];
        }
        // SAFETY: as `user_name`
        unsafe {
            slice::from_raw_parts(
                self.0.host_or_ip.cast::<u8>(),
                self.0.host_or_ip_length as usize,
            )
        }
    }

    /// The identity currently set for authorization purposes.
    pub fn authenticated_as(&self) -> &[u8] {
        cbuf_until_nul(&self.0.authenticated_as)
    }

    /// Redirect authorization to a different principal than the matched
    /// account. Errors if `name` exceeds the field capacity.
    pub fn set_authenticated_as(&mut self, name: impl AsRef<[u8]>) -> Result<(), TruncateError> {
        write_cbuf(&mut self.0.authenticated_as, name.as_ref())
    }

    /// The externally visible identity, as previously set.
    pub fn external_user(&self) -> &[u8] {
        cbuf_until_nul(&self.0.external_user)
    }

    /// Record the external identity shown by session introspection.
    /// Should be UTF-8. Errors if `name` exceeds the field capacity.
    pub fn set_external_user(&mut self, name: impl AsRef<[u8]>) -> Result<(), TruncateError> {
        write_cbuf(&mut self.0.external_user, name.as_ref())
    }

    pub fn password_used(&self) -> PasswordUsed {
        PasswordUsed::from_raw(self.0.password_used)
    }

    pub fn set_password_used(&mut self, used: PasswordUsed) {
        self.0.password_used = used.to_raw();
    }
}

/// View a nul-terminated C buffer as bytes, excluding the terminator.
fn cbuf_until_nul(buf: &[c_char]) -> &[u8] {
    // SAFETY: c_char and u8 have identical layout
    let bytes = unsafe { slice::from_raw_parts(buf.as_ptr().cast::<u8>(), buf.len()) };
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Copy `src` into a fixed-capacity nul-terminated field, rejecting
/// anything that does not fit with its terminator.
fn write_cbuf(dst: &mut [c_char], src: &[u8]) -> Result<(), TruncateError> {
    if src.len() >= dst.len() {
        return Err(TruncateError {
            capacity: dst.len() - 1,
            len: src.len(),
        });
    }
    for (d, s) in dst.iter_mut().zip(src) {
        *d = *s as c_char;
    }
    dst[src.len()] = 0;
    Ok(())
}

/// Implement this trait on a type that will serve as an authentication
/// plugin.
///
/// Every operation is stateless from the interface's perspective: the
/// server may invoke them concurrently for distinct attempts, each with
/// its own [`AuthInfo`] and channel.
pub trait Authentication: Send + Sized {
    /// Capabilities to advertise in the descriptor.
    const FLAGS: AuthFlags = AuthFlags::NONE;

    /// Exchange packets with the client over `vio` and decide whether the
    /// attempt succeeds.
    ///
    /// `info.user_name()` may be `None` if the client has not identified
    /// itself yet. On success, `info.set_authenticated_as` may be used to
    /// authorize as a different principal.
    fn authenticate(vio: &mut Vio, info: &mut AuthInfo) -> Result<(), AuthError>;

    /// Check `password` against policy, then write its stored digest to
    /// `out` and return the number of bytes written.
    ///
    /// If the digest would exceed `out.len()`, fail with
    /// [`AuthError::BufferTooSmall`] and write nothing; never truncate.
    fn generate_auth_string(password: &[u8], out: &mut [u8]) -> Result<usize, AuthError>;

    /// Check that `digest` is well formed for this plugin's format.
    fn validate_auth_string(digest: &[u8]) -> Result<(), AuthError>;

    /// Convert a stored (possibly textual) password hash into the binary
    /// salt form the mechanism needs, writing into `out` and returning
    /// the written length. Malformed hashes are an error, never a
    /// truncated or garbage salt.
    fn derive_salt(stored_hash: &[u8], out: &mut [u8]) -> Result<usize, AuthError>;
}

/// The plugin reported failure. The interface does not say why; the
/// server turns this into its user-facing diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRejected;

/// Why a raw descriptor was refused by [`AuthPluginHandle::from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleError {
    /// The descriptor was built against a different interface version.
    /// None of its function pointers may be invoked.
    VersionMismatch { expected: c_int, found: c_int },
    /// A required entry in the descriptor is null
    MissingEntry(&'static str),
}

/// Host-side view of a registered descriptor.
///
/// This is the only path from a raw `st_auth_plugin` to an invocation:
/// construction verifies the interface version, so a mismatched plugin
/// can never have a function pointer called.
#[derive(Debug)]
pub struct AuthPluginHandle<'a> {
    raw: &'a bindings::st_auth_plugin,
}

impl<'a> AuthPluginHandle<'a> {
    /// Validate a descriptor before use.
    ///
    /// # Safety
    ///
    /// The descriptor's function pointers must be sound for the signatures
    /// declared in `st_auth_plugin`, and `client_auth_plugin`, if set,
    /// must point to a nul-terminated string living as long as `raw`.
    pub unsafe fn from_raw(raw: &'a bindings::st_auth_plugin) -> Result<Self, HandleError> {
        if raw.interface_version != bindings::AUTH_INTERFACE_VERSION {
            return Err(HandleError::VersionMismatch {
                expected: bindings::AUTH_INTERFACE_VERSION,
                found: raw.interface_version,
            });
        }

        let entries = [
            (raw.authenticate_user.is_none(), "authenticate_user"),
            (
                raw.generate_authentication_string.is_none(),
                "generate_authentication_string",
            ),
            (
                raw.validate_authentication_string.is_none(),
                "validate_authentication_string",
            ),
            (raw.set_salt.is_none(), "set_salt"),
        ];
        if let Some(&(_, name)) = entries.iter().find(|(missing, _)| *missing) {
            return Err(HandleError::MissingEntry(name));
        }

        Ok(Self { raw })
    }

    /// Client-side plugin this descriptor requires, if restricted.
    pub fn client_plugin(&self) -> Option<&CStr> {
        if self.raw.client_auth_plugin.is_null() {
            return None;
        }
        // SAFETY: from_raw's caller guaranteed termination and lifetime
        Some(unsafe { CStr::from_ptr(self.raw.client_auth_plugin) })
    }

    pub fn flags(&self) -> AuthFlags {
        AuthFlags::from_raw(self.raw.authentication_flags)
    }

    /// Run the plugin's authentication exchange for one attempt.
    pub fn authenticate_user(
        &self,
        vio: &mut Vio,
        info: &mut AuthInfo,
    ) -> Result<(), AuthRejected> {
        let Some(f) = self.raw.authenticate_user else {
            return Err(AuthRejected);
        };
        let vio_ptr = ptr::from_mut(vio).cast::<bindings::st_plugin_vio>();
        let info_ptr = ptr::from_mut(info).cast::<bindings::st_server_auth_info>();
        // SAFETY: repr(transparent) wrappers, validated descriptor
        let ret = unsafe { f(vio_ptr, info_ptr) };
        if ret == 0 {
            Ok(())
        } else {
            Err(AuthRejected)
        }
    }

    /// Have the plugin digest `password` into `out`, returning the
    /// written length.
    pub fn generate_authentication_string(
        &self,
        password: &[u8],
        out: &mut [u8],
    ) -> Result<usize, AuthRejected> {
        let Some(f) = self.raw.generate_authentication_string else {
            return Err(AuthRejected);
        };
        let mut len: c_uint = out.len().try_into().unwrap_or(c_uint::MAX);
        // SAFETY: slice pointers valid for the declared lengths
        let ret = unsafe {
            f(
                out.as_mut_ptr().cast::<c_char>(),
                &mut len,
                password.as_ptr().cast::<c_char>(),
                password.len().try_into().unwrap_or(c_uint::MAX),
            )
        };
        if ret == 0 {
            Ok(len as usize)
        } else {
            Err(AuthRejected)
        }
    }

    pub fn validate_authentication_string(&self, digest: &[u8]) -> Result<(), AuthRejected> {
        let Some(f) = self.raw.validate_authentication_string else {
            return Err(AuthRejected);
        };
        // SAFETY: slice pointer valid for the declared length
        let ret = unsafe {
            f(
                digest.as_ptr().cast::<c_char>(),
                digest.len().try_into().unwrap_or(c_uint::MAX),
            )
        };
        if ret == 0 {
            Ok(())
        } else {
            Err(AuthRejected)
        }
    }

    /// Have the plugin derive the binary salt for a stored hash. The
    /// in/out length slot is a single byte, so `out` is capped at 255.
    pub fn set_salt(&self, stored_hash: &[u8], out: &mut [u8]) -> Result<usize, AuthRejected> {
        let Some(f) = self.raw.set_salt else {
            return Err(AuthRejected);
        };
        let mut len: c_uchar = out.len().min(c_uchar::MAX as usize) as c_uchar;
        // SAFETY: slice pointers valid for the declared lengths
        let ret = unsafe {
            f(
                stored_hash.as_ptr().cast::<c_char>(),
                stored_hash.len().try_into().unwrap_or(c_uint::MAX),
                out.as_mut_ptr(),
                &mut len,
            )
        };
        if ret == 0 {
            Ok(len as usize)
        } else {
            Err(AuthRejected)
        }
    }
}

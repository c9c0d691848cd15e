//! Raw definitions for the server authentication plugin interface.
//!
//! Everything in this crate is a direct `#[repr(C)]` mirror of what the
//! server expects to find in a loaded plugin: the per-attempt auth info
//! struct, the authentication descriptor with its five entry points, the
//! opaque I/O channel handle, and the outer plugin declaration frame.
//!
//! These structs are hand written rather than generated; the surface is
//! small and there is no header tree to run a generator against. Field
//! order and widths are ABI, do not reorder.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_uchar, c_uint, c_ulong, c_void};

/// Version of the authentication plugin interface. The server refuses to
/// call into a descriptor that reports anything else.
pub const AUTH_INTERFACE_VERSION: c_int = 0x0101;

/// Version of the outer plugin declaration frame.
pub const PLUGIN_INTERFACE_VERSION: c_int = 0x0100;

/* values for st_server_auth_info.password_used */

pub const PASSWORD_USED_NO: c_int = 0;
pub const PASSWORD_USED_YES: c_int = 1;
pub const PASSWORD_USED_NO_MENTION: c_int = 2;

/* authentication capability flags */

/// A user with sufficient privilege may run this plugin's password change
/// path for another account without supplying the old password.
pub const AUTH_FLAG_PRIVILEGED_USER_FOR_PASSWORD_CHANGE: c_ulong = 1 << 0;
/// The plugin keeps its own credential store instead of the server's.
pub const AUTH_FLAG_USES_INTERNAL_STORAGE: c_ulong = 1 << 1;

/// Maximum user name length in bytes, excluding the nul terminator.
pub const USERNAME_LENGTH: usize = 512;

/// Capacity of `st_server_auth_info.external_user`, including terminator.
pub const EXTERNAL_USER_LENGTH: usize = 512;

/* plugin declaration constants */

pub const PLUGIN_TYPE_AUTHENTICATION: c_int = 2;
pub const PLUGIN_TYPE_PASSWORD_VALIDATION: c_int = 3;

pub const PLUGIN_LICENSE_PROPRIETARY: c_int = 0;
pub const PLUGIN_LICENSE_GPL: c_int = 1;
pub const PLUGIN_LICENSE_BSD: c_int = 2;

pub const PLUGIN_MATURITY_UNKNOWN: c_uint = 0;
pub const PLUGIN_MATURITY_EXPERIMENTAL: c_uint = 1;
pub const PLUGIN_MATURITY_ALPHA: c_uint = 2;
pub const PLUGIN_MATURITY_BETA: c_uint = 3;
pub const PLUGIN_MATURITY_GAMMA: c_uint = 4;
pub const PLUGIN_MATURITY_STABLE: c_uint = 5;

/// Transport used by a connection, as reported by `st_plugin_vio::info`.
#[repr(C)]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum vio_protocol {
    VIO_PROTO_TCP = 0,
    VIO_PROTO_SOCKET = 1,
    VIO_PROTO_PIPE = 2,
    VIO_PROTO_MEMORY = 3,
}

/// Connection details a plugin may query from the channel.
#[repr(C)]
#[derive(Debug)]
pub struct st_plugin_vio_info {
    pub protocol: vio_protocol,
    /// Connection socket fd, if the transport has one.
    pub socket: c_int,
}

/// Opaque bidirectional packet channel between the plugin and the
/// connecting client. Owned by the server; the plugin only ever holds a
/// borrowed pointer for the duration of one `authenticate_user` call.
#[repr(C)]
pub struct st_plugin_vio {
    /// Read one packet. On success `*buf` points at the channel's internal
    /// buffer (valid until the next read) and the packet length is
    /// returned. Negative return means the channel failed.
    pub read_packet:
        Option<unsafe extern "C" fn(vio: *mut st_plugin_vio, buf: *mut *mut c_uchar) -> c_int>,
    /// Write one packet. Returns 0 on success, nonzero on failure.
    pub write_packet: Option<
        unsafe extern "C" fn(
            vio: *mut st_plugin_vio,
            packet: *const c_uchar,
            packet_len: c_int,
        ) -> c_int,
    >,
    /// Fill `info` with connection details.
    pub info:
        Option<unsafe extern "C" fn(vio: *mut st_plugin_vio, info: *mut st_plugin_vio_info)>,
}

/// Per-attempt authentication context. Allocated and owned by the server,
/// passed to the plugin by reference, discarded when the attempt ends.
#[repr(C)]
pub struct st_server_auth_info {
    /// User name as sent by the client. Null until the client packet
    /// carrying it has been received.
    pub user_name: *mut c_char,
    pub user_name_length: c_uint,
    /// Stored credential material for the matching account. Read only.
    pub auth_string: *const c_char,
    pub auth_string_length: c_ulong,
    /// Account name used for authorization. Prefilled by the server with
    /// the matched account; the plugin may overwrite it to redirect
    /// authorization to a different principal. Nul terminated.
    pub authenticated_as: [c_char; USERNAME_LENGTH + 1],
    /// Externally visible identity, exposed to session introspection.
    /// Nul-terminated UTF-8.
    pub external_user: [c_char; EXTERNAL_USER_LENGTH],
    /// One of the `PASSWORD_USED_*` values; only affects the wording of
    /// the server's "Authentication failed" message.
    pub password_used: c_int,
    /// Resolved client host name, or its IP address as a fallback.
    pub host_or_ip: *const c_char,
    pub host_or_ip_length: c_uint,
}

/// Server authentication plugin descriptor. Registered once at load time,
/// immutable afterwards; one descriptor serves many sequential attempts.
#[repr(C)]
#[derive(Debug)]
pub struct st_auth_plugin {
    /// Must be `AUTH_INTERFACE_VERSION` or the server ignores the plugin.
    pub interface_version: c_int,
    /// Client-side plugin this server plugin pairs with. Null means any.
    pub client_auth_plugin: *const c_char,
    /// Perform authentication over `vio`, returning 0 on success. May fill
    /// `info.authenticated_as` to authorize as a different principal.
    pub authenticate_user: Option<
        unsafe extern "C" fn(vio: *mut st_plugin_vio, info: *mut st_server_auth_info) -> c_int,
    >,
    /// Produce a stored digest from a plaintext credential. `*outbuflen`
    /// carries the buffer capacity in and the written length out.
    pub generate_authentication_string: Option<
        unsafe extern "C" fn(
            outbuf: *mut c_char,
            outbuflen: *mut c_uint,
            inbuf: *const c_char,
            inbuflen: c_uint,
        ) -> c_int,
    >,
    /// Check that a previously generated digest is well formed.
    pub validate_authentication_string:
        Option<unsafe extern "C" fn(inbuf: *const c_char, buflen: c_uint) -> c_int>,
    /// Convert a stored password hash to the binary salt form some
    /// mechanisms need. `*salt_len` is capacity in, written length out.
    pub set_salt: Option<
        unsafe extern "C" fn(
            password: *const c_char,
            password_len: c_uint,
            salt: *mut c_uchar,
            salt_len: *mut c_uchar,
        ) -> c_int,
    >,
    /// Bitset of `AUTH_FLAG_*` capabilities.
    pub authentication_flags: c_ulong,
}

/// Outer plugin declaration the server's loader scans for. Declarations
/// are emitted as an array terminated by an all-null entry.
#[repr(C)]
pub struct st_plugin_decl {
    pub type_: c_int,
    /// Points at the type-specific descriptor, e.g. `st_auth_plugin`.
    pub info: *mut c_void,
    pub name: *const c_char,
    pub author: *const c_char,
    pub descr: *const c_char,
    pub license: c_int,
    pub init: Option<unsafe extern "C" fn(arg1: *mut c_void) -> c_int>,
    pub deinit: Option<unsafe extern "C" fn(arg1: *mut c_void) -> c_int>,
    pub version: c_uint,
    pub version_info: *const c_char,
    pub maturity: c_uint,
}

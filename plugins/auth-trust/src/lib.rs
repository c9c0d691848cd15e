//! An authentication plugin that trusts the transport.
//!
//! Meant for connections that are already authenticated a layer below
//! (unix socket peers, service meshes, test rigs). The client sends one
//! packet with its external identity, `name@realm`; the realm is
//! stripped for authorization and the full identity is preserved for
//! session introspection. No credential is ever checked, which is also
//! why the plugin advertises internal storage: the server's credential
//! store has nothing useful for it.

use dbauth::log::info;
use dbauth::plugin::authentication::{
    AuthError, AuthFlags, AuthInfo, Authentication, PasswordUsed,
};
use dbauth::plugin::vio::Vio;
use dbauth::plugin::{register_plugin, License, Maturity, PluginType};

register_plugin! {
    TrustAuth,
    ptype: PluginType::Authentication,
    name: "auth_trust",
    author: "DBAuth contributors",
    description: "Trusts transport-level identity, maps name@realm for authorization",
    license: License::Gpl,
    maturity: Maturity::Experimental,
    version: "0.1",
    auth: TrustAuth,
}

pub struct TrustAuth;

/// The authorization principal for an external identity: everything up
/// to the realm separator.
fn primary_identity(identity: &[u8]) -> &[u8] {
    match identity.iter().position(|&b| b == b'@') {
        Some(at) => &identity[..at],
        None => identity,
    }
}

impl Authentication for TrustAuth {
    const FLAGS: AuthFlags = AuthFlags {
        privileged_password_change: false,
        internal_storage: true,
    };

    fn authenticate(vio: &mut Vio, info: &mut AuthInfo) -> Result<(), AuthError> {
        let identity = vio.read_packet()?.to_vec();
        let principal = primary_identity(&identity);
        // A realm-only banner must not authorize as the empty principal
        if principal.is_empty() {
            return Err(AuthError::AccessDenied);
        }

        info.set_external_user(&identity)
            .map_err(|_| AuthError::Malformed)?;
        info.set_authenticated_as(principal)
            .map_err(|_| AuthError::Malformed)?;
        info.set_password_used(PasswordUsed::NotMentioned);

        info!(
            "trusted connection from {} authorized as {}",
            String::from_utf8_lossy(info.host_or_ip()),
            String::from_utf8_lossy(principal),
        );
        Ok(())
    }

    // There is no credential; the stored auth string must stay empty.

    fn generate_auth_string(password: &[u8], _out: &mut [u8]) -> Result<usize, AuthError> {
        if password.is_empty() {
            Ok(0)
        } else {
            // Accepting a password here would silently discard it
            Err(AuthError::PolicyViolation)
        }
    }

    fn validate_auth_string(digest: &[u8]) -> Result<(), AuthError> {
        if digest.is_empty() {
            Ok(())
        } else {
            Err(AuthError::Malformed)
        }
    }

    fn derive_salt(stored_hash: &[u8], _out: &mut [u8]) -> Result<usize, AuthError> {
        if stored_hash.is_empty() {
            Ok(0)
        } else {
            Err(AuthError::Malformed)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::ffi::{c_int, c_uchar};
    use std::ptr;

    use dbauth::bindings;

    use super::*;

    #[test]
    fn identity_mapping() {
        assert_eq!(primary_identity(b"alice@corp.example"), b"alice");
        assert_eq!(primary_identity(b"bob"), b"bob");
        assert_eq!(primary_identity(b"@realm-only"), b"");
    }

    #[test]
    fn non_empty_password_rejected_by_policy() {
        let mut out = [0u8; 8];
        assert_eq!(TrustAuth::generate_auth_string(b"", &mut out), Ok(0));
        assert_eq!(
            TrustAuth::generate_auth_string(b"hunter2", &mut out),
            Err(AuthError::PolicyViolation)
        );
    }

    #[test]
    fn empty_auth_string_is_the_only_valid_one() {
        TrustAuth::validate_auth_string(b"").unwrap();
        assert_eq!(
            TrustAuth::validate_auth_string(b"$A$x$y"),
            Err(AuthError::Malformed)
        );
        let mut out = [0u8; 8];
        assert_eq!(TrustAuth::derive_salt(b"", &mut out), Ok(0));
        assert_eq!(
            TrustAuth::derive_salt(b"stale", &mut out),
            Err(AuthError::Malformed)
        );
    }

    thread_local! {
        static BANNER: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
    }

    unsafe extern "C" fn banner_read(
        _vio: *mut bindings::st_plugin_vio,
        buf: *mut *mut c_uchar,
    ) -> c_int {
        BANNER.with(|b| {
            let mut b = b.borrow_mut();
            if b.is_empty() {
                return -1;
            }
            *buf = b.as_mut_ptr();
            b.len() as c_int
        })
    }

    fn banner_vio(banner: &[u8]) -> bindings::st_plugin_vio {
        BANNER.with(|b| *b.borrow_mut() = banner.to_vec());
        bindings::st_plugin_vio {
            read_packet: Some(banner_read),
            write_packet: None,
            info: None,
        }
    }

    fn attempt_info() -> bindings::st_server_auth_info {
        bindings::st_server_auth_info {
            user_name: ptr::null_mut(),
            user_name_length: 0,
            auth_string: ptr::null(),
            auth_string_length: 0,
            authenticated_as: [0; bindings::USERNAME_LENGTH + 1],
            external_user: [0; bindings::EXTERNAL_USER_LENGTH],
            password_used: bindings::PASSWORD_USED_NO,
            host_or_ip: ptr::null(),
            host_or_ip_length: 0,
        }
    }

    #[test]
    fn realm_stripped_for_authorization() {
        let mut vio = banner_vio(b"alice@corp.example");
        let mut info = attempt_info();

        let res = TrustAuth::authenticate(
            unsafe { Vio::from_raw(&mut vio) },
            unsafe { AuthInfo::from_raw(&mut info) },
        );
        assert_eq!(res, Ok(()));

        let view = unsafe { AuthInfo::from_raw(&mut info) };
        assert_eq!(view.authenticated_as(), b"alice");
        assert_eq!(view.external_user(), b"alice@corp.example");
        assert_eq!(info.password_used, bindings::PASSWORD_USED_NO_MENTION);
    }

    #[test]
    fn silent_or_empty_banner_rejected() {
        let mut vio = banner_vio(b"");
        let mut info = attempt_info();
        let res = TrustAuth::authenticate(
            unsafe { Vio::from_raw(&mut vio) },
            unsafe { AuthInfo::from_raw(&mut info) },
        );
        assert!(res.is_err());
    }

    #[test]
    fn realm_only_banner_never_authorizes_empty_principal() {
        let mut vio = banner_vio(b"@corp.example");
        let mut info = attempt_info();
        let res = TrustAuth::authenticate(
            unsafe { Vio::from_raw(&mut vio) },
            unsafe { AuthInfo::from_raw(&mut info) },
        );
        assert_eq!(res, Err(AuthError::AccessDenied));
        // nothing was written to the authorization identity
        let view = unsafe { AuthInfo::from_raw(&mut info) };
        assert_eq!(view.authenticated_as(), b"");
        assert_eq!(view.external_user(), b"");
    }
}

//! Wrappers needed for the `st_auth_plugin` type
//!
//! Each function here adapts one descriptor entry point to the safe
//! [`Authentication`] trait: raw pointers become borrowed views, the
//! error taxonomy collapses to the 0/nonzero status the server expects,
//! and in/out length slots are only updated on success (zeroed on
//! failure, so a rejected call can never look like a short write).

use std::ffi::{c_char, c_int, c_uchar, c_uint};
use std::slice;

use dbauth_sys as bindings;
use log::warn;

use super::authentication::{AuthInfo, Authentication};
use super::vio::Vio;

/// Borrow `ptr[..len]`, tolerating the null-with-zero-length convention.
unsafe fn in_slice<'a>(ptr: *const c_char, len: usize) -> &'a [u8] {
    if ptr.is_null() {
        &[]
    } else {
        slice::from_raw_parts(ptr.cast::<u8>(), len)
    }
}

/// # Safety
///
/// `vio` and `info` must be valid for the duration of the call, with no
/// other live references.
pub unsafe extern "C" fn wrap_authenticate_user<A: Authentication>(
    vio: *mut bindings::st_plugin_vio,
    info: *mut bindings::st_server_auth_info,
) -> c_int {
    let vio = Vio::from_raw(vio);
    let info = AuthInfo::from_raw(info);

    match A::authenticate(vio, info) {
        Ok(()) => 0,
        Err(e) => {
            warn!("authentication rejected: {e:?}");
            1
        }
    }
}

/// # Safety
///
/// `outbuf` must be valid for `*outbuflen` bytes, `inbuf` for `inbuflen`.
pub unsafe extern "C" fn wrap_generate_authentication_string<A: Authentication>(
    outbuf: *mut c_char,
    outbuflen: *mut c_uint,
    inbuf: *const c_char,
    inbuflen: c_uint,
) -> c_int {
    let password = in_slice(inbuf, inbuflen as usize);
    let capacity = (*outbuflen) as usize;
    let mut empty: [u8; 0] = [];
    let out = if outbuf.is_null() {
        &mut empty[..]
    } else {
        slice::from_raw_parts_mut(outbuf.cast::<u8>(), capacity)
    };

    match A::generate_auth_string(password, out) {
        Ok(written) => {
            debug_assert!(written <= capacity);
            *outbuflen = written.try_into().unwrap();
            0
        }
        Err(e) => {
            warn!("generate_authentication_string failed: {e:?}");
            // The length slot must not suggest anything was written
            *outbuflen = 0;
            1
        }
    }
}

/// # Safety
///
/// `inbuf` must be valid for `buflen` bytes.
pub unsafe extern "C" fn wrap_validate_authentication_string<A: Authentication>(
    inbuf: *const c_char,
    buflen: c_uint,
) -> c_int {
    let digest = in_slice(inbuf, buflen as usize);
    match A::validate_auth_string(digest) {
        Ok(()) => 0,
        Err(e) => {
            warn!("validate_authentication_string failed: {e:?}");
            1
        }
    }
}

/// # Safety
///
/// `password` must be valid for `password_len` bytes and `salt` for
/// `*salt_len` bytes.
pub unsafe extern "C" fn wrap_set_salt<A: Authentication>(
    password: *const c_char,
    password_len: c_uint,
    salt: *mut c_uchar,
    salt_len: *mut c_uchar,
) -> c_int {
    let stored = in_slice(password, password_len as usize);
    let capacity = (*salt_len) as usize;
    let mut empty: [u8; 0] = [];
    let out = if salt.is_null() {
        &mut empty[..]
    } else {
        slice::from_raw_parts_mut(salt, capacity)
    };

    match A::derive_salt(stored, out) {
        Ok(written) => {
            debug_assert!(written <= capacity);
            *salt_len = written.try_into().unwrap();
            0
        }
        Err(e) => {
            warn!("set_salt failed: {e:?}");
            *salt_len = 0;
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::ffi::c_ulong;
    use std::ptr;

    use super::super::authentication::{
        AuthError, AuthFlags, AuthPluginHandle, HandleError, PasswordUsed,
    };
    use super::*;

    const DIGEST_PREFIX: &[u8] = b"digest:";

    /// Minimal mechanism for exercising the trampolines: the stored
    /// "digest" is `digest:<password>`, the challenge is fixed, and the
    /// client is expected to answer with the stored auth string.
    struct EchoAuth;

    impl Authentication for EchoAuth {
        const FLAGS: AuthFlags = AuthFlags {
            privileged_password_change: true,
            internal_storage: false,
        };

        fn authenticate(vio: &mut Vio, info: &mut AuthInfo) -> Result<(), AuthError> {
            let Some(user) = info.user_name() else {
                return Err(AuthError::AccessDenied);
            };
            if user.is_empty() {
                return Err(AuthError::AccessDenied);
            }
            let user = user.to_vec();

            vio.write_packet(b"challenge")?;
            let reply = vio.read_packet()?;
            info.set_password_used(PasswordUsed::Yes);
            if reply != info.auth_string() {
                return Err(AuthError::AccessDenied);
            }

            let mut proxied = b"proxy_".to_vec();
            proxied.extend_from_slice(&user);
            info.set_authenticated_as(&proxied)
                .map_err(|_| AuthError::Malformed)?;
            Ok(())
        }

        fn generate_auth_string(password: &[u8], out: &mut [u8]) -> Result<usize, AuthError> {
            if password.is_empty() {
                return Err(AuthError::PolicyViolation);
            }
            let needed = DIGEST_PREFIX.len() + password.len();
            if needed > out.len() {
                return Err(AuthError::BufferTooSmall);
            }
            out[..DIGEST_PREFIX.len()].copy_from_slice(DIGEST_PREFIX);
            out[DIGEST_PREFIX.len()..needed].copy_from_slice(password);
            Ok(needed)
        }

        fn validate_auth_string(digest: &[u8]) -> Result<(), AuthError> {
            if digest.starts_with(DIGEST_PREFIX) {
                Ok(())
            } else {
                Err(AuthError::Malformed)
            }
        }

        fn derive_salt(stored_hash: &[u8], out: &mut [u8]) -> Result<usize, AuthError> {
            let Some(salt) = stored_hash.strip_prefix(DIGEST_PREFIX) else {
                return Err(AuthError::Malformed);
            };
            if salt.len() > out.len() {
                return Err(AuthError::BufferTooSmall);
            }
            out[..salt.len()].copy_from_slice(salt);
            Ok(salt.len())
        }
    }

    /// Packet channel backed by thread-local queues, standing in for the
    /// server's transport.
    #[derive(Default)]
    struct MockChannel {
        incoming: VecDeque<Vec<u8>>,
        sent: Vec<Vec<u8>>,
        // Keeps the last read packet alive, like a real channel's
        // internal buffer
        held: Vec<u8>,
    }

    thread_local! {
        static CHANNEL: RefCell<MockChannel> = RefCell::new(MockChannel::default());
    }

    unsafe extern "C" fn mock_read(
        _vio: *mut bindings::st_plugin_vio,
        buf: *mut *mut c_uchar,
    ) -> c_int {
        CHANNEL.with(|c| {
            let mut c = c.borrow_mut();
            match c.incoming.pop_front() {
                Some(pkt) => {
                    c.held = pkt;
                    *buf = c.held.as_mut_ptr();
                    c.held.len() as c_int
                }
                None => -1,
            }
        })
    }

    unsafe extern "C" fn mock_write(
        _vio: *mut bindings::st_plugin_vio,
        packet: *const c_uchar,
        packet_len: c_int,
    ) -> c_int {
        let pkt = slice::from_raw_parts(packet, packet_len as usize).to_vec();
        CHANNEL.with(|c| c.borrow_mut().sent.push(pkt));
        0
    }

    unsafe extern "C" fn mock_info(
        _vio: *mut bindings::st_plugin_vio,
        info: *mut bindings::st_plugin_vio_info,
    ) {
        (*info).protocol = bindings::vio_protocol::VIO_PROTO_SOCKET;
        (*info).socket = 7;
    }

    fn mock_vio() -> bindings::st_plugin_vio {
        bindings::st_plugin_vio {
            read_packet: Some(mock_read),
            write_packet: Some(mock_write),
            info: Some(mock_info),
        }
    }

    fn reset_channel(incoming: &[&[u8]]) {
        CHANNEL.with(|c| {
            let mut c = c.borrow_mut();
            *c = MockChannel::default();
            c.incoming = incoming.iter().map(|p| p.to_vec()).collect();
        });
    }

    fn sent_packets() -> Vec<Vec<u8>> {
        CHANNEL.with(|c| c.borrow().sent.clone())
    }

    fn info_for(user: Option<&'static [u8]>, auth_string: &'static [u8]) -> bindings::st_server_auth_info {
        bindings::st_server_auth_info {
            user_name: user.map_or(ptr::null_mut(), |u| u.as_ptr().cast_mut().cast()),
            user_name_length: user.map_or(0, |u| u.len() as c_uint),
            auth_string: auth_string.as_ptr().cast(),
            auth_string_length: auth_string.len() as c_ulong,
            authenticated_as: [0; bindings::USERNAME_LENGTH + 1],
            external_user: [0; bindings::EXTERNAL_USER_LENGTH],
            password_used: bindings::PASSWORD_USED_NO,
            host_or_ip: ptr::null(),
            host_or_ip_length: 0,
        }
    }

    fn echo_descriptor() -> bindings::st_auth_plugin {
        bindings::st_auth_plugin {
            interface_version: bindings::AUTH_INTERFACE_VERSION,
            client_auth_plugin: ptr::null(),
            authenticate_user: Some(wrap_authenticate_user::<EchoAuth>),
            generate_authentication_string: Some(
                wrap_generate_authentication_string::<EchoAuth>,
            ),
            validate_authentication_string: Some(
                wrap_validate_authentication_string::<EchoAuth>,
            ),
            set_salt: Some(wrap_set_salt::<EchoAuth>),
            authentication_flags: EchoAuth::FLAGS.to_raw(),
        }
    }

    #[test]
    fn version_mismatch_prevents_use() {
        let mut desc = echo_descriptor();
        desc.interface_version = 0x0202;
        let err = unsafe { AuthPluginHandle::from_raw(&desc) }.unwrap_err();
        assert_eq!(
            err,
            HandleError::VersionMismatch {
                expected: bindings::AUTH_INTERFACE_VERSION,
                found: 0x0202
            }
        );
    }

    #[test]
    fn missing_entry_rejected() {
        let mut desc = echo_descriptor();
        desc.set_salt = None;
        let err = unsafe { AuthPluginHandle::from_raw(&desc) }.unwrap_err();
        assert_eq!(err, HandleError::MissingEntry("set_salt"));
    }

    #[test]
    fn generate_validate_roundtrip() {
        let desc = echo_descriptor();
        let handle = unsafe { AuthPluginHandle::from_raw(&desc) }.unwrap();

        let mut buf = [0u8; 64];
        let written = handle
            .generate_authentication_string(b"hunter2", &mut buf)
            .unwrap();
        assert_eq!(&buf[..written], b"digest:hunter2");
        handle
            .validate_authentication_string(&buf[..written])
            .unwrap();

        // garbage digest does not validate
        assert!(handle.validate_authentication_string(b"garbage").is_err());
    }

    #[test]
    fn generate_undersized_buffer_fails_without_truncation() {
        let desc = echo_descriptor();
        let handle = unsafe { AuthPluginHandle::from_raw(&desc) }.unwrap();

        // 11-byte credential, 4-byte buffer: hard failure, zero reported
        // length, buffer untouched
        let mut buf = [0xAAu8; 4];
        let mut len: c_uint = buf.len() as c_uint;
        let ret = unsafe {
            wrap_generate_authentication_string::<EchoAuth>(
                buf.as_mut_ptr().cast(),
                &mut len,
                b"plaintextpw".as_ptr().cast(),
                11,
            )
        };
        assert_ne!(ret, 0);
        assert_eq!(len, 0);
        assert_eq!(buf, [0xAA; 4]);

        // same through the handle
        assert!(handle
            .generate_authentication_string(b"plaintextpw", &mut [0u8; 4])
            .is_err());
    }

    #[test]
    fn empty_password_rejected_by_policy() {
        let desc = echo_descriptor();
        let handle = unsafe { AuthPluginHandle::from_raw(&desc) }.unwrap();
        assert!(handle
            .generate_authentication_string(b"", &mut [0u8; 64])
            .is_err());
    }

    #[test]
    fn authenticate_success_sets_authorization_identity() {
        reset_channel(&[b"digest:hunter2"]);
        let mut vio = mock_vio();
        let mut info = info_for(Some(b"alice"), b"digest:hunter2");

        let ret = unsafe { wrap_authenticate_user::<EchoAuth>(&mut vio, &mut info) };
        assert_eq!(ret, 0);

        // challenge went out over the channel
        assert_eq!(sent_packets(), vec![b"challenge".to_vec()]);
        // the override is visible to the caller, nul-terminated
        let auth_as = unsafe { AuthInfo::from_raw(&mut info) }.authenticated_as();
        assert_eq!(auth_as, b"proxy_alice");
        assert_eq!(info.authenticated_as[11], 0);
        assert_eq!(info.password_used, bindings::PASSWORD_USED_YES);
    }

    #[test]
    fn authenticate_wrong_reply_rejected() {
        reset_channel(&[b"digest:wrong"]);
        let mut vio = mock_vio();
        let mut info = info_for(Some(b"alice"), b"digest:hunter2");
        let ret = unsafe { wrap_authenticate_user::<EchoAuth>(&mut vio, &mut info) };
        assert_ne!(ret, 0);
    }

    #[test]
    fn authenticate_absent_user_and_silent_channel_rejected() {
        reset_channel(&[]);
        let mut vio = mock_vio();
        let mut info = info_for(None, b"");
        let ret = unsafe { wrap_authenticate_user::<EchoAuth>(&mut vio, &mut info) };
        assert_ne!(ret, 0);

        // empty (rather than absent) name, still nothing on the channel
        reset_channel(&[]);
        let mut info = info_for(Some(b""), b"");
        let ret = unsafe { wrap_authenticate_user::<EchoAuth>(&mut vio, &mut info) };
        assert_ne!(ret, 0);
    }

    #[test]
    fn set_salt_roundtrip_and_malformed() {
        let desc = echo_descriptor();
        let handle = unsafe { AuthPluginHandle::from_raw(&desc) }.unwrap();

        let mut salt = [0u8; 32];
        let n = handle.set_salt(b"digest:hunter2", &mut salt).unwrap();
        assert_eq!(&salt[..n], b"hunter2");

        // malformed stored hash: failure with zeroed length, not garbage
        let mut salt = [0u8; 32];
        let mut len: c_uchar = salt.len() as c_uchar;
        let ret = unsafe {
            wrap_set_salt::<EchoAuth>(
                b"not-a-digest".as_ptr().cast(),
                12,
                salt.as_mut_ptr(),
                &mut len,
            )
        };
        assert_ne!(ret, 0);
        assert_eq!(len, 0);
    }

    #[test]
    fn descriptor_flags_read_by_name() {
        let desc = echo_descriptor();
        let handle = unsafe { AuthPluginHandle::from_raw(&desc) }.unwrap();
        let flags = handle.flags();
        assert!(flags.privileged_password_change);
        assert!(!flags.internal_storage);
        assert!(handle.client_plugin().is_none());
    }

    #[test]
    fn sequential_attempts_share_one_descriptor() {
        let desc = echo_descriptor();
        let handle = unsafe { AuthPluginHandle::from_raw(&desc) }.unwrap();

        for (reply, ok) in [(b"digest:hunter2".as_slice(), true), (b"digest:no", false)] {
            reset_channel(&[reply]);
            let mut vio = mock_vio();
            let mut info = info_for(Some(b"bob"), b"digest:hunter2");
            let res = handle.authenticate_user(
                unsafe { Vio::from_raw(&mut vio) },
                unsafe { AuthInfo::from_raw(&mut info) },
            );
            assert_eq!(res.is_ok(), ok);
        }
    }

    #[test]
    fn vio_info_passthrough() {
        let mut raw = mock_vio();
        let vio = unsafe { Vio::from_raw(&mut raw) };
        let info = vio.info().unwrap();
        assert_eq!(info.protocol(), bindings::vio_protocol::VIO_PROTO_SOCKET);
        assert_eq!(info.socket(), Some(7));
    }
}

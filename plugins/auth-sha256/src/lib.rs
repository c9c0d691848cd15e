//! An authentication plugin storing salted SHA-256 digests.
//!
//! The stored auth string looks like `$A$<salt>$<digest>` with both parts
//! base64 encoded. Authentication is challenge/response: the plugin sends
//! a random nonce, the client answers with `HMAC-SHA-256(digest, nonce)`,
//! so the plaintext password never crosses the wire.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use dbauth::log::warn;
use dbauth::plugin::authentication::{
    AuthError, AuthFlags, AuthInfo, Authentication, PasswordUsed,
};
use dbauth::plugin::vio::Vio;
use dbauth::plugin::{register_plugin, License, Maturity, PluginType};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;
const NONCE_LEN: usize = 20;
const PREFIX: &str = "$A$";

/// Longest credential accepted by policy
const MAX_PASSWORD_LEN: usize = 256;

register_plugin! {
    Sha256Auth,
    ptype: PluginType::Authentication,
    name: "auth_sha256",
    author: "DBAuth contributors",
    description: "Salted SHA-256 challenge/response authentication",
    license: License::Gpl,
    maturity: Maturity::Experimental,
    version: "0.1",
    auth: Sha256Auth,
    client_plugin: "auth_sha256_client",
}

pub struct Sha256Auth;

impl Authentication for Sha256Auth {
    const FLAGS: AuthFlags = AuthFlags {
        // A DBA may reset a forgotten password through this plugin
        privileged_password_change: true,
        internal_storage: false,
    };

    fn authenticate(vio: &mut Vio, info: &mut AuthInfo) -> Result<(), AuthError> {
        let Some(user) = info.user_name() else {
            warn!("client closed before sending a user name");
            return Err(AuthError::AccessDenied);
        };
        if user.is_empty() {
            return Err(AuthError::AccessDenied);
        }

        let (_, digest) = parse_auth_string(info.auth_string())?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        vio.write_packet(&nonce)?;
        let reply = vio.read_packet()?;

        info.set_password_used(PasswordUsed::Yes);
        verify_response(&digest, &nonce, reply)
    }

    fn generate_auth_string(password: &[u8], out: &mut [u8]) -> Result<usize, AuthError> {
        if password.is_empty() || password.len() > MAX_PASSWORD_LEN {
            return Err(AuthError::PolicyViolation);
        }

        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let encoded = encode_auth_string(&salt, password);

        if encoded.len() > out.len() {
            return Err(AuthError::BufferTooSmall);
        }
        out[..encoded.len()].copy_from_slice(encoded.as_bytes());
        Ok(encoded.len())
    }

    fn validate_auth_string(digest: &[u8]) -> Result<(), AuthError> {
        parse_auth_string(digest).map(|_| ())
    }

    fn derive_salt(stored_hash: &[u8], out: &mut [u8]) -> Result<usize, AuthError> {
        let (salt, _) = parse_auth_string(stored_hash)?;
        if salt.len() > out.len() {
            return Err(AuthError::BufferTooSmall);
        }
        out[..salt.len()].copy_from_slice(&salt);
        Ok(salt.len())
    }
}

/// Build the stored form from a salt and a plaintext credential.
fn encode_auth_string(salt: &[u8], password: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password);
    let digest = hasher.finalize();
    format!("{PREFIX}{}${}", B64.encode(salt), B64.encode(digest))
}

/// Split a stored auth string into its decoded salt and digest.
fn parse_auth_string(stored: &[u8]) -> Result<(Vec<u8>, Vec<u8>), AuthError> {
    let stored = std::str::from_utf8(stored).map_err(|_| AuthError::Malformed)?;
    let rest = stored.strip_prefix(PREFIX).ok_or(AuthError::Malformed)?;
    let (salt_b64, digest_b64) = rest.split_once('$').ok_or(AuthError::Malformed)?;

    let salt = B64.decode(salt_b64).map_err(|_| AuthError::Malformed)?;
    let digest = B64.decode(digest_b64).map_err(|_| AuthError::Malformed)?;
    if salt.len() != SALT_LEN || digest.len() != DIGEST_LEN {
        return Err(AuthError::Malformed);
    }
    Ok((salt, digest))
}

/// Check the client's proof for this nonce, in constant time.
fn verify_response(digest: &[u8], nonce: &[u8], reply: &[u8]) -> Result<(), AuthError> {
    let mut mac = HmacSha256::new_from_slice(digest).map_err(|_| AuthError::Malformed)?;
    mac.update(nonce);
    mac.verify_slice(reply).map_err(|_| AuthError::AccessDenied)
}

/// What a well-behaved client sends back for a given challenge. Used by
/// the client-side plugin and by tests.
pub fn expected_response(digest: &[u8], nonce: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(digest).expect("hmac accepts any key length");
    mac.update(nonce);
    mac.finalize().into_bytes().to_vec()
}

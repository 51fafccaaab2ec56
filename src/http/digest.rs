//! HTTP Digest authentication (MD5)
//!
//! The challenge is the same for every client for the life of the process:
//! a fixed realm, a nonce hashed from a fixed seed and the MD5 of the realm
//! as opaque token.

use super::HttpRequest;
use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use std::fmt::Write as _;

pub const REALM: &str = "Private";

/// Seed the nonce is derived from
pub const NONCE_SEED: u32 = 1234;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

static CHALLENGE: Lazy<DigestChallenge> = Lazy::new(|| DigestChallenge {
    realm: REALM,
    nonce: fnv_hash32(NONCE_SEED),
    opaque: md5_hex(REALM),
});

/// Parameters of the `WWW-Authenticate: Digest` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: &'static str,
    pub nonce: u32,
    pub opaque: String,
}

impl DigestChallenge {
    /// The process-wide challenge
    pub fn get() -> &'static DigestChallenge {
        &CHALLENGE
    }

    /// Value of the `WWW-Authenticate` header
    pub fn header_value(&self) -> String {
        format!(
            "Digest realm=\"{}\", algorithm=MD5, nonce=\"{}\", opaque=\"{}\"",
            self.realm, self.nonce, self.opaque
        )
    }

    /// Expected client `response` for the given credentials and request
    pub fn expected_response(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
    ) -> String {
        let a1 = md5_hex(&format!("{}:{}:{}", username, self.realm, password));
        let a2 = md5_hex(&format!("{}:{}", method, uri));
        md5_hex(&format!("{}:{}:{}", a1, self.nonce, a2))
    }
}

/// 32-bit FNV-style hash over the little-endian bytes of `key`
///
/// Multiplies before the XOR, which is the FNV-1 order.
pub fn fnv_hash32(key: u32) -> u32 {
    key.to_le_bytes()
        .iter()
        .fold(FNV_OFFSET_BASIS, |hash, &byte| {
            hash.wrapping_mul(FNV_PRIME) ^ u32::from(byte)
        })
}

/// Lowercase hex MD5 digest of `data`
pub fn md5_hex(data: &str) -> String {
    hex::encode(Md5::digest(data.as_bytes()))
}

/// Checks client Digest responses against the server credentials
#[derive(Debug, Clone)]
pub struct DigestAuthenticator {
    username: String,
    password: String,
}

impl DigestAuthenticator {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn challenge(&self) -> &'static DigestChallenge {
        DigestChallenge::get()
    }

    /// True when the request's `Authorization` value contains the expected
    /// response digest anywhere in it.
    ///
    /// This is a substring test, not a parse of the Digest fields: the
    /// username, nonce and opaque echoed by the client are not checked.
    pub fn verify(&self, request: &HttpRequest) -> bool {
        let Some(authorization) = request.authorization.as_deref() else {
            return false;
        };

        let expected = self.challenge().expected_response(
            &self.username,
            &self.password,
            request.method.as_deref().unwrap_or(""),
            request.uri.as_deref().unwrap_or(""),
        );

        authorization.contains(&expected)
    }
}

/// Formats a full `Authorization` header value the way a browser would
pub fn authorization_value(
    challenge: &DigestChallenge,
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
) -> String {
    let response = challenge.expected_response(username, password, method, uri);
    let mut value = String::with_capacity(192);
    let _ = write!(
        value,
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\", opaque=\"{}\"",
        username, challenge.realm, challenge.nonce, uri, response, challenge.opaque
    );
    value
}

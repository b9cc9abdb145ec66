//! Message authentication
//!
//! Signs and verifies the `data` section of a message with an HMAC keyed by
//! a named shared secret. The digest travels as a binary string in
//! `header.authentication[key-name]`.
//!
//! Verification always works on the bytes of `data` exactly as they arrived,
//! never on a re-encoding, and compares digests in constant time.

use std::fmt;
use std::str;

use base64::Engine as _;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::error::{Result, RndcError};
use crate::protocol::codec::{self, MAX_KEY_LEN};
use crate::protocol::{Message, ReceivedMessage, TypedValue};

// =============================================================================
// Algorithm
// =============================================================================

/// The supported HMAC algorithms.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    /// All algorithms, weakest first
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha224,
        Algorithm::Sha256,
        Algorithm::Sha384,
        Algorithm::Sha512,
    ];

    /// Returns the length of a digest created with this algorithm.
    pub fn digest_len(self) -> usize {
        match self {
            Algorithm::Md5 => 16,
            Algorithm::Sha1 => 20,
            Algorithm::Sha224 => 28,
            Algorithm::Sha256 => 32,
            Algorithm::Sha384 => 48,
            Algorithm::Sha512 => 64,
        }
    }

    /// Returns the canonical `hmac-*` name.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Md5 => "hmac-md5",
            Algorithm::Sha1 => "hmac-sha1",
            Algorithm::Sha224 => "hmac-sha224",
            Algorithm::Sha256 => "hmac-sha256",
            Algorithm::Sha384 => "hmac-sha384",
            Algorithm::Sha512 => "hmac-sha512",
        }
    }
}

impl str::FromStr for Algorithm {
    type Err = AlgorithmError;

    /// Accepts `md5` or `hmac-md5` style names, case-insensitively.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let bare = lower.strip_prefix("hmac-").unwrap_or(&lower);
        match bare {
            "md5" => Ok(Algorithm::Md5),
            "sha1" => Ok(Algorithm::Sha1),
            "sha224" => Ok(Algorithm::Sha224),
            "sha256" => Ok(Algorithm::Sha256),
            "sha384" => Ok(Algorithm::Sha384),
            "sha512" => Ok(Algorithm::Sha512),
            _ => Err(AlgorithmError(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An algorithm name was not recognized.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AlgorithmError(pub String);

impl fmt::Display for AlgorithmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown HMAC algorithm {:?}", self.0)
    }
}

impl std::error::Error for AlgorithmError {}

// =============================================================================
// Credentials
// =============================================================================

/// A named shared secret and the algorithm it is used with
///
/// Immutable once created. The secret is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    key_name: String,
    secret: Vec<u8>,
    algorithm: Algorithm,
}

impl Credentials {
    /// Create credentials from a raw secret
    pub fn new(key_name: impl Into<String>, secret: impl Into<Vec<u8>>, algorithm: Algorithm) -> Result<Self> {
        let key_name = key_name.into();
        if key_name.is_empty() || key_name.len() > MAX_KEY_LEN {
            return Err(RndcError::Config(format!(
                "key name must be 1..={} bytes, got {}",
                MAX_KEY_LEN,
                key_name.len()
            )));
        }
        let secret = secret.into();
        if secret.is_empty() {
            return Err(RndcError::Config("secret is empty".to_string()));
        }
        Ok(Self {
            key_name,
            secret,
            algorithm,
        })
    }

    /// Create credentials from a base64-encoded secret
    pub fn from_base64(key_name: impl Into<String>, secret: &str, algorithm: Algorithm) -> Result<Self> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(secret.trim())
            .map_err(|e| RndcError::Config(format!("secret is not valid base64: {}", e)))?;
        Self::new(key_name, raw, algorithm)
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_name", &self.key_name)
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

// =============================================================================
// Signing
// =============================================================================

macro_rules! hmac_digest {
    ($hash:ty, $secret:expr, $bytes:expr) => {{
        let mut mac = <Hmac<$hash>>::new_from_slice($secret)
            .map_err(|e| RndcError::Config(format!("unusable HMAC key: {}", e)))?;
        mac.update($bytes);
        mac.finalize().into_bytes().to_vec()
    }};
}

macro_rules! hmac_verify {
    ($hash:ty, $secret:expr, $bytes:expr, $digest:expr) => {{
        match <Hmac<$hash>>::new_from_slice($secret) {
            Ok(mut mac) => {
                mac.update($bytes);
                mac.verify_slice($digest).is_ok()
            }
            Err(_) => false,
        }
    }};
}

/// HMAC over raw bytes
pub fn sign_bytes(bytes: &[u8], credentials: &Credentials) -> Result<Vec<u8>> {
    let secret = credentials.secret();
    Ok(match credentials.algorithm() {
        Algorithm::Md5 => hmac_digest!(Md5, secret, bytes),
        Algorithm::Sha1 => hmac_digest!(Sha1, secret, bytes),
        Algorithm::Sha224 => hmac_digest!(Sha224, secret, bytes),
        Algorithm::Sha256 => hmac_digest!(Sha256, secret, bytes),
        Algorithm::Sha384 => hmac_digest!(Sha384, secret, bytes),
        Algorithm::Sha512 => hmac_digest!(Sha512, secret, bytes),
    })
}

/// Constant-time check of a digest over raw bytes
pub fn verify_bytes(bytes: &[u8], digest: &[u8], credentials: &Credentials) -> bool {
    let secret = credentials.secret();
    match credentials.algorithm() {
        Algorithm::Md5 => hmac_verify!(Md5, secret, bytes, digest),
        Algorithm::Sha1 => hmac_verify!(Sha1, secret, bytes, digest),
        Algorithm::Sha224 => hmac_verify!(Sha224, secret, bytes, digest),
        Algorithm::Sha256 => hmac_verify!(Sha256, secret, bytes, digest),
        Algorithm::Sha384 => hmac_verify!(Sha384, secret, bytes, digest),
        Algorithm::Sha512 => hmac_verify!(Sha512, secret, bytes, digest),
    }
}

/// Digest of `encode(data)`
pub fn sign(data: &TypedValue, credentials: &Credentials) -> Result<Vec<u8>> {
    sign_bytes(&codec::encode(data)?, credentials)
}

/// Check a digest against `encode(data)`
pub fn verify(data: &TypedValue, digest: &[u8], credentials: &Credentials) -> bool {
    match codec::encode(data) {
        Ok(bytes) => verify_bytes(&bytes, digest, credentials),
        Err(_) => false,
    }
}

/// Fill `header.authentication[key-name]` of an outgoing message
pub fn sign_message(message: &mut Message, credentials: &Credentials) -> Result<()> {
    if message.key_name != credentials.key_name() {
        return Err(RndcError::Config(format!(
            "message built for key {:?} but credentials are for {:?}",
            message.key_name,
            credentials.key_name()
        )));
    }

    let digest = sign_bytes(&message.encode_data()?, credentials)?;
    message
        .header
        .authentication
        .insert(credentials.key_name(), TypedValue::Binary(digest));
    Ok(())
}

/// Check the digest of a received message
///
/// A missing digest for our key fails the same way as a wrong one.
pub fn verify_message(message: &ReceivedMessage, credentials: &Credentials) -> Result<()> {
    let digest = match message.header.authentication.get(credentials.key_name()) {
        Some(TypedValue::Binary(digest)) => digest,
        Some(_) => {
            return Err(RndcError::AuthenticationFailed(format!(
                "digest for key {:?} is not a binary string",
                credentials.key_name()
            )));
        }
        None => {
            return Err(RndcError::AuthenticationFailed(format!(
                "no digest for key {:?}",
                credentials.key_name()
            )));
        }
    };

    if !verify_bytes(&message.data_bytes, digest, credentials) {
        tracing::warn!(
            key = credentials.key_name(),
            algorithm = %credentials.algorithm(),
            "response digest mismatch"
        );
        return Err(RndcError::AuthenticationFailed(format!(
            "{} digest mismatch for key {:?}",
            credentials.algorithm(),
            credentials.key_name()
        )));
    }

    Ok(())
}

//! Password hashing and verification.
//!
//! New secrets are always hashed with the configured algorithm (Argon2id by
//! default). Verification never looks at that setting: the stored string is
//! decoded into an [`EncodedHash`] first and the variant picks the routine, so
//! bcrypt hashes written before the migration keep verifying.
//!
//! Argon2id hashes use the PHC layout
//! `$argon2id$v=19$m=<kib>,t=<iterations>,p=<lanes>$<salt>$<key>` and are
//! parsed and produced by the password-hash machinery re-exported from
//! `argon2`. Salt and key lengths are taken from the decoded fields, not from
//! the current configuration.

use crate::{config::SecurityConfig, error::AppError};
use argon2::{
    password_hash::{self, Output, PasswordHasher, PasswordVerifier, Salt, SaltString},
    Algorithm, Argon2, Params, PasswordHash, Version,
};
use rand::{rngs::OsRng, RngCore};
use std::{fmt, str::FromStr};
use thiserror::Error;

const ARGON2ID_TAG: &str = "argon2id";
const ARGON2_VERSION: u32 = 0x13;
const ARGON2_FIELDS: usize = 6;
const BCRYPT_FIELDS: usize = 4;
const BCRYPT_DIGEST_LEN: usize = 53;
const MIN_SALT_LEN: usize = 8;
// B64 salts are capped at 64 characters.
const MAX_SALT_LEN: usize = Salt::MAX_LENGTH / 4 * 3;

/// Password codec failures.
///
/// Everything except [`CodecError::Mismatch`] and [`CodecError::Hashing`]
/// describes a stored hash that could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("password does not match")]
    Mismatch,

    #[error("malformed hash: expected {expected} fields, found {found}")]
    MalformedHash { expected: usize, found: usize },

    #[error("invalid hash parameters: {0}")]
    InvalidParameters(String),

    #[error("unsupported argon2 version: {0}")]
    UnsupportedVersion(u32),

    #[error("unknown hash algorithm")]
    UnknownAlgorithm,

    #[error("invalid encoding in {0}")]
    InvalidEncoding(&'static str),

    #[error("hashing failed: {0}")]
    Hashing(String),
}

impl CodecError {
    /// True when the stored hash itself is unreadable (as opposed to a wrong password).
    pub fn is_decode_error(&self) -> bool {
        !matches!(self, CodecError::Mismatch | CodecError::Hashing(_))
    }
}

/// Algorithm used for hashing new secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Argon2id,
    /// Legacy adaptive hash, kept selectable for migrations.
    Bcrypt,
}

impl FromStr for HashAlgorithm {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "argon2id" | "argon2" => Ok(HashAlgorithm::Argon2id),
            "bcrypt" => Ok(HashAlgorithm::Bcrypt),
            _ => Err(CodecError::UnknownAlgorithm),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Argon2id => f.write_str("argon2id"),
            HashAlgorithm::Bcrypt => f.write_str("bcrypt"),
        }
    }
}

/// Argon2id cost parameters plus the salt/key sizes written with each hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub salt_len: usize,
    pub key_len: usize,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 2,
            salt_len: 16,
            key_len: 32,
        }
    }
}

impl Argon2Params {
    pub fn validate(&self) -> Result<(), CodecError> {
        if !(MIN_SALT_LEN..=MAX_SALT_LEN).contains(&self.salt_len) {
            return Err(CodecError::InvalidParameters(format!(
                "salt must be {} to {} bytes",
                MIN_SALT_LEN, MAX_SALT_LEN
            )));
        }
        if !(Output::MIN_LENGTH..=Output::MAX_LENGTH).contains(&self.key_len) {
            return Err(CodecError::InvalidParameters(format!(
                "key must be {} to {} bytes",
                Output::MIN_LENGTH,
                Output::MAX_LENGTH
            )));
        }
        self.engine().map(|_| ())
    }

    fn engine(&self) -> Result<Argon2<'static>, CodecError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.key_len),
        )
        .map_err(|e| CodecError::InvalidParameters(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// A decoded Argon2id hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argon2Hash<'a> {
    pub params: Argon2Params,
    phc: PasswordHash<'a>,
}

impl<'a> Argon2Hash<'a> {
    fn decode(encoded: &'a str) -> Result<Self, CodecError> {
        let phc = PasswordHash::new(encoded).map_err(|e| match e {
            password_hash::Error::PhcStringField | password_hash::Error::PhcStringTrailingData => {
                malformed(encoded)
            }
            other => CodecError::from(other),
        })?;

        match phc.version {
            Some(ARGON2_VERSION) | None => {}
            Some(other) => return Err(CodecError::UnsupportedVersion(other)),
        }

        // PHC allows defaults, stored hashes must spell out every cost.
        let cost = |name: &str| {
            phc.params.get_decimal(name).ok_or_else(|| {
                CodecError::InvalidParameters(format!("missing or invalid `{}`", name))
            })
        };
        let (memory_kib, iterations, parallelism) = (cost("m")?, cost("t")?, cost("p")?);

        let (Some(salt), Some(key)) = (phc.salt, phc.hash.as_ref()) else {
            return Err(malformed(encoded));
        };
        let mut salt_buf = [0u8; Salt::MAX_LENGTH];
        let salt_len = salt
            .decode_b64(&mut salt_buf)
            .map_err(|_| CodecError::InvalidEncoding("salt"))?
            .len();

        // Rejects unknown parameter names and out-of-range costs.
        Params::try_from(&phc).map_err(CodecError::from)?;

        let params = Argon2Params {
            memory_kib,
            iterations,
            parallelism,
            salt_len,
            key_len: key.len(),
        };
        if salt_len < MIN_SALT_LEN {
            return Err(CodecError::InvalidParameters(format!(
                "salt must be at least {} bytes",
                MIN_SALT_LEN
            )));
        }

        Ok(Self { params, phc })
    }

    fn verify(&self, plaintext: &[u8]) -> Result<(), CodecError> {
        // Cost parameters come from the stored hash, not from this instance.
        match Argon2::default().verify_password(plaintext, &self.phc) {
            Ok(()) => Ok(()),
            Err(password_hash::Error::Password) => Err(CodecError::Mismatch),
            Err(e) => Err(CodecError::Hashing(e.to_string())),
        }
    }
}

fn malformed(encoded: &str) -> CodecError {
    CodecError::MalformedHash {
        expected: ARGON2_FIELDS,
        found: encoded.split('$').count(),
    }
}

impl From<password_hash::Error> for CodecError {
    fn from(e: password_hash::Error) -> Self {
        use password_hash::Error as E;

        match e {
            E::Algorithm => CodecError::UnknownAlgorithm,
            E::Version => CodecError::InvalidParameters("invalid `v`".to_string()),
            E::SaltInvalid(_) => CodecError::InvalidEncoding("salt"),
            E::B64Encoding(_) => CodecError::InvalidEncoding("key"),
            E::OutputSize { .. } => CodecError::InvalidParameters("key length out of range".to_string()),
            E::PhcStringField
            | E::PhcStringTrailingData
            | E::ParamNameDuplicated
            | E::ParamNameInvalid
            | E::ParamValueInvalid(_)
            | E::ParamsMaxExceeded => CodecError::InvalidParameters(e.to_string()),
            other => CodecError::Hashing(other.to_string()),
        }
    }
}

/// A stored hash, decoded just far enough to pick the verification routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedHash<'a> {
    Argon2id(Argon2Hash<'a>),
    Bcrypt { cost: u32, encoded: &'a str },
}

impl<'a> EncodedHash<'a> {
    pub fn decode(encoded: &'a str) -> Result<Self, CodecError> {
        let fields: Vec<&str> = encoded.split('$').collect();

        // The leading '$' leaves an empty first field.
        if fields.len() < 2 || !fields[0].is_empty() {
            return Err(CodecError::UnknownAlgorithm);
        }

        match fields[1] {
            ARGON2ID_TAG => Argon2Hash::decode(encoded).map(EncodedHash::Argon2id),
            "2a" | "2b" | "2x" | "2y" => {
                if fields.len() != BCRYPT_FIELDS {
                    return Err(CodecError::MalformedHash {
                        expected: BCRYPT_FIELDS,
                        found: fields.len(),
                    });
                }
                let cost = fields[2]
                    .parse::<u32>()
                    .ok()
                    .filter(|c| (4..=31).contains(c))
                    .ok_or_else(|| {
                        CodecError::InvalidParameters("missing or invalid cost".to_string())
                    })?;
                if fields[3].len() != BCRYPT_DIGEST_LEN {
                    return Err(CodecError::InvalidEncoding("bcrypt digest"));
                }
                Ok(EncodedHash::Bcrypt { cost, encoded })
            }
            _ => Err(CodecError::UnknownAlgorithm),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            EncodedHash::Argon2id(_) => HashAlgorithm::Argon2id,
            EncodedHash::Bcrypt { .. } => HashAlgorithm::Bcrypt,
        }
    }
}

/// Hashes and verifies secrets. Built once from configuration and shared.
#[derive(Debug, Clone)]
pub struct PasswordCodec {
    algorithm: HashAlgorithm,
    argon2: Argon2Params,
    bcrypt_cost: u32,
}

impl PasswordCodec {
    pub fn new(
        algorithm: HashAlgorithm,
        argon2: Argon2Params,
        bcrypt_cost: u32,
    ) -> Result<Self, CodecError> {
        argon2.validate()?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(CodecError::InvalidParameters(
                "bcrypt cost must be between 4 and 31".to_string(),
            ));
        }

        Ok(Self {
            algorithm,
            argon2,
            bcrypt_cost,
        })
    }

    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        Self::new(
            config.hash_algorithm(),
            config.argon2_params(),
            config.bcrypt_cost,
        )
        .map_err(|e| AppError::Config(format!("Invalid password codec settings: {}", e)))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash a new secret with the current algorithm and a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Result<String, CodecError> {
        match self.algorithm {
            HashAlgorithm::Argon2id => {
                let mut salt = vec![0u8; self.argon2.salt_len];
                OsRng.fill_bytes(&mut salt);
                let salt = SaltString::encode_b64(&salt)
                    .map_err(|e| CodecError::Hashing(e.to_string()))?;

                self.argon2
                    .engine()?
                    .hash_password(plaintext.as_bytes(), &salt)
                    .map(|phc| phc.to_string())
                    .map_err(|e| CodecError::Hashing(e.to_string()))
            }
            HashAlgorithm::Bcrypt => bcrypt::hash(plaintext, self.bcrypt_cost)
                .map_err(|e| CodecError::Hashing(e.to_string())),
        }
    }

    /// Verify a secret against a stored hash of either algorithm.
    pub fn verify(&self, plaintext: &str, encoded: &str) -> Result<(), CodecError> {
        match EncodedHash::decode(encoded)? {
            EncodedHash::Argon2id(hash) => hash.verify(plaintext.as_bytes()),
            // bcrypt::verify compares the digests with subtle internally.
            EncodedHash::Bcrypt { encoded, .. } => match bcrypt::verify(plaintext, encoded) {
                Ok(true) => Ok(()),
                Ok(false) => Err(CodecError::Mismatch),
                Err(_) => Err(CodecError::InvalidEncoding("bcrypt hash")),
            },
        }
    }

    /// Whether a stored hash should be replaced by one made with the current settings.
    pub fn needs_rehash(&self, encoded: &str) -> bool {
        match (EncodedHash::decode(encoded), self.algorithm) {
            (Ok(EncodedHash::Argon2id(hash)), HashAlgorithm::Argon2id) => hash.params != self.argon2,
            (Ok(EncodedHash::Bcrypt { cost, .. }), HashAlgorithm::Bcrypt) => cost != self.bcrypt_cost,
            _ => true,
        }
    }

    /// Minimal password policy applied to administrator-set and changed passwords.
    pub fn validate_password_policy(password: &str, config: &SecurityConfig) -> Result<(), AppError> {
        if password.chars().count() < config.password_min_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                config.password_min_length
            )));
        }

        if password.trim().is_empty() {
            return Err(AppError::validation("Password must not be blank"));
        }

        Ok(())
    }
}

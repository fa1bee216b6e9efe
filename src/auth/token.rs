//! Session token signing and validation
//! HS256 tokens carrying issue time and absolute expiry

use crate::{config::AppConfig, error::AppError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Which kind of principal a token was issued to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    User,
    Service,
}

/// Session token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (user or service account ID)
    pub sub: Uuid,

    /// Principal kind
    pub kind: TokenKind,

    /// Issued at (epoch seconds)
    pub iat: i64,

    /// Expiration (epoch seconds)
    pub exp: i64,

    /// Token ID, keeps two tokens minted in the same second distinct
    pub jti: Uuid,
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Token signer shared by the whole process
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    user_lifetime: Duration,
    service_lifetime: Duration,
}

impl TokenSigner {
    /// Create token signer from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let secret = config.signing_secret()?.expose_secret();

        // Ensure secret is at least 32 bytes for HS256
        if secret.len() < 32 {
            return Err(AppError::Config(
                "Signing secret too short (min 32 chars)".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            user_lifetime: Duration::minutes(config.session.lifetime_minutes as i64),
            service_lifetime: Duration::minutes(config.session.service_lifetime_minutes as i64),
        })
    }

    pub fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::User => self.user_lifetime,
            TokenKind::Service => self.service_lifetime,
        }
    }

    /// Sign a token for a principal
    pub fn sign(&self, subject: Uuid, kind: TokenKind) -> Result<SignedToken, AppError> {
        self.sign_at(subject, kind, Utc::now())
    }

    pub(crate) fn sign_at(
        &self,
        subject: Uuid,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<SignedToken, AppError> {
        let expiration = now + self.lifetime(kind);

        let claims = SessionClaims {
            sub: subject,
            kind,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!("Failed to encode session token: {:?}", e);
                AppError::Internal(format!("Failed to encode session token: {}", e))
            })?;

        Ok(SignedToken {
            token,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    /// Validate signature and embedded expiry
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        self.decode_with(token, true)
    }

    /// Validate a token of a specific kind
    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<SessionClaims, AppError> {
        let claims = self.verify(token)?;
        ensure_kind(claims, kind)
    }

    /// Validate signature only; used by logout so expired sessions can still be revoked
    pub fn verify_ignoring_expiry(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<SessionClaims, AppError> {
        let claims = self.decode_with(token, false)?;
        ensure_kind(claims, kind)
    }

    fn decode_with(&self, token: &str, check_exp: bool) -> Result<SessionClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = check_exp;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => {
                    tracing::debug!("Token validation failed: {:?}", e);
                    AppError::TokenInvalid
                }
            })
    }
}

fn ensure_kind(claims: SessionClaims, kind: TokenKind) -> Result<SessionClaims, AppError> {
    if claims.kind != kind {
        tracing::debug!(expected = ?kind, actual = ?claims.kind, "Token kind mismatch");
        return Err(AppError::TokenInvalid);
    }
    Ok(claims)
}

/// Digest used as the storage key for session and refresh tokens
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    fn signer() -> TokenSigner {
        TokenSigner::from_config(&test_config()).unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = signer();
        let user_id = Uuid::new_v4();

        let signed = signer.sign(user_id, TokenKind::User).unwrap();
        let claims = signer.verify_kind(&signed.token, TokenKind::User).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::User);
        assert_eq!(claims.exp, signed.expires_at);
        assert_eq!(signed.expires_at - signed.issued_at, 60 * 60);
    }

    #[test]
    fn test_tokens_are_unique() {
        let signer = signer();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let a = signer.sign_at(user_id, TokenKind::User, now).unwrap();
        let b = signer.sign_at(user_id, TokenKind::User, now).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = signer();
        let issued = Utc::now() - Duration::hours(2);

        let signed = signer.sign_at(Uuid::new_v4(), TokenKind::User, issued).unwrap();

        assert!(matches!(
            signer.verify(&signed.token),
            Err(AppError::TokenExpired)
        ));
        // Signature is still good, so logout can read it
        assert!(signer
            .verify_ignoring_expiry(&signed.token, TokenKind::User)
            .is_ok());
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let signer = signer();
        let signed = signer.sign(Uuid::new_v4(), TokenKind::Service).unwrap();

        assert!(matches!(
            signer.verify_kind(&signed.token, TokenKind::User),
            Err(AppError::TokenInvalid)
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let signer = signer();
        let signed = signer.sign(Uuid::new_v4(), TokenKind::User).unwrap();

        let mut tampered = signed.token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        assert!(matches!(signer.verify(&tampered), Err(AppError::TokenInvalid)));
        assert!(matches!(signer.verify("invalid_token"), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn test_other_key_rejected() {
        let mut config = test_config();
        config.security.signing_secret = Some(secrecy::Secret::new(
            "another_secret_key_32_characters_long".to_string(),
        ));
        let other = TokenSigner::from_config(&config).unwrap();

        let signed = other.sign(Uuid::new_v4(), TokenKind::User).unwrap();
        assert!(matches!(signer().verify(&signed.token), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn test_missing_secret_is_configuration_missing() {
        let mut config = test_config();
        config.security.signing_secret = None;

        assert!(matches!(
            TokenSigner::from_config(&config),
            Err(AppError::ConfigurationMissing(_))
        ));
    }

    #[test]
    fn test_token_digest() {
        let digest = token_digest("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, token_digest("abc"));
        assert_ne!(digest, token_digest("abd"));
    }
}

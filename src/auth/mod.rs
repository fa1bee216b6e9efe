//! Authentication and authorization module

pub mod api_key;
pub mod cookie;
pub mod middleware;
pub mod password;
pub mod token;

pub use api_key::ApiCredentials;
pub use cookie::SessionCookies;
pub use middleware::{extract_token, session_auth_middleware, AuthContext};
pub use password::{CodecError, EncodedHash, HashAlgorithm, PasswordCodec};
pub use token::{token_digest, SessionClaims, SignedToken, TokenKind, TokenSigner};

//! Authentication
//!
//! Email/password identities from the hosted identity service. The ID token
//! issued at sign-in is the bearer credential for the document store and is
//! refreshed with the long-lived refresh token.

pub mod account;
mod errors;
pub mod identity;
mod provider;
pub mod tokens;
pub mod validation;

pub use account::AccountService;
pub use errors::{AuthError, AuthErrorCode};
pub use identity::IdentityClient;
pub use provider::{AuthProvider, AuthUser, TokenSource};
pub use tokens::{StoredSession, StoredToken, TokenStore};

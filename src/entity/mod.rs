//! Per-record encryption and sharing
//!
//! Member keyrings, per-owner DEKs, share-based authorization, and the
//! middleware every record read and write passes through.

pub mod authorizer;
pub mod key_store;
pub mod middleware;
pub mod session;

pub use authorizer::SharingAuthorizer;
pub use key_store::EntityKeyStore;
pub use middleware::EncryptionMiddleware;
pub use session::UserSession;

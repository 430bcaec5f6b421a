pub mod codec;
pub mod error;
pub mod factory;
pub mod refresh_store;
pub mod refresh_token_service;
pub mod token_service;
pub mod types;

pub use codec::CredentialCodec;
pub use error::AuthError;
pub use token_service::TokenService;
pub use types::{AccessClaims, Identity, ResourceIds};

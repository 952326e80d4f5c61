//! Bearer token authentication against a static allow-list.

mod authenticator;
mod token_set;

pub use authenticator::{extract_bearer_token, TokenAuthenticator};
pub use token_set::{TokenSet, DEV_TOKEN};

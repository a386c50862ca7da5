//! Authentication and authorization seams consumed by the gateway.
//!
//! Both are supplied by the scheduling application: [`TokenVerifier`] turns
//! a credential into an identity at admission, and [`JoinPolicy`] decides
//! whether that identity may subscribe to a given room.

pub mod bearer;
pub mod policy;
pub mod verifier;

pub use bearer::bearer_token;
pub use policy::{AllowAll, JoinPolicy, StaticGrants};
pub use verifier::{Rejection, StaticTokenVerifier, TokenVerifier};

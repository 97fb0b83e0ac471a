//! Identity-domain identifiers, principals, and secret wrappers.

pub mod id;
pub mod principal;
pub mod secret;

pub use id::*;
pub use principal::*;
pub use secret::*;

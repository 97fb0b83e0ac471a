//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated endpoint, scope, and authorize-parameter metadata for each
//! upstream identity provider. `strategy` defines [`ProviderStrategy`], the hook that turns a
//! provider-specific profile payload into a [`NormalizedProfile`].

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;

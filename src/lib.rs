//! Identity and session core for ChatShare: OAuth sign-in against Google and LINE, one-time
//! anti-forgery state tokens, signed bearer credentials, fixed-window rate limiting, and
//! transactional account erasure.

#![deny(clippy::all, unused_crate_dependencies)]
#![warn(missing_docs)]

pub mod accounts;
pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod limiter;
pub mod mirror;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;
pub mod token;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(not(feature = "redis"))] use tokio as _;
#[cfg(test)] use {httpmock as _, tower as _};

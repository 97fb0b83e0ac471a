//! Provider descriptor data structures shared by the sign-in flows.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::Provider};

const GOOGLE_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_PROFILE_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const GOOGLE_SCOPES: [&str; 2] = [
	"https://www.googleapis.com/auth/userinfo.email",
	"https://www.googleapis.com/auth/userinfo.profile",
];
const LINE_AUTHORIZATION_ENDPOINT: &str = "https://access.line.me/oauth2/v2.1/authorize";
const LINE_TOKEN_ENDPOINT: &str = "https://api.line.me/oauth2/v2.1/token";
const LINE_PROFILE_ENDPOINT: &str = "https://api.line.me/v2/profile";
const LINE_SCOPES: [&str; 3] = ["profile", "openid", "email"];

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint the end user is redirected to.
	pub authorization: Url,
	/// Token endpoint used for the code exchange.
	pub token: Url,
	/// Profile endpoint queried with the provider access token.
	pub profile: Url,
}

/// Immutable provider descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Provider this descriptor targets.
	pub provider: Provider,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Scopes requested on the authorize URL, in order.
	pub scopes: Vec<String>,
	/// Character used to join scopes.
	pub scope_delimiter: char,
	/// Extra query parameters appended to the authorize URL.
	pub authorize_params: Vec<(String, String)>,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided provider.
	pub fn builder(provider: Provider) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(provider)
	}

	/// Production descriptor for `provider`.
	pub fn standard(provider: Provider) -> Result<Self, ProviderDescriptorError> {
		match provider {
			Provider::Google => Self::google(),
			Provider::Line => Self::line(),
		}
	}

	/// Google OAuth 2.0 with offline access and the userinfo scopes.
	pub fn google() -> Result<Self, ProviderDescriptorError> {
		Self::builder(Provider::Google)
			.authorization_endpoint(parse_endpoint("authorization", GOOGLE_AUTHORIZATION_ENDPOINT)?)
			.token_endpoint(parse_endpoint("token", GOOGLE_TOKEN_ENDPOINT)?)
			.profile_endpoint(parse_endpoint("profile", GOOGLE_PROFILE_ENDPOINT)?)
			.scopes(GOOGLE_SCOPES)
			.authorize_param("access_type", "offline")
			.build()
	}

	/// LINE Login v2.1.
	pub fn line() -> Result<Self, ProviderDescriptorError> {
		Self::builder(Provider::Line)
			.authorization_endpoint(parse_endpoint("authorization", LINE_AUTHORIZATION_ENDPOINT)?)
			.token_endpoint(parse_endpoint("token", LINE_TOKEN_ENDPOINT)?)
			.profile_endpoint(parse_endpoint("profile", LINE_PROFILE_ENDPOINT)?)
			.scopes(LINE_SCOPES)
			.build()
	}

	/// Joins the requested scopes with the descriptor's delimiter.
	pub fn scope_param(&self) -> String {
		let mut buf = String::new();

		for (idx, scope) in self.scopes.iter().enumerate() {
			if idx > 0 {
				buf.push(self.scope_delimiter);
			}

			buf.push_str(scope);
		}

		buf
	}
}

fn parse_endpoint(endpoint: &'static str, raw: &str) -> Result<Url, ProviderDescriptorError> {
	Url::parse(raw).map_err(|source| ProviderDescriptorError::InvalidUrl { endpoint, source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn standard_descriptors_match_provider_contracts() {
		let google = ProviderDescriptor::google().expect("Google descriptor should build.");

		assert_eq!(google.endpoints.profile.as_str(), GOOGLE_PROFILE_ENDPOINT);
		assert_eq!(
			google.scope_param(),
			"https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/userinfo.profile"
		);
		assert_eq!(google.authorize_params, vec![("access_type".into(), "offline".into())]);

		let line = ProviderDescriptor::standard(Provider::Line).expect("LINE descriptor should build.");

		assert_eq!(line.endpoints.authorization.as_str(), LINE_AUTHORIZATION_ENDPOINT);
		assert_eq!(line.endpoints.token.as_str(), LINE_TOKEN_ENDPOINT);
		assert_eq!(line.scope_param(), "profile openid email");
		assert!(line.authorize_params.is_empty());
	}
}

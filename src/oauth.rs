//! Internal OAuth client facade abstractions.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, HttpClientError, RedirectUrl, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION},
	},
};
// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::ConfigError,
	http::{ProviderHttpClient, ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::ProviderDescriptor,
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Outbound provider call a failure belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderCall {
	/// Authorization code exchange at the token endpoint.
	TokenExchange,
	/// Profile lookup with the provider access token.
	ProfileFetch,
}
impl ProviderCall {
	/// Builds the error variant matching this call.
	pub fn failure(self, reason: impl Into<String>) -> Error {
		match self {
			ProviderCall::TokenExchange => Error::TokenExchangeFailed { reason: reason.into() },
			ProviderCall::ProfileFetch => Error::ProfileFetchFailed { reason: reason.into() },
		}
	}

	/// Human-readable endpoint label.
	pub const fn endpoint(self) -> &'static str {
		match self {
			ProviderCall::TokenExchange => "token endpoint",
			ProviderCall::ProfileFetch => "profile endpoint",
		}
	}
}

/// Maps HTTP transport failures into service [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a service error.
	fn map_transport_error(
		&self,
		call: ProviderCall,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		call: ProviderCall,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(call, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) =>
				call.failure(format!("I/O error while calling the {}: {inner}", call.endpoint())),
			HttpClientError::Other(message) => call.failure(format!(
				"HTTP client error while calling the {}: {message}",
				call.endpoint()
			)),
			_ => call.failure(format!("HTTP client error while calling the {}", call.endpoint())),
		}
	}
}

pub(crate) trait OAuth2Facade {
	fn exchange_code<'a>(&'a self, code: &'a str) -> FacadeFuture<'a, Secret>;

	fn fetch_profile<'a>(&'a self, access_token: &'a Secret) -> FacadeFuture<'a, Vec<u8>>;
}

pub(crate) struct BasicFacade<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	profile_endpoint: Url,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Configures a `client_secret_post` client for `descriptor`.
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: &Secret,
		redirect_uri: &Url,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.expose().to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self {
			oauth_client,
			profile_endpoint: descriptor.endpoints.profile.clone(),
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_code<'a>(&'a self, code: &'a str) -> FacadeFuture<'a, Secret> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

			Ok(Secret::new(response.access_token().secret().to_owned()))
		})
	}

	fn fetch_profile<'a>(&'a self, access_token: &'a Secret) -> FacadeFuture<'a, Vec<u8>> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let request = Request::builder()
				.method(Method::GET)
				.uri(self.profile_endpoint.as_str())
				.header(AUTHORIZATION, format!("Bearer {}", access_token.expose()))
				.header(ACCEPT, "application/json")
				.body(Vec::new())
				.map_err(ConfigError::from)?;
			let response = instrumented.call(request).await.map_err(|err| {
				self.error_mapper.map_transport_error(
					ProviderCall::ProfileFetch,
					meta.take().as_ref(),
					err,
				)
			})?;

			if !response.status().is_success() {
				return Err(ProviderCall::ProfileFetch.failure(format!(
					"profile endpoint returned HTTP {}",
					response.status().as_u16()
				)));
			}

			Ok(response.into_body())
		})
	}
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let call = ProviderCall::TokenExchange;

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response),
		RequestTokenError::Request(error) => mapper.map_transport_error(call, meta.as_ref(), error),
		RequestTokenError::Parse(error, _body) =>
			call.failure(format!("token response is malformed at `{}`", error.path())),
		RequestTokenError::Other(message) => call.failure(match meta.and_then(|m| m.status) {
			Some(status) => format!("token endpoint returned HTTP {status}: {message}"),
			None => format!("token endpoint returned an unexpected response: {message}"),
		}),
	}
}

fn map_server_response_error(response: BasicErrorResponse) -> Error {
	let reason = match response.error_description() {
		Some(description) =>
			format!("provider returned `{}`: {description}", response.error().as_ref()),
		None => format!("provider returned `{}`", response.error().as_ref()),
	};

	ProviderCall::TokenExchange.failure(reason)
}

fn map_reqwest_error(
	call: ProviderCall,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return call.failure(format!("the {} did not respond in time", call.endpoint()));
	}

	match meta.and_then(|value| value.status).or_else(|| err.status().map(|s| s.as_u16())) {
		Some(status) =>
			call.failure(format!("the {} failed with HTTP {status}: {err}", call.endpoint())),
		None => call.failure(format!("network error while calling the {}: {err}", call.endpoint())),
	}
}

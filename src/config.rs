//! Environment-driven service configuration.
//!
//! Every value has a default except `JWT_SECRET`. Durations accept Go-style literals such as
//! `24h`, `1m`, `1h30m`, or `500ms`.

// self
use crate::{
	_prelude::*,
	api::PageSettings,
	auth::{Provider, Secret},
	error::ConfigError,
	limiter::RateLimitPolicy,
};

const MIN_STORE_TIMEOUT: Duration = Duration::seconds(1);
const MAX_STORE_TIMEOUT: Duration = Duration::seconds(5);
// Durations are added to wall-clock instants, so they stay well inside the calendar range.
const MAX_DURATION: Duration = Duration::days(3_650);

/// Deployment environment; controls cookie security.
///
/// Only `production` is recognised; any other label is a non-production deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
	/// Local development (cookies are not marked `Secure`).
	#[default]
	Development,
	/// Production deployment.
	Production,
}
impl From<&str> for Environment {
	fn from(label: &str) -> Self {
		if label.eq_ignore_ascii_case("production") {
			Self::Production
		} else {
			Self::Development
		}
	}
}

/// OAuth client registration for one provider.
#[derive(Clone, Debug)]
pub struct ProviderCredentials {
	/// Registered client (channel) identifier.
	pub client_id: String,
	/// Registered client (channel) secret.
	pub client_secret: Secret,
	/// Callback URL registered with the provider.
	pub redirect_uri: Url,
}

/// Fully resolved service configuration.
#[derive(Clone, Debug)]
pub struct Config {
	/// Deployment environment.
	pub environment: Environment,
	/// Google credentials; `None` disables the Google endpoints.
	pub google: Option<ProviderCredentials>,
	/// LINE credentials; `None` disables the LINE endpoints.
	pub line: Option<ProviderCredentials>,
	/// HMAC secret for bearer credentials.
	pub jwt_secret: Secret,
	/// Bearer credential lifetime.
	pub jwt_ttl: Duration,
	/// Fixed-window rate-limit policy.
	pub rate_limit: RateLimitPolicy,
	/// Credential store connection string.
	pub redis_url: String,
	/// Per-operation credential store timeout.
	pub store_timeout: Duration,
	/// Relational store connection string.
	pub database_url: String,
	/// Timeout applied to provider HTTP calls.
	pub provider_timeout: Duration,
	/// Whether the first `X-Forwarded-For` hop identifies the client.
	pub trust_forwarded_for: bool,
	/// Pagination defaults for list endpoints.
	pub pagination: PageSettings,
}
impl Config {
	/// Reads configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads configuration through `lookup`, treating empty values as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let env = Lookup(lookup);
		let jwt_secret = env.get("JWT_SECRET").ok_or(ConfigError::Missing { key: "JWT_SECRET" })?;
		let store_timeout = env
			.duration("STORE_TIMEOUT", Duration::seconds(2))?
			.clamp(MIN_STORE_TIMEOUT, MAX_STORE_TIMEOUT);
		let default_page_size = env.number("DEFAULT_PAGE_SIZE", 20)?;
		let max_page_size = env.number("MAX_PAGE_SIZE", 100)?;

		Ok(Self {
			environment: env
				.get("ENVIRONMENT")
				.as_deref()
				.map(Environment::from)
				.unwrap_or_default(),
			google: env.credentials(
				"GOOGLE_CLIENT_ID",
				"GOOGLE_CLIENT_SECRET",
				"GOOGLE_REDIRECT_URL",
			)?,
			line: env.credentials("LINE_CHANNEL_ID", "LINE_CHANNEL_SECRET", "LINE_REDIRECT_URL")?,
			jwt_secret: Secret::new(jwt_secret),
			jwt_ttl: env.duration("JWT_EXPIRATION", Duration::hours(24))?,
			rate_limit: RateLimitPolicy::new(
				env.number("RATE_LIMIT_REQUESTS", 100)?,
				env.duration("RATE_LIMIT_DURATION", Duration::minutes(1))?,
			),
			redis_url: env.get("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379/0".into()),
			store_timeout,
			database_url: env
				.get("DATABASE_URL")
				.unwrap_or_else(|| "sqlite://chatshare.db?mode=rwc".into()),
			provider_timeout: env.duration("PROVIDER_TIMEOUT", Duration::seconds(15))?,
			trust_forwarded_for: env.flag("TRUST_FORWARDED_FOR")?,
			pagination: PageSettings::new(default_page_size, max_page_size),
		})
	}

	/// Returns `true` in production.
	pub fn is_production(&self) -> bool {
		matches!(self.environment, Environment::Production)
	}

	/// Credentials for `provider`, when configured.
	pub fn credentials(&self, provider: Provider) -> Option<&ProviderCredentials> {
		match provider {
			Provider::Google => self.google.as_ref(),
			Provider::Line => self.line.as_ref(),
		}
	}
}

struct Lookup<F>(F);
impl<F> Lookup<F>
where
	F: Fn(&str) -> Option<String>,
{
	fn get(&self, key: &str) -> Option<String> {
		(self.0)(key).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
	}

	fn duration(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
		match self.get(key) {
			Some(raw) => parse_duration(&raw)
				.filter(|value| value.is_positive() && *value <= MAX_DURATION)
				.ok_or(ConfigError::InvalidValue { key, value: raw }),
			None => Ok(default),
		}
	}

	fn number(&self, key: &'static str, default: u64) -> Result<u64, ConfigError> {
		match self.get(key) {
			Some(raw) => raw
				.parse::<u64>()
				.ok()
				.filter(|value| *value > 0)
				.ok_or(ConfigError::InvalidValue { key, value: raw }),
			None => Ok(default),
		}
	}

	fn flag(&self, key: &'static str) -> Result<bool, ConfigError> {
		match self.get(key).as_deref() {
			None | Some("0" | "false" | "no") => Ok(false),
			Some("1" | "true" | "yes") => Ok(true),
			Some(other) => Err(ConfigError::InvalidValue { key, value: other.to_owned() }),
		}
	}

	fn credentials(
		&self,
		id_key: &'static str,
		secret_key: &'static str,
		redirect_key: &'static str,
	) -> Result<Option<ProviderCredentials>, ConfigError> {
		let Some(client_id) = self.get(id_key) else {
			return Ok(None);
		};
		let client_secret = self.get(secret_key).ok_or(ConfigError::Missing { key: secret_key })?;
		let raw_redirect =
			self.get(redirect_key).ok_or(ConfigError::Missing { key: redirect_key })?;
		let redirect_uri = Url::parse(&raw_redirect)
			.map_err(|_| ConfigError::InvalidValue { key: redirect_key, value: raw_redirect })?;

		Ok(Some(ProviderCredentials {
			client_id,
			client_secret: Secret::new(client_secret),
			redirect_uri,
		}))
	}
}

/// Parses a Go-style duration literal (`300ms`, `90s`, `1m`, `1h30m`).
pub fn parse_duration(raw: &str) -> Option<Duration> {
	let mut rest = raw.trim();
	let mut total = Duration::ZERO;

	if rest.is_empty() {
		return None;
	}
	if rest == "0" {
		return Some(Duration::ZERO);
	}

	while !rest.is_empty() {
		let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());

		if digits == 0 {
			return None;
		}

		let value = rest[..digits].parse::<i64>().ok()?;

		rest = &rest[digits..];

		let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
		let part = match &rest[..unit_len] {
			"ms" => Duration::milliseconds(value),
			"s" => Duration::seconds(value),
			"m" => Duration::seconds(value.checked_mul(60)?),
			"h" => Duration::seconds(value.checked_mul(3_600)?),
			_ => return None,
		};

		total = total.checked_add(part)?;
		rest = &rest[unit_len..];
	}

	Some(total)
}

//! Signed bearer credentials (HS256 JWTs) handed to clients after sign-in.
//!
//! Verification checks the signature first and then compares `exp` against the service
//! [`Clock`] so expiry behaves identically under a [`ManualClock`](crate::clock::ManualClock).

// std
use std::collections::HashSet;
// crates.io
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, Role, Secret},
	clock::{Clock, SystemClock},
	error::ConfigError,
};

/// Claims carried by every bearer credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerClaims {
	/// Principal identifier.
	pub sub: PrincipalId,
	/// Principal email at issuance.
	pub email: String,
	/// Principal role at issuance.
	pub role: Role,
	/// Issued-at, seconds since the Unix epoch.
	pub iat: i64,
	/// Expiry, seconds since the Unix epoch.
	pub exp: i64,
}
impl BearerClaims {
	/// Returns `true` once `now` is past the expiry.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.exp < now.unix_timestamp()
	}
}

/// Freshly signed credential plus its expiry.
#[derive(Clone, Debug)]
pub struct IssuedToken {
	/// Encoded credential.
	pub token: Secret,
	/// Instant after which the credential is rejected.
	pub expires_at: OffsetDateTime,
}

/// Issues and verifies bearer credentials with a shared HMAC secret.
#[derive(Clone)]
pub struct BearerTokenService {
	encoding: EncodingKey,
	decoding: DecodingKey,
	validation: Validation,
	ttl: Duration,
	clock: Arc<dyn Clock>,
}
impl BearerTokenService {
	/// Builds a service signing with `secret`, issuing credentials valid for `ttl`.
	pub fn new(secret: &Secret, ttl: Duration) -> Result<Self, ConfigError> {
		if secret.is_empty() {
			return Err(ConfigError::Missing { key: "JWT_SECRET" });
		}
		if !ttl.is_positive() {
			return Err(ConfigError::InvalidValue { key: "JWT_EXPIRATION", value: ttl.to_string() });
		}

		let mut validation = Validation::new(Algorithm::HS256);

		validation.validate_exp = false;
		validation.leeway = 0;
		validation.required_spec_claims = HashSet::from(["exp".to_owned(), "sub".to_owned()]);

		Ok(Self {
			encoding: EncodingKey::from_secret(secret.expose().as_bytes()),
			decoding: DecodingKey::from_secret(secret.expose().as_bytes()),
			validation,
			ttl,
			clock: Arc::new(SystemClock),
		})
	}

	/// Replaces the clock used for `iat`, `exp`, and verification.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Lifetime of issued credentials.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Signs a credential for `subject`.
	pub fn issue(&self, subject: &PrincipalId, email: &str, role: Role) -> Result<IssuedToken> {
		let issued_at = self.clock.now();
		let expires_at = issued_at + self.ttl;
		let claims = BearerClaims {
			sub: subject.clone(),
			email: email.to_owned(),
			role,
			iat: issued_at.unix_timestamp(),
			exp: expires_at.unix_timestamp(),
		};
		let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
			.map_err(|source| ConfigError::Signing { source })?;

		Ok(IssuedToken { token: Secret::new(token), expires_at })
	}

	/// Verifies the signature and expiry of `token`, returning its claims.
	pub fn verify(&self, token: &str) -> Result<BearerClaims> {
		if token.is_empty() {
			return Err(Error::unauthenticated("bearer credential is missing"));
		}

		let data = jsonwebtoken::decode::<BearerClaims>(token, &self.decoding, &self.validation)
			.map_err(|_| Error::unauthenticated("bearer credential is invalid"))?;

		if data.claims.is_expired_at(self.clock.now()) {
			return Err(Error::unauthenticated("bearer credential has expired"));
		}

		Ok(data.claims)
	}
}
impl Debug for BearerTokenService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BearerTokenService").field("ttl", &self.ttl).finish()
	}
}

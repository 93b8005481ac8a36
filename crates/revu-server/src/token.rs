//! HS256 JSON Web Tokens as the bearer-token format.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use revu_core::{
  account::Role,
  identity::{BoxError, Claims, TokenCodec},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Registered and private claims carried in every token.
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
  /// Account id; usernames can be renamed and reused.
  sub:  String,
  name: String,
  role: Role,
  iat:  u64,
  exp:  u64,
}

/// Signs and verifies tokens with a shared secret.
pub struct JwtCodec {
  encoding:   EncodingKey,
  decoding:   DecodingKey,
  validation: Validation,
}

impl JwtCodec {
  pub fn new(secret: &[u8]) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);
    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
      validation,
    }
  }

  fn encode_claims(&self, claims: &JwtClaims) -> Result<String> {
    Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
  }
}

fn unix_now() -> Result<u64> {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs())
    .map_err(|_| Error::Clock)
}

impl TokenCodec for JwtCodec {
  fn mint(&self, claims: &Claims, ttl: Duration) -> Result<String, BoxError> {
    let iat = unix_now()?;
    let token = self.encode_claims(&JwtClaims {
      sub: claims.account_id.to_string(),
      name: claims.username.clone(),
      role: claims.role,
      iat,
      exp: iat.saturating_add(ttl.as_secs()),
    })?;
    Ok(token)
  }

  fn verify(&self, token: &str) -> Option<Claims> {
    let data = match decode::<JwtClaims>(token, &self.decoding, &self.validation)
    {
      Ok(data) => data,
      Err(e) => {
        tracing::debug!(error = %e, "token rejected");
        return None;
      }
    };
    let account_id = match Uuid::parse_str(&data.claims.sub) {
      Ok(id) => id,
      Err(e) => {
        tracing::debug!(error = %e, "token subject is not an account id");
        return None;
      }
    };
    Some(Claims {
      account_id,
      username: data.claims.name,
      role: data.claims.role,
    })
  }
}

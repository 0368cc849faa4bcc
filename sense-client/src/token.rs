//! Access token claims.
//!
//! Sense access tokens look like JWTs behind a version prefix:
//! `t1.v2.<header>.<claims>.<signature>`. Only the claims segment matters
//! here. It is base64 JSON carrying the expiry (`exp`, seconds since the
//! epoch) and the subject the token was minted for. The signature is not
//! checked; the server does that.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

/// Version prefix stripped before structural parsing.
pub const VERSION_PREFIX: &str = "t1.v2.";

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Why a token could not be read. Any of these makes the token unusable
/// for good, as opposed to merely expired.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Invalid access token format.")]
    Segments(usize),

    #[error("Invalid access token encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Invalid access token payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("No expiration time in access token.")]
    MissingExpiration,

    #[error("No subject id in access token.")]
    MissingSubject,
}

/// The parts of an access token's claims this crate relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessTokenClaims {
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,

    /// Subject identifier, as sent back to the renewal endpoint
    pub subject: String,
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    exp: Option<f64>,
    #[serde(default, rename = "userId")]
    user_id: Option<Value>,
    #[serde(default)]
    sub: Option<Value>,
}

impl AccessTokenClaims {
    pub fn parse(token: &str) -> Result<Self, TokenError> {
        let token = token.strip_prefix(VERSION_PREFIX).unwrap_or(token);

        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(TokenError::Segments(segments.len()));
        }

        let raw = decode_segment(segments[1])?;
        let claims: RawClaims = serde_json::from_slice(&raw)?;

        let exp = claims
            .exp
            .filter(|exp| *exp > 0.0)
            .ok_or(TokenError::MissingExpiration)? as i64;

        let subject = claims
            .user_id
            .as_ref()
            .and_then(subject_string)
            .or_else(|| claims.sub.as_ref().and_then(subject_string))
            .ok_or(TokenError::MissingSubject)?;

        Ok(Self { exp, subject })
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.exp).ok()
    }

    /// True if the token expires less than `window` after `now`.
    pub fn expires_within(&self, window: Duration, now: OffsetDateTime) -> bool {
        let deadline = now + window;
        self.exp <= deadline.unix_timestamp()
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD_LENIENT
        .decode(segment)
        .or_else(|_| URL_SAFE_LENIENT.decode(segment))
}

fn subject_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_token, TokenSpec};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_parse_prefixed_token() {
        let token = make_token(TokenSpec::expiring_in(3600).user_id(json!(123)));
        let claims = AccessTokenClaims::parse(&token).unwrap();
        assert_eq!(claims.subject, "123");
        assert!(claims.exp > OffsetDateTime::now_utc().unix_timestamp());
    }

    #[test]
    fn test_parse_unprefixed_token() {
        let token = make_token(TokenSpec::expiring_in(3600).unprefixed());
        assert!(!token.starts_with(VERSION_PREFIX));
        assert_eq!(AccessTokenClaims::parse(&token).unwrap().subject, "123");
    }

    #[test]
    fn test_parse_url_safe_unpadded_claims() {
        let claims = URL_SAFE_NO_PAD.encode(br#"{"exp":4102444800,"userId":"abc?>"}"#);
        let token = format!("t1.v2.eyJhbGciOiJIUzI1NiJ9.{claims}.sig");
        let parsed = AccessTokenClaims::parse(&token).unwrap();
        assert_eq!(parsed.exp, 4102444800);
        assert_eq!(parsed.subject, "abc?>");
    }

    #[test]
    fn test_parse_falls_back_to_sub() {
        let claims = URL_SAFE_NO_PAD.encode(br#"{"exp":4102444800,"sub":"42"}"#);
        let token = format!("h.{claims}.s");
        assert_eq!(AccessTokenClaims::parse(&token).unwrap().subject, "42");
    }

    #[test_case("invalid-token"; "one segment")]
    #[test_case("t1.v2.a.b"; "two segments")]
    #[test_case("a.b.c.d"; "four segments")]
    fn test_parse_rejects_segment_count(token: &str) {
        assert!(matches!(
            AccessTokenClaims::parse(token),
            Err(TokenError::Segments(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_json_claims() {
        let claims = URL_SAFE_NO_PAD.encode(b"not json");
        assert!(matches!(
            AccessTokenClaims::parse(&format!("h.{claims}.s")),
            Err(TokenError::Payload(_))
        ));
    }

    #[test]
    fn test_parse_missing_exp() {
        let token = make_token(TokenSpec::expiring_in(3600).without_exp());
        assert!(matches!(
            AccessTokenClaims::parse(&token),
            Err(TokenError::MissingExpiration)
        ));
    }

    #[test]
    fn test_parse_missing_subject() {
        let token = make_token(TokenSpec::expiring_in(3600).without_user_id());
        assert!(matches!(
            AccessTokenClaims::parse(&token),
            Err(TokenError::MissingSubject)
        ));
    }

    #[test_case(20 * 60, false; "twenty minutes left")]
    #[test_case(10 * 60, true; "ten minutes left")]
    #[test_case(-60, true; "already expired")]
    fn test_expires_within_lookahead(seconds_left: i64, expected: bool) {
        let now = OffsetDateTime::now_utc();
        let claims = AccessTokenClaims {
            exp: now.unix_timestamp() + seconds_left,
            subject: "1".into(),
        };
        assert_eq!(claims.expires_within(Duration::minutes(15), now), expected);
    }
}

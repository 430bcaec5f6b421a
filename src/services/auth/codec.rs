//! Access credential codec: sign and verify short-lived bearer JWTs.
//!
//! Pure transform. The signing secret is handed in at construction (no module-level key),
//! so several codecs with different keys can live side by side (rotation, tests).
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, error};

use crate::services::auth::error::AuthError;
use crate::services::auth::types::{AccessClaims, Identity};

const BEARER_SCHEME: &str = "Bearer";

/// Settings the codec needs besides the key material.
#[derive(Debug, Clone)]
pub struct CodecSettings {
    pub issuer: String,
    pub audience: String,
    pub ttl_seconds: u64,
    pub leeway_seconds: u64,
}

#[derive(Clone)]
pub struct CredentialCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    settings: CodecSettings,
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("CredentialCodec")
            .field("settings", &self.settings)
            .finish()
    }
}

impl CredentialCodec {
    /// HS256 codec over `secret`.
    pub fn new(secret: &[u8], settings: CodecSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        // Expiry is exact. Leeway only covers an issuer clock running ahead (`iat`).
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            settings,
        }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.settings.ttl_seconds
    }

    /// Issue an access token for `identity`, valid for the configured TTL from now.
    pub fn issue_access_token(&self, identity: &Identity) -> Result<String, AuthError> {
        self.issue_access_token_at(identity, chrono::Utc::now().timestamp())
    }

    /// Same as [`issue_access_token`](Self::issue_access_token) with an explicit issue time.
    ///
    /// Output is a pure function of `(identity, issued_at)` and the codec settings.
    pub fn issue_access_token_at(
        &self,
        identity: &Identity,
        issued_at: i64,
    ) -> Result<String, AuthError> {
        let claims = AccessClaims {
            sub: identity.clone(),
            iss: self.settings.issuer.clone(),
            aud: self.settings.audience.clone(),
            iat: issued_at,
            exp: issued_at + self.settings.ttl_seconds as i64,
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign access token");
            AuthError::Internal(e.to_string())
        })
    }

    /// Verify a raw token (no scheme prefix) and return its claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "access token rejected");
                AuthError::InvalidCredential
            })?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::InvalidCredential);
        }

        let latest_iat = chrono::Utc::now().timestamp() + self.settings.leeway_seconds as i64;
        if data.claims.iat > latest_iat {
            debug!(iat = data.claims.iat, "access token issued in the future");
            return Err(AuthError::InvalidCredential);
        }

        Ok(data.claims)
    }

    /// Parse an `Authorization` header value of the form `Bearer <token>`.
    pub fn parse_bearer(&self, header_value: &str) -> Result<AccessClaims, AuthError> {
        let (scheme, token) = header_value
            .split_once(' ')
            .ok_or(AuthError::InvalidCredential)?;

        if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
            return Err(AuthError::InvalidCredential);
        }

        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::InvalidCredential);
        }

        self.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_codec, test_codec_settings};

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[test]
    fn issued_token_parses_back_to_identity() {
        let codec = test_codec();
        let identity = Identity::from("test-user-id");

        let token = codec.issue_access_token(&identity).unwrap();
        let claims = codec.parse_bearer(&format!("Bearer {token}")).unwrap();

        assert_eq!(claims.sub, identity);
        assert_eq!(claims.exp - claims.iat, codec.ttl_seconds() as i64);
        assert_eq!(claims.iss, "https://auth.test");
        assert_eq!(claims.aud, "webskeleton-test");
    }

    #[test]
    fn issuance_is_deterministic_for_same_instant() {
        let codec = test_codec();
        let identity = Identity::from("u1");
        let t = now();

        let a = codec.issue_access_token_at(&identity, t).unwrap();
        let b = codec.issue_access_token_at(&identity, t).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = test_codec();
        let identity = Identity::from("u1");
        // exp = issued_at + ttl, placed 10s in the past
        let issued_at = now() - codec.ttl_seconds() as i64 - 10;

        let token = codec.issue_access_token_at(&identity, issued_at).unwrap();
        let result = codec.parse_bearer(&format!("Bearer {token}"));

        assert_eq!(result, Err(AuthError::InvalidCredential));
    }

    fn codec_with_leeway(leeway_seconds: u64) -> CredentialCodec {
        let mut settings = test_codec_settings();
        settings.leeway_seconds = leeway_seconds;
        CredentialCodec::new(crate::test_support::TEST_SECRET, settings)
    }

    #[test]
    fn leeway_never_extends_expiry() {
        let codec = codec_with_leeway(crate::config::DEFAULT_ACCESS_TOKEN_LEEWAY_SECONDS);
        let issued_at = now() - codec.ttl_seconds() as i64 - 10;

        let token = codec.issue_access_token_at(&Identity::from("u1"), issued_at).unwrap();

        assert_eq!(
            codec.parse_bearer(&format!("Bearer {token}")),
            Err(AuthError::InvalidCredential)
        );
    }

    #[test]
    fn leeway_tolerates_issuer_clock_ahead() {
        let codec = codec_with_leeway(60);
        let identity = Identity::from("u1");

        let slightly_ahead = codec.issue_access_token_at(&identity, now() + 30).unwrap();
        assert!(codec.verify(&slightly_ahead).is_ok());

        let far_ahead = codec.issue_access_token_at(&identity, now() + 300).unwrap();
        assert_eq!(codec.verify(&far_ahead), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn tampering_any_position_is_rejected() {
        let codec = test_codec();
        let token = codec.issue_access_token(&Identity::from("u1")).unwrap();
        let bytes = token.as_bytes();

        for i in 0..bytes.len() {
            for replacement in [b'A', b'z', b'.', b'_'] {
                if bytes[i] == replacement {
                    continue;
                }
                let mut tampered = bytes.to_vec();
                tampered[i] = replacement;
                let tampered = String::from_utf8(tampered).unwrap();

                assert_eq!(
                    codec.parse_bearer(&format!("Bearer {tampered}")),
                    Err(AuthError::InvalidCredential),
                    "byte {i} replaced with {:?} was accepted",
                    replacement as char
                );
            }
        }
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let other = CredentialCodec::new(b"another-secret-another-secret-0123", test_codec_settings());
        let token = other.issue_access_token(&Identity::from("u1")).unwrap();

        assert_eq!(test_codec().verify(&token), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let mut settings = test_codec_settings();
        settings.audience = "someone-else".to_string();
        let other = CredentialCodec::new(crate::test_support::TEST_SECRET, settings);
        let token = other.issue_access_token(&Identity::from("u1")).unwrap();

        assert_eq!(test_codec().verify(&token), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let codec = test_codec();
        let token = codec.issue_access_token(&Identity::from("u1")).unwrap();

        for header in [
            "".to_string(),
            "Bearer".to_string(),
            "Bearer ".to_string(),
            format!("Basic {token}"),
            token.clone(),
            "Bearer not-a-jwt".to_string(),
        ] {
            assert_eq!(
                codec.parse_bearer(&header),
                Err(AuthError::InvalidCredential),
                "header {header:?} was accepted"
            );
        }

        // Scheme is case-insensitive.
        assert!(codec.parse_bearer(&format!("bearer {token}")).is_ok());
    }

    #[test]
    fn verification_has_no_side_effects() {
        let codec = test_codec();
        let header = format!("Bearer {}", codec.issue_access_token(&Identity::from("u1")).unwrap());

        let first = codec.parse_bearer(&header).unwrap();
        let second = codec.parse_bearer(&header).unwrap();
        assert_eq!(first, second);
    }
}

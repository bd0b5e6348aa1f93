//! Session token authorization
//!
//! The console consumes opaque bearer tokens minted by the external session
//! layer. Verification is HS256 against a shared secret; role and group
//! membership ride in the claims and resolve the privileged gate.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::ConsoleError;
use crate::storage::settings::AuthSettings;

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (account name)
    pub sub: String,

    /// Assigned role
    #[serde(default)]
    pub role: String,

    /// Group memberships
    #[serde(default)]
    pub groups: Vec<String>,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,
}

/// An authorized caller identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Account name
    pub subject: String,

    /// Assigned role
    pub role: String,

    /// Group memberships
    pub groups: Vec<String>,

    /// Whether the caller passes the elevated-privilege gate
    pub privileged: bool,
}

/// Authorizer trait for testability
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Resolve a bearer token into a caller identity
    async fn authorize(&self, token: &str) -> Result<Identity, ConsoleError>;
}

/// HS256 token authorizer backed by the shared session secret
pub struct TokenAuthorizer {
    secret: SecretString,
    privileged_roles: Vec<String>,
    privileged_groups: Vec<String>,
}

impl TokenAuthorizer {
    /// Create a new authorizer from auth settings
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            secret: settings.token_secret.clone(),
            privileged_roles: settings.privileged_roles.clone(),
            privileged_groups: settings.privileged_groups.clone(),
        }
    }

    fn is_privileged(&self, claims: &SessionClaims) -> bool {
        self.privileged_roles.iter().any(|r| r == &claims.role)
            || claims
                .groups
                .iter()
                .any(|g| self.privileged_groups.contains(g))
    }
}

#[async_trait]
impl Authorizer for TokenAuthorizer {
    async fn authorize(&self, token: &str) -> Result<Identity, ConsoleError> {
        let validation = Validation::new(Algorithm::HS256);
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());

        let data = decode::<SessionClaims>(token, &key, &validation)
            .map_err(|e| ConsoleError::Unauthorized(format!("Invalid session token: {}", e)))?;

        let privileged = self.is_privileged(&data.claims);

        Ok(Identity {
            subject: data.claims.sub,
            role: data.claims.role,
            groups: data.claims.groups,
            privileged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn settings(secret: &str) -> AuthSettings {
        AuthSettings {
            token_secret: SecretString::from(secret.to_string()),
            privileged_roles: vec!["admin".to_string()],
            privileged_groups: vec!["wheel".to_string()],
        }
    }

    fn mint(secret: &str, role: &str, groups: &[&str]) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            sub: "operator".to_string(),
            role: role.to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            iat: now,
            exp: now + 3600,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn admin_role_is_privileged() {
        let authorizer = TokenAuthorizer::new(&settings("s3cret"));
        let identity = authorizer
            .authorize(&mint("s3cret", "admin", &[]))
            .await
            .unwrap();
        assert!(identity.privileged);
        assert_eq!(identity.subject, "operator");
    }

    #[tokio::test]
    async fn wheel_group_is_privileged() {
        let authorizer = TokenAuthorizer::new(&settings("s3cret"));
        let identity = authorizer
            .authorize(&mint("s3cret", "viewer", &["wheel"]))
            .await
            .unwrap();
        assert!(identity.privileged);
    }

    #[tokio::test]
    async fn plain_viewer_is_not_privileged() {
        let authorizer = TokenAuthorizer::new(&settings("s3cret"));
        let identity = authorizer
            .authorize(&mint("s3cret", "viewer", &["staff"]))
            .await
            .unwrap();
        assert!(!identity.privileged);
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let authorizer = TokenAuthorizer::new(&settings("s3cret"));
        let result = authorizer.authorize(&mint("other", "admin", &[])).await;
        assert!(matches!(result, Err(ConsoleError::Unauthorized(_))));
    }
}

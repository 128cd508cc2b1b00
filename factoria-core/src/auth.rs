use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::models::{DirectoryUser, Role};
use crate::AppState;

/// A verified caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Subject id issued by the identity provider.
    pub uid: String,
    /// Raw role claim; absent means an ordinary caller.
    pub role: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(Role::Admin.as_str())
    }

    /// Applies a role assigned in the directory over the token's claim.
    pub fn with_assigned_role(mut self, assigned: Option<String>) -> Self {
        if assigned.is_some() {
            self.role = assigned;
        }
        self
    }

    /// Fails with an authorization error unless the caller holds the admin role.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Authorization("admin role required".to_string()))
        }
    }
}

/// Container for the authenticated caller stored in request extensions.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Identity);

#[derive(Debug, Deserialize)]
struct NestedClaims {
    role: Option<String>,
}

/// Claims expected inside the provider-issued JWT.
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// Subject - the caller's stable id.
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    claims: Option<NestedClaims>,
}

impl Claims {
    /// Top-level `role` wins over `claims.role`.
    fn role(&self) -> Option<String> {
        self.role
            .clone()
            .or_else(|| self.claims.as_ref().and_then(|c| c.role.clone()))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, ApiError> {
    let header = header.ok_or_else(|| {
        ApiError::Authentication("missing Authorization: Bearer <token>".to_string())
    })?;

    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(ApiError::Authentication(
            "malformed Authorization header, expected Bearer <token>".to_string(),
        )),
    }
}

/// Verifies HS256 tokens signed with the identity provider's shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, ApiError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| ApiError::Authentication(format!("invalid token: {}", e)))?
            .claims;

        if claims.sub.is_empty() {
            return Err(ApiError::Authentication("token has no subject".to_string()));
        }

        let role = claims.role();
        Ok(Identity {
            uid: claims.sub,
            role,
            email: claims.email,
        })
    }
}

/// The external identity provider as seen by this service.
///
/// Token verification is the hot path; the remaining operations back supplier
/// listing, listing enrichment and role assignment.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<Identity, ApiError>;

    async fn get_user(&self, uid: &str) -> Result<Option<DirectoryUser>, ApiError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, ApiError>;

    async fn list_users(&self) -> Result<Vec<DirectoryUser>, ApiError>;

    /// Assigns the role claim. Seen by every later `verify_token` for the
    /// subject.
    async fn set_role(&self, uid: &str, role: Role) -> Result<(), ApiError>;
}

/// Production identity provider: local JWT verification plus the `users`
/// directory table that mirrors the provider's user list.
pub struct PgIdentityProvider {
    verifier: JwtVerifier,
    pool: PgPool,
}

impl PgIdentityProvider {
    pub fn new(verifier: JwtVerifier, pool: PgPool) -> Self {
        Self { verifier, pool }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    /// Verifies the token locally, then records the caller in the `users`
    /// directory. A role assigned through [`IdentityProvider::set_role`]
    /// takes precedence over the token's own claim.
    async fn verify_token(&self, token: &str) -> Result<Identity, ApiError> {
        let identity = self.verifier.verify(token)?;

        let stored_role: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO users (uid, email)
            VALUES ($1, $2)
            ON CONFLICT (uid) DO UPDATE SET email = COALESCE(EXCLUDED.email, users.email)
            RETURNING role
            "#,
        )
        .bind(&identity.uid)
        .bind(&identity.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(identity.with_assigned_role(stored_role))
    }

    async fn get_user(&self, uid: &str) -> Result<Option<DirectoryUser>, ApiError> {
        let user = sqlx::query_as::<_, DirectoryUser>(
            "SELECT uid, email, display_name, role, created_at FROM users WHERE uid = $1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, ApiError> {
        let user = sqlx::query_as::<_, DirectoryUser>(
            "SELECT uid, email, display_name, role, created_at FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<DirectoryUser>, ApiError> {
        let users = sqlx::query_as::<_, DirectoryUser>(
            "SELECT uid, email, display_name, role, created_at FROM users ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn set_role(&self, uid: &str, role: Role) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE users SET role = $2 WHERE uid = $1")
            .bind(uid)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::Dependency(format!("no user with uid {}", uid)));
        }

        info!("Assigned role {} to {}", role, uid);
        Ok(())
    }
}

/// Middleware validating the bearer token on every protected route.
///
/// On success the verified [`Identity`] is attached to the request extensions
/// as [`CurrentUser`]; on failure a `401` JSON error is returned.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = bearer_token(header)?;

    let identity = state.identity.verify_token(token).await?;
    debug!("Authenticated {} (role: {:?})", identity.uid, identity.role);

    req.extensions_mut().insert(CurrentUser(identity));

    Ok(next.run(req).await)
}

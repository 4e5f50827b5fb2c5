//! Authentication middleware
//!
//! JWT authentication and role-based access control

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::UserRole;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::auth::decode_token;
use crate::AppState;

/// Authenticated principal extracted from the JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub branch_id: Option<Uuid>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn has_role(&self, roles: &[UserRole]) -> bool {
        roles.contains(&self.role)
    }
}

/// Authentication middleware that validates bearer tokens with the configured secret
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let token = match token {
        Some(token) => token,
        None => {
            return AppError::Unauthorized {
                message: "Missing or invalid Authorization header".to_string(),
                message_th: "ไม่สามารถยืนยันตัวตนได้".to_string(),
            }
            .into_response();
        }
    };

    let auth_user = match decode_token(token, &state.config.jwt.secret) {
        Ok(claims) => match claims.into_auth_user() {
            Ok(user) => user,
            Err(err) => return err.into_response(),
        },
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication required".to_string(),
                message_th: "ต้องเข้าสู่ระบบก่อน".to_string(),
            })
    }
}

/// Role guard for use in handlers
pub fn require_role(user: &AuthUser, roles: &[UserRole]) -> AppResult<()> {
    if user.has_role(roles) {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions)
    }
}

/// Administrators reach every branch; everyone else only their own
pub fn require_branch_access(user: &AuthUser, branch_id: Uuid) -> AppResult<()> {
    if user.is_admin() || user.branch_id == Some(branch_id) {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions)
    }
}

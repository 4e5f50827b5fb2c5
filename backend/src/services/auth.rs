//! Authentication service for login, token handling and user accounts

use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{validate_password, CreateUserInput, LoginInput, User, UserRole, UserStatus};
use uuid::Uuid;
use validator::Validate;

use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::repository::Store;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub role: UserRole,
    pub branch_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn into_auth_user(self) -> AppResult<AuthUser> {
        let user_id = Uuid::parse_str(&self.sub).map_err(|_| AppError::InvalidToken)?;
        let branch_id = self
            .branch_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| AppError::InvalidToken)?;
        Ok(AuthUser {
            user_id,
            role: self.role,
            branch_id,
        })
    }
}

/// Decode and validate an HS256 access token
pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt_secret: String,
    access_token_expiry: i64,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(store: Arc<dyn Store>, config: &JwtConfig) -> Self {
        Self {
            store,
            jwt_secret: config.secret.clone(),
            access_token_expiry: config.access_token_expiry,
        }
    }

    /// Authenticate user with username and password
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthTokens> {
        input.validate()?;

        let credentials = self
            .store
            .find_credentials(&input.username)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        // Check if user is active
        if credentials.user.status != UserStatus::Active {
            return Err(AppError::Unauthorized {
                message: "Account is disabled".to_string(),
                message_th: "บัญชีถูกปิดใช้งาน".to_string(),
            });
        }

        // Verify password
        let valid = verify(&input.password, &credentials.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        let access_token = self.generate_token(&credentials.user)?;

        tracing::info!(user_id = %credentials.user.id, role = credentials.user.role.as_str(), "User logged in");

        Ok(AuthTokens {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
            user: credentials.user,
        })
    }

    /// Validate access token and return claims
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        decode_token(token, &self.jwt_secret)
    }

    /// Profile of the authenticated principal
    pub async fn current_user(&self, user_id: Uuid) -> AppResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User", format!("ไม่พบผู้ใช้: {}", user_id)))
    }

    /// Create a staff account. Managers may only create non-admin users of
    /// their own branch.
    pub async fn create_user(&self, actor: &AuthUser, input: CreateUserInput) -> AppResult<User> {
        input.validate()?;
        validate_password(&input.password).map_err(|msg| {
            AppError::validation("password", msg, "รหัสผ่านต้องมีอย่างน้อย 8 ตัวอักษร")
        })?;

        if !actor.is_admin()
            && (input.role == UserRole::Admin || input.branch_id != actor.branch_id)
        {
            return Err(AppError::InsufficientPermissions);
        }

        if input.role != UserRole::Admin && input.branch_id.is_none() {
            return Err(AppError::validation(
                "branch_id",
                "A branch is required for non-admin users",
                "ต้องระบุสาขาของผู้ใช้",
            ));
        }

        if let Some(branch_id) = input.branch_id {
            if self.store.find_branch(branch_id).await?.is_none() {
                return Err(AppError::not_found("Branch", "ไม่พบสาขาที่ระบุ"));
            }
        }

        if self.store.user_exists(&input.username, &input.email).await? {
            return Err(AppError::conflict(
                "user",
                "Username or email already exists",
                "ชื่อผู้ใช้หรืออีเมลนี้ถูกใช้แล้ว",
            ));
        }

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let user = User {
            id: Uuid::new_v4(),
            username: input.username,
            email: input.email,
            name: input.name,
            phone: input.phone,
            role: input.role,
            branch_id: input.branch_id,
            status: UserStatus::Active,
            created_at: Utc::now(),
        };
        self.store.insert_user(&user, &password_hash).await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), created_by = %actor.user_id, "User created");
        Ok(user)
    }

    /// Create the initial administrator when the username is still free
    pub async fn bootstrap_admin(&self, username: &str, email: &str, password: &str) -> AppResult<()> {
        if self.store.user_exists(username, email).await? {
            return Ok(());
        }

        let password_hash = hash(password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            name: "Administrator".to_string(),
            phone: None,
            role: UserRole::Admin,
            branch_id: None,
            status: UserStatus::Active,
            created_at: Utc::now(),
        };
        self.store.insert_user(&user, &password_hash).await?;

        tracing::info!(user_id = %user.id, "Bootstrap administrator created");
        Ok(())
    }

    /// Generate an access token for the user
    fn generate_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_expiry);

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            branch_id: user.branch_id.map(|id| id.to_string()),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}

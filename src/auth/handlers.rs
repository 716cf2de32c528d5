use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, random_string, verify_password},
    },
    error::{AppError, AppResult},
    extract::ApiJson,
    response::{respond, Envelope},
    state::AppState,
    users::{NewUser, User},
    validation::{registry::AUTH_REGISTER, ValidationError},
};

/// Role new sign-ups receive when it exists.
const DEFAULT_ROLE: &str = "user";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<Value>,
) -> AppResult<Json<Envelope<AuthResponse>>> {
    if let Err(e) = state.rules.get(AUTH_REGISTER)?.validate(&payload) {
        warn!(errors = ?e.messages(), "registration rejected");
        return Err(e.into());
    }
    let mut req: RegisterRequest = serde_json::from_value(payload)
        .map_err(|e| AppError::BadRequest(format!("Malformed registration: {e}")))?;
    req.email = req.email.trim().to_lowercase();

    if state.users.email_taken(&req.email, None).await? {
        warn!(email = %req.email, "email already registered");
        return Err(ValidationError::single("email", "The email has already been taken.").into());
    }

    let user = state
        .users
        .create(&NewUser {
            name: req.name.trim().to_string(),
            email: req.email,
            email_verified_at: None,
            password_hash: hash_password(&req.password)?,
            remember_token: Some(random_string(10)),
            active: true,
            verify: false,
            agree: true,
        })
        .await?;

    if let Some(role) = state.roles.find_by_name(DEFAULT_ROLE).await? {
        state.users.assign_roles(user.id, &[role.id]).await?;
    }

    info!(user_id = user.id, email = %user.email, "user registered");
    let body = issue_tokens(&state, user).await?;
    Ok(respond("Registration successful.", body))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<LoginRequest>,
) -> AppResult<Json<Envelope<AuthResponse>>> {
    payload.email = payload.email.trim().to_lowercase();

    let Some(user) = state.users.find_by_email(&payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    if !user.active {
        warn!(user_id = user.id, "login for inactive account");
        return Err(AppError::Forbidden("Account is inactive".into()));
    }

    info!(user_id = user.id, email = %user.email, "user logged in");
    let body = issue_tokens(&state, user).await?;
    Ok(respond("Login successful.", body))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> AppResult<Json<Envelope<AuthResponse>>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = state
        .users
        .find(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    if !user.active {
        warn!(user_id = user.id, "refresh for inactive account");
        return Err(AppError::Forbidden("Account is inactive".into()));
    }

    let body = issue_tokens(&state, user).await?;
    Ok(respond("Token refreshed.", body))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Envelope<PublicUser>>> {
    let user = state
        .users
        .find(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    let roles = state.users.role_names(user.id).await?;
    Ok(respond("Current user.", PublicUser { user, roles }))
}

async fn issue_tokens(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    let roles = state.users.role_names(user.id).await?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser { user, roles },
    })
}

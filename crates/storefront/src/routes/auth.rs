//! Authentication route handlers.
//!
//! Username/password accounts. Logging in (or registering) moves any guest
//! cart of the session into the customer's cart.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{CartSession, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::AuthService;
use crate::services::cart::CartService;
use crate::state::AppState;

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Registration request body.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// The logged-in identity returned by login and registration.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub message: &'static str,
    pub user: CurrentUser,
}

/// Registration response.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: User,
}

/// Create an account and log it in.
#[instrument(skip(state, cart, request), fields(username = %request.username))]
pub async fn register(
    State(state): State<AppState>,
    mut cart: CartSession,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let (user, customer) = AuthService::new(state.pool())
        .register(&request.username, &request.email, &request.password)
        .await?;

    let current = CurrentUser {
        id: user.id,
        username: user.username.clone(),
        customer_id: customer.id,
    };
    start_session(&state, &mut cart, &current).await?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Account created",
            user,
        }),
    ))
}

/// Log in with username and password.
#[instrument(skip(state, cart, request), fields(username = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    mut cart: CartSession,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionView>> {
    let current = match AuthService::new(state.pool())
        .login(&request.username, &request.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            return Err(e.into());
        }
    };

    start_session(&state, &mut cart, &current).await?;

    Ok(Json(SessionView {
        message: "Logged in",
        user: current,
    }))
}

/// Log out and destroy the session.
#[instrument(skip(cart))]
pub async fn logout(cart: CartSession) -> Result<Json<serde_json::Value>> {
    clear_current_user(&cart.session)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to clear session: {e}")))?;
    clear_sentry_user();

    Ok(Json(serde_json::json!({ "message": "Logged out" })))
}

/// Merge the guest cart, then store the identity under a fresh session ID.
async fn start_session(state: &AppState, cart: &mut CartSession, user: &CurrentUser) -> Result<()> {
    if let Some(token) = cart.guest {
        CartService::new(state.pool())
            .merge_guest_cart(token, user.customer_id)
            .await?;
        cart.forget_guest().await?;
    }

    set_current_user(&cart.session, user)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to set session: {e}")))?;

    set_sentry_user(&user.id, Some(&user.username));
    add_breadcrumb("auth", "User logged in", Some(&[("username", user.username.as_str())]));

    Ok(())
}

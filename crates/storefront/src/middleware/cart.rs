//! Cart ownership extractor.
//!
//! Logged-in visitors own their customer's cart. Anonymous visitors own a
//! cart keyed by a guest token kept in their session; the token is created
//! lazily on the first cart mutation.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use warung_core::GuestToken;

use crate::error::AppError;
use crate::models::session::keys;
use crate::models::{CartOwner, CurrentUser};

/// The visitor's session together with whatever identifies their cart.
pub struct CartSession {
    pub session: Session,
    pub user: Option<CurrentUser>,
    pub guest: Option<GuestToken>,
}

impl CartSession {
    /// Owner of the visitor's cart, if they have one.
    #[must_use]
    pub fn owner(&self) -> Option<CartOwner> {
        match (&self.user, self.guest) {
            (Some(user), _) => Some(CartOwner::Customer(user.customer_id)),
            (None, Some(token)) => Some(CartOwner::Guest(token)),
            (None, None) => None,
        }
    }

    /// Owner of the visitor's cart, issuing a guest token if needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the session cannot be written.
    pub async fn owner_or_create(&mut self) -> Result<CartOwner, AppError> {
        if let Some(owner) = self.owner() {
            return Ok(owner);
        }

        let token = GuestToken::generate();
        self.session
            .insert(keys::GUEST_CART, token)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store guest cart: {e}")))?;
        self.guest = Some(token);
        Ok(CartOwner::Guest(token))
    }

    /// Remove the guest token from the session after its cart was merged.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the session cannot be written.
    pub async fn forget_guest(&mut self) -> Result<(), AppError> {
        self.session
            .remove::<GuestToken>(keys::GUEST_CART)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to clear guest cart: {e}")))?;
        self.guest = None;
        Ok(())
    }
}

impl<S> FromRequestParts<S> for CartSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("Session layer is not installed".to_string()))?;

        let user = session
            .get::<CurrentUser>(keys::CURRENT_USER)
            .await
            .ok()
            .flatten();
        let guest = session
            .get::<GuestToken>(keys::GUEST_CART)
            .await
            .ok()
            .flatten();

        Ok(Self {
            session,
            user,
            guest,
        })
    }
}

//! Session middleware configuration.
//!
//! `PostgreSQL`-backed sessions holding the logged-in user and the guest
//! cart token.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "warung_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// Cookies are signed with a key derived from the session secret and marked
/// `Secure` when the public base URL is HTTPS.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore, SignedCookie> {
    // Default `tower_sessions.session` table, created by migration
    let store = PostgresStore::new(pool.clone());
    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(&config.session_secret))
}

/// 64-byte cookie signing key from the configured secret.
fn signing_key(secret: &SecretString) -> Key {
    let digest = Sha512::digest(secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::config::MidtransConfig;

    fn config(base_url: &str) -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/warung"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: base_url.to_string(),
            session_secret: SecretString::from("k3Jd9Qw2ZpL7xV4mN8bR1tY6sF0hG5cE"),
            midtrans: MidtransConfig {
                server_key: SecretString::from("SB-Mid-server-q8Zr2LkP0aVx7NdT"),
                client_key: "SB-Mid-client-Hd72kLm".to_string(),
                merchant_id: "G123456789".to_string(),
                is_production: false,
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    fn key(secret: &str) -> Key {
        signing_key(&SecretString::from(secret.to_string()))
    }

    #[test]
    fn test_signing_key_is_stable_per_secret() {
        let a = key("k3Jd9Qw2ZpL7xV4mN8bR1tY6sF0hG5cE");
        let b = key("k3Jd9Qw2ZpL7xV4mN8bR1tY6sF0hG5cE");
        let c = key("Zq8Wm2Lx7Vn4Bc1Rt6Yk9Ps3Dg0Hf5Ja");
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), c.master());
    }

    #[tokio::test]
    async fn test_session_layer_uses_signed_cookies() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/warung")
            .unwrap();
        for base_url in ["http://localhost:3000", "https://toko.id"] {
            let _layer: SessionManagerLayer<PostgresStore, SignedCookie> =
                create_session_layer(&pool, &config(base_url));
        }
    }
}

//! CLI command implementations.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;

/// Environment variable holding the storefront database URL.
const DATABASE_URL_VAR: &str = "STOREFRONT_DATABASE_URL";

/// Read the storefront database URL, falling back to `DATABASE_URL`.
///
/// # Errors
///
/// Returns the name of the missing variable.
pub fn database_url() -> Result<SecretString, &'static str> {
    dotenvy::dotenv().ok();

    std::env::var(DATABASE_URL_VAR)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| DATABASE_URL_VAR)
}

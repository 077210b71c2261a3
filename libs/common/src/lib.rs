//! Common library for the inventory platform
//!
//! This crate provides shared functionality used by the credential core and
//! the HTTP service: database connectivity, storage error types and the
//! crypto primitives used for data at rest and credential hashing.

pub mod crypto;
pub mod database;
pub mod error;

/// Example usage of the database and crypto modules
///
/// ```rust,no_run
/// use common::crypto::{Cipher, CryptoConfig};
/// use common::database::{DatabaseConfig, init_pool, health_check};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::from_env()?;
///     let pool = init_pool(&config).await?;
///     let is_healthy = health_check(&pool).await?;
///     println!("Database health check: {}", is_healthy);
///
///     let cipher = Cipher::new(&CryptoConfig::from_env()?)?;
///     let sealed = cipher.encrypt("ops@example.com")?;
///     assert_eq!(cipher.decrypt(&sealed)?, "ops@example.com");
///     Ok(())
/// }
/// ```
pub fn example_usage() {}

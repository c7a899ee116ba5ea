//! Shared infrastructure for the gatepass services
//!
//! Database connectivity and migrations, row mapping for the pass domain,
//! layered settings and error types.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, init_pool, health_check, run_migrations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
pub mod records;
pub mod settings;

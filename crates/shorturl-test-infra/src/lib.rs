pub mod error;
pub mod postgres;
pub mod retry;

pub use error::{Result, TestInfraError};
pub use postgres::{PostgresConfig, PostgresServer};
pub use retry::{retry, RetryPolicy};

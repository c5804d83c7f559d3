pub mod auth;
pub mod error;

pub use auth::{JwtClaims, Operator};
pub use error::AppError;

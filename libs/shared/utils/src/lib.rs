pub mod extractor;
pub mod jwt;
pub mod scheduler;
pub mod test_utils;

pub use extractor::operator_middleware;
pub use jwt::validate_token;
pub use scheduler::PeriodicTask;

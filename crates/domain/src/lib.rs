pub mod auth;
pub mod error;
pub mod identity;
pub mod ports;
pub mod reviews;
pub mod summary;
pub mod tours;
pub mod triggers;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;

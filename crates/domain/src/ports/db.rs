use super::BoxFuture;
use crate::DomainResult;

/// Liveness probe for the backing document store.
pub trait StoreHealth: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Resolves to `DomainError::Unavailable` when the store cannot be reached.
    fn health_check(&self) -> BoxFuture<'_, DomainResult<()>>;
}

use crate::DomainResult;
use crate::ports::BoxFuture;
use crate::summary::TourSummary;
use crate::tours::Tour;

pub trait TourRepository: Send + Sync {
    fn create(&self, tour: &Tour) -> BoxFuture<'_, DomainResult<Tour>>;

    fn get(&self, tour_id: &str) -> BoxFuture<'_, DomainResult<Option<Tour>>>;

    fn list(&self) -> BoxFuture<'_, DomainResult<Vec<Tour>>>;

    /// Writes both summary fields in one statement. `DomainError::NotFound`
    /// when the tour does not exist.
    fn update_summary(
        &self,
        tour_id: &str,
        summary: &TourSummary,
    ) -> BoxFuture<'_, DomainResult<()>>;
}

use std::sync::Arc;

use tourbook_domain::ports::db::StoreHealth;
use tourbook_domain::ports::reviews::ReviewRepository;
use tourbook_domain::ports::tours::TourRepository;
use tourbook_domain::reviews::ReviewService;
use tourbook_domain::tours::TourService;
use tourbook_infra::config::AppConfig;
use tourbook_infra::db::{self, DbConfig, InMemoryAdapter, SurrealAdapter};
use tourbook_infra::repositories::{
    InMemoryReviewRepository, InMemoryTourRepository, SurrealReviewRepository,
    SurrealTourRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub review_repo: Arc<dyn ReviewRepository>,
    pub tour_repo: Arc<dyn TourRepository>,
    pub store_health: Arc<dyn StoreHealth>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        if !config.uses_surreal() {
            tracing::warn!(
                data_backend = %config.data_backend,
                "using in-memory repositories; data is lost on restart"
            );
            return Ok(Self::in_memory(config));
        }

        let db_config = DbConfig::from_app_config(&config);
        let client = db::connect(&db_config).await?;
        Ok(Self {
            review_repo: Arc::new(SurrealReviewRepository::with_client(client.clone())),
            tour_repo: Arc::new(SurrealTourRepository::with_client(client)),
            store_health: Arc::new(SurrealAdapter::new(db_config)),
            config,
        })
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            config,
            review_repo: Arc::new(InMemoryReviewRepository::new()),
            tour_repo: Arc::new(InMemoryTourRepository::new()),
            store_health: Arc::new(InMemoryAdapter),
        }
    }

    pub fn review_service(&self) -> ReviewService {
        ReviewService::new(self.review_repo.clone(), self.tour_repo.clone())
    }

    pub fn tour_service(&self) -> TourService {
        TourService::new(self.tour_repo.clone())
    }
}

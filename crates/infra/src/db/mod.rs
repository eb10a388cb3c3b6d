use std::sync::Arc;
use std::time::Duration;

use surrealdb::{
    Surreal,
    engine::remote::ws::{Client, Ws},
    opt::auth::Root,
};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tourbook_domain::DomainResult;
use tourbook_domain::error::DomainError;
use tourbook_domain::ports::BoxFuture;
use tourbook_domain::ports::db::StoreHealth;
use url::Url;

use crate::config::AppConfig;

/// Review and tour tables. The compound unique index on `review` is the
/// one-review-per-user-per-tour rule; inserts race-free against it.
const SCHEMA: &str = "\
    DEFINE TABLE IF NOT EXISTS tour SCHEMALESS; \
    DEFINE INDEX IF NOT EXISTS tour_id_unique ON TABLE tour FIELDS tour_id UNIQUE; \
    DEFINE TABLE IF NOT EXISTS review SCHEMALESS; \
    DEFINE INDEX IF NOT EXISTS review_id_unique ON TABLE review FIELDS review_id UNIQUE; \
    DEFINE INDEX IF NOT EXISTS review_tour_user_unique ON TABLE review FIELDS tour_id, user_id UNIQUE; \
    DEFINE INDEX IF NOT EXISTS review_tour ON TABLE review FIELDS tour_id;";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DbConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.surreal_endpoint.clone(),
            namespace: config.surreal_ns.clone(),
            database: config.surreal_db.clone(),
            username: config.surreal_user.clone(),
            password: config.surreal_pass.clone(),
        }
    }
}

/// Opens a root session, selects namespace and database, and applies the schema.
pub async fn connect(db_config: &DbConfig) -> anyhow::Result<Arc<Surreal<Client>>> {
    let db = Surreal::<Client>::init();
    db.connect::<Ws>(db_config.endpoint.as_str()).await?;
    db.signin(Root {
        username: &db_config.username,
        password: &db_config.password,
    })
    .await?;
    db.use_ns(&db_config.namespace)
        .use_db(&db_config.database)
        .await?;
    db.query(SCHEMA).await?.check()?;
    tracing::info!(
        endpoint = %db_config.endpoint,
        namespace = %db_config.namespace,
        database = %db_config.database,
        "surreal schema ready"
    );
    Ok(Arc::new(db))
}

/// Maps driver errors onto the domain taxonomy. Unique index violations
/// become `Conflict`; everything else is treated as the store being unavailable.
pub(crate) fn map_surreal_error(err: surrealdb::Error) -> DomainError {
    let error_message = err.to_string();
    if is_index_violation(&error_message) {
        return DomainError::Conflict;
    }
    DomainError::Unavailable(format!("surreal query failed: {error_message}"))
}

/// SurrealDB reports a unique index hit as
/// ``Database index `name` already contains ...``.
fn is_index_violation(message: &str) -> bool {
    message.contains("Database index") && message.contains("already contains")
}

#[derive(Debug, Clone)]
pub struct SurrealAdapter {
    config: DbConfig,
}

impl SurrealAdapter {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }
}

impl StoreHealth for SurrealAdapter {
    fn backend(&self) -> &'static str {
        "surrealdb"
    }

    fn health_check(&self) -> BoxFuture<'_, DomainResult<()>> {
        let endpoint = self.config.endpoint.clone();
        Box::pin(async move {
            let address = parse_socket_address(&endpoint)?;
            let connect = timeout(Duration::from_secs(2), TcpStream::connect(address))
                .await
                .map_err(|_| {
                    DomainError::Unavailable("surreal endpoint connect timed out".to_string())
                })?;
            connect.map_err(|err| {
                DomainError::Unavailable(format!("surreal endpoint connect failed: {err}"))
            })?;
            tracing::debug!(endpoint, "surreal health check succeeded");
            Ok(())
        })
    }
}

/// Health probe for the process-local backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAdapter;

impl StoreHealth for InMemoryAdapter {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn health_check(&self) -> BoxFuture<'_, DomainResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

fn parse_socket_address(endpoint: &str) -> DomainResult<String> {
    let normalized = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("ws://{endpoint}")
    };
    let parsed = Url::parse(&normalized).map_err(|err| {
        DomainError::Unavailable(format!("invalid surreal endpoint '{endpoint}': {err}"))
    })?;

    let host = parsed.host_str().ok_or_else(|| {
        DomainError::Unavailable(format!("missing surreal host in endpoint '{endpoint}'"))
    })?;
    let port = match parsed.scheme() {
        "ws" | "http" => parsed.port().unwrap_or(8000),
        _ => parsed.port_or_known_default().unwrap_or(8000),
    };
    Ok(format!("{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_index_violations_count_as_conflicts() {
        assert!(is_index_violation(
            "Database index `review_tour_user_unique` already contains ['t1', 'u1'], \
             with record `review:abc`"
        ));
        assert!(!is_index_violation(
            "There was a problem with the database: unique constraint check timed out"
        ));
        assert!(!is_index_violation("duplicate field `rating` in SET clause"));
    }

    #[test]
    fn endpoint_without_scheme_defaults_to_ws() {
        assert_eq!(
            parse_socket_address("127.0.0.1:8000").expect("address"),
            "127.0.0.1:8000"
        );
    }

    #[test]
    fn bare_ws_endpoint_uses_surreal_port() {
        assert_eq!(
            parse_socket_address("ws://db.internal").expect("address"),
            "db.internal:8000"
        );
    }

    #[test]
    fn secure_endpoint_uses_tls_port() {
        assert_eq!(
            parse_socket_address("wss://db.example.com").expect("address"),
            "db.example.com:443"
        );
    }
}

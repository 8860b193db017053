pub mod auth;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use clock::Clock;
use config::MagicLinkConfig;
use repositories::{SqliteMagicLinkRepository, SqliteUserRepository};
use services::{EmailService, MagicLinkService, UserService};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub magic_link_service: Arc<MagicLinkService>,
    pub pool: SqlitePool,
}

impl AppState {
    /// Wires the SQLite repositories and services around `pool`.
    pub fn new(
        pool: SqlitePool,
        config: MagicLinkConfig,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
        let magic_link_repository = Arc::new(SqliteMagicLinkRepository::new(pool.clone()));

        let user_service = Arc::new(UserService::new(user_repository));
        let magic_link_service = Arc::new(MagicLinkService::new(
            config,
            magic_link_repository,
            user_service.clone(),
            email_service,
            clock,
        ));

        Self {
            user_service,
            magic_link_service,
            pool,
        }
    }
}

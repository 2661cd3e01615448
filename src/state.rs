use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::catalogue::CatalogueClient;
use crate::config::AppConfig;
use crate::services::{CatalogueSync, EnrolmentService, Notifier, SyncSettings};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub catalogue: Arc<dyn CatalogueClient>,
    pub notifier: Arc<Notifier>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn enrolments(&self) -> EnrolmentService {
        EnrolmentService::new(self.db.clone(), self.notifier.clone())
    }

    pub fn catalogue_sync(&self) -> CatalogueSync {
        let settings = SyncSettings {
            public_base_url: self.config.public_base_url.clone(),
            max_attempts: self
                .config
                .catalogue
                .as_ref()
                .map(|c| c.max_attempts)
                .unwrap_or(2),
            pricing: self.config.pricing.clone(),
        };
        CatalogueSync::new(self.db.clone(), self.catalogue.clone(), settings)
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

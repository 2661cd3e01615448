use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use academy::api::router;
use academy::catalogue::{CatalogueClient, HttpCatalogueClient, NoopCatalogueClient};
use academy::config::AppConfig;
use academy::db;
use academy::services::Notifier;
use academy::services::notifications::{HttpSmsSender, Mailer, SmsSender, SmtpMailer};
use academy::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "academy=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = db::connect(&config.database).await?;
    db::migrate(&pool).await?;

    let catalogue: Arc<dyn CatalogueClient> = match &config.catalogue {
        Some(catalogue_config) => Arc::new(HttpCatalogueClient::new(catalogue_config.clone())?),
        None => {
            warn!("CATALOGUE_BASE_URL not set; storefront sync disabled");
            Arc::new(NoopCatalogueClient)
        }
    };

    let mailer: Option<Arc<dyn Mailer>> = match &config.notification.email {
        Some(smtp) => Some(Arc::new(SmtpMailer::new(smtp)?)),
        None => None,
    };
    let sms: Option<Arc<dyn SmsSender>> = match &config.notification.sms {
        Some(sms) => Some(Arc::new(HttpSmsSender::new(sms.clone())?)),
        None => None,
    };
    let notifier = Notifier::new(
        pool.clone(),
        mailer,
        sms,
        config.notification.clone(),
        config.pricing.clone(),
    );

    let addr = config.server.bind_addr;
    let state = AppState {
        db: pool,
        catalogue,
        notifier: Arc::new(notifier),
        config: Arc::new(config),
    };

    let app = router(state);

    info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

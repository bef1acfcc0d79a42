use std::io;
use std::sync::Arc;
use std::time::Duration;

use chat_order_service::application::conversation::{ConversationService, ConversationSettings};
use chat_order_service::application::model_gateway::ModelGateway;
use chat_order_service::application::notifications::NotificationQueue;
use chat_order_service::application::order_service::OrderService;
use chat_order_service::config::Config;
use chat_order_service::domain::order::PickupInfo;
use chat_order_service::domain::ports::{Notifier, SystemClock};
use chat_order_service::infrastructure::catalog_client::{CatalogClientConfig, HttpCatalogClient};
use chat_order_service::infrastructure::gemini::{GeminiClient, GeminiConfig};
use chat_order_service::infrastructure::notifier::{LogNotifier, WebhookNotifier};
use chat_order_service::infrastructure::order_repo::DieselOrderRepository;
use chat_order_service::{build_server, create_pool, run_migrations, AppState};
use dotenvy::dotenv;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(io::Error::other)?;

    let pool = create_pool(&config.database_url).map_err(io::Error::other)?;
    run_migrations(&pool).map_err(io::Error::other)?;
    let repo = Arc::new(DieselOrderRepository::new(pool));

    let catalog = HttpCatalogClient::new(CatalogClientConfig {
        base_url: config.catalog_url.clone(),
        timeout_secs: config.catalog_timeout_secs,
    })
    .map_err(io::Error::other)?;
    let model = GeminiClient::new(GeminiConfig {
        api_key: config.gemini_api_key.clone(),
        model: config.gemini_model.clone(),
        endpoint: config.gemini_endpoint.clone(),
        timeout_secs: config.model_timeout_secs,
    })
    .map_err(io::Error::other)?;

    let notifier: Arc<dyn Notifier> = match &config.notify_url {
        Some(url) => {
            log::info!("delivering notices to {}", url);
            Arc::new(WebhookNotifier::new(url, 10).map_err(io::Error::other)?)
        }
        None => {
            log::warn!("NOTIFY_URL not set, notices are only logged");
            Arc::new(LogNotifier)
        }
    };
    let (notifications, _worker) = NotificationQueue::spawn(notifier, config.notify_queue_capacity);

    let pickup = PickupInfo {
        time: config.pickup_time.clone(),
        location: config.pickup_location.clone(),
    };
    let clock = Arc::new(SystemClock);

    let chat = ConversationService::new(
        repo.clone(),
        Arc::new(catalog),
        ModelGateway::new(Arc::new(model), Duration::from_secs(config.model_timeout_secs)),
        notifications.clone(),
        clock.clone(),
        ConversationSettings {
            pickup: pickup.clone(),
            currency: config.currency.clone(),
            compose_summary: config.compose_summary,
        },
    );
    let orders = OrderService::new(repo, notifications, clock, config.cancellation_cutoff);

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(AppState::new(chat, orders, pickup), &config.host, config.port)?.await
}

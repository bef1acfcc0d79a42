pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::conversation::ConversationService;
use application::order_service::OrderService;
use domain::order::PickupInfo;
use handlers::ApiDoc;
use infrastructure::order_repo::DieselOrderRepository;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type ChatService = ConversationService<DieselOrderRepository>;
pub type OrdersService = OrderService<DieselOrderRepository>;

type MigrationError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), MigrationError> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    for version in applied {
        log::info!("applied migration {}", version);
    }
    Ok(())
}

/// Shared services handed to every worker.
#[derive(Clone)]
pub struct AppState {
    pub chat: web::Data<ChatService>,
    pub orders: web::Data<OrdersService>,
    pub pickup: web::Data<PickupInfo>,
}

impl AppState {
    pub fn new(chat: ChatService, orders: OrdersService, pickup: PickupInfo) -> Self {
        Self {
            chat: web::Data::new(chat),
            orders: web::Data::new(orders),
            pickup: web::Data::new(pickup),
        }
    }
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: AppState,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let openapi = ApiDoc::openapi();
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.chat.clone())
            .app_data(state.orders.clone())
            .app_data(state.pickup.clone())
            .wrap(Logger::default())
            .route("/chat/prompt", web::post().to(handlers::chat::prompt))
            .service(
                web::scope("/orders")
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("/{id}", web::get().to(handlers::orders::get_order))
                    .route("/{id}", web::delete().to(handlers::orders::cancel_order)),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}

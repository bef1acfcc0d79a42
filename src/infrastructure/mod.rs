pub mod catalog_client;
pub mod gemini;
pub mod models;
pub mod notifier;
pub mod order_repo;

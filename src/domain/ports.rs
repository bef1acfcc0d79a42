use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use uuid::Uuid;

use super::catalog::CatalogItem;
use super::errors::{CatalogError, DomainError, ModelError, NotifyError};
use super::notification::{CancellationNotice, ConfirmationNotice};
use super::order::{ListResult, OrderFilter, OrderLineInput, OrderStatus, OrderView};

/// Persistent store of orders and their lines.
///
/// Implementations are blocking; async callers run them on the blocking pool.
pub trait OrderRepository: Send + Sync + 'static {
    /// Most recent order of `user_id` in an active status.
    fn find_active_draft(&self, user_id: Uuid) -> Result<Option<OrderView>, DomainError>;

    /// Inserts a `BUILDING` order and all of its lines atomically. Fails with
    /// `Conflict` when the user already has an active draft.
    fn create_draft(&self, user_id: Uuid, lines: Vec<OrderLineInput>) -> Result<Uuid, DomainError>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError>;

    /// Confirmed orders of `user_id` created at or after `since`, not counting `excluding`.
    fn count_confirmed_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        excluding: Uuid,
    ) -> Result<i64, DomainError>;

    /// Moves an active draft to `status` with its final amounts. Fails with
    /// `NotFound` when the order is not an active draft any more.
    fn finalize(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        transport_fee: i64,
        total_cost: i64,
    ) -> Result<OrderView, DomainError>;

    /// Marks an order `CANCELLED` if its current status allows it.
    fn cancel(&self, order_id: Uuid) -> Result<(), DomainError>;

    fn list(&self, user_id: Uuid, filter: &OrderFilter) -> Result<ListResult, DomainError>;
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn query(&self, text: &str, max_results: u32) -> Result<Vec<CatalogItem>, CatalogError>;
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: ModelRequest) -> Result<String, ModelError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_confirmed(&self, notice: &ConfirmationNotice) -> Result<(), NotifyError>;
    async fn notify_cancelled(&self, notice: &CancellationNotice) -> Result<(), NotifyError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

//! In-memory stand-ins for the ports, shared by the application tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use uuid::Uuid;

use crate::domain::catalog::CatalogItem;
use crate::domain::errors::{CatalogError, DomainError, ModelError, NotifyError};
use crate::domain::notification::{CancellationNotice, ConfirmationNotice, Notification};
use crate::domain::order::{
    ListResult, OrderFilter, OrderLineInput, OrderLineView, OrderStatus, OrderView,
};
use crate::domain::ports::{
    CatalogClient, Clock, LanguageModel, ModelRequest, Notifier, OrderRepository,
};

pub fn sample_order(status: OrderStatus) -> OrderView {
    OrderView {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        status,
        transport_fee: 0,
        total_cost: 0,
        created_at: Utc::now(),
        lines: vec![OrderLineView {
            id: Uuid::new_v4(),
            item_ref: "1".to_string(),
            item_name: "Jesa Milk (2L)".to_string(),
            quantity: 2,
            unit_price: 5000,
        }],
    }
}

// ── Repository ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<Vec<OrderView>>,
    fail_creates: AtomicBool,
}

impl InMemoryOrderRepository {
    pub fn insert(&self, order: OrderView) {
        self.orders.lock().expect("lock").push(order);
    }

    pub fn orders_of(&self, user_id: Uuid) -> Vec<OrderView> {
        self.orders
            .lock()
            .expect("lock")
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn active_count(&self, user_id: Uuid) -> usize {
        self.orders_of(user_id)
            .iter()
            .filter(|o| o.status.is_active())
            .count()
    }

    pub fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn find_active_draft(&self, user_id: Uuid) -> Result<Option<OrderView>, DomainError> {
        Ok(self
            .orders_of(user_id)
            .into_iter()
            .filter(|o| o.status.is_active())
            .max_by_key(|o| o.created_at))
    }

    fn create_draft(&self, user_id: Uuid, lines: Vec<OrderLineInput>) -> Result<Uuid, DomainError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(DomainError::Internal("database unavailable".to_string()));
        }
        let mut orders = self.orders.lock().expect("lock");
        if orders
            .iter()
            .any(|o| o.user_id == user_id && o.status.is_active())
        {
            return Err(DomainError::Conflict("active draft exists".to_string()));
        }
        let id = Uuid::new_v4();
        orders.push(OrderView {
            id,
            user_id,
            status: OrderStatus::Building,
            transport_fee: 0,
            total_cost: 0,
            created_at: Utc::now(),
            lines: lines
                .into_iter()
                .map(|l| OrderLineView {
                    id: Uuid::new_v4(),
                    item_ref: l.item_ref,
                    item_name: l.item_name,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                })
                .collect(),
        });
        Ok(id)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        Ok(self
            .orders
            .lock()
            .expect("lock")
            .iter()
            .find(|o| o.id == id)
            .cloned())
    }

    fn count_confirmed_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        excluding: Uuid,
    ) -> Result<i64, DomainError> {
        Ok(self
            .orders_of(user_id)
            .iter()
            .filter(|o| {
                o.status == OrderStatus::Confirmed && o.created_at >= since && o.id != excluding
            })
            .count() as i64)
    }

    fn finalize(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        transport_fee: i64,
        total_cost: i64,
    ) -> Result<OrderView, DomainError> {
        let mut orders = self.orders.lock().expect("lock");
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id && o.status.is_active())
            .ok_or(DomainError::NotFound)?;
        order.status = status;
        order.transport_fee = transport_fee;
        order.total_cost = total_cost;
        Ok(order.clone())
    }

    fn cancel(&self, order_id: Uuid) -> Result<(), DomainError> {
        let mut orders = self.orders.lock().expect("lock");
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(DomainError::NotFound)?;
        if !order.status.is_cancellable() {
            return Err(DomainError::NotCancellable(order.status.to_string()));
        }
        order.status = OrderStatus::Cancelled;
        Ok(())
    }

    fn list(&self, user_id: Uuid, filter: &OrderFilter) -> Result<ListResult, DomainError> {
        let mut matching: Vec<OrderView> = self
            .orders_of(user_id)
            .into_iter()
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .filter(|o| filter.created_from.map_or(true, |t| o.created_at >= t))
            .filter(|o| filter.created_until.map_or(true, |t| o.created_at < t))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect();
        Ok(ListResult { items, total })
    }
}

// ── Language model ────────────────────────────────────────────────────────────

/// Answers with the response of the first rule whose keyword occurs in the
/// user prompt, or with the fallback.
pub struct ScriptedModel {
    rules: Vec<(String, String)>,
    fallback: Result<String, String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn always(response: &str) -> Self {
        Self {
            rules: Vec::new(),
            fallback: Ok(response.to_string()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fallback: Err(message.to_string()),
            ..Self::always("")
        }
    }

    pub fn when(mut self, keyword: &str, response: &str) -> Self {
        self.rules.push((keyword.to_string(), response.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: ModelRequest) -> Result<String, ModelError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let answer = self
            .rules
            .iter()
            .find(|(keyword, _)| request.user.contains(keyword.as_str()))
            .map(|(_, response)| Ok(response.clone()))
            .unwrap_or_else(|| self.fallback.clone());
        self.requests.lock().expect("lock").push(request);
        answer.map_err(ModelError::Http)
    }
}

// ── Catalog ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeCatalog {
    items: Vec<CatalogItem>,
    fail: bool,
    queries: Mutex<Vec<(String, u32)>>,
}

impl FakeCatalog {
    pub fn with_item(mut self, id: &str, name: &str, price: i64, available: bool) -> Self {
        self.items.push(CatalogItem {
            id: id.to_string(),
            name: name.to_string(),
            category: None,
            price,
            available,
        });
        self
    }

    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<(String, u32)> {
        self.queries.lock().expect("lock").clone()
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn query(&self, text: &str, max_results: u32) -> Result<Vec<CatalogItem>, CatalogError> {
        self.queries
            .lock()
            .expect("lock")
            .push((text.to_string(), max_results));
        if self.fail {
            return Err(CatalogError::Http("connection refused".to_string()));
        }
        let needle = text.to_lowercase();
        Ok(self
            .items
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&needle))
            .take(max_results as usize)
            .cloned()
            .collect())
    }
}

// ── Notifier ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().expect("lock").clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn record(&self, notification: Notification) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotifyError::Delivery("smtp down".to_string()));
        }
        self.delivered.lock().expect("lock").push(notification);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_confirmed(&self, notice: &ConfirmationNotice) -> Result<(), NotifyError> {
        self.record(Notification::Confirmed(notice.clone()))
    }

    async fn notify_cancelled(&self, notice: &CancellationNotice) -> Result<(), NotifyError> {
        self.record(Notification::Cancelled(notice.clone()))
    }
}

// ── Clock ─────────────────────────────────────────────────────────────────────

pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::notification::Notification;
use crate::domain::order::{OrderLineInput, OrderStatus, OrderView, PickupInfo};
use crate::domain::ports::{CatalogClient, Clock, OrderRepository};
use crate::domain::pricing;

use super::model_gateway::ModelGateway;
use super::notifications::{cancellation_notice, confirmation_notice, NotificationQueue};
use super::replies::{self, DraftSummary};
use super::turn_locks::TurnLocks;
use super::{run_blocking, start_of_day};

#[derive(Debug, Clone)]
pub struct ConversationSettings {
    pub pickup: PickupInfo,
    pub currency: String,
    /// Let the model phrase the draft summary instead of the fixed template.
    pub compose_summary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Confirm,
    Cancel,
    Other,
}

/// How a message is read while the user has an open draft. Confirmation
/// wins when both words appear.
fn intent_of(message: &str) -> Intent {
    let lowered = message.to_lowercase();
    if lowered.contains("confirm") {
        Intent::Confirm
    } else if lowered.contains("cancel") {
        Intent::Cancel
    } else {
        Intent::Other
    }
}

/// Handles one chat turn: drafts an order from free text, or resolves the
/// open draft on confirm/cancel.
pub struct ConversationService<R> {
    repo: Arc<R>,
    catalog: Arc<dyn CatalogClient>,
    gateway: ModelGateway,
    notifications: NotificationQueue,
    clock: Arc<dyn Clock>,
    locks: TurnLocks,
    settings: ConversationSettings,
}

impl<R: OrderRepository> ConversationService<R> {
    pub fn new(
        repo: Arc<R>,
        catalog: Arc<dyn CatalogClient>,
        gateway: ModelGateway,
        notifications: NotificationQueue,
        clock: Arc<dyn Clock>,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            repo,
            catalog,
            gateway,
            notifications,
            clock,
            locks: TurnLocks::default(),
            settings,
        }
    }

    pub async fn handle_turn(&self, user_id: Uuid, message: &str) -> Result<String, DomainError> {
        let _turn = self.locks.acquire(user_id).await;

        let draft = run_blocking(&self.repo, move |r| r.find_active_draft(user_id)).await?;
        let Some(draft) = draft else {
            return self.start_draft(user_id, message).await;
        };

        match intent_of(message) {
            Intent::Confirm => self.confirm(draft).await,
            Intent::Cancel => self.cancel(draft).await,
            Intent::Other => {
                let stale = draft.id;
                run_blocking(&self.repo, move |r| r.cancel(stale)).await?;
                log::info!("discarded unconfirmed order {} of user {}", stale, user_id);
                let reply = self.start_draft(user_id, message).await?;
                Ok(replies::with_discard_notice(&reply))
            }
        }
    }

    async fn confirm(&self, draft: OrderView) -> Result<String, DomainError> {
        let (user_id, order_id) = (draft.user_id, draft.id);
        let since = start_of_day(&self.clock.now());

        let earlier = run_blocking(&self.repo, move |r| {
            r.count_confirmed_since(user_id, since, order_id)
        })
        .await?;
        let fee = pricing::transport_fee(earlier + 1);
        let total = pricing::order_total(
            draft.lines.iter().map(|l| (l.quantity, l.unit_price)),
            fee,
        )
        .ok_or_else(|| DomainError::Internal(format!("total of order {} overflows", order_id)))?;

        let confirmed = run_blocking(&self.repo, move |r| {
            r.finalize(order_id, OrderStatus::Confirmed, fee, total)
        })
        .await?;
        log::info!(
            "order {} confirmed for user {}: fee {}, total {}",
            order_id,
            user_id,
            fee,
            total
        );

        if let Some(notice) = confirmation_notice(&confirmed, &self.settings.pickup) {
            self.notifications.enqueue(Notification::Confirmed(notice));
        }
        Ok(replies::confirmed(&self.settings.pickup))
    }

    async fn cancel(&self, draft: OrderView) -> Result<String, DomainError> {
        let order_id = draft.id;
        run_blocking(&self.repo, move |r| r.cancel(order_id)).await?;
        log::info!("order {} cancelled by user {}", order_id, draft.user_id);

        self.notifications
            .enqueue(Notification::Cancelled(cancellation_notice(&draft)));
        Ok(replies::CANCELLED.to_string())
    }

    async fn start_draft(&self, user_id: Uuid, message: &str) -> Result<String, DomainError> {
        let extraction = self.gateway.extract(message).await?;
        if let Some(err) = &extraction.parse_error {
            log::warn!(
                "unusable extraction output for user {} ({}): {}",
                user_id,
                err,
                extraction.raw_payload
            );
        }
        if extraction.lines.is_empty() {
            return Ok(replies::OFF_TOPIC.to_string());
        }

        let mut lines = Vec::with_capacity(extraction.lines.len());
        for requested in &extraction.lines {
            let hit = self
                .catalog
                .query(&requested.name, 1)
                .await?
                .into_iter()
                .next();
            let item = match hit {
                Some(item) if item.available => item,
                _ => return Ok(replies::unavailable(&requested.name)),
            };
            if pricing::line_subtotal(requested.quantity, item.price).is_none() {
                return Ok(replies::quantity_too_large(&requested.name));
            }
            lines.push(OrderLineInput {
                item_ref: item.id,
                item_name: item.name,
                quantity: requested.quantity,
                unit_price: item.price,
            });
        }

        let Some(summary) = DraftSummary::from_lines(&lines, &self.settings.currency) else {
            return Ok(replies::ORDER_TOO_LARGE.to_string());
        };

        let order_id = run_blocking(&self.repo, move |r| r.create_draft(user_id, lines)).await?;
        log::info!(
            "user {} drafted order {} with {} line(s)",
            user_id,
            order_id,
            summary.lines.len()
        );

        Ok(self.render_summary(&summary).await)
    }

    async fn render_summary(&self, summary: &DraftSummary) -> String {
        if !self.settings.compose_summary {
            return summary.render();
        }
        match self.gateway.compose(summary).await {
            Ok(text) if text.contains(&summary.subtotal.to_string()) => text,
            Ok(text) => {
                log::warn!("composed summary lost the subtotal, using template: {}", text);
                summary.render()
            }
            Err(e) => {
                log::warn!("summary composition failed, using template: {}", e);
                summary.render()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{Local, Utc};
    use tokio::sync::mpsc;

    use super::*;
    use crate::application::test_support::{
        sample_order, FakeCatalog, FixedClock, InMemoryOrderRepository, ScriptedModel,
    };

    const MILK: &str = r#"[{"name":"Jesa Milk (2L)","quantity":2}]"#;
    const BREAD: &str = r#"```json
[{"name":"Bread Loaf","quantity":1}]
```"#;

    struct Harness {
        service: ConversationService<InMemoryOrderRepository>,
        repo: Arc<InMemoryOrderRepository>,
        catalog: Arc<FakeCatalog>,
        model: Arc<ScriptedModel>,
        notices: mpsc::Receiver<Notification>,
    }

    impl Harness {
        fn drain_notices(&mut self) -> Vec<Notification> {
            let mut out = Vec::new();
            while let Ok(n) = self.notices.try_recv() {
                out.push(n);
            }
            out
        }
    }

    fn shop() -> FakeCatalog {
        FakeCatalog::default()
            .with_item("1", "Jesa Milk (2L)", 5000, true)
            .with_item("7", "Bread Loaf", 3500, true)
    }

    fn menu() -> ScriptedModel {
        ScriptedModel::always("[]")
            .when("Jesa Milk", MILK)
            .when("Bread", BREAD)
    }

    fn harness_with(model: ScriptedModel, catalog: FakeCatalog, compose_summary: bool) -> Harness {
        let repo = Arc::new(InMemoryOrderRepository::default());
        let catalog = Arc::new(catalog);
        let model = Arc::new(model);
        let (queue, notices) = NotificationQueue::channel(16);
        let service = ConversationService::new(
            repo.clone(),
            catalog.clone(),
            ModelGateway::new(model.clone(), Duration::from_secs(1)),
            queue,
            Arc::new(FixedClock(Local::now())),
            ConversationSettings {
                pickup: PickupInfo {
                    time: "18:00".to_string(),
                    location: "F2 17".to_string(),
                },
                currency: "UGX".to_string(),
                compose_summary,
            },
        );
        Harness {
            service,
            repo,
            catalog,
            model,
            notices,
        }
    }

    fn harness(model: ScriptedModel, catalog: FakeCatalog) -> Harness {
        harness_with(model, catalog, false)
    }

    #[test]
    fn confirm_takes_precedence_over_cancel() {
        assert_eq!(intent_of("I Confirm"), Intent::Confirm);
        assert_eq!(intent_of("confirm, do not cancel"), Intent::Confirm);
        assert_eq!(intent_of("it's cancelled"), Intent::Cancel);
        assert_eq!(intent_of("yes please"), Intent::Other);
    }

    #[tokio::test]
    async fn request_becomes_a_priced_draft() {
        let h = harness(menu(), shop());
        let user = Uuid::new_v4();

        let reply = h
            .service
            .handle_turn(user, "I want two Jesa Milk (2L)")
            .await
            .expect("turn");

        assert!(reply.contains("10000"));
        assert!(reply.contains("Do you confirm"));
        assert!(!reply.contains("Grand total:"));
        let orders = h.repo.orders_of(user);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Building);
        assert_eq!(orders[0].transport_fee, 0);
        assert_eq!(orders[0].total_cost, 0);
        assert_eq!(orders[0].lines.len(), 1);
        assert_eq!(orders[0].lines[0].item_ref, "1");
        assert_eq!(orders[0].lines[0].quantity, 2);
        assert_eq!(orders[0].lines[0].unit_price, 5000);
        assert_eq!(h.catalog.queries(), vec![("Jesa Milk (2L)".to_string(), 1)]);
    }

    #[tokio::test]
    async fn unavailable_product_persists_nothing() {
        let catalog = FakeCatalog::default().with_item("1", "Jesa Milk (2L)", 5000, false);
        let h = harness(menu(), catalog);
        let user = Uuid::new_v4();

        let reply = h
            .service
            .handle_turn(user, "I want two Jesa Milk (2L)")
            .await
            .expect("turn");

        assert_eq!(
            reply,
            "That product \"Jesa Milk (2L)\" is not available at the moment."
        );
        assert!(h.repo.orders_of(user).is_empty());
        assert_eq!(h.repo.active_count(user), 0);
    }

    #[tokio::test]
    async fn unknown_product_is_reported_unavailable() {
        let h = harness(menu(), FakeCatalog::default());

        let reply = h
            .service
            .handle_turn(Uuid::new_v4(), "Bread please")
            .await
            .expect("turn");

        assert_eq!(reply, replies::unavailable("Bread Loaf"));
    }

    #[tokio::test]
    async fn off_topic_message_makes_one_model_call_and_nothing_else() {
        let h = harness(ScriptedModel::always("[]"), shop());
        let user = Uuid::new_v4();

        let reply = h
            .service
            .handle_turn(user, "What is biology?")
            .await
            .expect("turn");

        assert_eq!(reply, replies::OFF_TOPIC);
        assert_eq!(h.model.requests().len(), 1);
        assert!(h.catalog.queries().is_empty());
        assert!(h.repo.orders_of(user).is_empty());
    }

    #[tokio::test]
    async fn unparsable_model_output_is_treated_as_off_topic() {
        let h = harness(ScriptedModel::always("Sure! What would you like?"), shop());

        let reply = h
            .service
            .handle_turn(Uuid::new_v4(), "hello")
            .await
            .expect("turn");

        assert_eq!(reply, replies::OFF_TOPIC);
        assert!(h.catalog.queries().is_empty());
    }

    #[tokio::test]
    async fn first_confirmation_of_the_day_costs_the_lowest_fee() {
        let mut h = harness(menu(), shop());
        let user = Uuid::new_v4();

        h.service
            .handle_turn(user, "I want two Jesa Milk (2L)")
            .await
            .expect("draft");
        let reply = h.service.handle_turn(user, "I confirm").await.expect("confirm");

        assert_eq!(
            reply,
            "Your order has been confirmed! We'll see you at 18:00 at F2 17."
        );
        let order = &h.repo.orders_of(user)[0];
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.transport_fee, 1000);
        assert_eq!(order.total_cost, 11_000);
        let notices = h.drain_notices();
        assert_eq!(notices.len(), 1);
        let Notification::Confirmed(notice) = &notices[0] else {
            panic!("expected a confirmation notice");
        };
        assert_eq!(notice.order_id, order.id);
        assert_eq!(notice.total_cost, 11_000);
        assert_eq!(notice.pickup_time, "18:00");
    }

    #[tokio::test]
    async fn fourth_confirmation_of_the_day_costs_the_middle_fee() {
        let mut h = harness(menu(), shop());
        let user = Uuid::new_v4();
        for _ in 0..3 {
            let mut earlier = sample_order(OrderStatus::Confirmed);
            earlier.user_id = user;
            earlier.created_at = Utc::now();
            h.repo.insert(earlier);
        }

        h.service
            .handle_turn(user, "I want two Jesa Milk (2L)")
            .await
            .expect("draft");
        h.service.handle_turn(user, "confirm").await.expect("confirm");

        let confirmed: Vec<_> = h
            .repo
            .orders_of(user)
            .into_iter()
            .filter(|o| o.transport_fee > 0)
            .collect();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].status, OrderStatus::Confirmed);
        assert_eq!(confirmed[0].transport_fee, 2000);
        assert_eq!(confirmed[0].total_cost, 12_000);
        assert_eq!(h.drain_notices().len(), 1);
    }

    #[tokio::test]
    async fn repeated_confirm_neither_charges_nor_notifies_twice() {
        let mut h = harness(menu(), shop());
        let user = Uuid::new_v4();

        h.service
            .handle_turn(user, "I want two Jesa Milk (2L)")
            .await
            .expect("draft");
        h.service.handle_turn(user, "confirm").await.expect("confirm");
        let again = h.service.handle_turn(user, "confirm").await.expect("again");

        assert_eq!(again, replies::OFF_TOPIC);
        let orders = h.repo.orders_of(user);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total_cost, 11_000);
        assert_eq!(h.drain_notices().len(), 1);
    }

    #[tokio::test]
    async fn cancel_resolves_the_draft_and_notifies() {
        let mut h = harness(menu(), shop());
        let user = Uuid::new_v4();

        h.service
            .handle_turn(user, "I want two Jesa Milk (2L)")
            .await
            .expect("draft");
        let reply = h
            .service
            .handle_turn(user, "Please CANCEL that")
            .await
            .expect("cancel");

        assert_eq!(reply, replies::CANCELLED);
        assert_eq!(h.repo.orders_of(user)[0].status, OrderStatus::Cancelled);
        assert_eq!(h.repo.active_count(user), 0);
        let notices = h.drain_notices();
        assert_eq!(notices.len(), 1);
        assert!(matches!(notices[0], Notification::Cancelled(_)));
    }

    #[tokio::test]
    async fn new_request_replaces_the_unconfirmed_draft() {
        let mut h = harness(menu(), shop());
        let user = Uuid::new_v4();

        h.service
            .handle_turn(user, "I want two Jesa Milk (2L)")
            .await
            .expect("draft");
        let reply = h
            .service
            .handle_turn(user, "Actually just one Bread Loaf")
            .await
            .expect("replace");

        assert!(reply.starts_with(replies::DRAFT_DISCARDED));
        assert!(reply.contains("Bread Loaf × 1 @ 3500 UGX"));
        assert_eq!(h.repo.active_count(user), 1);
        let orders = h.repo.orders_of(user);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
        assert_eq!(orders[1].lines[0].item_name, "Bread Loaf");
        assert!(h.drain_notices().is_empty());
    }

    #[tokio::test]
    async fn oversized_quantity_is_rejected_without_persisting() {
        let catalog = FakeCatalog::default().with_item("9", "Gold Bar", i64::MAX, true);
        let model = ScriptedModel::always(r#"[{"name":"Gold Bar","quantity":2}]"#);
        let h = harness(model, catalog);
        let user = Uuid::new_v4();

        let reply = h.service.handle_turn(user, "two gold bars").await.expect("turn");

        assert_eq!(reply, replies::quantity_too_large("Gold Bar"));
        assert!(h.repo.orders_of(user).is_empty());
    }

    #[tokio::test]
    async fn catalog_outage_fails_the_turn_without_persisting() {
        let h = harness(menu(), FakeCatalog::unreachable());
        let user = Uuid::new_v4();

        let err = h
            .service
            .handle_turn(user, "I want two Jesa Milk (2L)")
            .await
            .expect_err("catalog is down");

        assert!(matches!(err, DomainError::Upstream(_)));
        assert!(h.repo.orders_of(user).is_empty());
    }

    #[tokio::test]
    async fn model_outage_fails_the_turn() {
        let h = harness(ScriptedModel::failing("503"), shop());

        let err = h
            .service
            .handle_turn(Uuid::new_v4(), "I want two Jesa Milk (2L)")
            .await
            .expect_err("model is down");

        assert!(matches!(err, DomainError::Upstream(_)));
        assert!(h.catalog.queries().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_leaves_no_draft() {
        let h = harness(menu(), shop());
        h.repo.fail_creates();
        let user = Uuid::new_v4();

        let result = h.service.handle_turn(user, "I want two Jesa Milk (2L)").await;

        assert!(matches!(result, Err(DomainError::Internal(_))));
        assert_eq!(h.repo.active_count(user), 0);
    }

    #[tokio::test]
    async fn composed_summary_is_used_when_it_keeps_the_subtotal() {
        let model = ScriptedModel::always(MILK).when("Subtotal:", "Two Jesa Milk for 10000 UGX. Confirm?");
        let h = harness_with(model, shop(), true);

        let reply = h
            .service
            .handle_turn(Uuid::new_v4(), "I want two Jesa Milk (2L)")
            .await
            .expect("turn");

        assert_eq!(reply, "Two Jesa Milk for 10000 UGX. Confirm?");
    }

    #[tokio::test]
    async fn composed_summary_without_the_subtotal_falls_back_to_template() {
        let model = ScriptedModel::always(MILK).when("Subtotal:", "Lovely choice! Confirm?");
        let h = harness_with(model, shop(), true);

        let reply = h
            .service
            .handle_turn(Uuid::new_v4(), "I want two Jesa Milk (2L)")
            .await
            .expect("turn");

        assert!(reply.starts_with("Okay, here's a summary of your order:"));
        assert!(reply.contains("Subtotal: 10000 UGX"));
    }

    #[tokio::test]
    async fn concurrent_turns_of_one_user_leave_one_active_draft() {
        let model = ScriptedModel::always(MILK).with_delay(Duration::from_millis(30));
        let h = harness(model, shop());
        let user = Uuid::new_v4();

        let (a, b) = tokio::join!(
            h.service.handle_turn(user, "I want two Jesa Milk (2L)"),
            h.service.handle_turn(user, "I want two Jesa Milk (2L)"),
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(h.repo.active_count(user), 1);
        assert_eq!(h.repo.orders_of(user).len(), 2);
    }
}

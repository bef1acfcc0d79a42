use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::notification::Notification;
use crate::domain::order::{ListResult, OrderFilter, OrderStatus, OrderView};
use crate::domain::ports::{Clock, OrderRepository};

use super::notifications::{cancellation_notice, NotificationQueue};
use super::{local_instant, run_blocking};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    /// Local calendar day the orders were created on.
    pub date: Option<NaiveDate>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Read access to a user's orders, plus cancel-by-id.
pub struct OrderService<R> {
    repo: Arc<R>,
    notifications: NotificationQueue,
    clock: Arc<dyn Clock>,
    cancellation_cutoff: NaiveTime,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(
        repo: Arc<R>,
        notifications: NotificationQueue,
        clock: Arc<dyn Clock>,
        cancellation_cutoff: NaiveTime,
    ) -> Self {
        Self {
            repo,
            notifications,
            clock,
            cancellation_cutoff,
        }
    }

    pub fn filter_for(&self, query: &ListQuery) -> OrderFilter {
        let tz = self.clock.now().timezone();
        let window = query.date.map(|day| {
            let from = local_instant(&tz, day, NaiveTime::MIN);
            let until = day
                .succ_opt()
                .map(|next| local_instant(&tz, next, NaiveTime::MIN));
            (from, until)
        });
        OrderFilter {
            status: query.status,
            created_from: window.map(|(from, _)| from),
            created_until: window.and_then(|(_, until)| until),
            page: query.page.filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE),
            limit: query
                .limit
                .filter(|l| (1..=MAX_LIMIT).contains(l))
                .unwrap_or(DEFAULT_LIMIT),
        }
    }

    pub async fn list_orders(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<(ListResult, OrderFilter), DomainError> {
        let filter = self.filter_for(query);
        let for_repo = filter.clone();
        let result = run_blocking(&self.repo, move |r| r.list(user_id, &for_repo)).await?;
        Ok((result, filter))
    }

    /// Another user's order is reported as missing.
    pub async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, DomainError> {
        run_blocking(&self.repo, move |r| r.find_by_id(order_id))
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(DomainError::NotFound)
    }

    /// Cancels an order the user owns, up to the cutoff time on the day the
    /// order was created.
    pub async fn cancel_order(&self, user_id: Uuid, order_id: Uuid) -> Result<(), DomainError> {
        let order = run_blocking(&self.repo, move |r| r.find_by_id(order_id))
            .await?
            .ok_or(DomainError::NotFound)?;
        if order.user_id != user_id {
            return Err(DomainError::Forbidden);
        }
        if !order.status.is_cancellable() {
            return Err(DomainError::NotCancellable(order.status.to_string()));
        }

        let now = self.clock.now();
        let tz = now.timezone();
        let created_day = order.created_at.with_timezone(&tz).date_naive();
        let deadline = local_instant(&tz, created_day, self.cancellation_cutoff);
        if now.with_timezone(&Utc) >= deadline {
            return Err(DomainError::CancellationWindowClosed);
        }

        run_blocking(&self.repo, move |r| r.cancel(order_id)).await?;
        log::info!("order {} cancelled via api by user {}", order_id, user_id);

        self.notifications
            .enqueue(Notification::Cancelled(cancellation_notice(&order)));
        Ok(())
    }
}

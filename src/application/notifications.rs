//! Fire-and-forget delivery of order notices.
//!
//! Turns push onto a bounded queue and return immediately; a single worker
//! task drains it and hands each notice to the [`Notifier`]. Delivery errors
//! end in the log and never reach the turn that produced the notice.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::domain::notification::{CancellationNotice, ConfirmationNotice, NoticeLine, Notification};
use crate::domain::order::{OrderView, PickupInfo};
use crate::domain::ports::Notifier;

#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
}

impl NotificationQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Creates the queue and spawns its worker on the current runtime.
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::channel(capacity);
        let handle = tokio::spawn(run_worker(rx, notifier));
        (queue, handle)
    }

    pub fn enqueue(&self, notification: Notification) {
        let order_id = notification.order_id();
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::error!("notification queue full, dropping notice for order {}", order_id);
            }
            Err(TrySendError::Closed(_)) => {
                log::error!("notification worker stopped, dropping notice for order {}", order_id);
            }
        }
    }
}

pub async fn run_worker(mut rx: mpsc::Receiver<Notification>, notifier: Arc<dyn Notifier>) {
    while let Some(notification) = rx.recv().await {
        deliver(notifier.as_ref(), &notification).await;
    }
    log::info!("notification worker exiting");
}

async fn deliver(notifier: &dyn Notifier, notification: &Notification) {
    let result = match notification {
        Notification::Confirmed(notice) => notifier.notify_confirmed(notice).await,
        Notification::Cancelled(notice) => notifier.notify_cancelled(notice).await,
    };
    if let Err(e) = result {
        log::error!(
            "failed to deliver notice for order {}: {}",
            notification.order_id(),
            e
        );
    }
}

/// `None` when a line subtotal overflows. Drafts refuse such lines when they
/// are created, so this only happens if stored rows were altered.
pub fn confirmation_notice(order: &OrderView, pickup: &PickupInfo) -> Option<ConfirmationNotice> {
    let lines = order
        .lines
        .iter()
        .map(|l| {
            l.subtotal().map(|subtotal| NoticeLine {
                item_name: l.item_name.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
                subtotal,
            })
        })
        .collect::<Option<Vec<_>>>();
    let Some(lines) = lines else {
        log::error!("line subtotal of order {} overflows, no notice built", order.id);
        return None;
    };
    Some(ConfirmationNotice {
        order_id: order.id,
        user_id: order.user_id,
        lines,
        transport_fee: order.transport_fee,
        total_cost: order.total_cost,
        pickup_time: pickup.time.clone(),
        pickup_location: pickup.location.clone(),
    })
}

pub fn cancellation_notice(order: &OrderView) -> CancellationNotice {
    CancellationNotice {
        order_id: order.id,
        user_id: order.user_id,
    }
}

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoticeLine {
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub subtotal: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationNotice {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub lines: Vec<NoticeLine>,
    pub transport_fee: i64,
    pub total_cost: i64,
    pub pickup_time: String,
    pub pickup_location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationNotice {
    pub order_id: Uuid,
    pub user_id: Uuid,
}

/// A side effect queued for the notification collaborator after a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Confirmed(ConfirmationNotice),
    Cancelled(CancellationNotice),
}

impl Notification {
    pub fn order_id(&self) -> Uuid {
        match self {
            Notification::Confirmed(n) => n.order_id,
            Notification::Cancelled(n) => n.order_id,
        }
    }
}

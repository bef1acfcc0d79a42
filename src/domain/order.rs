use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::pricing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Building,
    AwaitingConfirmation,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    /// Statuses that count as the user's open draft.
    pub const ACTIVE: [OrderStatus; 2] = [OrderStatus::Building, OrderStatus::AwaitingConfirmation];

    /// Statuses the cancel-by-id operation accepts.
    pub const CANCELLABLE: [OrderStatus; 3] = [
        OrderStatus::Building,
        OrderStatus::AwaitingConfirmation,
        OrderStatus::Confirmed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Building => "BUILDING",
            OrderStatus::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_cancellable(&self) -> bool {
        Self::CANCELLABLE.contains(self)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUILDING" => Ok(OrderStatus::Building),
            "AWAITING_CONFIRMATION" => Ok(OrderStatus::AwaitingConfirmation),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// A catalog-validated line ready to be written into a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineInput {
    pub item_ref: String,
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineView {
    pub id: Uuid,
    pub item_ref: String,
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: i64,
}

impl OrderLineView {
    pub fn subtotal(&self) -> Option<i64> {
        pricing::line_subtotal(self.quantity, self.unit_price)
    }
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub transport_fee: i64,
    pub total_cost: i64,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineView>,
}

impl OrderView {
    pub fn subtotal(&self) -> Option<i64> {
        pricing::order_subtotal(self.lines.iter().map(|l| (l.quantity, l.unit_price)))
    }
}

/// Where and when confirmed orders are collected. Fixed by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupInfo {
    pub time: String,
    pub location: String,
}

/// Filters for listing a user's orders. `created_from` is inclusive and
/// `created_until` exclusive.
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_until: Option<DateTime<Utc>>,
    pub page: i64,
    pub limit: i64,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            status: None,
            created_from: None,
            created_until: None,
            page: 1,
            limit: 20,
        }
    }
}

impl OrderFilter {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit
    }
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<OrderView>,
    pub total: i64,
}

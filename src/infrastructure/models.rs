use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::{order_lines, orders};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub transport_fee: i64,
    pub total_cost: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub transport_fee: i64,
    pub total_cost: i64,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = order_lines)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderLineRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub line_no: i32,
    pub item_ref: String,
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_lines)]
pub struct NewOrderLineRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub line_no: i32,
    pub item_ref: String,
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: i64,
}

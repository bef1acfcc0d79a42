use chrono::{DateTime, Utc};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    ListResult, OrderFilter, OrderLineInput, OrderLineView, OrderStatus, OrderView,
};
use crate::domain::ports::OrderRepository;
use crate::schema::{order_lines, orders};

use super::models::{NewOrderLineRow, NewOrderRow, OrderLineRow, OrderRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            // orders_one_active_draft_idx
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DomainError::Conflict(info.message().to_string())
            }
            other => DomainError::Internal(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// ── Row helpers ───────────────────────────────────────────────────────────────

fn active_statuses() -> Vec<&'static str> {
    OrderStatus::ACTIVE.iter().map(OrderStatus::as_str).collect()
}

fn to_view(order: OrderRow, lines: Vec<OrderLineRow>) -> Result<OrderView, DomainError> {
    let status = order
        .status
        .parse::<OrderStatus>()
        .map_err(DomainError::Internal)?;
    Ok(OrderView {
        id: order.id,
        user_id: order.user_id,
        status,
        transport_fee: order.transport_fee,
        total_cost: order.total_cost,
        created_at: order.created_at,
        lines: lines
            .into_iter()
            .map(|l| OrderLineView {
                id: l.id,
                item_ref: l.item_ref,
                item_name: l.item_name,
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect(),
    })
}

fn load_lines(conn: &mut PgConnection, order_id: Uuid) -> Result<Vec<OrderLineRow>, DomainError> {
    Ok(order_lines::table
        .filter(order_lines::order_id.eq(order_id))
        .select(OrderLineRow::as_select())
        .order(order_lines::line_no.asc())
        .load(conn)?)
}

fn insert_draft(conn: &mut PgConnection, user_id: Uuid) -> Result<Uuid, DomainError> {
    let order_id = Uuid::new_v4();
    diesel::insert_into(orders::table)
        .values(&NewOrderRow {
            id: order_id,
            user_id,
            status: OrderStatus::Building.as_str().to_string(),
            transport_fee: 0,
            total_cost: 0,
        })
        .execute(conn)?;
    Ok(order_id)
}

fn add_line(
    conn: &mut PgConnection,
    order_id: Uuid,
    line_no: i32,
    line: &OrderLineInput,
) -> Result<Uuid, DomainError> {
    let line_id = Uuid::new_v4();
    diesel::insert_into(order_lines::table)
        .values(&NewOrderLineRow {
            id: line_id,
            order_id,
            line_no,
            item_ref: line.item_ref.clone(),
            item_name: line.item_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        })
        .execute(conn)?;
    Ok(line_id)
}

fn filtered(user_id: Uuid, filter: &OrderFilter) -> orders::BoxedQuery<'static, Pg> {
    let mut query = orders::table
        .filter(orders::user_id.eq(user_id))
        .into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(orders::status.eq(status.as_str()));
    }
    if let Some(from) = filter.created_from {
        query = query.filter(orders::created_at.ge(from));
    }
    if let Some(until) = filter.created_until {
        query = query.filter(orders::created_at.lt(until));
    }
    query
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl OrderRepository for DieselOrderRepository {
    fn find_active_draft(&self, user_id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let order = orders::table
            .filter(orders::user_id.eq(user_id))
            .filter(orders::status.eq_any(active_statuses()))
            .order(orders::created_at.desc())
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        let lines = load_lines(&mut conn, order.id)?;
        Ok(Some(to_view(order, lines)?))
    }

    fn create_draft(&self, user_id: Uuid, lines: Vec<OrderLineInput>) -> Result<Uuid, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::InvalidInput(
                "a draft needs at least one line".to_string(),
            ));
        }
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let open: i64 = orders::table
                .filter(orders::user_id.eq(user_id))
                .filter(orders::status.eq_any(active_statuses()))
                .count()
                .get_result(conn)?;
            if open > 0 {
                return Err(DomainError::Conflict(format!(
                    "user {} already has an active draft",
                    user_id
                )));
            }

            let order_id = insert_draft(conn, user_id)?;
            for (line_no, line) in (1..).zip(lines.iter()) {
                add_line(conn, order_id, line_no, line)?;
            }
            Ok(order_id)
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let order = orders::table
            .filter(orders::id.eq(id))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        let lines = load_lines(&mut conn, order.id)?;
        Ok(Some(to_view(order, lines)?))
    }

    fn count_confirmed_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        excluding: Uuid,
    ) -> Result<i64, DomainError> {
        let mut conn = self.pool.get()?;

        Ok(orders::table
            .filter(orders::user_id.eq(user_id))
            .filter(orders::status.eq(OrderStatus::Confirmed.as_str()))
            .filter(orders::created_at.ge(since))
            .filter(orders::id.ne(excluding))
            .count()
            .get_result(&mut conn)?)
    }

    fn finalize(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        transport_fee: i64,
        total_cost: i64,
    ) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let updated = diesel::update(
                orders::table
                    .filter(orders::id.eq(order_id))
                    .filter(orders::status.eq_any(active_statuses())),
            )
            .set((
                orders::status.eq(status.as_str()),
                orders::transport_fee.eq(transport_fee),
                orders::total_cost.eq(total_cost),
                orders::updated_at.eq(Utc::now()),
            ))
            .returning(OrderRow::as_returning())
            .get_result(conn)
            .optional()?;

            let Some(order) = updated else {
                return Err(DomainError::NotFound);
            };

            let lines = load_lines(conn, order.id)?;
            to_view(order, lines)
        })
    }

    fn cancel(&self, order_id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let current: Option<String> = orders::table
                .filter(orders::id.eq(order_id))
                .select(orders::status)
                .for_update()
                .first(conn)
                .optional()?;

            let Some(current) = current else {
                return Err(DomainError::NotFound);
            };
            let current = current
                .parse::<OrderStatus>()
                .map_err(DomainError::Internal)?;
            if !current.is_cancellable() {
                return Err(DomainError::NotCancellable(current.to_string()));
            }

            diesel::update(orders::table.filter(orders::id.eq(order_id)))
                .set((
                    orders::status.eq(OrderStatus::Cancelled.as_str()),
                    orders::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            Ok(())
        })
    }

    fn list(&self, user_id: Uuid, filter: &OrderFilter) -> Result<ListResult, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let total: i64 = filtered(user_id, filter).count().get_result(conn)?;

            let rows: Vec<OrderRow> = filtered(user_id, filter)
                .select(OrderRow::as_select())
                .order(orders::created_at.desc())
                .limit(filter.limit)
                .offset(filter.offset())
                .load(conn)?;

            let lines: Vec<OrderLineRow> = OrderLineRow::belonging_to(&rows)
                .select(OrderLineRow::as_select())
                .order(order_lines::line_no.asc())
                .load(conn)?;
            let grouped = lines.grouped_by(&rows);

            let items = rows
                .into_iter()
                .zip(grouped)
                .map(|(order, lines)| to_view(order, lines))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(ListResult { items, total })
        })
    }
}

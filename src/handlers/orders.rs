use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::order_service::ListQuery;
use crate::domain::order::{OrderStatus, OrderView, PickupInfo};
use crate::errors::AppError;
use crate::handlers::auth::AuthenticatedUser;
use crate::OrdersService;

// ── Response DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineResponse {
    pub id: Uuid,
    /// Catalog id of the item.
    pub item_ref: String,
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub subtotal: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub subtotal: i64,
    pub transport_fee: i64,
    pub total_cost: i64,
    pub created_at: String,
    pub pickup_time: String,
    pub pickup_location: String,
    pub lines: Vec<OrderLineResponse>,
}

impl OrderResponse {
    /// Fails when a subtotal overflows. Drafts refuse such lines at creation,
    /// so this only happens if stored rows were altered.
    fn new(order: OrderView, pickup: &PickupInfo) -> Result<Self, AppError> {
        let overflow = |id: Uuid| {
            log::error!("subtotal of order {} overflows", id);
            AppError::Internal(format!("subtotal of order {} overflows", id))
        };
        let subtotal = order.subtotal().ok_or_else(|| overflow(order.id))?;
        let order_id = order.id;
        let lines = order
            .lines
            .into_iter()
            .map(|l| -> Result<OrderLineResponse, AppError> {
                Ok(OrderLineResponse {
                    subtotal: l.subtotal().ok_or_else(|| overflow(order_id))?,
                    id: l.id,
                    item_ref: l.item_ref,
                    item_name: l.item_name,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status.to_string(),
            subtotal,
            transport_fee: order.transport_fee,
            total_cost: order.total_cost,
            created_at: order.created_at.to_rfc3339(),
            pickup_time: pickup.time.clone(),
            pickup_location: pickup.location.clone(),
            lines,
        })
    }
}

// ── Filtering and pagination ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrdersParams {
    /// One of BUILDING, AWAITING_CONFIRMATION, CONFIRMED, CANCELLED.
    pub status: Option<String>,
    /// Local creation day, `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Page number (1-based). Defaults to 1.
    pub page: Option<String>,
    /// Number of items per page. Defaults to 20, maximum 100.
    pub limit: Option<String>,
}

impl ListOrdersParams {
    fn into_query(self) -> Result<ListQuery, AppError> {
        let status = self
            .status
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<OrderStatus>())
            .transpose()
            .map_err(AppError::BadRequest)?;
        let date = self
            .date
            .filter(|d| !d.trim().is_empty())
            .map(|d| {
                NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
                    .map_err(|_| AppError::BadRequest(format!("invalid date '{}'", d)))
            })
            .transpose()?;
        Ok(ListQuery {
            status,
            date,
            page: self.page.and_then(|p| p.trim().parse().ok()),
            limit: self.limit.and_then(|l| l.trim().parse().ok()),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /orders
///
/// Lists the caller's orders, newest first, each with its lines.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("X-User-Id" = Uuid, Header, description = "Authenticated user id"),
        ListOrdersParams,
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 400, description = "Unknown status or malformed date"),
        (status = 401, description = "Missing or invalid user id"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    service: web::Data<OrdersService>,
    pickup: web::Data<PickupInfo>,
    user: AuthenticatedUser,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner().into_query()?;
    let (result, filter) = service.list_orders(user.0, &query).await?;

    let items = result
        .items
        .into_iter()
        .map(|o| OrderResponse::new(o, &pickup))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items,
        total: result.total,
        page: filter.page,
        limit: filter.limit,
    }))
}

/// GET /orders/{id}
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-User-Id" = Uuid, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 401, description = "Missing or invalid user id"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<OrdersService>,
    pickup: web::Data<PickupInfo>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order = service.get_order(user.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::new(order, &pickup)?))
}

/// DELETE /orders/{id}
///
/// Cancels one of the caller's orders. Allowed until the cutoff time on the
/// day the order was created.
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("X-User-Id" = Uuid, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 204, description = "Order cancelled"),
        (status = 400, description = "Order is already cancelled"),
        (status = 401, description = "Missing or invalid user id"),
        (status = 403, description = "Order of another user, or cutoff passed"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    service: web::Data<OrdersService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    service.cancel_order(user.0, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

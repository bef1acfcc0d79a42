pub mod auth;
pub mod chat;
pub mod orders;

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(chat::prompt, orders::list_orders, orders::get_order, orders::cancel_order),
    components(schemas(
        chat::PromptRequest,
        chat::PromptResponse,
        orders::OrderResponse,
        orders::OrderLineResponse,
        orders::ListOrdersResponse,
    )),
    tags(
        (name = "chat", description = "Conversational ordering"),
        (name = "orders", description = "Order history and cancellation"),
    )
)]
pub struct ApiDoc;

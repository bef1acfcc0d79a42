use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::auth::AuthenticatedUser;
use crate::ChatService;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PromptRequest {
    /// Free-text message typed by the customer.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PromptResponse {
    pub reply: String,
}

/// POST /chat/prompt
///
/// Runs one conversational turn for the caller. Business outcomes such as an
/// unavailable product or an off-topic message are normal `200` replies.
#[utoipa::path(
    post,
    path = "/chat/prompt",
    request_body = PromptRequest,
    params(
        ("X-User-Id" = Uuid, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Assistant reply", body = PromptResponse),
        (status = 400, description = "Empty message"),
        (status = 401, description = "Missing or invalid user id"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "chat"
)]
pub async fn prompt(
    service: web::Data<ChatService>,
    user: AuthenticatedUser,
    body: web::Json<PromptRequest>,
) -> Result<HttpResponse, AppError> {
    let message = body.into_inner().message;
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    let reply = service.handle_turn(user.0, message).await?;
    Ok(HttpResponse::Ok().json(PromptResponse { reply }))
}

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use uuid::Uuid;

use crate::errors::AppError;

/// Header carrying the caller's id, set by the gateway that authenticated them.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

impl AuthenticatedUser {
    fn from_request_head(req: &HttpRequest) -> Result<Self, AppError> {
        let value = req
            .headers()
            .get(USER_ID_HEADER)
            .ok_or(AppError::Unauthorized)?;
        let text = value.to_str().map_err(|_| AppError::Unauthorized)?;
        Uuid::parse_str(text.trim())
            .map(AuthenticatedUser)
            .map_err(|_| AppError::Unauthorized)
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_request_head(req))
    }
}

// apps/bookshop/src/web/extractors.rs

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Actor, User};
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// The caller, as vouched for by the upstream authentication layer through `X-User-ID`.
/// The id must belong to a known user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
  pub user: User,
}

impl AuthenticatedUser {
  pub fn actor(&self) -> Actor {
    Actor::from(&self.user)
  }

  pub fn require_staff(&self) -> Result<Actor, AppError> {
    let actor = self.actor();
    if actor.is_staff() {
      Ok(actor)
    } else {
      warn!(user_id = %actor.user_id, "Staff-only operation refused.");
      Err(AppError::Forbidden("This operation is reserved for staff.".to_string()))
    }
  }
}

fn header_user_id(req: &HttpRequest) -> Result<Uuid, AppError> {
  req
    .headers()
    .get(USER_ID_HEADER)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| Uuid::parse_str(v.trim()).ok())
    .ok_or_else(|| AppError::Auth("Missing or invalid X-User-ID header.".to_string()))
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let user_id = header_user_id(req);
    let state = req.app_data::<web::Data<AppState>>().cloned();
    Box::pin(async move {
      let user_id = user_id?;
      let state = state.ok_or_else(|| AppError::Internal("application state is not configured".to_string()))?;
      match state.store.find_user(user_id).await? {
        Some(user) => Ok(AuthenticatedUser { user }),
        None => {
          warn!(%user_id, "Request from an unknown user id.");
          Err(AppError::Auth("Unknown user.".to_string()))
        }
      }
    })
  }
}

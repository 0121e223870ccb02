// apps/bookshop/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CartLine, OrderStatus};
use crate::services::order_service;
use crate::state::AppState;
use crate::web::envelope::ApiResponse;
use crate::web::extractors::AuthenticatedUser;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Deserialize, Debug)]
pub struct CreateOrderRequest {
  pub items: Vec<CartLine>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCodeRequest {
  pub claim_code: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
  pub order_id: Uuid,
  pub status: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
  pub status: Option<String>,
  pub customer_id: Option<Uuid>,
  pub page: Option<u32>,
  pub page_size: Option<u32>,
}

fn parse_status(raw: &str) -> Result<OrderStatus, AppError> {
  raw.parse::<OrderStatus>().map_err(AppError::Validation)
}

fn idempotency_key(req: &HttpRequest) -> Option<String> {
  req
    .headers()
    .get(IDEMPOTENCY_KEY_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::to_string)
}

#[instrument(
  name = "handler::create_order",
  skip(app_state, req, auth_user, body),
  fields(user_id = %auth_user.user.id, lines = body.items.len())
)]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  auth_user: AuthenticatedUser,
  body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
  let placed = order_service::create_order(
    &app_state,
    auth_user.user.id,
    body.into_inner().items,
    idempotency_key(&req),
  )
  .await?;

  if placed.replayed {
    info!(order_id = %placed.order.id(), "Returning previously created order.");
    Ok(HttpResponse::Ok().json(ApiResponse::ok(placed, "Order already created for this request.")))
  } else {
    Ok(HttpResponse::Created().json(ApiResponse::ok(placed, "Order created successfully.")))
  }
}

#[instrument(name = "handler::complete_order_by_claim_code", skip(app_state, auth_user, body), fields(user_id = %auth_user.user.id))]
pub async fn complete_order_by_claim_code_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  body: web::Json<ClaimCodeRequest>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_staff()?;
  let order = order_service::process_order_by_claim_code(&app_state, &body.claim_code).await?;
  Ok(HttpResponse::Ok().json(ApiResponse::ok(order, "Order completed.")))
}

#[instrument(
  name = "handler::cancel_order",
  skip(app_state, auth_user, path),
  fields(user_id = %auth_user.user.id, order_id = %path.as_ref())
)]
pub async fn cancel_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = order_service::cancel_order(&app_state, &auth_user.actor(), path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(ApiResponse::ok(order, "Order cancelled.")))
}

#[instrument(name = "handler::update_order_status", skip(app_state, auth_user), fields(user_id = %auth_user.user.id))]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_staff()?;
  let status = parse_status(&body.status)?;
  let order = order_service::update_order_status(&app_state, body.order_id, status).await?;
  Ok(HttpResponse::Ok().json(ApiResponse::ok(order, "Order status updated.")))
}

#[instrument(name = "handler::get_all_orders", skip(app_state, auth_user), fields(user_id = %auth_user.user.id))]
pub async fn get_all_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  query: web::Query<OrderListQuery>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_staff()?;
  let query = query.into_inner();
  let status = query.status.as_deref().map(parse_status).transpose()?;
  let page = order_service::list_orders(&app_state, status, query.customer_id, query.page, query.page_size).await?;
  Ok(HttpResponse::Ok().json(ApiResponse::ok(page, "Orders fetched successfully.")))
}

#[instrument(
  name = "handler::get_order_by_id",
  skip(app_state, auth_user, path),
  fields(user_id = %auth_user.user.id, order_id = %path.as_ref())
)]
pub async fn get_order_by_id_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = order_service::get_order_for(&app_state, &auth_user.actor(), path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(ApiResponse::ok(order, "Order fetched successfully.")))
}

#[instrument(name = "handler::my_orders", skip(app_state, auth_user), fields(user_id = %auth_user.user.id))]
pub async fn my_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  query: web::Query<OrderListQuery>,
) -> Result<HttpResponse, AppError> {
  let query = query.into_inner();
  let page = order_service::my_orders(&app_state, &auth_user.actor(), query.page, query.page_size).await?;
  Ok(HttpResponse::Ok().json(ApiResponse::ok(page, "Orders fetched successfully.")))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_names_are_case_insensitive() {
    assert_eq!(parse_status("completed").unwrap(), OrderStatus::Completed);
    assert_eq!(parse_status("Canceled").unwrap(), OrderStatus::Cancelled);
    assert!(matches!(parse_status("shipped"), Err(AppError::Validation(_))));
  }
}

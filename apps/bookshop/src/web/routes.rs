// apps/bookshop/src/web/routes.rs

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::envelope::ApiResponse;
use crate::web::handlers::{book_handlers, order_handlers};

async fn health_check_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  app_state.store.ping().await?;
  Ok(HttpResponse::Ok().json(ApiResponse::ok(json!({ "status": "ok" }), "Service is healthy.")))
}

/// Malformed bodies, query strings and path segments answer with the envelope as a 400.
fn extractor_configs(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(web::JsonConfig::default().error_handler(|err, _req| AppError::Validation(err.to_string()).into()))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| AppError::Validation(err.to_string()).into()))
    .app_data(web::PathConfig::default().error_handler(|err, _req| AppError::Validation(err.to_string()).into()));
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  extractor_configs(cfg);
  cfg
    .route("/health", web::get().to(health_check_handler))
    .service(
      web::scope("/Orders")
        .route("/CreateOrder", web::post().to(order_handlers::create_order_handler))
        .route(
          "/CompleteOrderByClaimCode",
          web::post().to(order_handlers::complete_order_by_claim_code_handler),
        )
        .route("/CancelOrder/{orderId}", web::put().to(order_handlers::cancel_order_handler))
        .route("/UpdateOrderStatus", web::post().to(order_handlers::update_order_status_handler))
        .route("/GetAllOrders", web::get().to(order_handlers::get_all_orders_handler))
        .route("/GetOrderById/{orderId}", web::get().to(order_handlers::get_order_by_id_handler))
        .route("/MyOrders", web::get().to(order_handlers::my_orders_handler)),
    )
    .service(
      web::scope("/Books")
        .route("", web::get().to(book_handlers::list_books_handler))
        .route("", web::post().to(book_handlers::create_book_handler))
        .route("/{bookId}", web::get().to(book_handlers::get_book_handler))
        .route("/{bookId}", web::put().to(book_handlers::update_book_handler)),
    );
}

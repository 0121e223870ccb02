// apps/bookshop/src/web/handlers/book_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::BookInput;
use crate::services::catalog_service::{self, BookFilter};
use crate::state::AppState;
use crate::web::envelope::ApiResponse;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListBooksQuery {
  pub search: Option<String>,
  pub genre: Option<String>,
  pub author: Option<String>,
  pub on_sale: Option<bool>,
  pub sort: Option<String>,
  pub page: Option<u32>,
  pub page_size: Option<u32>,
}

impl From<ListBooksQuery> for BookFilter {
  fn from(q: ListBooksQuery) -> Self {
    BookFilter {
      search: q.search,
      genre: q.genre,
      author: q.author,
      on_sale: q.on_sale.unwrap_or(false),
      sort: q.sort,
      page: q.page,
      page_size: q.page_size,
    }
  }
}

#[instrument(name = "handler::list_books", skip(app_state))]
pub async fn list_books_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ListBooksQuery>,
) -> Result<HttpResponse, AppError> {
  let page = catalog_service::list_books(&app_state, query.into_inner().into()).await?;
  Ok(HttpResponse::Ok().json(ApiResponse::ok(page, "Books fetched successfully.")))
}

#[instrument(name = "handler::get_book", skip(app_state, path), fields(book_id = %path.as_ref()))]
pub async fn get_book_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let book = catalog_service::get_book(&app_state, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(ApiResponse::ok(book, "Book fetched successfully.")))
}

#[instrument(name = "handler::create_book", skip(app_state, auth_user, body), fields(user_id = %auth_user.user.id))]
pub async fn create_book_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  body: web::Json<BookInput>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_staff()?;
  let book = catalog_service::create_book(&app_state, body.into_inner()).await?;
  Ok(HttpResponse::Created().json(ApiResponse::ok(book, "Book created.")))
}

#[instrument(
  name = "handler::update_book",
  skip(app_state, auth_user, path, body),
  fields(user_id = %auth_user.user.id, book_id = %path.as_ref())
)]
pub async fn update_book_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
  body: web::Json<BookInput>,
) -> Result<HttpResponse, AppError> {
  auth_user.require_staff()?;
  let book = catalog_service::update_book(&app_state, path.into_inner(), body.into_inner()).await?;
  Ok(HttpResponse::Ok().json(ApiResponse::ok(book, "Book updated.")))
}

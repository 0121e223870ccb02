// apps/bookshop/src/services/catalog_service.rs

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::{BookQuery, BookSort, Page, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::errors::{AppError, OrderError, Result};
use crate::models::{BookInput, BookView};
use crate::state::AppState;

/// Catalog filters as they arrive from the query string.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
  pub search: Option<String>,
  pub genre: Option<String>,
  pub author: Option<String>,
  pub on_sale: bool,
  pub sort: Option<String>,
  pub page: Option<u32>,
  pub page_size: Option<u32>,
}

fn non_blank(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl BookFilter {
  fn into_query(self) -> Result<BookQuery> {
    let sort = match self.sort.as_deref() {
      Some(raw) => raw.parse::<BookSort>().map_err(AppError::Validation)?,
      None => BookSort::default(),
    };
    Ok(BookQuery {
      search: non_blank(self.search),
      genre: non_blank(self.genre),
      author: non_blank(self.author),
      on_sale_only: self.on_sale,
      sort,
      page: self.page.unwrap_or(1).max(1),
      page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
      now: Utc::now(),
    })
  }
}

#[instrument(name = "catalog_service::list_books", skip(state), err)]
pub async fn list_books(state: &AppState, filter: BookFilter) -> Result<Page<BookView>> {
  let query = filter.into_query()?;
  let now = query.now;
  let page = state.store.list_books(&query).await?;
  Ok(page.map(|book| BookView::at(book, now)))
}

#[instrument(name = "catalog_service::get_book", skip(state), err)]
pub async fn get_book(state: &AppState, book_id: Uuid) -> Result<BookView> {
  let book = state
    .store
    .find_book(book_id)
    .await?
    .ok_or(OrderError::BookNotFound(book_id))?;
  Ok(BookView::at(book, Utc::now()))
}

#[instrument(name = "catalog_service::create_book", skip(state, input), fields(title = %input.title), err)]
pub async fn create_book(state: &AppState, input: BookInput) -> Result<BookView> {
  let now = Utc::now();
  let book = input.into_new_book(now)?;
  state.store.insert_book(&book).await?;
  info!(book_id = %book.id, "Book added to the catalog.");
  Ok(BookView::at(book, now))
}

#[instrument(name = "catalog_service::update_book", skip(state, input), err)]
pub async fn update_book(state: &AppState, book_id: Uuid, input: BookInput) -> Result<BookView> {
  let now = Utc::now();
  let existing = state
    .store
    .find_book(book_id)
    .await?
    .ok_or(OrderError::BookNotFound(book_id))?;
  let changed = input.into_update_of(&existing, now)?;
  let updated = state
    .store
    .update_book(&changed)
    .await?
    .ok_or(OrderError::BookNotFound(book_id))?;
  info!(%book_id, "Book updated.");
  Ok(BookView::at(updated, now))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn filter_normalizes_paging_and_blanks() {
    let query = BookFilter {
      search: Some("  ".into()),
      genre: Some(" Fantasy ".into()),
      sort: Some("priceDesc".into()),
      page: Some(0),
      page_size: Some(1000),
      ..Default::default()
    }
    .into_query()
    .unwrap();
    assert_eq!(query.search, None);
    assert_eq!(query.genre.as_deref(), Some("Fantasy"));
    assert_eq!(query.sort, BookSort::PriceDesc);
    assert_eq!((query.page, query.page_size), (1, 100));
  }

  #[test]
  fn unknown_sort_is_a_validation_error() {
    let err = BookFilter {
      sort: Some("stars".into()),
      ..Default::default()
    }
    .into_query()
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
  }
}

// apps/bookshop/src/web/handlers/mod.rs

pub mod book_handlers;
pub mod order_handlers;

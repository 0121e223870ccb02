// apps/bookshop/src/models/mod.rs

//! Data structures representing stored entities and request payloads.

pub mod book;
pub mod cart;
pub mod order;
pub mod order_item;
pub mod user;

pub use book::{Book, BookInput, BookView};
pub use cart::{CartLine, PricedLine};
pub use order::{Order, OrderDetails, OrderStatus};
pub use order_item::OrderItem;
pub use user::{Actor, User, UserRole};

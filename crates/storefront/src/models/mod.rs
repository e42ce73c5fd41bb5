//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types in
//! [`crate::db`]. Serialized forms are camelCase and carry money as decimal
//! strings in major units.

pub mod cart;
pub mod coupon;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem, CartLine, CartTotals};
pub use coupon::Coupon;
pub use order::{Order, OrderLine};
pub use product::{NewProduct, Product};
pub use user::User;

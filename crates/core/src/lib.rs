//! Mercato Core - Shared domain types.
//!
//! This crate provides the types shared by every Mercato component:
//! - `storefront` - The JSON API server
//! - `client` - Typed API client used by front-ends and tests
//! - `cli` - Command-line tools for migrations and catalog management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, money amounts, percentages and roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

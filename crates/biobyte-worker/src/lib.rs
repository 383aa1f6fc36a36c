//! BioByte storefront backend: accounts, price-based resource access, checkout
//! with PayPal / WeChat Pay, the admin portal and the mindmap content API.
//!
//! Everything outside `worker_wasm` is plain Rust over SeaORM and builds on any
//! target; the Cloudflare Worker entrypoint only exists on wasm32.

pub mod access;
pub mod chat;
pub mod config;
pub mod content;
pub mod crypto;
pub mod error;
pub mod jwt;
pub mod libsql;
pub mod mail;
pub mod mindmap;
pub mod paypal;
pub mod rate_limit;
pub mod services;
pub mod session;
pub mod util;
pub mod wechat;

#[cfg(target_arch = "wasm32")]
mod worker_wasm;

#[cfg(target_arch = "wasm32")]
pub use worker_wasm::*;

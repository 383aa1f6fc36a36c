pub mod accounts;
pub mod admin;
pub mod admin_auth;
pub mod chat;
pub mod content;
pub mod migrations;
pub mod orders;
pub mod payments;

//! Route handlers for the HTTP API.

pub mod events;
pub mod health;
pub mod index;
pub mod logs;
pub mod stream;

//! HTTP surface: `/run` turns a task into tool calls, `/read` returns files
//! under the data directory.

pub mod api;
pub mod error;
pub mod handlers;
pub mod sandbox;
pub mod server;

pub use server::{build_router, AppState};

//! HTTP front end for the shortener: create, redirect and health routes.

pub mod app;
pub mod error;
pub mod handlers;
pub mod model;
pub mod server;
pub mod state;

pub use app::App;
pub use error::AppError;
pub use server::serve;
pub use state::AppState;

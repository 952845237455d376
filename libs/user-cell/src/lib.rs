pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::UserError;
pub use router::user_routes;

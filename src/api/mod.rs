pub mod routes;

pub use routes::{api_router, public_router, AppState};

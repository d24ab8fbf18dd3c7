// HTTP layer
//
// *Le Serveur* (The Server) - axum REST API over the search engine and its analytics

pub mod error;
pub mod handlers;
#[allow(clippy::module_inception)]
pub mod server;

pub use error::{ApiError, ApiResult};
pub use handlers::{build_app, create_router, AppState, PopularParams, SearchParams};
pub use server::{wait_for_shutdown, TchallerServer};

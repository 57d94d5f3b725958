//! HTTP boundary for the data engine.
//!
//! The engine itself never depends on this module; the routes only parse
//! query/path inputs, relay them to [`crate::tile::DataService`], and map
//! the engine's error classes to status codes.
//!
//! # Endpoints
//!
//! - `GET /metadata?type=specimens` - full specimen listing, verbatim
//! - `GET /metadata?type=regions&specimen={id}` - region hierarchy document
//! - `GET /data/{data_id}` - resolve a composite identifier to bytes
//! - `GET /health` - health check

mod handlers;
mod routes;

pub use handlers::{
    data_handler, health_handler, metadata_handler, AppState, ErrorResponse, HealthResponse,
    MetadataQueryParams,
};
pub use routes::{create_router, RouterConfig};

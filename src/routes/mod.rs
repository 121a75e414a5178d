//! Router assembly: ambient routes plus the dispatched entity routes.

mod common;
mod entity;
pub use common::common_routes;
pub use entity::{service_routers, service_routes, ServiceRouter};

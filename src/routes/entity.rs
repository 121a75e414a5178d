//! Entity routes. Route names are single path segments (`/createPatient`, `/getPatientsByStaffMember`),
//! so one parameterized path per method hands the name to the dispatcher.

use crate::handlers::{dispatch_get, dispatch_post};
use crate::routes::common_routes;
use crate::state::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

const BODY_LIMIT: usize = 1024 * 1024;

/// A router ready to be served on one port.
pub struct ServiceRouter {
    pub name: String,
    pub port: u16,
    pub router: Router,
}

/// Every route of the state's model, plus health/ready/version.
pub fn service_routes(state: AppState) -> Router {
    Router::new()
        .merge(common_routes())
        .route("/:route", get(dispatch_get).post(dispatch_post))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// One router per service on its own port, or a single router for everything when `single_port` is set.
pub fn service_routers(state: AppState, single_port: Option<u16>) -> Vec<ServiceRouter> {
    if let Some(port) = single_port {
        return vec![ServiceRouter {
            name: "all".into(),
            port,
            router: service_routes(state),
        }];
    }
    state
        .model
        .services
        .iter()
        .map(|service| {
            let scoped = AppState {
                model: Arc::new(state.model.for_service(service)),
                ..state.clone()
            };
            ServiceRouter {
                name: service.name.clone(),
                port: service.port,
                router: service_routes(scoped),
            }
        })
        .collect()
}

//! `GET /`: list the routes the server exposes

use axum::Json;
use serde::Serialize;

/// One entry of the route listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    /// Handler name
    pub name: &'static str,
    /// Accepted methods, sorted
    pub methods: Vec<&'static str>,
    /// Path
    pub url: &'static str,
}

/// Response body of the listing
#[derive(Debug, Serialize)]
pub struct RouteList {
    /// Every registered route, in registration order
    pub routes: Vec<RouteInfo>,
}

/// Registered routes as (name, methods, path)
///
/// `get` routes also answer `HEAD`. Must match what `build_router` mounts.
pub const ROUTES: &[(&str, &[&str], &str)] = &[
    ("list_routes", &["GET", "HEAD"], "/"),
    ("postreceive", &["POST"], "/postreceive"),
    ("health", &["GET", "HEAD"], "/health"),
];

/// The route table with methods sorted
pub fn route_table() -> Vec<RouteInfo> {
    ROUTES
        .iter()
        .map(|(name, methods, url)| {
            let mut methods = methods.to_vec();
            methods.sort_unstable();
            RouteInfo { name, methods, url }
        })
        .collect()
}

/// `GET /` handler
pub async fn list_routes() -> Json<RouteList> {
    Json(RouteList {
        routes: route_table(),
    })
}

//! HTTP handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::version::BuildInfo;
use crate::{Catalog, CatalogRead, Result};

/// Error body returned to the storefront on any upstream failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub version: String,
    pub build: BuildInfo,
}

/// GET /api/products
pub async fn products(State(catalog): State<Catalog>) -> Response {
    respond("products", catalog.get_catalog().await)
}

/// GET /api/ingredients
pub async fn ingredients(State(catalog): State<Catalog>) -> Response {
    respond("ingredients", catalog.ingredients().await)
}

/// GET /api/services
pub async fn services(State(catalog): State<Catalog>) -> Response {
    respond("services", catalog.services().await)
}

/// GET /healthz
pub async fn health() -> Json<HealthBody> {
    let build = BuildInfo::current();
    Json(HealthBody {
        status: "ok",
        version: build.to_string(),
        build,
    })
}

fn respond(view: &'static str, result: Result<CatalogRead>) -> Response {
    match result {
        Ok(read) => Json(read).into_response(),
        Err(e) => {
            error!(view, error = %e, "catalog read failed");
            let message = match view {
                "services" => "Unable to fetch services",
                _ => "Unable to fetch products",
            };
            (StatusCode::BAD_GATEWAY, Json(ErrorBody { error: message })).into_response()
        }
    }
}

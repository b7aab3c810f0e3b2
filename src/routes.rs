use crate::common::state::AppState;
use crate::config::Config;
use crate::submissions;
use crate::submissions::views::{SUBMISSION_HEADER, WARNINGS_HEADER};
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::{Router, extract::DefaultBodyLimit};
use sea_orm::DatabaseConnection;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = match HeaderValue::from_str(&config.cors_origin) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(
                "Invalid CORS_ORIGIN '{}', cross-origin requests will be refused",
                config.cors_origin
            );
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static(WARNINGS_HEADER),
            HeaderName::from_static(SUBMISSION_HEADER),
        ])
}

pub fn build_router(db: Option<DatabaseConnection>, config: &Config) -> Router {
    #[derive(OpenApi)]
    #[openapi(info(
        title = "Line Protection Calculation Sheet API",
        description = "Fills the line protection calculation sheet template from relay study CSV exports"
    ))]
    struct ApiDoc;

    let app_state: AppState = AppState::new(db, config.clone());

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(crate::common::views::router(&app_state))
        .merge(submissions::views::router(&app_state))
        .split_for_parts();

    router
        .merge(Scalar::with_url("/api/docs", api))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(config))
}

use crate::{
    auth::{
        gateway::{self, AuthGateway},
        otp::{ConsoleNotifier, OtpEngine, PgChallengeStore},
        principal::{PgPrincipalStore, PrincipalStore},
        session::{PgSessionLedger, SessionLedger},
        sweep,
        token::TokenEngine,
    },
    cli::globals::GlobalArgs,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware,
    routing::{get, post},
    Extension,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use url::Url;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

pub(crate) mod handlers;
mod openapi;

pub use handlers::ApiState;
pub use openapi::openapi;

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let principals: Arc<dyn PrincipalStore> = Arc::new(PgPrincipalStore::new(pool.clone()));
    let challenges = Arc::new(PgChallengeStore::new(pool.clone()));
    let sessions = Arc::new(PgSessionLedger::new(pool.clone()));

    let otp = OtpEngine::new(
        challenges.clone(),
        Arc::new(ConsoleNotifier),
        globals.otp_config(),
    );
    let tokens = Arc::new(TokenEngine::new(globals.secret_store()).with_ledger(sessions.clone()));
    let auth_gateway = Arc::new(AuthGateway::new(tokens.clone(), principals.clone()));
    let state = Arc::new(ApiState::new(otp, tokens, principals));

    sweep::spawn(
        challenges,
        Some(sessions as Arc<dyn SessionLedger>),
        sweep::DEFAULT_SWEEP_INTERVAL_SECONDS,
    );

    let frontend_origin = frontend_origin(&globals.frontend_url)?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let app = axum::Router::new()
        .route(
            "/health",
            get(handlers::health::health).options(handlers::health::health),
        )
        .route("/v1/auth/otp/request", post(handlers::otp::request_otp))
        .route("/v1/auth/otp/verify", post(handlers::otp::verify_otp))
        .route("/v1/auth/token/refresh", post(handlers::token::refresh))
        .route("/v1/auth/logout", post(handlers::token::logout))
        .route(
            "/v1/me",
            get(handlers::me::me).route_layer(middleware::from_fn(gateway::require_user)),
        )
        .route(
            "/v1/admin/me",
            get(handlers::me::admin_me).route_layer(middleware::from_fn(gateway::require_admin)),
        )
        .route(
            "/v1/status",
            get(handlers::me::status).route_layer(middleware::from_fn(gateway::maybe_user)),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Uuid::new_v4().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state))
                .layer(Extension(auth_gateway))
                .layer(Extension(pool)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

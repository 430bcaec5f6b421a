/*
 * Responsibility
 * - Config -> services -> Router
 * - Tracing + panic hook
 * - axum::serve()
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::services::auth::AuthError;
use crate::services::auth::factory::{build_codec, build_refresh_store, build_token_service};
use crate::services::authz::policies::{AUTHENTICATED, AnyAuthenticated, EmptySet, OWNS_ALL, OwnsAll};
use crate::services::authz::{
    AuthzEngine, OwnershipOracle, PgOwnershipOracle, PolicyRegistry, PolicyRegistryBuilder,
};
use crate::state::{ApiSettings, AppState};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,webskeleton=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: crash the whole process so it gets noticed.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config)?;

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// The policies every endpoint may name. Registration happens here, once, before serving.
pub fn build_registry(oracle: Arc<dyn OwnershipOracle>) -> Result<PolicyRegistry, AuthError> {
    Ok(PolicyRegistryBuilder::new()
        .register(OWNS_ALL, OwnsAll::new(oracle, EmptySet::Deny))?
        .register(AUTHENTICATED, AnyAuthenticated)?
        .freeze())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let codec = build_codec(config);
    let store = build_refresh_store(config)
        .await
        .context("refresh store unavailable")?;
    let tokens = build_token_service(config, codec, store);

    // Lazy: the pool connects on the first ownership query, not at startup.
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .context("invalid DATABASE_URL")?;
    let oracle = PgOwnershipOracle::new(pool, &config.ownership_function)?;
    let registry = build_registry(Arc::new(oracle))?;
    tracing::info!(?registry, "policies registered");

    let api = ApiSettings {
        allow_direct_issue: config.allow_direct_issue,
        refresh_token_cookie: config.refresh_token_cookie.clone(),
    };

    Ok(AppState::new(tokens, Arc::new(AuthzEngine::new(registry)), api))
}

fn build_router(state: AppState, config: &Config) -> Result<Router> {
    let v1 = api::v1::routes(state.clone())?;

    let router = Router::new().nest("/api/v1", v1).with_state(state);
    let router = middleware::cors::apply(router, config);

    Ok(middleware::http::apply(router, config))
}

//! Binary entry point: loads configuration, wires every crate into an
//! `AppState`, and serves the router built in `routes::build_router`.

use chrono::Duration as ChronoDuration;
use jobgrid_auth::{RbacPolicy, Role, TokenService, default_skip_paths};
use jobgrid_audit::TracingAuditSink;
use jobgrid_edge::{EdgeServices, EndpointRateLimiter, RateLimitConfig, run_rate_limit_janitor};
use jobgrid_scheduler::{BuiltinScheduler, DependencyManager, ExternalAdapter, ExternalAdapterConfig, SchedulerManager};
use jobgrid_server::audit_sink::{CombinedSink, QueryableAuditSink};
use jobgrid_server::config::ServerConfig;
use jobgrid_server::datasource_repo::InMemoryDatasourceRepo;
use jobgrid_server::routes::build_router;
use jobgrid_server::state::AppState;
use jobgrid_server::user_repo::InMemoryUserRepo;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("loaded configuration");

    let token_service = Arc::new(
        TokenService::new(config.jwt.secret.clone(), config.jwt.issuer.clone())
            .with_access_ttl(ChronoDuration::from_std(config.jwt.access_ttl()).expect("valid access ttl"))
            .with_refresh_ttl(ChronoDuration::from_std(config.jwt.refresh_ttl()).expect("valid refresh ttl")),
    );

    let edge = Arc::new(EdgeServices {
        token_service,
        rbac: Arc::new(RbacPolicy::new()),
        skip_paths: Arc::new(default_skip_paths()),
    });

    let rate_limiter = Arc::new(build_rate_limiter(&config.rate_limit));
    if config.rate_limit.enabled {
        tokio::spawn(run_rate_limit_janitor(
            rate_limiter.clone(),
            config.rate_limit.cleanup_period(),
        ));
    }

    let scheduler = Arc::new(SchedulerManager::new(None));
    let dependencies = Arc::new(DependencyManager::default());
    scheduler
        .register_adapter("builtin", Arc::new(BuiltinScheduler::new(dependencies)))
        .await;
    if let Some(endpoint) = config.scheduler.endpoint.clone() {
        let external = ExternalAdapter::new(ExternalAdapterConfig {
            base_url: endpoint,
            bearer_token: config
                .scheduler
                .properties
                .get("bearer_token")
                .cloned()
                .unwrap_or_default(),
            timezone: config
                .scheduler
                .properties
                .get("timezone")
                .cloned()
                .unwrap_or_else(|| "UTC".to_string()),
            request_timeout: StdDuration::from_secs(30),
        });
        scheduler.register_adapter("external", Arc::new(external)).await;
    }
    scheduler
        .initialize(&config.scheduler.r#type)
        .await
        .expect("failed to initialize scheduler adapter");

    let users = Arc::new(
        InMemoryUserRepo::new().with_user("admin", "changeme", Role::Admin),
    );
    let datasources = Arc::new(InMemoryDatasourceRepo::new());

    let audit_query = QueryableAuditSink::new();
    let audit: Arc<dyn jobgrid_audit::AuditSink> =
        Arc::new(CombinedSink::new(TracingAuditSink, audit_query.clone()));

    let state = AppState {
        scheduler,
        edge,
        rate_limiter,
        audit,
        audit_query,
        users,
        datasources,
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .expect("server error");
}

fn config_with_burst(requests_per_window: u32, window: StdDuration, burst_size: u32) -> RateLimitConfig {
    RateLimitConfig {
        burst_size,
        ..RateLimitConfig::per_window(requests_per_window, window)
    }
}

/// Builds the endpoint rate limiter from `[rate_limit]` settings.
/// `endpoint_overrides` keys are `"METHOD path_pattern"` (e.g.
/// `"POST /api/v1/tasks/*/retry"`); a key with no recognizable method
/// prefix is skipped rather than silently applied to every verb.
fn build_rate_limiter(settings: &jobgrid_server::config::RateLimitSettings) -> EndpointRateLimiter {
    if !settings.enabled {
        return EndpointRateLimiter::disabled();
    }
    let default_config =
        config_with_burst(settings.requests_per_ip, settings.window(), settings.burst_size);
    let mut limiter = EndpointRateLimiter::token_bucket(default_config);
    for (key, requests) in &settings.endpoint_overrides {
        let Some((method, pattern)) = key.split_once(' ') else {
            tracing::warn!(key = %key, "skipping malformed rate limit override, expected 'METHOD pattern'");
            continue;
        };
        let config = config_with_burst(*requests, settings.window(), settings.burst_size);
        limiter = limiter.with_override(pattern.to_string(), method.to_string(), config);
    }
    limiter
}

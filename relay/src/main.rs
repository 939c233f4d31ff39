//! Bouncebot - Mailgun webhook relay server.
//!
//! Startup loads the managed domains and configured mailing lists, reports
//! webhook and route status for operators, then serves the webhooks.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bouncebot::registry::check_routes;
use bouncebot::{
    web, AppState, Config, DomainRegistry, ListRegistry, MailProvider, Mailgun, NoticeDefaults,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("bouncebot_starting");

    // Load configuration
    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        host = %config.host,
        api_base = %config.mailgun_api_base,
        mailing_lists = config.mailing_lists.len(),
        cc_configured = config.bounce_cc.is_some(),
        bcc_configured = config.bounce_bcc.is_some(),
        help_email_configured = config.help_email.is_some(),
        "config_loaded"
    );

    let api_key = config
        .mailgun_api_key
        .clone()
        .context("MAILGUN_API_KEY is not set")?;
    let mailgun =
        Mailgun::new(&config.mailgun_api_base, api_key).context("Failed to create Mailgun client")?;
    let provider: Arc<dyn MailProvider> = Arc::new(mailgun);

    // Registries are loaded once; a restart picks up changes
    let domains = DomainRegistry::load(provider.as_ref(), &config.webhook_url("/bounce"))
        .await
        .context("Failed to load domains")?;

    let lists = ListRegistry::load(config.mailing_lists.clone());
    let routes = check_routes(provider.as_ref(), &config.webhook_url("/mailinglist")).await;
    info!(
        managed_domains = domains.len(),
        mailing_lists = lists.len(),
        notifying_routes = routes.len(),
        "registries_ready"
    );

    let state = AppState::new(
        provider,
        domains,
        lists,
        NoticeDefaults::from_config(&config),
    );
    let app = web::router(state, config.max_body_bytes);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "bouncebot_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("bouncebot_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("bouncebot_shutting_down");
}

//! HTTP server for the checkout fulfillment backend.
//!
//! Exposes checkout session creation and stock lookup for the storefront,
//! the payment provider webhook, and the scheduled reconciliation trigger,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use connectors::{
    ConnectorError, MicroCmsCatalog, MicroCmsConfig, SheetsConfig, SheetsLedger, SlackNotifier,
    StripeClient, StripeConfig,
};
use fulfillment::{
    CheckoutService, CheckoutSettings, FulfillmentWorkflow, ReconciliationJob,
    ReconciliationSettings, Services, WorkflowSettings,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub workflow: Arc<FulfillmentWorkflow>,
    pub checkout: CheckoutService,
    pub reconciliation: ReconciliationJob,
}

impl AppState {
    /// Wires every handler to the same collaborators.
    pub fn new(
        services: Services,
        workflow: WorkflowSettings,
        checkout: CheckoutSettings,
        reconciliation: ReconciliationSettings,
    ) -> Self {
        Self {
            workflow: Arc::new(FulfillmentWorkflow::new(services.clone(), workflow)),
            checkout: CheckoutService::new(services.clone(), checkout),
            reconciliation: ReconciliationJob::new(services, reconciliation),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/api/webhook", post(routes::webhook::receive))
        .route(
            "/api/create-checkout-session",
            post(routes::checkout::create),
        )
        .route("/api/check-stock", post(routes::stock::check))
        .route(
            "/api/check-orders",
            get(routes::reconciliation::check_orders),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the HTTP collaborators described by `config`.
pub fn build_services(config: &Config) -> Result<Services, ConnectorError> {
    let timeout = config.http_timeout;

    let payments = StripeClient::new(StripeConfig {
        api_base: config.stripe_api_base.clone(),
        secret_key: config.stripe_secret_key.clone(),
        timeout,
    })?;

    let catalog_config = match &config.microcms_api_base {
        Some(api_base) => MicroCmsConfig {
            api_base: api_base.clone(),
            api_key: config.microcms_api_key.clone(),
            timeout,
        },
        None => MicroCmsConfig::for_service(
            &config.microcms_service_domain,
            config.microcms_api_key.clone(),
            timeout,
        ),
    };
    let catalog = MicroCmsCatalog::new(catalog_config)?;

    let ledger = SheetsLedger::new(SheetsConfig {
        api_base: config.sheets_api_base.clone(),
        spreadsheet_id: config.spreadsheet_id.clone(),
        access_token: config.sheets_access_token.clone(),
        range: config.ledger_range.clone(),
        schema: config.ledger_schema,
        timeout,
    })?;

    let notifier = SlackNotifier::new(config.slack_webhook_url.clone(), timeout)?;
    if !notifier.is_enabled() {
        tracing::warn!("SLACK_WEBHOOK_URL not set; notifications are disabled");
    }

    Ok(Services {
        catalog: Arc::new(catalog),
        ledger: Arc::new(ledger),
        payments: Arc::new(payments),
        notifier: Arc::new(notifier),
    })
}

/// Creates the application state for `config` over `services`.
pub fn create_state(services: Services, config: &Config) -> Arc<AppState> {
    Arc::new(AppState::new(
        services,
        config.workflow_settings(),
        config.checkout_settings(),
        config.reconciliation_settings(),
    ))
}

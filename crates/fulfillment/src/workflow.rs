//! Fulfillment workflow for completed checkout sessions.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use common::{OrderId, ProductId, SessionId};
use domain::{OrderRecord, PaymentEvent, Session, messages};

use crate::error::{FulfillmentError, LedgerError, Result};
use crate::locks::KeyedLocks;
use crate::services::{AppendOutcome, Services, StockChange};
use crate::signature::SignatureVerifier;
use crate::state::FulfillmentState;

/// Settings the workflow needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub verifier: SignatureVerifier,
    /// Offset the ledger timestamps are written in.
    pub ledger_offset: FixedOffset,
    /// Provider dashboard root used to link each payment.
    pub dashboard_url: String,
}

/// Result of one stock decrement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub outcome: std::result::Result<StockChange, String>,
}

/// Summary of a run that fulfilled an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentReport {
    pub order_id: OrderId,
    pub adjustments: Vec<StockAdjustment>,
    /// True if every stock adjustment succeeded.
    pub inventory_updated: bool,
    /// True if the ledger holds the order after the run.
    pub recorded: bool,
    /// States visited, in order.
    pub states: Vec<FulfillmentState>,
}

/// How a verified webhook was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// The event type needs no fulfillment.
    Ignored { event_type: String },
    /// The order was fulfilled by an earlier delivery.
    AlreadyRecorded { order_id: OrderId },
    /// The order was fulfilled by this delivery.
    Fulfilled(FulfillmentReport),
}

impl FulfillmentOutcome {
    fn label(&self) -> &'static str {
        match self {
            FulfillmentOutcome::Ignored { .. } => "ignored",
            FulfillmentOutcome::AlreadyRecorded { .. } => "duplicate",
            FulfillmentOutcome::Fulfilled(_) => "fulfilled",
        }
    }
}

/// Tracks the state of a single run and rejects out-of-order steps.
#[derive(Debug)]
struct FulfillmentRun {
    history: Vec<FulfillmentState>,
}

impl FulfillmentRun {
    fn new() -> Self {
        Self {
            history: vec![FulfillmentState::Received],
        }
    }

    fn state(&self) -> FulfillmentState {
        self.history.last().copied().unwrap_or_default()
    }

    fn advance(&mut self, to: FulfillmentState) -> Result<()> {
        let from = self.state();
        if !from.can_transition_to(to) {
            return Err(FulfillmentError::InvalidTransition { from, to });
        }
        tracing::debug!(%from, %to, "fulfillment state changed");
        self.history.push(to);
        Ok(())
    }
}

/// Runs the fulfillment sequence for provider webhooks.
///
/// One instance is shared by every request. Runs for the same order id are
/// serialised; runs for different orders proceed concurrently.
pub struct FulfillmentWorkflow {
    services: Services,
    settings: WorkflowSettings,
    order_locks: KeyedLocks,
}

impl FulfillmentWorkflow {
    /// Creates a workflow over the given collaborators.
    pub fn new(services: Services, settings: WorkflowSettings) -> Self {
        Self {
            services,
            settings,
            order_locks: KeyedLocks::new(),
        }
    }

    /// Handles one webhook delivery with the current time.
    pub async fn handle(&self, payload: &[u8], signature: Option<&str>) -> Result<FulfillmentOutcome> {
        self.handle_at(payload, signature, Utc::now()).await
    }

    /// Handles one delivery on its own task.
    ///
    /// The run completes even if the caller stops waiting for it.
    pub async fn handle_detached(
        self: Arc<Self>,
        payload: Vec<u8>,
        signature: Option<String>,
    ) -> Result<FulfillmentOutcome> {
        self.handle_detached_at(payload, signature, Utc::now()).await
    }

    /// [`handle_detached`](Self::handle_detached) with an explicit `now`.
    pub async fn handle_detached_at(
        self: Arc<Self>,
        payload: Vec<u8>,
        signature: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentOutcome> {
        let task = tokio::spawn(async move {
            self.handle_at(&payload, signature.as_deref(), now).await
        });
        task.await
            .map_err(|e| FulfillmentError::Interrupted(e.to_string()))?
    }

    /// Handles one webhook delivery, checking the signature age against `now`.
    ///
    /// `Err` values for which [`FulfillmentError::is_rejection`] holds were
    /// refused before any collaborator was called. Other errors happened
    /// before the order was touched and are safe to redeliver.
    #[tracing::instrument(skip(self, payload, signature), fields(bytes = payload.len()))]
    pub async fn handle_at(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentOutcome> {
        let started = std::time::Instant::now();
        let result = self.run(payload, signature, now).await;

        let outcome = match &result {
            Ok(outcome) => outcome.label(),
            Err(e) if e.is_rejection() => "rejected",
            Err(_) => "failed",
        };
        metrics::counter!("fulfillment_runs_total", "outcome" => outcome).increment(1);
        metrics::histogram!("fulfillment_duration_seconds").record(started.elapsed().as_secs_f64());

        result
    }

    async fn run(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentOutcome> {
        let mut run = FulfillmentRun::new();

        // 1. Authenticate and decode
        let event = match self.verify(payload, signature, now) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "webhook rejected");
                run.advance(FulfillmentState::Failed)?;
                return Err(e);
            }
        };
        run.advance(FulfillmentState::Verified)?;

        if !event.is_checkout_completed() {
            tracing::info!(event_type = %event.event_type, "ignoring event");
            run.advance(FulfillmentState::Done)?;
            return Ok(FulfillmentOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        // 2. Re-fetch the authoritative session
        let session_id = event.session_id();
        let (session, mut record) = match self.extract(&session_id).await {
            Ok(extracted) => extracted,
            Err(e) => return Err(self.abort(&mut run, &session_id, e).await),
        };
        run.advance(FulfillmentState::ItemsExtracted)?;

        let order_id = record.order_id.clone();
        let _guard = self.order_locks.lock(order_id.as_str()).await;

        // 3. Skip orders an earlier delivery already fulfilled
        match self.services.ledger.find_by_order_id(&order_id).await {
            Ok(Some(_)) => {
                return self.finish_duplicate(&mut run, order_id);
            }
            Err(LedgerError::Malformed(e)) => {
                tracing::warn!(%order_id, error = %e, "existing ledger row is malformed");
                return self.finish_duplicate(&mut run, order_id);
            }
            Ok(None) => {}
            Err(source) => {
                let error = FulfillmentError::LedgerLookup {
                    order_id: order_id.clone(),
                    source,
                };
                return Err(self.abort(&mut run, &session_id, error).await);
            }
        }

        // 4. Adjust stock, best-effort per item
        let adjustments = self.adjust_stock(&session).await;
        let inventory_updated = adjustments.iter().all(|a| a.outcome.is_ok());
        record.inventory_updated = inventory_updated;
        run.advance(FulfillmentState::StockAdjusted)?;

        // 5. Record the order
        let recorded = self.record(&record).await;
        run.advance(FulfillmentState::Recorded)?;

        // 6. Announce the order
        self.services
            .notifier
            .notify(&messages::order_summary(&record, &session.currency))
            .await;
        run.advance(FulfillmentState::Notified)?;
        run.advance(FulfillmentState::Done)?;

        tracing::info!(%order_id, inventory_updated, recorded, "order fulfilled");
        Ok(FulfillmentOutcome::Fulfilled(FulfillmentReport {
            order_id,
            adjustments,
            inventory_updated,
            recorded,
            states: run.history,
        }))
    }

    fn verify(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PaymentEvent> {
        self.settings.verifier.verify(payload, signature, now)?;
        Ok(serde_json::from_slice(payload)?)
    }

    async fn extract(&self, session_id: &SessionId) -> Result<(Session, OrderRecord)> {
        let session = self
            .services
            .payments
            .retrieve_session(session_id)
            .await
            .map_err(|source| FulfillmentError::SessionFetch {
                session_id: session_id.clone(),
                source,
            })?;

        for item in session.line_items.iter().filter(|i| i.stock_target().is_none()) {
            tracing::warn!(
                %session_id,
                item = %item.name,
                quantity = item.quantity,
                "line item has no catalog product; stock left unchanged"
            );
        }

        let record = OrderRecord::for_session(
            &session,
            true,
            self.settings.ledger_offset,
            &self.settings.dashboard_url,
        )?;
        Ok((session, record))
    }

    async fn adjust_stock(&self, session: &Session) -> Vec<StockAdjustment> {
        let mut adjustments = Vec::new();
        for item in &session.line_items {
            let Some(product_id) = item.stock_target() else {
                continue;
            };

            let outcome = match self
                .services
                .catalog
                .decrement_stock(product_id, item.quantity)
                .await
            {
                Ok(change) => {
                    tracing::info!(
                        %product_id,
                        previous = change.previous,
                        current = change.current,
                        "stock decremented"
                    );
                    Ok(change)
                }
                Err(e) => {
                    tracing::error!(%product_id, error = %e, "stock update failed");
                    metrics::counter!("fulfillment_stock_failures_total").increment(1);
                    self.services
                        .notifier
                        .notify_error(
                            &format!("stock update failed: {} ({})", item.name, product_id),
                            &e.to_string(),
                        )
                        .await;
                    Err(e.to_string())
                }
            };

            adjustments.push(StockAdjustment {
                product_id: product_id.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                outcome,
            });
        }
        adjustments
    }

    async fn record(&self, record: &OrderRecord) -> bool {
        match self.services.ledger.append_once(record).await {
            Ok(AppendOutcome::Appended) => true,
            Ok(AppendOutcome::AlreadyRecorded) => {
                tracing::warn!(order_id = %record.order_id, "order appeared in ledger during run");
                true
            }
            Err(e) => {
                tracing::error!(order_id = %record.order_id, error = %e, "ledger write failed");
                metrics::counter!("fulfillment_ledger_failures_total").increment(1);
                self.services
                    .notifier
                    .notify_error(
                        &format!("ledger write failed for order {}", record.order_id),
                        &e.to_string(),
                    )
                    .await;
                false
            }
        }
    }

    fn finish_duplicate(
        &self,
        run: &mut FulfillmentRun,
        order_id: OrderId,
    ) -> Result<FulfillmentOutcome> {
        tracing::info!(%order_id, "order already recorded; skipping");
        metrics::counter!("fulfillment_duplicates_total").increment(1);
        run.advance(FulfillmentState::Done)?;
        Ok(FulfillmentOutcome::AlreadyRecorded { order_id })
    }

    async fn abort(
        &self,
        run: &mut FulfillmentRun,
        session_id: &SessionId,
        error: FulfillmentError,
    ) -> FulfillmentError {
        tracing::error!(%session_id, error = %error, "fulfillment failed");
        if let Err(invalid) = run.advance(FulfillmentState::Failed) {
            return invalid;
        }
        self.services
            .notifier
            .notify_error(
                &format!("fulfillment failed for session {session_id}"),
                &error.to_string(),
            )
            .await;
        error
    }
}

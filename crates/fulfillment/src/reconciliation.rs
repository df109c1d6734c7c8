//! Reconciliation of recent payments against the order ledger.

use chrono::{DateTime, Duration, Utc};
use common::SessionId;
use domain::Money;
use serde::Serialize;

use crate::error::{LedgerError, ReconciliationError};
use crate::services::Services;

/// Settings for the reconciliation job.
#[derive(Debug, Clone)]
pub struct ReconciliationSettings {
    /// Bearer secret the scheduler must present; `None` rejects every call.
    pub secret: Option<String>,
    /// How far back to look for completed sessions.
    pub window: Duration,
    /// Maximum number of sessions checked per run.
    pub page_size: u32,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            secret: None,
            window: Duration::hours(24),
            page_size: 100,
        }
    }
}

/// A paid session with no ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mismatch {
    pub session_id: SessionId,
    pub payment_reference: String,
    pub amount: Money,
    pub currency: String,
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Number of completed sessions listed for the window.
    pub checked: usize,
    pub mismatches: Vec<Mismatch>,
}

/// Audits completed sessions against the ledger and reports gaps.
pub struct ReconciliationJob {
    services: Services,
    settings: ReconciliationSettings,
}

impl ReconciliationJob {
    /// Creates a job over the given collaborators.
    pub fn new(services: Services, settings: ReconciliationSettings) -> Self {
        Self { services, settings }
    }

    /// Checks an `Authorization` header value against the configured secret.
    pub fn authorize(&self, header: Option<&str>) -> Result<(), ReconciliationError> {
        let Some(secret) = self.settings.secret.as_deref().filter(|s| !s.is_empty()) else {
            tracing::warn!("reconciliation secret not configured; rejecting request");
            return Err(ReconciliationError::Unauthorized);
        };
        let presented = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(ReconciliationError::Unauthorized)?;
        if constant_time_eq(presented.as_bytes(), secret.as_bytes()) {
            Ok(())
        } else {
            Err(ReconciliationError::Unauthorized)
        }
    }

    /// Runs the audit over the window ending now.
    pub async fn run(&self) -> Result<ReconciliationReport, ReconciliationError> {
        self.run_at(Utc::now()).await
    }

    /// Runs the audit over the window ending at `now`.
    #[tracing::instrument(skip(self))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<ReconciliationReport, ReconciliationError> {
        metrics::counter!("reconciliation_runs_total").increment(1);
        let since = now - self.settings.window;

        let sessions = self
            .services
            .payments
            .list_completed_sessions(since, self.settings.page_size)
            .await?;

        let mut report = ReconciliationReport {
            checked: sessions.len(),
            mismatches: Vec::new(),
        };
        for session in &sessions {
            let Some(order_id) = session.order_id() else {
                tracing::debug!(session_id = %session.id, "session has no payment reference");
                continue;
            };

            match self.services.ledger.find_by_order_id(&order_id).await {
                Ok(Some(_)) => {}
                Err(LedgerError::Malformed(e)) => {
                    tracing::warn!(%order_id, error = %e, "ledger row present but malformed");
                }
                Ok(None) => {
                    tracing::warn!(%order_id, session_id = %session.id, "payment missing from ledger");
                    report.mismatches.push(Mismatch {
                        session_id: session.id.clone(),
                        payment_reference: order_id.to_string(),
                        amount: session.amount_total,
                        currency: session.currency.clone(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        metrics::counter!("reconciliation_mismatches_total").increment(report.mismatches.len() as u64);
        tracing::info!(
            checked = report.checked,
            mismatches = report.mismatches.len(),
            "reconciliation finished"
        );

        if !report.mismatches.is_empty() {
            let message = mismatch_message(&report.mismatches, self.settings.window);
            self.services.notifier.notify(&message).await;
        }

        Ok(report)
    }
}

fn mismatch_message(mismatches: &[Mismatch], window: Duration) -> String {
    let mut lines = vec![
        "Reconciliation: payments missing from the order ledger".to_string(),
        format!("Window: last {} hours", window.num_hours()),
        format!("Count: {}", mismatches.len()),
        String::new(),
    ];
    lines.extend(mismatches.iter().map(|m| {
        format!(
            "- {} (session {}): {} {}",
            m.payment_reference,
            m.session_id,
            m.amount,
            m.currency.to_ascii_uppercase()
        )
    }));
    lines.join("\n")
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        InMemoryCatalog, InMemoryLedger, InMemoryPaymentProvider, LedgerClient, RecordingNotifier,
    };
    use chrono::{FixedOffset, TimeZone};
    use domain::{CustomerDetails, OrderRecord, Session};
    use std::sync::Arc;

    struct Fixture {
        job: ReconciliationJob,
        ledger: InMemoryLedger,
        payments: InMemoryPaymentProvider,
        notifier: RecordingNotifier,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()
    }

    fn setup(secret: Option<&str>) -> Fixture {
        let ledger = InMemoryLedger::new();
        let payments = InMemoryPaymentProvider::new();
        let notifier = RecordingNotifier::new();
        let services = Services {
            catalog: Arc::new(InMemoryCatalog::new()),
            ledger: Arc::new(ledger.clone()),
            payments: Arc::new(payments.clone()),
            notifier: Arc::new(notifier.clone()),
        };
        let settings = ReconciliationSettings {
            secret: secret.map(str::to_string),
            ..Default::default()
        };
        Fixture {
            job: ReconciliationJob::new(services, settings),
            ledger,
            payments,
            notifier,
        }
    }

    fn session(n: u32, reference: Option<&str>) -> Session {
        Session {
            id: SessionId::new(format!("cs_{n}")),
            payment_reference: reference.map(str::to_string),
            amount_total: Money::from_minor(1000 * i64::from(n)),
            currency: "jpy".to_string(),
            customer: CustomerDetails::default(),
            shipping: None,
            line_items: Vec::new(),
            created: now() - Duration::hours(i64::from(n)),
        }
    }

    async fn record(ledger: &InMemoryLedger, session: &Session) {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let record = OrderRecord::for_session(session, true, offset, "https://dashboard.test").unwrap();
        ledger.append(&record).await.unwrap();
    }

    #[test]
    fn test_authorize() {
        let f = setup(Some("cron-secret"));
        assert!(f.job.authorize(Some("Bearer cron-secret")).is_ok());
        assert!(f.job.authorize(Some("Bearer wrong")).is_err());
        assert!(f.job.authorize(Some("cron-secret")).is_err());
        assert!(f.job.authorize(None).is_err());
    }

    #[test]
    fn test_missing_secret_fails_closed() {
        let f = setup(None);
        assert!(matches!(
            f.job.authorize(Some("Bearer ")),
            Err(ReconciliationError::Unauthorized)
        ));
        let f = setup(Some(""));
        assert!(f.job.authorize(Some("Bearer ")).is_err());
    }

    #[tokio::test]
    async fn test_reports_unrecorded_sessions() {
        let f = setup(Some("s"));
        for n in 1..=4 {
            let s = session(n, Some(&format!("pi_{n}")));
            if n % 2 == 0 {
                record(&f.ledger, &s).await;
            }
            f.payments.insert_session(s).await;
        }

        let report = f.job.run_at(now()).await.unwrap();
        assert_eq!(report.checked, 4);
        let missing: Vec<_> = report
            .mismatches
            .iter()
            .map(|m| m.payment_reference.as_str())
            .collect();
        assert_eq!(missing, vec!["pi_1", "pi_3"]);

        let messages = f.notifier.messages().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Count: 2"));
        assert!(messages[0].contains("pi_1"));
        assert!(messages[0].contains("3000 JPY"));
    }

    #[tokio::test]
    async fn test_clean_run_sends_nothing() {
        let f = setup(Some("s"));
        let s = session(1, Some("pi_1"));
        record(&f.ledger, &s).await;
        f.payments.insert_session(s).await;

        let report = f.job.run_at(now()).await.unwrap();
        assert_eq!(report.checked, 1);
        assert!(report.mismatches.is_empty());
        assert_eq!(f.notifier.count().await, 0);
    }

    #[tokio::test]
    async fn test_window_excludes_old_sessions() {
        let f = setup(Some("s"));
        f.payments.insert_session(session(30, Some("pi_30"))).await;

        let report = f.job.run_at(now()).await.unwrap();
        assert_eq!(report.checked, 0);
        assert_eq!(f.notifier.count().await, 0);
    }

    #[tokio::test]
    async fn test_upstream_failures_propagate() {
        let f = setup(Some("s"));
        f.payments.set_fail_on_list(true).await;
        assert!(matches!(
            f.job.run_at(now()).await,
            Err(ReconciliationError::Payment(_))
        ));

        f.payments.set_fail_on_list(false).await;
        f.payments.insert_session(session(1, Some("pi_1"))).await;
        f.ledger.set_fail_on_read(true).await;
        assert!(matches!(
            f.job.run_at(now()).await,
            Err(ReconciliationError::Ledger(_))
        ));
        assert_eq!(f.notifier.count().await, 0);
    }
}

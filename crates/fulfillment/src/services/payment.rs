//! Payment provider trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ProductId, SessionId};
use domain::{Money, Session};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::PaymentError;

/// One priced line of a checkout session to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub product_id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub unit_amount: Money,
    pub quantity: u32,
}

/// Everything the provider needs to open a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub line_items: Vec<CheckoutLineItem>,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub allowed_countries: Vec<String>,
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: SessionId,
    pub url: String,
}

/// Trait for the payment provider's session API.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Fetches a session with its line items and product references expanded.
    async fn retrieve_session(&self, id: &SessionId) -> Result<Session, PaymentError>;

    /// Lists completed sessions created at or after `created_since`, newest first.
    async fn list_completed_sessions(
        &self,
        created_since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Session>, PaymentError>;

    /// Opens a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    sessions: HashMap<SessionId, Session>,
    created: Vec<CheckoutRequest>,
    fail_on_retrieve: bool,
    fail_on_list: bool,
    fail_on_create: bool,
    retrieve_calls: usize,
}

/// In-memory payment provider for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProvider {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentProvider {
    /// Creates a provider with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a session.
    pub async fn insert_session(&self, session: Session) {
        self.state
            .write()
            .await
            .sessions
            .insert(session.id.clone(), session);
    }

    /// Configures session retrieval to fail.
    pub async fn set_fail_on_retrieve(&self, fail: bool) {
        self.state.write().await.fail_on_retrieve = fail;
    }

    /// Configures session listing to fail.
    pub async fn set_fail_on_list(&self, fail: bool) {
        self.state.write().await.fail_on_list = fail;
    }

    /// Configures session creation to fail.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Returns every checkout request received, in order.
    pub async fn created_requests(&self) -> Vec<CheckoutRequest> {
        self.state.read().await.created.clone()
    }

    /// Returns the number of `retrieve_session` calls.
    pub async fn retrieve_count(&self) -> usize {
        self.state.read().await.retrieve_calls
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn retrieve_session(&self, id: &SessionId) -> Result<Session, PaymentError> {
        let mut state = self.state.write().await;
        state.retrieve_calls += 1;
        if state.fail_on_retrieve {
            return Err(PaymentError::Transport("connection reset".to_string()));
        }
        state
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| PaymentError::SessionNotFound(id.clone()))
    }

    async fn list_completed_sessions(
        &self,
        created_since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Session>, PaymentError> {
        let state = self.state.read().await;
        if state.fail_on_list {
            return Err(PaymentError::Api {
                status: 500,
                message: "listing unavailable".to_string(),
            });
        }
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.created >= created_since && s.payment_reference.is_some())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created.cmp(&a.created));
        sessions.truncate(limit as usize);
        Ok(sessions)
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut state = self.state.write().await;
        if state.fail_on_create {
            return Err(PaymentError::Api {
                status: 400,
                message: "invalid request".to_string(),
            });
        }
        state.created.push(request);
        let id = SessionId::new(format!("cs_test_{}", Uuid::new_v4().simple()));
        let url = format!("https://checkout.test/pay/{id}");
        Ok(CheckoutSession { id, url })
    }
}

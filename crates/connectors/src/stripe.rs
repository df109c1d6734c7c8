//! Checkout sessions on the payment provider's REST API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ProductId, SessionId};
use domain::{Address, CustomerDetails, LineItem, Money, Session, ShippingDetails};
use fulfillment::{CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::http;

/// Product metadata key holding the catalog product id.
pub const PRODUCT_ID_METADATA: &str = "microCmsId";

/// Largest page the provider serves for line item lists.
const LINE_ITEM_PAGE_SIZE: &str = "100";

/// Connection settings for the payment provider.
#[derive(Clone)]
pub struct StripeConfig {
    pub api_base: String,
    pub secret_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Payment provider client.
pub struct StripeClient {
    client: Client,
    base: Url,
    secret_key: String,
}

impl StripeClient {
    /// Creates a client for the given settings.
    pub fn new(config: StripeConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout)?,
            base: http::base_url(&config.api_base)?,
            secret_key: config.secret_key,
        })
    }

    fn sessions_url(&self, id: Option<&str>) -> Url {
        let mut segments = vec!["v1", "checkout", "sessions"];
        segments.extend(id);
        http::endpoint(&self.base, &segments)
    }

    fn line_items_url(&self, id: &str) -> Url {
        http::endpoint(&self.base, &["v1", "checkout", "sessions", id, "line_items"])
    }

    /// Follows the line item list until the provider reports no more pages.
    async fn fetch_remaining_line_items(
        &self,
        id: &SessionId,
        list: &mut WireList<WireLineItem>,
    ) -> std::result::Result<(), PaymentError> {
        while list.has_more {
            let after = list
                .data
                .last()
                .and_then(|item| item.id.clone())
                .ok_or_else(|| {
                    PaymentError::Decode(format!(
                        "session {} line items are truncated and carry no cursor",
                        id.as_str()
                    ))
                })?;

            let request = self.client.get(self.line_items_url(id.as_str())).query(&[
                ("limit", LINE_ITEM_PAGE_SIZE),
                ("starting_after", after.as_str()),
                ("expand[]", "data.price.product"),
            ]);
            let page: WireList<WireLineItem> = self.send(request).await?;
            if page.data.is_empty() && page.has_more {
                return Err(PaymentError::Decode(format!(
                    "session {} returned an empty line item page",
                    id.as_str()
                )));
            }
            tracing::debug!(fetched = page.data.len(), "fetched line item page");
            list.data.extend(page.data);
            list.has_more = page.has_more;
        }
        Ok(())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> std::result::Result<T, PaymentError> {
        let response = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let (status, body) = http::failure(response).await;
            let message = serde_json::from_str::<WireErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            tracing::warn!(status, %message, "payment provider request failed");
            return Err(PaymentError::Api { status, message });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PaymentError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[tracing::instrument(skip(self))]
    async fn retrieve_session(&self, id: &SessionId) -> std::result::Result<Session, PaymentError> {
        let request = self.client.get(self.sessions_url(Some(id.as_str()))).query(&[
            ("expand[]", "line_items"),
            ("expand[]", "line_items.data.price.product"),
        ]);

        let mut wire: WireSession = match self.send(request).await {
            Err(PaymentError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Err(PaymentError::SessionNotFound(id.clone()));
            }
            other => other?,
        };
        if let Some(list) = wire.line_items.as_mut() {
            self.fetch_remaining_line_items(id, list).await?;
        }
        wire.into_session()
    }

    #[tracing::instrument(skip(self))]
    async fn list_completed_sessions(
        &self,
        created_since: DateTime<Utc>,
        limit: u32,
    ) -> std::result::Result<Vec<Session>, PaymentError> {
        let request = self.client.get(self.sessions_url(None)).query(&[
            ("status", "complete".to_string()),
            ("created[gte]", created_since.timestamp().to_string()),
            ("limit", limit.to_string()),
        ]);

        let list: WireList<WireSession> = self.send(request).await?;
        if list.has_more {
            tracing::warn!(limit, "more completed sessions than one page; only the first page is checked");
        }
        list.data.into_iter().map(WireSession::into_session).collect()
    }

    #[tracing::instrument(skip(self, request), fields(lines = request.line_items.len()))]
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> std::result::Result<CheckoutSession, PaymentError> {
        let form = checkout_form(&request);
        let created: WireCreated = self
            .send(self.client.post(self.sessions_url(None)).form(&form))
            .await?;

        let url = created
            .url
            .ok_or_else(|| PaymentError::Decode("created session has no url".to_string()))?;
        Ok(CheckoutSession {
            id: SessionId::new(created.id),
            url,
        })
    }
}

/// Encodes a checkout request in the provider's bracketed form syntax.
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("metadata[source]".to_string(), "web".to_string()),
    ];

    for (i, country) in request.allowed_countries.iter().enumerate() {
        form.push((
            format!("shipping_address_collection[allowed_countries][{i}]"),
            country.clone(),
        ));
    }

    for (i, line) in request.line_items.iter().enumerate() {
        let price = format!("line_items[{i}][price_data]");
        form.push((format!("{price}[currency]"), request.currency.clone()));
        form.push((
            format!("{price}[unit_amount]"),
            line.unit_amount.minor_units().to_string(),
        ));
        form.push((format!("{price}[product_data][name]"), line.name.clone()));
        if let Some(description) = line.description.as_deref().filter(|d| !d.is_empty()) {
            form.push((
                format!("{price}[product_data][description]"),
                description.to_string(),
            ));
        }
        if let Some(image) = &line.image_url {
            form.push((format!("{price}[product_data][images][0]"), image.clone()));
        }
        form.push((
            format!("{price}[product_data][metadata][{PRODUCT_ID_METADATA}]"),
            line.product_id.to_string(),
        ));
        form.push((format!("line_items[{i}][quantity]"), line.quantity.to_string()));
    }

    form
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireList<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct WireCreated {
    id: String,
    url: Option<String>,
}

/// A reference the API returns either as a bare id or as the expanded object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expandable<T> {
    Id(String),
    Object(T),
}

#[derive(Debug, Deserialize)]
struct WireId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireSession {
    id: String,
    payment_intent: Option<Expandable<WireId>>,
    amount_total: Option<i64>,
    currency: Option<String>,
    customer_details: Option<WireCustomer>,
    collected_information: Option<WireCollected>,
    shipping_details: Option<WireShipping>,
    line_items: Option<WireList<WireLineItem>>,
    created: i64,
}

#[derive(Debug, Deserialize)]
struct WireCustomer {
    email: Option<String>,
    name: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCollected {
    shipping_details: Option<WireShipping>,
}

#[derive(Debug, Deserialize)]
struct WireShipping {
    name: Option<String>,
    address: Option<WireAddress>,
}

#[derive(Debug, Deserialize)]
struct WireAddress {
    postal_code: Option<String>,
    state: Option<String>,
    city: Option<String>,
    line1: Option<String>,
    line2: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireLineItem {
    id: Option<String>,
    description: Option<String>,
    quantity: Option<u32>,
    price: Option<WirePrice>,
}

#[derive(Debug, Deserialize)]
struct WirePrice {
    unit_amount: Option<i64>,
    product: Option<Expandable<WireProduct>>,
}

#[derive(Debug, Deserialize)]
struct WireProduct {
    name: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl WireSession {
    fn into_session(self) -> std::result::Result<Session, PaymentError> {
        let created = DateTime::from_timestamp(self.created, 0).ok_or_else(|| {
            PaymentError::Decode(format!("session {} has invalid created time", self.id))
        })?;

        // Newer API versions move shipping under collected_information.
        let shipping = self
            .collected_information
            .and_then(|c| c.shipping_details)
            .or(self.shipping_details)
            .map(|s| ShippingDetails {
                name: s.name,
                address: s.address.map(|a| Address {
                    postal_code: a.postal_code,
                    state: a.state,
                    city: a.city,
                    line1: a.line1,
                    line2: a.line2,
                    country: a.country,
                }),
            });

        let line_items = self
            .line_items
            .map(|list| list.data)
            .unwrap_or_default()
            .into_iter()
            .map(|item| {
                let (unit_amount, product) = item
                    .price
                    .map(|p| (p.unit_amount, p.product))
                    .unwrap_or((None, None));
                let product = match product {
                    Some(Expandable::Object(product)) => Some(product),
                    _ => None,
                };
                let product_id = product
                    .as_ref()
                    .and_then(|p| p.metadata.get(PRODUCT_ID_METADATA))
                    .filter(|id| !id.is_empty())
                    .map(ProductId::new);
                let name = item
                    .description
                    .or_else(|| product.and_then(|p| p.name))
                    .unwrap_or_default();
                LineItem {
                    product_id,
                    name,
                    unit_price: Money::from_minor(unit_amount.unwrap_or(0)),
                    quantity: item.quantity.unwrap_or(0),
                }
            })
            .collect();

        let customer = self
            .customer_details
            .map(|c| CustomerDetails {
                email: c.email,
                name: c.name,
                phone: c.phone,
            })
            .unwrap_or_default();

        Ok(Session {
            id: SessionId::new(self.id),
            payment_reference: self.payment_intent.map(|pi| match pi {
                Expandable::Id(id) => id,
                Expandable::Object(WireId { id }) => id,
            }),
            amount_total: Money::from_minor(self.amount_total.unwrap_or(0)),
            currency: self.currency.unwrap_or_default(),
            customer,
            shipping,
            line_items,
            created,
        })
    }
}

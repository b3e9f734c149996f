//! Broker bridge client, wrapped in a circuit breaker (§4.5.c).

use crate::errors::AppError;
use crate::resilience::circuit_breaker::CircuitBreaker;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub net_liquidation: f64,
    pub buying_power: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Lmt,
    Mkt,
    Stp,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerOrder {
    pub symbol: String,
    pub direction: crate::domain::Direction,
    pub quantity: u64,
    pub order_type: OrderType,
    pub limit_price: Option<f64>,
    pub time_in_force: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}

#[async_trait]
pub trait BrokerBridge: Send + Sync {
    async fn get_account(&self) -> Result<Account, AppError>;
    async fn place_order(&self, order: &BrokerOrder) -> Result<OrderAck, AppError>;
    async fn health(&self) -> Result<(), AppError>;
}

pub struct HttpBrokerBridge {
    client: Client,
    base_url: String,
    breaker: Arc<CircuitBreaker>,
}

impl HttpBrokerBridge {
    pub fn new(base_url: impl Into<String>, breaker: Arc<CircuitBreaker>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Fatal(format!("failed to build broker http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            breaker,
        })
    }

    fn classify(status: reqwest::StatusCode) -> AppError {
        if status.as_u16() == 429 || status.is_server_error() {
            AppError::Transient(format!("broker returned {status}"))
        } else {
            AppError::Fatal(format!("broker returned {status}"))
        }
    }

    async fn guarded<T, F, Fut>(&self, call: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, AppError>>,
    {
        if !self.breaker.allow() {
            return Err(AppError::Unavailable("broker circuit breaker open".into()));
        }
        match call().await {
            Ok(value) => {
                self.breaker.record_success();
                Ok(value)
            }
            Err(err) => {
                self.breaker.record_failure();
                Err(err)
            }
        }
    }
}

#[async_trait]
impl BrokerBridge for HttpBrokerBridge {
    async fn get_account(&self) -> Result<Account, AppError> {
        let url = format!("{}/account", self.base_url);
        self.guarded(|| async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| AppError::Transient(format!("account request failed: {e}")))?;
            if !response.status().is_success() {
                return Err(Self::classify(response.status()));
            }
            response
                .json::<Account>()
                .await
                .map_err(|e| AppError::Fatal(format!("malformed account payload: {e}")))
        })
        .await
    }

    async fn place_order(&self, order: &BrokerOrder) -> Result<OrderAck, AppError> {
        let url = format!("{}/orders", self.base_url);
        self.guarded(|| async {
            let response = self
                .client
                .post(&url)
                .json(order)
                .send()
                .await
                .map_err(|e| AppError::Transient(format!("order submission failed: {e}")))?;
            if !response.status().is_success() {
                return Err(Self::classify(response.status()));
            }
            response
                .json::<OrderAck>()
                .await
                .map_err(|e| AppError::Fatal(format!("malformed order ack: {e}")))
        })
        .await
    }

    async fn health(&self) -> Result<(), AppError> {
        let url = format!("{}/health", self.base_url);
        self.guarded(|| async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| AppError::Transient(format!("broker health check failed: {e}")))?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::classify(response.status()))
            }
        })
        .await
    }
}

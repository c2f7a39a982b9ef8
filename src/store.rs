//! Delivery store HTTP client.
//!
//! The delivery store is an external service; this client covers the three
//! calls the scan pipeline makes: lookup by reader code, create, update.
//! The base URL is injected at construction; there is no process-global
//! endpoint state.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Block;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A delivery row as the store returns it.
///
/// `id` is absent until the row is persisted (and has been observed missing
/// on otherwise-valid lookup responses, so it stays optional rather than
/// trusted). The wire calls the delivered flag `status`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeliveryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub reader_code: String,
    pub block: Block,
    pub number: u32,
    pub apartment_id: i64,
    #[serde(default, rename = "status")]
    pub delivered: bool,
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    reader_code: &'a str,
}

/// Body for `POST /deliveries`.
#[derive(Debug, Serialize)]
pub struct NewDelivery<'a> {
    pub reader_code: &'a str,
    pub block: Block,
    pub number: u32,
    pub apartment_id: i64,
}

/// Body for `PUT /deliveries/{id}`.
#[derive(Debug, Serialize)]
pub struct DeliveryUpdate<'a> {
    pub reader_code: &'a str,
    pub block: Block,
    pub number: u32,
    pub apartment_id: i64,
    pub status: bool,
    pub id: i64,
}

/// Outcome of a lookup by reader code. A transport or server failure is a
/// separate `Err`, never folded into `NotFound` here.
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    Found(DeliveryRecord),
    NotFound,
}

/// Client for the external delivery store.
#[derive(Clone)]
pub struct DeliveryStoreClient {
    agent: ureq::Agent,
    base_url: String,
}

impl DeliveryStoreClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(REQUEST_TIMEOUT)
                .build(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up a delivery by its reader code.
    ///
    /// Both an HTTP 404 and a JSON `null` body mean no matching row.
    pub fn find_by_reader_code(&self, code: &str) -> Result<Lookup> {
        let url = format!("{}/deliveries/find_by_reader_code", self.base_url);
        match self
            .agent
            .post(&url)
            .send_json(LookupRequest { reader_code: code })
        {
            Ok(response) => {
                let record: Option<DeliveryRecord> = response
                    .into_json()
                    .context("parse delivery lookup response")?;
                Ok(record.map(Lookup::Found).unwrap_or(Lookup::NotFound))
            }
            Err(ureq::Error::Status(404, _)) => Ok(Lookup::NotFound),
            Err(err) => Err(request_error("delivery lookup", err)),
        }
    }

    /// Create a fresh delivery row.
    pub fn create(&self, delivery: &NewDelivery<'_>) -> Result<DeliveryRecord> {
        let url = format!("{}/deliveries", self.base_url);
        let response = self
            .agent
            .post(&url)
            .send_json(delivery)
            .map_err(|err| request_error("delivery creation", err))?;
        response.into_json().context("parse created delivery")
    }

    /// Update an existing delivery row by id.
    pub fn update(&self, id: i64, update: &DeliveryUpdate<'_>) -> Result<DeliveryRecord> {
        let url = format!("{}/deliveries/{}", self.base_url, id);
        let response = self
            .agent
            .put(&url)
            .send_json(update)
            .map_err(|err| request_error("delivery update", err))?;
        response.into_json().context("parse updated delivery")
    }
}

fn request_error(action: &str, err: ureq::Error) -> anyhow::Error {
    match err {
        ureq::Error::Status(code, _) => anyhow!("{} rejected by store (http {})", action, code),
        other => anyhow::Error::from(other).context(format!("{} request failed", action)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_deserializes_with_missing_optional_fields() {
        let record: DeliveryRecord = serde_json::from_str(
            r#"{"reader_code":"ABC","block":"B","number":45,"apartment_id":1}"#,
        )
        .unwrap();
        assert_eq!(record.id, None);
        assert!(!record.delivered);
        assert_eq!(record.block, Block::B);
    }

    #[test]
    fn record_reads_the_status_wire_field() {
        let record: DeliveryRecord = serde_json::from_str(
            r#"{"id":7,"reader_code":"ABC","block":"A","number":123,"apartment_id":1,"status":true}"#,
        )
        .unwrap();
        assert_eq!(record.id, Some(7));
        assert!(record.delivered);
    }

    #[test]
    fn new_delivery_serializes_exactly_four_fields() {
        let body = serde_json::to_value(NewDelivery {
            reader_code: "QR-1",
            block: Block::A,
            number: 123,
            apartment_id: 1,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "reader_code": "QR-1",
                "block": "A",
                "number": 123,
                "apartment_id": 1
            })
        );
    }

    #[test]
    fn update_serializes_status_and_id() {
        let body = serde_json::to_value(DeliveryUpdate {
            reader_code: "QR-1",
            block: Block::B,
            number: 45,
            apartment_id: 1,
            status: true,
            id: 9,
        })
        .unwrap();
        assert_eq!(body["status"], serde_json::json!(true));
        assert_eq!(body["id"], serde_json::json!(9));
        assert_eq!(body["block"], serde_json::json!("B"));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = DeliveryStoreClient::new("http://store.local/");
        assert_eq!(client.base_url(), "http://store.local");
    }
}

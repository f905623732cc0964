//! DHL Unified API tracking client
//!
//! API: <https://developer.dhl.com/api-reference/shipment-tracking>
//!
//! Transport failures degrade to [`TrackOutcome::Unavailable`] — the scheduled
//! reconciliation cycle is the retry mechanism, the client itself never
//! retries.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use super::{CarrierTracker, TrackOutcome, TrackingResult, map_vendor_status};
use crate::db::models::{ShipmentStatus, TrackingEvent};
use crate::utils::{AppError, AppResult};

/// DHL shipment tracking client
#[derive(Clone)]
pub struct DhlClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DhlClient {
    /// Build a client with a bounded per-call timeout
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl CarrierTracker for DhlClient {
    async fn track(&self, tracking_number: &str) -> TrackOutcome {
        let resp = match self
            .http
            .get(&self.base_url)
            .header("DHL-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("trackingNumber", tracking_number)])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    tracking_number = %tracking_number,
                    error = %e,
                    "DHL tracking request failed"
                );
                return TrackOutcome::Unavailable;
            }
        };

        if resp.status() == StatusCode::NOT_FOUND {
            tracing::warn!(tracking_number = %tracking_number, "Tracking number not found");
            return TrackOutcome::NotFound;
        }

        if !resp.status().is_success() {
            tracing::warn!(
                tracking_number = %tracking_number,
                status = %resp.status(),
                "DHL tracking returned non-success status"
            );
            return TrackOutcome::Unavailable;
        }

        let data: DhlTrackingResponse = match resp.json().await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(
                    tracking_number = %tracking_number,
                    error = %e,
                    "Failed to decode DHL tracking response"
                );
                return TrackOutcome::Unavailable;
            }
        };

        match parse_response(tracking_number, &data) {
            Some(result) => TrackOutcome::Found(result),
            None => TrackOutcome::NotFound,
        }
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Deserialize)]
struct DhlTrackingResponse {
    #[serde(default)]
    shipments: Vec<DhlShipment>,
}

#[derive(Debug, Deserialize)]
struct DhlShipment {
    status: Option<DhlStatus>,
    #[serde(default)]
    events: Vec<DhlEvent>,
    #[serde(rename = "estimatedTimeOfDelivery")]
    estimated_time_of_delivery: Option<String>,
    origin: Option<DhlPlace>,
    destination: Option<DhlPlace>,
}

#[derive(Debug, Deserialize)]
struct DhlStatus {
    #[serde(rename = "statusCode")]
    status_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DhlEvent {
    timestamp: Option<String>,
    location: Option<DhlPlace>,
    #[serde(rename = "statusCode")]
    status_code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DhlPlace {
    address: Option<DhlAddress>,
}

#[derive(Debug, Deserialize)]
struct DhlAddress {
    #[serde(rename = "addressLocality")]
    address_locality: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
}

// =============================================================================
// Normalization
// =============================================================================

/// Normalize a DHL response; `None` means the vendor returned no shipment
fn parse_response(tracking_number: &str, data: &DhlTrackingResponse) -> Option<TrackingResult> {
    let shipment = data.shipments.first()?;

    let mut events: Vec<TrackingEvent> = shipment.events.iter().filter_map(parse_event).collect();
    // 最新在前，不依赖运营商的返回顺序
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let vendor_status_code = shipment
        .status
        .as_ref()
        .and_then(|s| s.status_code.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let status = map_vendor_status(&vendor_status_code);

    let estimated_delivery = shipment
        .estimated_time_of_delivery
        .as_deref()
        .and_then(parse_vendor_timestamp);

    let actual_delivery = if status == ShipmentStatus::Delivered {
        events.first().map(|e| e.timestamp)
    } else {
        None
    };

    Some(TrackingResult {
        tracking_number: tracking_number.to_string(),
        status,
        vendor_status_code,
        origin: shipment.origin.as_ref().and_then(format_place),
        destination: shipment.destination.as_ref().and_then(format_place),
        estimated_delivery,
        actual_delivery,
        events,
    })
}

/// Parse one vendor event; drops the event with a warning when the timestamp
/// is missing or unparseable (partial-data tolerance)
fn parse_event(raw: &DhlEvent) -> Option<TrackingEvent> {
    let raw_timestamp = raw.timestamp.as_deref().unwrap_or_default();
    let timestamp = match parse_vendor_timestamp(raw_timestamp) {
        Some(ts) => ts,
        None => {
            tracing::warn!(timestamp = %raw_timestamp, "Dropping DHL event with unparseable timestamp");
            return None;
        }
    };

    let location = raw
        .location
        .as_ref()
        .and_then(format_place)
        .unwrap_or_else(|| "Unknown".to_string());

    Some(TrackingEvent {
        timestamp,
        location,
        status_code: raw.status_code.clone().unwrap_or_default(),
        description: raw.description.clone().unwrap_or_default(),
    })
}

/// Vendor timestamps are RFC 3339 with a "Z" suffix; some feeds omit the
/// offset entirely, which is taken as UTC
fn parse_vendor_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// "Locality, CC" like the vendor's own tracking page shows it
fn format_place(place: &DhlPlace) -> Option<String> {
    let address = place.address.as_ref()?;
    let locality = address.address_locality.clone().unwrap_or_default();
    match address.country_code.as_deref() {
        Some(cc) if !cc.is_empty() => Some(format!("{}, {}", locality, cc)),
        _ if !locality.is_empty() => Some(locality),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn response_from_json(value: serde_json::Value) -> DhlTrackingResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_shipments_is_not_found() {
        let data = response_from_json(serde_json::json!({ "shipments": [] }));
        assert!(parse_response("00340434161094000001", &data).is_none());
    }

    #[test]
    fn test_events_sorted_newest_first() {
        // Vendor returns T3, T1, T2 out of order
        let data = response_from_json(serde_json::json!({
            "shipments": [{
                "status": { "statusCode": "transit" },
                "events": [
                    { "timestamp": "2024-06-03T10:00:00Z", "statusCode": "transit", "description": "T3" },
                    { "timestamp": "2024-06-01T10:00:00Z", "statusCode": "pre-transit", "description": "T1" },
                    { "timestamp": "2024-06-02T10:00:00Z", "statusCode": "transit", "description": "T2" }
                ]
            }]
        }));

        let result = parse_response("123", &data).unwrap();
        let descriptions: Vec<&str> =
            result.events.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["T3", "T2", "T1"]);
    }

    #[test]
    fn test_malformed_event_timestamp_is_dropped() {
        let data = response_from_json(serde_json::json!({
            "shipments": [{
                "status": { "statusCode": "transit" },
                "events": [
                    { "timestamp": "not-a-timestamp", "description": "bad" },
                    { "timestamp": "2024-06-02T10:00:00Z", "description": "good" },
                    { "description": "missing" }
                ]
            }]
        }));

        let result = parse_response("123", &data).unwrap();
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].description, "good");
    }

    #[test]
    fn test_delivered_takes_actual_delivery_from_newest_event() {
        let data = response_from_json(serde_json::json!({
            "shipments": [{
                "status": { "statusCode": "delivered" },
                "events": [
                    { "timestamp": "2024-06-01T08:00:00Z", "description": "picked up" },
                    { "timestamp": "2024-06-04T14:12:00Z", "description": "delivered" }
                ]
            }]
        }));

        let result = parse_response("123", &data).unwrap();
        assert_eq!(result.status, ShipmentStatus::Delivered);
        assert_eq!(
            result.actual_delivery,
            Some(Utc.with_ymd_and_hms(2024, 6, 4, 14, 12, 0).unwrap())
        );
    }

    #[test]
    fn test_missing_status_maps_to_in_transit() {
        let data = response_from_json(serde_json::json!({
            "shipments": [{ "events": [] }]
        }));

        let result = parse_response("123", &data).unwrap();
        assert_eq!(result.vendor_status_code, "unknown");
        assert_eq!(result.status, ShipmentStatus::InTransit);
        assert_eq!(result.actual_delivery, None);
    }

    #[test]
    fn test_z_suffix_and_offsetless_timestamps() {
        let z = parse_vendor_timestamp("2024-06-04T14:12:00Z").unwrap();
        assert_eq!(z, Utc.with_ymd_and_hms(2024, 6, 4, 14, 12, 0).unwrap());

        let bare = parse_vendor_timestamp("2024-06-04T14:12:00").unwrap();
        assert_eq!(bare, z);

        assert!(parse_vendor_timestamp("04.06.2024").is_none());
    }

    #[test]
    fn test_origin_and_destination_formatting() {
        let data = response_from_json(serde_json::json!({
            "shipments": [{
                "status": { "statusCode": "transit" },
                "events": [],
                "origin": { "address": { "addressLocality": "Bonn", "countryCode": "DE" } },
                "destination": { "address": { "addressLocality": "Berlin", "countryCode": "DE" } }
            }]
        }));

        let result = parse_response("123", &data).unwrap();
        assert_eq!(result.origin.as_deref(), Some("Bonn, DE"));
        assert_eq!(result.destination.as_deref(), Some("Berlin, DE"));
    }

    #[test]
    fn test_estimated_delivery_parsed() {
        let data = response_from_json(serde_json::json!({
            "shipments": [{
                "status": { "statusCode": "transit" },
                "events": [],
                "estimatedTimeOfDelivery": "2024-06-05T12:00:00Z"
            }]
        }));

        let result = parse_response("123", &data).unwrap();
        assert_eq!(
            result.estimated_delivery,
            Some(Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap())
        );
    }
}

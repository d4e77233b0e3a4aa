//! Notification request model and payload normalization.
//!
//! Inbound bodies come from webhook processors we don't control, so parsing
//! never fails. A body that isn't a JSON object collapses to the all-defaults
//! request for that kind and a warning is logged. Within an object, each
//! field is read on its own and defaults independently of its neighbours.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Topic used when an ops failure arrives without one.
pub const UNKNOWN_TOPIC: &str = "unknown_failure";

/// Currency assumed when a donation arrives without one.
pub const DEFAULT_CURRENCY: &str = "gbp";

/// The three notification pipelines exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OpsFailure,
    FulfillmentIssue,
    DonationThanks,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OpsFailure => "ops_failure",
            NotificationKind::FulfillmentIssue => "fulfillment_issue",
            NotificationKind::DonationThanks => "donation_thanks",
        }
    }

    /// Ops-facing kinds go to the configured ops inbox rather than a customer.
    pub fn is_ops(&self) -> bool {
        !matches!(self, NotificationKind::DonationThanks)
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An internal failure reported by the ops trigger (payment failures, cron errors).
#[derive(Debug, Clone, PartialEq)]
pub struct OpsFailure {
    pub topic: String,
    pub message: String,
    pub context: Map<String, Value>,
}

impl Default for OpsFailure {
    fn default() -> Self {
        Self {
            topic: UNKNOWN_TOPIC.to_string(),
            message: String::new(),
            context: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Non-empty parts joined on one line, e.g. `1 High St, Leeds, LS1 1AA, GB`.
    pub fn summary(&self) -> String {
        [&self.line1, &self.city, &self.postal_code, &self.country]
            .into_iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One order line that couldn't be fulfilled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FulfillmentLine {
    pub sku: String,
    pub qty: i64,
    pub reason: String,
}

/// A paid checkout session that needs manual fulfillment attention.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FulfillmentIssue {
    pub session_id: String,
    pub email: String,
    pub name: String,
    pub shipping_address: ShippingAddress,
    pub issues: Vec<FulfillmentLine>,
}

/// A completed donation to thank the donor for.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationThanks {
    pub email: String,
    pub name: String,
    pub amount_pence: i64,
    pub currency: String,
}

impl Default for DonationThanks {
    fn default() -> Self {
        Self {
            email: String::new(),
            name: String::new(),
            amount_pence: 0,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// A normalized notification, one variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationRequest {
    OpsFailure(OpsFailure),
    FulfillmentIssue(FulfillmentIssue),
    DonationThanks(DonationThanks),
}

impl NotificationRequest {
    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationRequest::OpsFailure(_) => NotificationKind::OpsFailure,
            NotificationRequest::FulfillmentIssue(_) => NotificationKind::FulfillmentIssue,
            NotificationRequest::DonationThanks(_) => NotificationKind::DonationThanks,
        }
    }

    /// The all-defaults request for a kind.
    pub fn empty(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::OpsFailure => NotificationRequest::OpsFailure(OpsFailure::default()),
            NotificationKind::FulfillmentIssue => {
                NotificationRequest::FulfillmentIssue(FulfillmentIssue::default())
            }
            NotificationKind::DonationThanks => {
                NotificationRequest::DonationThanks(DonationThanks::default())
            }
        }
    }

    /// Parse a raw request body into the request for `kind`.
    ///
    /// Never fails. A body that isn't a JSON object yields
    /// [`NotificationRequest::empty`]; inside an object each field that is
    /// missing or of the wrong type falls back to its own default.
    pub fn normalize(kind: NotificationKind, body: &str) -> Self {
        if body.trim().is_empty() {
            return Self::empty(kind);
        }

        let root = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                tracing::warn!(
                    kind = %kind,
                    root = json_type(&other),
                    body_len = body.len(),
                    "Notification payload is not a JSON object, falling back to defaults"
                );
                return Self::empty(kind);
            }
            Err(e) => {
                tracing::warn!(
                    kind = %kind,
                    error = %e,
                    body_len = body.len(),
                    "Malformed notification payload, falling back to defaults"
                );
                return Self::empty(kind);
            }
        };

        let fields = Fields(&root);
        match kind {
            NotificationKind::OpsFailure => NotificationRequest::OpsFailure(OpsFailure::from_fields(fields)),
            NotificationKind::FulfillmentIssue => {
                NotificationRequest::FulfillmentIssue(FulfillmentIssue::from_fields(fields))
            }
            NotificationKind::DonationThanks => {
                NotificationRequest::DonationThanks(DonationThanks::from_fields(fields))
            }
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================
// Field extraction
// ============================================================

/// Lenient, typed lookups over one JSON object.
#[derive(Clone, Copy)]
struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    /// Strings as-is; numbers and booleans by their JSON text.
    fn string(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Integers, integral floats such as `2550.0`, and integer strings.
    fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn object(&self, key: &str) -> Option<&'a Map<String, Value>> {
        self.0.get(key)?.as_object()
    }

    /// Object elements of an array; other elements are dropped.
    fn objects(&self, key: &str) -> Vec<Fields<'a>> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_object).map(Fields).collect())
            .unwrap_or_default()
    }
}

impl OpsFailure {
    fn from_fields(fields: Fields<'_>) -> Self {
        Self {
            topic: non_empty(fields.string("topic")).unwrap_or_else(|| UNKNOWN_TOPIC.to_string()),
            message: fields.string("message").unwrap_or_default(),
            context: fields.object("context").cloned().unwrap_or_default(),
        }
    }
}

impl ShippingAddress {
    fn from_fields(fields: Fields<'_>) -> Self {
        Self {
            line1: fields.string("line1").unwrap_or_default(),
            city: fields.string("city").unwrap_or_default(),
            postal_code: fields.string("postalCode").unwrap_or_default(),
            country: fields.string("country").unwrap_or_default(),
        }
    }
}

impl FulfillmentLine {
    fn from_fields(fields: Fields<'_>) -> Self {
        Self {
            sku: fields.string("sku").unwrap_or_default(),
            qty: fields.int("qty").unwrap_or_default(),
            reason: fields.string("reason").unwrap_or_default(),
        }
    }
}

impl FulfillmentIssue {
    fn from_fields(fields: Fields<'_>) -> Self {
        Self {
            session_id: fields.string("sessionId").unwrap_or_default(),
            email: fields.string("email").unwrap_or_default(),
            name: fields.string("name").unwrap_or_default(),
            shipping_address: fields
                .object("shippingAddress")
                .map(|address| ShippingAddress::from_fields(Fields(address)))
                .unwrap_or_default(),
            issues: fields
                .objects("issues")
                .into_iter()
                .map(FulfillmentLine::from_fields)
                .collect(),
        }
    }
}

impl DonationThanks {
    fn from_fields(fields: Fields<'_>) -> Self {
        Self {
            email: fields.string("email").unwrap_or_default(),
            name: fields.string("name").unwrap_or_default(),
            amount_pence: fields.int("amountPence").unwrap_or_default(),
            currency: non_empty(fields.string("currency"))
                .map(|c| c.trim().to_lowercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ops(body: &str) -> OpsFailure {
        match NotificationRequest::normalize(NotificationKind::OpsFailure, body) {
            NotificationRequest::OpsFailure(r) => r,
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    fn fulfillment(body: &str) -> FulfillmentIssue {
        match NotificationRequest::normalize(NotificationKind::FulfillmentIssue, body) {
            NotificationRequest::FulfillmentIssue(r) => r,
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    fn donation(body: &str) -> DonationThanks {
        match NotificationRequest::normalize(NotificationKind::DonationThanks, body) {
            NotificationRequest::DonationThanks(r) => r,
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_ops_failure_full_payload() {
        let req = ops(r#"{"topic":"payment_failed","message":"card declined","context":{"orderId":"X1"}}"#);
        assert_eq!(req.topic, "payment_failed");
        assert_eq!(req.message, "card declined");
        assert_eq!(req.context.get("orderId"), Some(&json!("X1")));
    }

    #[test]
    fn test_ops_failure_missing_or_empty_topic() {
        assert_eq!(ops("{}").topic, UNKNOWN_TOPIC);
        assert_eq!(ops(r#"{"topic":""}"#).topic, UNKNOWN_TOPIC);
        assert_eq!(ops(r#"{"topic":null}"#).topic, UNKNOWN_TOPIC);
    }

    #[test]
    fn test_malformed_bodies_fall_back_to_defaults() {
        for body in ["not json", "[1,2,3]", "null", "\"str\"", "", "   ", "{\"topic\":"] {
            assert_eq!(ops(body), OpsFailure::default(), "body: {body:?}");
        }
        assert_eq!(fulfillment("<<<"), FulfillmentIssue::default());
        assert_eq!(donation("42"), DonationThanks::default());
    }

    #[test]
    fn test_wrongly_typed_field_keeps_siblings() {
        let req = donation(r#"{"email":"donor@example.test","name":"Ada","amountPence":"lots"}"#);
        assert_eq!(req.email, "donor@example.test");
        assert_eq!(req.name, "Ada");
        assert_eq!(req.amount_pence, 0);

        let req = ops(r#"{"topic":"payment_failed","message":{"nested":true},"context":[1]}"#);
        assert_eq!(req.topic, "payment_failed");
        assert_eq!(req.message, "");
        assert!(req.context.is_empty());

        let req = fulfillment(r#"{"sessionId":"cs_1","name":"Sam","shippingAddress":"oops","issues":{"sku":"x"}}"#);
        assert_eq!(req.session_id, "cs_1");
        assert_eq!(req.name, "Sam");
        assert_eq!(req.shipping_address, ShippingAddress::default());
        assert!(req.issues.is_empty());
    }

    #[test]
    fn test_scalar_fields_are_coerced() {
        assert_eq!(ops(r#"{"topic": 42}"#).topic, "42");
        assert_eq!(donation(r#"{"amountPence":2550.0}"#).amount_pence, 2550);
        assert_eq!(donation(r#"{"amountPence":"2550"}"#).amount_pence, 2550);
        assert_eq!(donation(r#"{"amountPence":25.5}"#).amount_pence, 0);

        let req = fulfillment(r#"{"sessionId":"cs_live_42","issues":[{"sku":"A-HOOD-ARIES","qty":"2","reason":"out of stock"},7]}"#);
        assert_eq!(req.session_id, "cs_live_42");
        assert_eq!(req.issues.len(), 1);
        assert_eq!(req.issues[0].qty, 2);
    }

    #[test]
    fn test_address_fields_default_independently() {
        let req = fulfillment(
            r#"{"sessionId":"cs_1","shippingAddress":{"city":"Leeds","country":"GB"}}"#,
        );
        assert_eq!(req.session_id, "cs_1");
        assert_eq!(req.shipping_address.line1, "");
        assert_eq!(req.shipping_address.postal_code, "");
        assert_eq!(req.shipping_address.summary(), "Leeds, GB");
    }

    #[test]
    fn test_issue_fields_default_independently() {
        let req = fulfillment(r#"{"issues":[{"sku":"A-HOOD-ARIES","qty":2,"reason":"out of stock"},{"reason":"unknown sku"}]}"#);
        assert_eq!(req.issues.len(), 2);
        assert_eq!(req.issues[0].qty, 2);
        assert_eq!(
            req.issues[1],
            FulfillmentLine {
                sku: String::new(),
                qty: 0,
                reason: "unknown sku".to_string(),
            }
        );
    }

    #[test]
    fn test_donation_currency_defaults_and_normalizes() {
        assert_eq!(donation("{}").currency, DEFAULT_CURRENCY);
        assert_eq!(donation(r#"{"currency":""}"#).currency, DEFAULT_CURRENCY);
        assert_eq!(donation(r#"{"currency":"USD"}"#).currency, "usd");

        let req = donation(r#"{"email":"a@b.test","name":"Ada","amountPence":2550}"#);
        assert_eq!(req.amount_pence, 2550);
        assert_eq!(req.name, "Ada");
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let req = donation(r#"{"amountPence":100,"livemode":true}"#);
        assert_eq!(req.amount_pence, 100);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(NotificationKind::OpsFailure.to_string(), "ops_failure");
        assert!(NotificationKind::FulfillmentIssue.is_ops());
        assert!(!NotificationKind::DonationThanks.is_ops());
    }
}

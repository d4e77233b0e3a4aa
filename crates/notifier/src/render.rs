//! Subject + HTML rendering for each notification kind.
//!
//! Bodies are tera templates embedded with `include_str!`. Template names end
//! in `.html`, so tera autoescapes every interpolated value. Rendering is a
//! pure function of the request and the ops recipient: the same input always
//! produces byte-identical output, and no input can make it fail.

use serde::Serialize;
use serde_json::{Value, json};
use tera::{Context, Tera};
use thiserror::Error;

use crate::request::{
    DonationThanks, FulfillmentIssue, NotificationKind, NotificationRequest, OpsFailure,
};

/// Subject line for donation receipts.
pub const DONATION_SUBJECT: &str = "Thank you for your donation";

const OPS_FAILURE_TEMPLATE: &str = "ops_failure.html";
const FULFILLMENT_ISSUE_TEMPLATE: &str = "fulfillment_issue.html";
const DONATION_THANKS_TEMPLATE: &str = "donation_thanks.html";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load templates: {0}")]
    Template(String),
}

/// A message ready for the delivery dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMessage {
    pub kind: NotificationKind,
    pub subject: String,
    pub html: String,
    /// Empty when no delivery address could be resolved.
    pub recipients: Vec<String>,
    /// Structured summary for dry-run and failure logs.
    pub details: Value,
}

/// Renders notification requests into messages.
#[derive(Debug, Clone)]
pub struct Renderer {
    engine: Tera,
    ops_recipient: Option<String>,
}

impl Renderer {
    /// Load the embedded templates.
    pub fn new(ops_recipient: Option<String>) -> Result<Self, RenderError> {
        let mut engine = Tera::default();
        engine
            .add_raw_templates(vec![
                (OPS_FAILURE_TEMPLATE, include_str!("../templates/ops_failure.html")),
                (
                    FULFILLMENT_ISSUE_TEMPLATE,
                    include_str!("../templates/fulfillment_issue.html"),
                ),
                (
                    DONATION_THANKS_TEMPLATE,
                    include_str!("../templates/donation_thanks.html"),
                ),
            ])
            .map_err(|e| RenderError::Template(e.to_string()))?;

        Ok(Self {
            engine,
            ops_recipient: ops_recipient
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        })
    }

    pub fn render(&self, request: &NotificationRequest) -> RenderedMessage {
        match request {
            NotificationRequest::OpsFailure(r) => self.render_ops_failure(r),
            NotificationRequest::FulfillmentIssue(r) => self.render_fulfillment_issue(r),
            NotificationRequest::DonationThanks(r) => self.render_donation_thanks(r),
        }
    }

    fn ops_recipients(&self) -> Vec<String> {
        self.ops_recipient.iter().cloned().collect()
    }

    /// Templates are fixed at compile time, so a render error is a bug in a
    /// template. Log it and ship the subject alone rather than dropping the alert.
    fn render_body(&self, template: &str, context: &Context, subject: &str) -> String {
        match self.engine.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!(template, error = %e, "Failed to render notification template");
                let mut fallback = Context::new();
                fallback.insert("subject", subject);
                Tera::one_off("<p>{{ subject }}</p>", &fallback, true).unwrap_or_default()
            }
        }
    }

    fn render_ops_failure(&self, req: &OpsFailure) -> RenderedMessage {
        // serde_json::Map iterates in a stable order, so this is deterministic.
        let context_json = serde_json::to_string_pretty(&req.context).unwrap_or_default();
        let subject = subject_line(&format!("URGENT: {}", req.topic));

        let mut context = Context::new();
        context.insert("topic", &req.topic);
        context.insert("message", &req.message);
        context.insert("context_json", &context_json);

        RenderedMessage {
            kind: NotificationKind::OpsFailure,
            html: self.render_body(OPS_FAILURE_TEMPLATE, &context, &subject),
            subject,
            recipients: self.ops_recipients(),
            details: json!({
                "topic": req.topic,
                "message": req.message,
                "context": req.context,
            }),
        }
    }

    fn render_fulfillment_issue(&self, req: &FulfillmentIssue) -> RenderedMessage {
        let subject = subject_line(&format!("FULFILLMENT ATTENTION — {}", req.session_id));

        let mut context = Context::new();
        context.insert("session_id", &req.session_id);
        context.insert("name", &req.name);
        context.insert("email", &req.email);
        context.insert("address", &req.shipping_address.summary());
        context.insert("issues", &req.issues);

        RenderedMessage {
            kind: NotificationKind::FulfillmentIssue,
            html: self.render_body(FULFILLMENT_ISSUE_TEMPLATE, &context, &subject),
            subject,
            recipients: self.ops_recipients(),
            details: json!({
                "session_id": req.session_id,
                "email": req.email,
                "shipping_address": req.shipping_address,
                "issues": req.issues,
            }),
        }
    }

    fn render_donation_thanks(&self, req: &DonationThanks) -> RenderedMessage {
        let subject = DONATION_SUBJECT.to_string();

        let mut context = Context::new();
        context.insert("name", req.name.trim());
        context.insert("amount", &format_amount(req.amount_pence, &req.currency));

        let email = req.email.trim();
        let recipients = if email.is_empty() {
            Vec::new()
        } else {
            vec![email.to_string()]
        };

        RenderedMessage {
            kind: NotificationKind::DonationThanks,
            html: self.render_body(DONATION_THANKS_TEMPLATE, &context, &subject),
            subject,
            recipients,
            details: json!({
                "amount_pence": req.amount_pence,
                "currency": req.currency,
            }),
        }
    }
}

/// Format minor units as a display amount, e.g. `2550, "gbp"` → `£25.50`.
///
/// Currencies without a known symbol render as `25.50 CHF`.
pub fn format_amount(minor_units: i64, currency: &str) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    let major = format!("{}.{:02}", abs / 100, abs % 100);

    let code = currency.trim().to_lowercase();
    let symbol = match code.as_str() {
        "gbp" => Some("£"),
        "usd" => Some("$"),
        "eur" => Some("€"),
        _ => None,
    };

    match symbol {
        Some(symbol) => format!("{sign}{symbol}{major}"),
        None => format!("{sign}{major} {}", code.to_uppercase()),
    }
}

/// Subjects are a single header line.
fn subject_line(raw: &str) -> String {
    raw.replace(['\r', '\n'], " ")
}

//! PayPal Orders v2 payloads and response parsing. The HTTP calls live in the Worker layer.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;

use crate::config::PayPalConfig;
use crate::util::format_cents;

pub const CAPTURE_COMPLETED: &str = "PAYMENT.CAPTURE.COMPLETED";

/// Headers PayPal signs webhook deliveries with, in the order the verify API names them.
pub const TRANSMISSION_HEADERS: &[(&str, &str)] = &[
    ("PAYPAL-AUTH-ALGO", "auth_algo"),
    ("PAYPAL-CERT-URL", "cert_url"),
    ("PAYPAL-TRANSMISSION-ID", "transmission_id"),
    ("PAYPAL-TRANSMISSION-SIG", "transmission_sig"),
    ("PAYPAL-TRANSMISSION-TIME", "transmission_time"),
];

pub fn token_url(cfg: &PayPalConfig) -> String {
    format!("{}/v1/oauth2/token", cfg.api_base)
}

pub fn orders_url(cfg: &PayPalConfig) -> String {
    format!("{}/v2/checkout/orders", cfg.api_base)
}

pub fn capture_url(cfg: &PayPalConfig, paypal_order_id: &str) -> String {
    format!("{}/v2/checkout/orders/{paypal_order_id}/capture", cfg.api_base)
}

pub fn verify_webhook_url(cfg: &PayPalConfig) -> String {
    format!("{}/v1/notifications/verify-webhook-signature", cfg.api_base)
}

/// `Authorization` value for the client-credentials token request.
pub fn basic_auth(cfg: &PayPalConfig) -> String {
    let raw = format!("{}:{}", cfg.client_id, cfg.secret);
    format!("Basic {}", STANDARD.encode(raw))
}

#[derive(Debug, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
}

pub fn create_order_body(amount_cents: i64, custom_id: &str, app_url: &str) -> Value {
    serde_json::json!({
        "intent": "CAPTURE",
        "purchase_units": [{
            "amount": {
                "currency_code": "USD",
                "value": format_cents(amount_cents),
            },
            "custom_id": custom_id,
        }],
        "application_context": {
            "return_url": format!("{app_url}/order-success"),
            "cancel_url": format!("{app_url}/cart"),
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatedOrder {
    pub id: String,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl CreatedOrder {
    pub fn approval_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href.as_str())
    }
}

/// The parts of a capture response the checkout flow reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub status: String,
    /// Capture id when present, otherwise the PayPal order id.
    pub transaction_id: String,
    pub custom_id: Option<String>,
}

fn non_empty(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Capture {
    pub fn from_response(data: &Value) -> Self {
        let unit = data.pointer("/purchase_units/0");
        let first_capture = unit.and_then(|u| u.pointer("/payments/captures/0"));

        let custom_id = non_empty(unit.and_then(|u| u.get("custom_id")))
            .or_else(|| non_empty(first_capture.and_then(|c| c.get("custom_id"))))
            .or_else(|| non_empty(unit.and_then(|u| u.get("reference_id"))));

        let transaction_id = non_empty(first_capture.and_then(|c| c.get("id")))
            .or_else(|| non_empty(data.get("id")))
            .unwrap_or_default();

        Self {
            status: non_empty(data.get("status")).unwrap_or_default(),
            transaction_id,
            custom_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }

    /// Local order id: whatever PayPal echoed back, else the client-supplied one.
    pub fn local_order_id(&self, fallback: Option<&str>) -> Option<String> {
        self.custom_id.clone().or_else(|| {
            fallback
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    }
}

/// What a webhook delivery asks us to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    MarkPaid {
        order_id: String,
        transaction_id: String,
    },
    Ignore(String),
}

pub fn webhook_action(event: &Value) -> WebhookAction {
    let Some(event_type) = event.get("event_type").and_then(Value::as_str) else {
        return WebhookAction::Ignore("missing event_type".to_string());
    };
    let Some(resource) = event.get("resource").filter(|r| r.is_object()) else {
        return WebhookAction::Ignore("missing resource".to_string());
    };
    if event_type != CAPTURE_COMPLETED {
        return WebhookAction::Ignore(format!("event {event_type} not handled"));
    }
    let Some(order_id) = non_empty(resource.get("custom_id")) else {
        return WebhookAction::Ignore("capture has no custom_id".to_string());
    };
    WebhookAction::MarkPaid {
        order_id,
        transaction_id: non_empty(resource.get("id")).unwrap_or_default(),
    }
}

/// Body for `verify-webhook-signature`. `None` when a transmission header is missing.
pub fn verify_webhook_body<F>(webhook_id: &str, event: &Value, header: F) -> Option<Value>
where
    F: Fn(&str) -> Option<String>,
{
    let mut body = serde_json::Map::new();
    for (name, field) in TRANSMISSION_HEADERS {
        body.insert(field.to_string(), Value::String(header(name)?));
    }
    body.insert("webhook_id".to_string(), Value::String(webhook_id.to_string()));
    body.insert("webhook_event".to_string(), event.clone());
    Some(Value::Object(body))
}

pub fn webhook_verified(response: &Value) -> bool {
    response.get("verification_status").and_then(Value::as_str) == Some("SUCCESS")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn cfg() -> PayPalConfig {
        PayPalConfig {
            client_id: "id".into(),
            secret: "sec".into(),
            api_base: "https://api-m.sandbox.paypal.com".into(),
            webhook_id: None,
        }
    }

    #[test]
    fn urls_and_auth() {
        assert_eq!(
            capture_url(&cfg(), "PP1"),
            "https://api-m.sandbox.paypal.com/v2/checkout/orders/PP1/capture"
        );
        assert_eq!(basic_auth(&cfg()), "Basic aWQ6c2Vj");
    }

    #[test]
    fn order_body_formats_amount() {
        let body = create_order_body(1999, "order_1_abc", "https://shop.io");
        assert_eq!(body["intent"], "CAPTURE");
        assert_eq!(body["purchase_units"][0]["amount"]["value"], "19.99");
        assert_eq!(body["purchase_units"][0]["amount"]["currency_code"], "USD");
        assert_eq!(body["purchase_units"][0]["custom_id"], "order_1_abc");
        assert_eq!(
            body["application_context"]["return_url"],
            "https://shop.io/order-success"
        );
        assert_eq!(body["application_context"]["cancel_url"], "https://shop.io/cart");
    }

    #[test]
    fn approval_link() {
        let order: CreatedOrder = serde_json::from_value(json!({
            "id": "PP1",
            "links": [
                {"href": "https://x/self", "rel": "self"},
                {"href": "https://x/approve", "rel": "approve"}
            ]
        }))
        .unwrap();
        assert_eq!(order.approval_url(), Some("https://x/approve"));
    }

    #[test]
    fn custom_id_resolution_order() {
        let c = Capture::from_response(&json!({
            "id": "PP1",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "ref",
                "payments": {"captures": [{"id": "CAP1", "custom_id": "from_capture"}]}
            }]
        }));
        assert_eq!(c.custom_id.as_deref(), Some("from_capture"));
        assert_eq!(c.transaction_id, "CAP1");
        assert!(c.is_completed());

        let c = Capture::from_response(&json!({
            "id": "PP1",
            "status": "COMPLETED",
            "purchase_units": [{"custom_id": "top", "reference_id": "ref"}]
        }));
        assert_eq!(c.custom_id.as_deref(), Some("top"));
        assert_eq!(c.transaction_id, "PP1");

        let c = Capture::from_response(&json!({
            "id": "PP1",
            "status": "PENDING",
            "purchase_units": [{"reference_id": "ref"}]
        }));
        assert_eq!(c.custom_id.as_deref(), Some("ref"));
        assert!(!c.is_completed());
    }

    #[test]
    fn falls_back_to_request_order_id() {
        let c = Capture::from_response(&json!({"id": "PP1", "status": "COMPLETED"}));
        assert_eq!(c.local_order_id(Some("order_9")), Some("order_9".into()));
        assert_eq!(c.local_order_id(Some(" ")), None);
        assert_eq!(c.local_order_id(None), None);
    }

    #[test]
    fn webhook_actions() {
        let paid = webhook_action(&json!({
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": {"id": "CAP1", "custom_id": "order_1"}
        }));
        assert_eq!(
            paid,
            WebhookAction::MarkPaid {
                order_id: "order_1".into(),
                transaction_id: "CAP1".into()
            }
        );

        assert!(matches!(
            webhook_action(&json!({"event_type": "CHECKOUT.ORDER.APPROVED", "resource": {}})),
            WebhookAction::Ignore(_)
        ));
        assert!(matches!(
            webhook_action(&json!({"event_type": CAPTURE_COMPLETED, "resource": {"id": "x"}})),
            WebhookAction::Ignore(_)
        ));
        assert!(matches!(webhook_action(&json!({})), WebhookAction::Ignore(_)));
    }

    #[test]
    fn verify_body_requires_all_headers() {
        let event = json!({"id": "WH-1"});
        let full = |_: &str| Some("v".to_string());
        let body = verify_webhook_body("WID", &event, full).unwrap();
        assert_eq!(body["webhook_id"], "WID");
        assert_eq!(body["auth_algo"], "v");
        assert_eq!(body["webhook_event"]["id"], "WH-1");

        let partial = |name: &str| (name != "PAYPAL-CERT-URL").then(|| "v".to_string());
        assert!(verify_webhook_body("WID", &event, partial).is_none());

        assert!(webhook_verified(&json!({"verification_status": "SUCCESS"})));
        assert!(!webhook_verified(&json!({"verification_status": "FAILURE"})));
    }
}

/// Payment-gateway webhook events
///
/// Raw events arrive as `{id, type, data: {object}}`. Subscription lifecycle
/// events carry a subscription object, payment events carry an invoice. Both
/// are narrowed into [`SubscriptionEvent`]; every other verified event type
/// becomes [`GatewayEvent::Ignored`].

use serde::Deserialize;

use super::error::BillingError;

/// Variant of a subscription-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEventKind {
    Created,
    Updated,
    Deleted,
    PaymentSucceeded,
    PaymentFailed,
}

impl SubscriptionEventKind {
    /// Maps a gateway event type to a variant
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "customer.subscription.created" => Some(Self::Created),
            "customer.subscription.updated" => Some(Self::Updated),
            "customer.subscription.deleted" => Some(Self::Deleted),
            "invoice.payment_succeeded" => Some(Self::PaymentSucceeded),
            "invoice.payment_failed" => Some(Self::PaymentFailed),
            _ => None,
        }
    }

    pub fn as_event_type(&self) -> &'static str {
        match self {
            Self::Created => "customer.subscription.created",
            Self::Updated => "customer.subscription.updated",
            Self::Deleted => "customer.subscription.deleted",
            Self::PaymentSucceeded => "invoice.payment_succeeded",
            Self::PaymentFailed => "invoice.payment_failed",
        }
    }

    fn is_invoice(&self) -> bool {
        matches!(self, Self::PaymentSucceeded | Self::PaymentFailed)
    }
}

/// A verified event that may change a user's billing projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEvent {
    /// Gateway event id, used for log correlation
    pub id: String,
    pub kind: SubscriptionEventKind,
    pub customer_id: String,

    /// Always present for lifecycle events; optional on invoices
    pub subscription_id: Option<String>,

    /// Status string in the gateway's vocabulary
    pub status: String,
}

/// Result of parsing a verified webhook body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Subscription(SubscriptionEvent),
    Ignored { id: String, event_type: String },
}

impl GatewayEvent {
    pub fn id(&self) -> &str {
        match self {
            GatewayEvent::Subscription(e) => &e.id,
            GatewayEvent::Ignored { id, .. } => id,
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            GatewayEvent::Subscription(e) => e.kind.as_event_type(),
            GatewayEvent::Ignored { event_type, .. } => event_type,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    customer: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    customer: String,
    subscription: Option<String>,
    #[serde(default)]
    status: Option<String>,

    /// Newer API versions move the subscription id under
    /// `parent.subscription_details`
    #[serde(default)]
    parent: Option<InvoiceParent>,
}

#[derive(Debug, Deserialize)]
struct InvoiceParent {
    #[serde(default)]
    subscription_details: Option<InvoiceSubscriptionDetails>,
}

#[derive(Debug, Deserialize)]
struct InvoiceSubscriptionDetails {
    #[serde(default)]
    subscription: Option<String>,
}

impl InvoiceObject {
    fn subscription_id(&self) -> Option<String> {
        self.subscription
            .as_deref()
            .or_else(|| {
                self.parent
                    .as_ref()
                    .and_then(|p| p.subscription_details.as_ref())
                    .and_then(|d| d.subscription.as_deref())
            })
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

fn invalid(e: serde_json::Error) -> BillingError {
    BillingError::InvalidPayload(e.to_string())
}

/// Parses a webhook body whose signature has already been verified
pub fn parse_event(payload: &[u8]) -> Result<GatewayEvent, BillingError> {
    let raw: RawEvent = serde_json::from_slice(payload).map_err(invalid)?;

    let Some(kind) = SubscriptionEventKind::from_event_type(&raw.event_type) else {
        return Ok(GatewayEvent::Ignored {
            id: raw.id,
            event_type: raw.event_type,
        });
    };

    let event = if kind.is_invoice() {
        let invoice: InvoiceObject = serde_json::from_value(raw.data.object).map_err(invalid)?;
        SubscriptionEvent {
            id: raw.id,
            kind,
            subscription_id: invoice.subscription_id(),
            customer_id: invoice.customer,
            status: invoice.status.unwrap_or_default(),
        }
    } else {
        let subscription: SubscriptionObject =
            serde_json::from_value(raw.data.object).map_err(invalid)?;
        SubscriptionEvent {
            id: raw.id,
            kind,
            customer_id: subscription.customer,
            subscription_id: Some(subscription.id),
            status: subscription.status,
        }
    };

    Ok(GatewayEvent::Subscription(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_parse_subscription_updated() {
        let payload = body(json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": {"object": {"id": "sub_1", "customer": "cus_1", "status": "past_due", "items": {}}}
        }));

        let event = parse_event(&payload).unwrap();
        assert_eq!(
            event,
            GatewayEvent::Subscription(SubscriptionEvent {
                id: "evt_1".into(),
                kind: SubscriptionEventKind::Updated,
                customer_id: "cus_1".into(),
                subscription_id: Some("sub_1".into()),
                status: "past_due".into(),
            })
        );
        assert_eq!(event.event_type(), "customer.subscription.updated");
    }

    #[test]
    fn test_parse_invoice_without_subscription() {
        let payload = body(json!({
            "id": "evt_2",
            "type": "invoice.payment_failed",
            "data": {"object": {"customer": "cus_1", "subscription": null, "status": "open"}}
        }));

        match parse_event(&payload).unwrap() {
            GatewayEvent::Subscription(e) => {
                assert_eq!(e.kind, SubscriptionEventKind::PaymentFailed);
                assert_eq!(e.subscription_id, None);
                assert_eq!(e.status, "open");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_invoice_with_parent_subscription_details() {
        let payload = body(json!({
            "id": "evt_5",
            "type": "invoice.payment_failed",
            "data": {"object": {
                "customer": "cus_1",
                "status": "open",
                "parent": {"subscription_details": {"subscription": "sub_1"}}
            }}
        }));

        match parse_event(&payload).unwrap() {
            GatewayEvent::Subscription(e) => {
                assert_eq!(e.kind, SubscriptionEventKind::PaymentFailed);
                assert_eq!(e.customer_id, "cus_1");
                assert_eq!(e.subscription_id.as_deref(), Some("sub_1"));
            }
            other => panic!("unexpected event {:?}", other),
        }

        let quote_parent = body(json!({
            "id": "evt_6",
            "type": "invoice.payment_succeeded",
            "data": {"object": {
                "customer": "cus_1",
                "status": "paid",
                "parent": {"quote_details": {"quote": "qt_1"}}
            }}
        }));
        match parse_event(&quote_parent).unwrap() {
            GatewayEvent::Subscription(e) => assert_eq!(e.subscription_id, None),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let payload = body(json!({
            "id": "evt_3",
            "type": "charge.refunded",
            "data": {"object": {"id": "ch_1"}}
        }));

        assert_eq!(
            parse_event(&payload).unwrap(),
            GatewayEvent::Ignored {
                id: "evt_3".into(),
                event_type: "charge.refunded".into()
            }
        );
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(parse_event(b"not json"), Err(BillingError::InvalidPayload(_))));

        let missing_customer = body(json!({
            "id": "evt_4",
            "type": "customer.subscription.created",
            "data": {"object": {"id": "sub_1", "status": "active"}}
        }));
        assert!(matches!(
            parse_event(&missing_customer),
            Err(BillingError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_event_type_round_trip() {
        for kind in [
            SubscriptionEventKind::Created,
            SubscriptionEventKind::Updated,
            SubscriptionEventKind::Deleted,
            SubscriptionEventKind::PaymentSucceeded,
            SubscriptionEventKind::PaymentFailed,
        ] {
            assert_eq!(SubscriptionEventKind::from_event_type(kind.as_event_type()), Some(kind));
        }
    }
}

/// Local projection of gateway subscription state
///
/// The projection is the pair of billing columns the reconciler owns on the
/// user row (the customer id is set once at checkout and never changes here).
/// [`transition_for`] maps an event to the projection it leaves behind. It is
/// a pure function of the event alone: applying the same event twice yields
/// the same state, and the last event applied wins.
///
/// | Event                               | active            | subscription id |
/// |-------------------------------------|-------------------|-----------------|
/// | created / updated                   | status == active  | event's id      |
/// | deleted                             | false             | cleared         |
/// | payment succeeded, with subscription| true              | event's id      |
/// | payment failed, with subscription   | false             | event's id      |
/// | payment event without subscription  | unchanged         | unchanged       |

use serde::Serialize;

use super::events::{SubscriptionEvent, SubscriptionEventKind};

/// Gateway status that counts as an active subscription for lifecycle events
pub const ACTIVE_STATUS: &str = "active";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingProjection {
    pub has_active_subscription: bool,
    pub external_subscription_id: Option<String>,
}

/// What an event does to a projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Set(BillingProjection),
    Unchanged,
}

impl Transition {
    /// Projection after applying this transition to `current`
    pub fn apply(&self, current: &BillingProjection) -> BillingProjection {
        match self {
            Transition::Set(next) => next.clone(),
            Transition::Unchanged => current.clone(),
        }
    }
}

/// Computes the transition caused by `event`
pub fn transition_for(event: &SubscriptionEvent) -> Transition {
    use SubscriptionEventKind::*;

    let set = |active: bool, subscription_id: Option<String>| {
        Transition::Set(BillingProjection {
            has_active_subscription: active,
            external_subscription_id: subscription_id,
        })
    };

    match (event.kind, &event.subscription_id) {
        (Created | Updated, id) => set(event.status == ACTIVE_STATUS, id.clone()),
        (Deleted, _) => set(false, None),
        (PaymentSucceeded, Some(id)) => set(true, Some(id.clone())),
        (PaymentFailed, Some(id)) => set(false, Some(id.clone())),
        (PaymentSucceeded | PaymentFailed, None) => Transition::Unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubscriptionEventKind::*;

    fn event(kind: SubscriptionEventKind, subscription: Option<&str>, status: &str) -> SubscriptionEvent {
        SubscriptionEvent {
            id: "evt_test".into(),
            kind,
            customer_id: "cus_1".into(),
            subscription_id: subscription.map(String::from),
            status: status.into(),
        }
    }

    fn projection(active: bool, subscription: Option<&str>) -> BillingProjection {
        BillingProjection {
            has_active_subscription: active,
            external_subscription_id: subscription.map(String::from),
        }
    }

    #[test]
    fn test_transition_table() {
        let priors = [
            projection(false, None),
            projection(true, Some("sub_old")),
            projection(false, Some("sub_old")),
        ];

        // (event, expected projection; None means the prior is kept)
        let cases: Vec<(SubscriptionEvent, Option<BillingProjection>)> = vec![
            (event(Created, Some("sub_1"), "active"), Some(projection(true, Some("sub_1")))),
            (event(Created, Some("sub_1"), "incomplete"), Some(projection(false, Some("sub_1")))),
            (event(Updated, Some("sub_1"), "active"), Some(projection(true, Some("sub_1")))),
            (event(Updated, Some("sub_1"), "past_due"), Some(projection(false, Some("sub_1")))),
            (event(Updated, Some("sub_1"), "trialing"), Some(projection(false, Some("sub_1")))),
            (event(Deleted, Some("sub_1"), "canceled"), Some(projection(false, None))),
            (event(PaymentSucceeded, Some("sub_1"), "paid"), Some(projection(true, Some("sub_1")))),
            (event(PaymentSucceeded, None, "paid"), None),
            (event(PaymentFailed, Some("sub_1"), "open"), Some(projection(false, Some("sub_1")))),
            (event(PaymentFailed, None, "open"), None),
        ];

        for prior in &priors {
            for (ev, expected) in &cases {
                let next = transition_for(ev).apply(prior);
                let expected = expected.clone().unwrap_or_else(|| prior.clone());
                assert_eq!(next, expected, "{:?} from {:?}", ev, prior);
            }
        }
    }

    #[test]
    fn test_idempotent() {
        let ev = event(Created, Some("sub_1"), "active");
        let once = transition_for(&ev).apply(&BillingProjection::default());
        let twice = transition_for(&ev).apply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_out_of_order_delete_then_create_keeps_created_state() {
        let deleted = event(Deleted, Some("sub_1"), "canceled");
        let created = event(Created, Some("sub_1"), "active");

        let state = transition_for(&deleted).apply(&projection(true, Some("sub_1")));
        let state = transition_for(&created).apply(&state);

        assert_eq!(state, projection(true, Some("sub_1")));
    }

    #[test]
    fn test_payment_without_subscription_is_unchanged() {
        assert_eq!(
            transition_for(&event(PaymentSucceeded, None, "paid")),
            Transition::Unchanged
        );
    }
}

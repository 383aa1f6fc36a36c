use serde::Serialize;

use entity::study_resource::{self, MEMBERSHIP_PRICE_CENTS};

pub const TYPE_MINDMAP: &str = "Mindmap";
pub const TYPE_SYLLABUS_ANALYSIS: &str = "Syllabus Analysis";

/// Access tier derived from a resource's `price_cents`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessTier {
    Free,
    Membership,
    Paid,
    /// Negative prices other than the membership marker.
    Unavailable,
}

impl AccessTier {
    pub fn from_price_cents(price_cents: i64) -> Self {
        match price_cents {
            0 => AccessTier::Free,
            MEMBERSHIP_PRICE_CENTS => AccessTier::Membership,
            p if p > 0 => AccessTier::Paid,
            _ => AccessTier::Unavailable,
        }
    }

    pub fn of(resource: &study_resource::Model) -> Self {
        Self::from_price_cents(resource.price_cents)
    }
}

/// What is known about the caller when a rule is evaluated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewer {
    pub authenticated: bool,
    pub has_membership: bool,
    pub has_paid_item: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NotLoggedIn,
    MembershipRequired,
    AccessDenied,
}

impl DenyReason {
    pub fn message(self) -> &'static str {
        match self {
            DenyReason::NotLoggedIn => "Please log in to access this content",
            DenyReason::MembershipRequired => "Membership required to access mindmap content",
            DenyReason::AccessDenied => "Access denied",
        }
    }
}

pub fn allows(tier: AccessTier, viewer: Viewer) -> bool {
    if !viewer.authenticated {
        return false;
    }
    match tier {
        AccessTier::Free => true,
        AccessTier::Membership => viewer.has_membership,
        AccessTier::Paid => viewer.has_paid_item,
        AccessTier::Unavailable => false,
    }
}

/// Outcome reported by `check-resource-access`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub has_access: bool,
    pub reason: Option<DenyReason>,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

impl AccessDecision {
    pub fn granted(resource_type: Option<String>) -> Self {
        Self {
            has_access: true,
            reason: None,
            message: "Access granted",
            resource_type,
        }
    }

    pub fn denied(reason: DenyReason, resource_type: Option<String>) -> Self {
        Self {
            has_access: false,
            reason: Some(reason),
            message: reason.message(),
            resource_type,
        }
    }
}

/// Evaluate a concrete resource for an authenticated viewer, choosing the
/// denial reason from the resource type.
pub fn decide_for_resource(resource: &study_resource::Model, viewer: Viewer) -> AccessDecision {
    let resource_type = Some(resource.r#type.clone());
    if !viewer.authenticated {
        return AccessDecision::denied(DenyReason::NotLoggedIn, resource_type);
    }
    if allows(AccessTier::of(resource), viewer) {
        return AccessDecision::granted(resource_type);
    }
    let reason = if resource.r#type == TYPE_MINDMAP {
        DenyReason::MembershipRequired
    } else {
        DenyReason::AccessDenied
    };
    AccessDecision::denied(reason, resource_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const ANON: Viewer = Viewer {
        authenticated: false,
        has_membership: true,
        has_paid_item: true,
    };
    const PLAIN: Viewer = Viewer {
        authenticated: true,
        has_membership: false,
        has_paid_item: false,
    };
    const MEMBER: Viewer = Viewer {
        authenticated: true,
        has_membership: true,
        has_paid_item: false,
    };
    const BUYER: Viewer = Viewer {
        authenticated: true,
        has_membership: false,
        has_paid_item: true,
    };

    #[rstest]
    #[case(0, AccessTier::Free)]
    #[case(-100, AccessTier::Membership)]
    #[case(999, AccessTier::Paid)]
    #[case(-1, AccessTier::Unavailable)]
    #[case(-200, AccessTier::Unavailable)]
    fn tier_from_price(#[case] cents: i64, #[case] tier: AccessTier) {
        assert_eq!(AccessTier::from_price_cents(cents), tier);
    }

    #[rstest]
    #[case(AccessTier::Free, ANON, false)]
    #[case(AccessTier::Free, PLAIN, true)]
    #[case(AccessTier::Membership, ANON, false)]
    #[case(AccessTier::Membership, PLAIN, false)]
    #[case(AccessTier::Membership, MEMBER, true)]
    #[case(AccessTier::Paid, MEMBER, false)]
    #[case(AccessTier::Paid, BUYER, true)]
    #[case(AccessTier::Unavailable, ANON, false)]
    #[case(AccessTier::Unavailable, Viewer { authenticated: true, has_membership: true, has_paid_item: true }, false)]
    fn rule_table(#[case] tier: AccessTier, #[case] viewer: Viewer, #[case] expected: bool) {
        assert_eq!(allows(tier, viewer), expected);
    }

    fn resource(price_cents: i64, kind: &str) -> study_resource::Model {
        study_resource::Model {
            id: 1,
            title: "t".into(),
            description: None,
            price_cents,
            r#type: kind.into(),
            level: "AS".into(),
            chapter: None,
            file_path: None,
            image: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn denial_reason_follows_type() {
        let d = decide_for_resource(&resource(-100, TYPE_MINDMAP), PLAIN);
        assert_eq!(d.reason, Some(DenyReason::MembershipRequired));

        let d = decide_for_resource(&resource(500, "Notes"), PLAIN);
        assert_eq!(d.reason, Some(DenyReason::AccessDenied));

        let d = decide_for_resource(&resource(0, "Notes"), ANON);
        assert_eq!(d.reason, Some(DenyReason::NotLoggedIn));
    }

    #[test]
    fn decision_serializes_camel_case() {
        let v = serde_json::to_value(AccessDecision::denied(DenyReason::MembershipRequired, None))
            .unwrap();
        assert_eq!(v["hasAccess"], false);
        assert_eq!(v["reason"], "membership_required");
        assert!(v.get("resourceType").is_none());
    }
}

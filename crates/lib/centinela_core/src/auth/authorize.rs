//! Role authorization decision.
//!
//! A pure function over a route policy and the caller's roles. No request,
//! store or clock is involved, so every branch is testable directly.

use serde::{Deserialize, Serialize};

use super::AuthError;

/// Access policy declared by a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    /// Public routes skip the decision entirely.
    #[serde(default)]
    pub public: bool,
    /// Any one of these roles grants access. `Some(vec![])` grants nothing.
    #[serde(default)]
    pub required_roles: Option<Vec<String>>,
    /// Admin override, consulted only when no required roles are declared.
    #[serde(default)]
    pub admin_role: Option<String>,
}

impl RoutePolicy {
    pub fn public() -> Self {
        Self {
            public: true,
            ..Self::default()
        }
    }

    /// Any authenticated caller.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn require_any<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_roles: Some(roles.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn admin(role: impl Into<String>) -> Self {
        Self {
            admin_role: Some(role.into()),
            ..Self::default()
        }
    }
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    PublicRoute,
    NoRestriction,
    AdminOverride,
    NotAdmin,
    MatchedRole(String),
    NoMatchingRole,
}

impl Reason {
    pub fn describe(&self) -> String {
        match self {
            Reason::PublicRoute => "route is public".into(),
            Reason::NoRestriction => "route declares no role restriction".into(),
            Reason::AdminOverride => "caller holds the admin role".into(),
            Reason::NotAdmin => "route is admin-only".into(),
            Reason::MatchedRole(role) => format!("caller holds required role {role}"),
            Reason::NoMatchingRole => "caller holds none of the required roles".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Reason,
}

impl Decision {
    fn allow(reason: Reason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: Reason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }

    /// Denials become [`AuthError::Unauthorized`].
    pub fn into_result(self) -> Result<(), AuthError> {
        if self.allowed {
            Ok(())
        } else {
            Err(AuthError::Unauthorized(self.reason.describe()))
        }
    }
}

/// Decide whether `caller_roles` satisfies `policy`.
///
/// | required roles | admin role | outcome                               |
/// |----------------|------------|---------------------------------------|
/// | unset          | unset      | allow                                 |
/// | unset          | set        | allow iff admin ∈ caller roles        |
/// | set            | any        | allow iff caller ∩ required ≠ ∅       |
pub fn authorize(policy: &RoutePolicy, caller_roles: &[String]) -> Decision {
    if policy.public {
        return Decision::allow(Reason::PublicRoute);
    }
    match (&policy.required_roles, &policy.admin_role) {
        (None, None) => Decision::allow(Reason::NoRestriction),
        (None, Some(admin)) => {
            if caller_roles.contains(admin) {
                Decision::allow(Reason::AdminOverride)
            } else {
                Decision::deny(Reason::NotAdmin)
            }
        }
        (Some(required), _) => match required.iter().find(|r| caller_roles.contains(r)) {
            Some(role) => Decision::allow(Reason::MatchedRole(role.clone())),
            None => Decision::deny(Reason::NoMatchingRole),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(list: &[&str]) -> Vec<String> {
        list.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn basic_caller_denied_on_admin_route() {
        let policy = RoutePolicy::require_any(["ADMIN"]);
        let decision = authorize(&policy, &roles(&["BASIC"]));
        assert!(!decision.allowed);
        assert!(matches!(
            decision.into_result(),
            Err(AuthError::Unauthorized(_))
        ));
    }

    #[test]
    fn admin_and_basic_caller_allowed() {
        let policy = RoutePolicy::require_any(["ADMIN"]);
        let decision = authorize(&policy, &roles(&["ADMIN", "BASIC"]));
        assert_eq!(decision.reason, Reason::MatchedRole("ADMIN".into()));
        assert!(decision.into_result().is_ok());
    }

    #[test]
    fn unrestricted_route_allows_anyone() {
        assert!(authorize(&RoutePolicy::authenticated(), &[]).allowed);
        assert!(authorize(&RoutePolicy::authenticated(), &roles(&["BASIC"])).allowed);
    }

    #[test]
    fn admin_override_only() {
        let policy = RoutePolicy::admin("ADMIN");
        assert_eq!(
            authorize(&policy, &roles(&["ADMIN"])).reason,
            Reason::AdminOverride
        );
        assert_eq!(
            authorize(&policy, &roles(&["BASIC"])).reason,
            Reason::NotAdmin
        );
        assert!(!authorize(&policy, &[]).allowed);
    }

    #[test]
    fn required_roles_take_precedence_over_admin() {
        let policy = RoutePolicy {
            required_roles: Some(roles(&["EDITOR"])),
            admin_role: Some("ADMIN".into()),
            ..RoutePolicy::default()
        };
        assert!(!authorize(&policy, &roles(&["ADMIN"])).allowed);
        assert!(authorize(&policy, &roles(&["EDITOR"])).allowed);
    }

    #[test]
    fn empty_required_list_denies() {
        let policy = RoutePolicy::require_any(Vec::<String>::new());
        assert!(!authorize(&policy, &roles(&["ADMIN"])).allowed);
    }

    #[test]
    fn public_route_bypasses_everything() {
        let policy = RoutePolicy {
            public: true,
            required_roles: Some(roles(&["ADMIN"])),
            admin_role: None,
        };
        assert_eq!(authorize(&policy, &[]).reason, Reason::PublicRoute);
    }
}

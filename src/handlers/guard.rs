use crate::handlers::roles::RoleRegistry;
use crate::handlers::token::{Claims, TokenCodec};
use log::debug;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No usable token where one was required
    Unauthenticated,
    /// Valid token, role not in the required set
    Forbidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Claims are present when the operation required (and got) a token.
    Allow(Option<Claims>),
    Deny(DenyReason),
}

impl Decision {
    #[cfg(test)]
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
/// Any other scheme, or an empty token, counts as no token.
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let (scheme, token) = authorization?.trim().split_once(' ')?;
    let token = token.trim();
    if scheme == "Bearer" && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Allow/deny decision for one operation, ahead of its handler.
#[derive(Clone)]
pub struct AccessGuard {
    registry: Arc<RoleRegistry>,
    codec: Arc<TokenCodec>,
}

impl AccessGuard {
    pub fn new(registry: Arc<RoleRegistry>, codec: Arc<TokenCodec>) -> Self {
        AccessGuard { registry, codec }
    }

    pub fn decide(&self, operation_id: &str, authorization: Option<&str>) -> Decision {
        let requirement = match self.registry.requirement_for(operation_id) {
            Some(requirement) => requirement,
            None => return Decision::Allow(None),
        };

        let token = match bearer_token(authorization) {
            Some(token) => token,
            None => return Decision::Deny(DenyReason::Unauthenticated),
        };

        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Token rejected for {}: {}", operation_id, e);
                return Decision::Deny(DenyReason::Unauthenticated);
            }
        };

        match claims.known_role() {
            Some(role) if requirement.permits(role) => Decision::Allow(Some(claims)),
            _ => Decision::Deny(DenyReason::Forbidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::roles::OperationDecl;
    use crate::models::all_models::Role;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "guard-secret";

    const DECLS: &[OperationDecl] = &[
        ("login", None),
        ("createProduct", Some(&[Role::Admin])),
        ("findProduct", Some(&[Role::Admin, Role::User])),
    ];

    fn guard() -> AccessGuard {
        AccessGuard::new(
            Arc::new(RoleRegistry::build(DECLS).unwrap()),
            Arc::new(TokenCodec::new(SECRET, Duration::days(3))),
        )
    }

    fn bearer(role: Role) -> String {
        let codec = TokenCodec::new(SECRET, Duration::days(3));
        format!("Bearer {}", codec.issue(role, &role.to_string()).unwrap())
    }

    #[test]
    fn extracts_bearer_tokens_only() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("  Bearer   abc ")), Some("abc"));
        assert_eq!(bearer_token(None), None);
        assert_eq!(bearer_token(Some("")), None);
        assert_eq!(bearer_token(Some("Bearer")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(Some("bearer abc")), None);
    }

    #[test]
    fn public_operations_allow_anything() {
        let guard = guard();
        for header in [None, Some("garbage"), Some("Bearer garbage"), Some("Basic x")] {
            assert_eq!(guard.decide("login", header), Decision::Allow(None));
            assert_eq!(guard.decide("notDeclared", header), Decision::Allow(None));
        }
    }

    #[test]
    fn admin_token_may_create_user_token_may_not() {
        let guard = guard();

        let admin = guard.decide("createProduct", Some(bearer(Role::Admin).as_str()));
        match admin {
            Decision::Allow(Some(claims)) => assert_eq!(claims.role, "admin"),
            other => panic!("expected allow with claims, got {:?}", other),
        }

        assert_eq!(
            guard.decide("createProduct", Some(bearer(Role::User).as_str())),
            Decision::Deny(DenyReason::Forbidden)
        );
    }

    #[test]
    fn both_roles_may_read() {
        let guard = guard();
        assert!(guard.decide("findProduct", Some(bearer(Role::Admin).as_str())).is_allow());
        assert!(guard.decide("findProduct", Some(bearer(Role::User).as_str())).is_allow());
    }

    #[test]
    fn missing_or_wrong_scheme_is_unauthenticated() {
        let guard = guard();
        let token = bearer(Role::Admin);
        let raw = token.trim_start_matches("Bearer ");

        assert_eq!(
            guard.decide("createProduct", None),
            Decision::Deny(DenyReason::Unauthenticated)
        );
        assert_eq!(
            guard.decide("createProduct", Some(raw)),
            Decision::Deny(DenyReason::Unauthenticated)
        );
        assert_eq!(
            guard.decide("createProduct", Some(format!("Token {}", raw).as_str())),
            Decision::Deny(DenyReason::Unauthenticated)
        );
    }

    #[test]
    fn verification_failures_collapse_to_unauthenticated() {
        let guard = guard();

        let foreign = TokenCodec::new("someone-else", Duration::days(3))
            .issue(Role::Admin, "admin")
            .unwrap();
        let expired = TokenCodec::new(SECRET, Duration::days(3))
            .issue_at(Role::Admin, "admin", Utc::now() - Duration::days(5))
            .unwrap();

        for token in ["garbage", foreign.as_str(), expired.as_str()] {
            assert_eq!(
                guard.decide("createProduct", Some(format!("Bearer {}", token).as_str())),
                Decision::Deny(DenyReason::Unauthenticated)
            );
        }
    }

    #[test]
    fn unknown_role_in_valid_token_is_forbidden() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let token = encode(
            &Header::default(),
            &json!({ "role": "guest", "sub": "guest", "iat": 0, "exp": exp }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            guard().decide("findProduct", Some(format!("Bearer {}", token).as_str())),
            Decision::Deny(DenyReason::Forbidden)
        );
    }
}

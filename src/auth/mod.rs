//! Login and role scoping.
//!
//! [`CredentialStore`] verifies a username/password pair. [`UserDirectory`]
//! implements it over a JSON users file. [`UserScope`] is the ceiling on what
//! a logged-in user may select, derived once from the username at login.

mod users;

pub use users::{UserDirectory, UserEntry, hash_password};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AccessDeniedSnafu, Result};

/// Provinces large enough to be split into electoral sub-divisions.
pub const DESIGNATED_PROVINCES: [&str; 3] = ["GUAYAS", "MANABI", "PICHINCHA"];

/// Returns `true` if `province` is split into sub-divisions.
pub fn is_designated_province(province: &str) -> bool {
    let key = province.trim().to_uppercase();
    DESIGNATED_PROVINCES.contains(&key.as_str())
}

/// Label used in the source data for sub-division `number`.
pub fn sub_division_label(number: &str) -> String {
    format!("CIRCUNSCRIPCIÓN {}", number.trim().to_uppercase())
}

/// Widest selection a user is allowed to make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum UserScope {
    /// Any province, including all of them at once.
    Unrestricted,
    /// A single province and everything under it.
    Province { province: String },
    /// A single sub-division of a designated province.
    SubDivision {
        province: String,
        sub_division: String,
    },
}

impl UserScope {
    /// Derives the scope from a login name.
    ///
    /// The name is split on `_`:
    /// - any `admin` token → [`UserScope::Unrestricted`]
    /// - a designated province token alone (`guayas`) → that province
    /// - a designated province with a third token (`guayas_x_3`) → sub-division 3
    /// - anything else → the province named by the whole identity, uppercased
    ///
    /// # Errors
    ///
    /// Empty identities and designated-province identities without a
    /// sub-division number (`guayas_x`, `guayas_x_`) are rejected with [`crate::error::DashboardError::AccessDenied`].
    pub fn from_identity(identity: &str) -> Result<Self> {
        let identity = identity.trim();
        if identity.is_empty() {
            return AccessDeniedSnafu {
                identity,
                reason: "empty identity",
            }
            .fail();
        }

        let tokens: Vec<&str> = identity.split('_').collect();
        if tokens.iter().any(|t| t.eq_ignore_ascii_case("admin")) {
            return Ok(UserScope::Unrestricted);
        }

        let designated = tokens
            .iter()
            .map(|t| t.to_uppercase())
            .find(|t| DESIGNATED_PROVINCES.contains(&t.as_str()));

        match (designated, tokens.len()) {
            (Some(province), 1) => Ok(UserScope::Province { province }),
            (Some(_), _) if tokens.get(2).is_none_or(|n| n.trim().is_empty()) => {
                AccessDeniedSnafu {
                    identity,
                    reason: "sub-division identity is missing its number",
                }
                .fail()
            }
            (Some(province), _) => Ok(UserScope::SubDivision {
                province,
                sub_division: sub_division_label(tokens[2]),
            }),
            (None, _) => Ok(UserScope::Province {
                province: identity.to_uppercase(),
            }),
        }
    }

    pub fn allows_all_provinces(&self) -> bool {
        matches!(self, UserScope::Unrestricted)
    }

    /// The single province this user is limited to, if any.
    pub fn province(&self) -> Option<&str> {
        match self {
            UserScope::Unrestricted => None,
            UserScope::Province { province } | UserScope::SubDivision { province, .. } => {
                Some(province)
            }
        }
    }

    /// The single sub-division this user is limited to, if any.
    pub fn sub_division(&self) -> Option<&str> {
        match self {
            UserScope::SubDivision { sub_division, .. } => Some(sub_division),
            _ => None,
        }
    }
}

/// Verifies credentials against some user storage.
pub trait CredentialStore: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;

    /// Human-readable name for `username`, when the store has one.
    fn display_name(&self, username: &str) -> Option<String> {
        let _ = username;
        None
    }
}

/// A user that passed [`login`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub username: String,
    pub display_name: Option<String>,
    pub scope: UserScope,
}

/// Checks credentials, then derives the user's scope.
///
/// Nothing about the location data is touched here; callers load the table
/// only after this returns `Ok`.
pub fn login<S: CredentialStore + ?Sized>(
    store: &S,
    username: &str,
    password: &str,
) -> Result<AuthenticatedUser> {
    if !store.verify(username, password) {
        warn!(username, "Login rejected");
        return AccessDeniedSnafu {
            identity: username,
            reason: "incorrect username or password",
        }
        .fail();
    }

    let scope = UserScope::from_identity(username)?;
    info!(username, ?scope, "Login accepted");

    Ok(AuthenticatedUser {
        username: username.to_string(),
        display_name: store.display_name(username),
        scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;

    struct FixedStore;

    impl CredentialStore for FixedStore {
        fn verify(&self, _username: &str, password: &str) -> bool {
            password == "secret"
        }
    }

    #[test]
    fn test_admin_is_unrestricted() {
        assert_eq!(UserScope::from_identity("admin").unwrap(), UserScope::Unrestricted);
        assert_eq!(
            UserScope::from_identity("ops_admin").unwrap(),
            UserScope::Unrestricted
        );
    }

    #[test]
    fn test_designated_province_alone() {
        assert_eq!(
            UserScope::from_identity("guayas").unwrap(),
            UserScope::Province {
                province: "GUAYAS".into()
            }
        );
    }

    #[test]
    fn test_designated_province_with_sub_division() {
        let scope = UserScope::from_identity("guayas_x_3").unwrap();
        assert_eq!(
            scope,
            UserScope::SubDivision {
                province: "GUAYAS".into(),
                sub_division: "CIRCUNSCRIPCIÓN 3".into()
            }
        );
        assert_eq!(scope.province(), Some("GUAYAS"));
        assert_eq!(scope.sub_division(), Some("CIRCUNSCRIPCIÓN 3"));
    }

    #[test]
    fn test_designated_province_with_two_tokens_is_denied() {
        let err = UserScope::from_identity("pichincha_x").unwrap_err();
        assert!(matches!(err, DashboardError::AccessDenied { .. }));
    }

    #[test]
    fn test_designated_province_with_blank_number_is_denied() {
        for identity in ["guayas_x_", "manabi_x_ "] {
            let err = UserScope::from_identity(identity).unwrap_err();
            assert!(matches!(err, DashboardError::AccessDenied { .. }), "{identity}");
        }
    }

    #[test]
    fn test_other_identity_is_uppercased_province() {
        assert_eq!(
            UserScope::from_identity("azuay").unwrap(),
            UserScope::Province {
                province: "AZUAY".into()
            }
        );
    }

    #[test]
    fn test_empty_identity_is_denied() {
        assert!(UserScope::from_identity("  ").is_err());
    }

    #[test]
    fn test_login_rejects_bad_password() {
        let err = login(&FixedStore, "admin", "nope").unwrap_err();
        assert!(matches!(err, DashboardError::AccessDenied { .. }));
    }

    #[test]
    fn test_login_derives_scope() {
        let user = login(&FixedStore, "manabi", "secret").unwrap();
        assert_eq!(user.username, "manabi");
        assert_eq!(user.scope.province(), Some("MANABI"));
        assert!(!user.scope.allows_all_provinces());
    }
}

//! Second-factor exemption - a time-boxed administrative override.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which verification flows an exemption bypasses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionScope {
    Login,
    Signing,
    Both,
}

impl ExemptionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Signing => "signing",
            Self::Both => "both",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "login" => Self::Login,
            "both" => Self::Both,
            _ => Self::Signing,
        }
    }

    /// Whether an exemption of this scope covers the requested scope.
    pub fn covers(&self, requested: ExemptionScope) -> bool {
        *self == ExemptionScope::Both || *self == requested
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SecondFactorExemption {
    pub exemption_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub exemption_type: String,
    pub expires_utc: DateTime<Utc>,
    pub granted_by: Uuid,
    pub grant_reason: String,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl SecondFactorExemption {
    pub fn scope(&self) -> ExemptionScope {
        ExemptionScope::from_str(&self.exemption_type)
    }

    /// Active means unrevoked and unexpired at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_utc.is_none() && self.expires_utc > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn exemption(scope: ExemptionScope, expires_in: Duration) -> SecondFactorExemption {
        let now = Utc::now();
        SecondFactorExemption {
            exemption_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            exemption_type: scope.as_str().to_string(),
            expires_utc: now + expires_in,
            granted_by: Uuid::new_v4(),
            grant_reason: "test".to_string(),
            revoked_utc: None,
            created_utc: now,
        }
    }

    #[test]
    fn both_scope_covers_signing_and_login() {
        assert!(ExemptionScope::Both.covers(ExemptionScope::Signing));
        assert!(ExemptionScope::Both.covers(ExemptionScope::Login));
        assert!(ExemptionScope::Signing.covers(ExemptionScope::Signing));
        assert!(!ExemptionScope::Login.covers(ExemptionScope::Signing));
    }

    #[test]
    fn expired_exemption_is_inactive() {
        let e = exemption(ExemptionScope::Signing, Duration::hours(-1));
        assert!(!e.is_active(Utc::now()));
    }

    #[test]
    fn revoked_exemption_is_inactive() {
        let mut e = exemption(ExemptionScope::Signing, Duration::hours(1));
        e.revoked_utc = Some(Utc::now());
        assert!(!e.is_active(Utc::now()));
    }
}

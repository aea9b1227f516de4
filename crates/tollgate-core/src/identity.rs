//! Verified caller identity.
//!
//! An [`Identity`] is produced by the identity stage from a signed session
//! credential. It is never mutated after resolution. Anything the session
//! verifier hands back is first received as a raw [`VerifiedSession`] and
//! converted with [`Identity::try_from`], which enforces the KYC-status
//! invariant.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller role. Only [`Role::Admin`] is special-cased by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// Regular account holder.
    User,
    /// Platform administrator.
    Admin,
    /// Any other role string, preserved verbatim.
    Other(String),
}

impl Role {
    /// Parses a role name. Only the exact names `ADMIN` and `USER` are
    /// known roles; any other spelling is kept as [`Role::Other`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "ADMIN" => Self::Admin,
            "USER" => Self::User,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the canonical role name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Know-your-customer verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    /// No verification attempted.
    NotVerified,
    /// Verification submitted and under review.
    Pending,
    /// Verification passed.
    Verified,
    /// Verification failed.
    Rejected,
    /// A previous verification lapsed.
    Expired,
}

impl KycStatus {
    /// Returns the wire name (`NOT_VERIFIED`, `PENDING`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotVerified => "NOT_VERIFIED",
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KycStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_VERIFIED" => Ok(Self::NotVerified),
            "PENDING" => Ok(Self::Pending),
            "VERIFIED" => Ok(Self::Verified),
            "REJECTED" => Ok(Self::Rejected),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(GatewayError::malformed(
                "kyc status",
                format!("unknown value '{other}'"),
            )),
        }
    }
}

/// The raw claims returned by a session verifier.
///
/// Field names follow the session token's JSON claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedSession {
    /// Subject (user) identifier.
    pub subject_id: String,
    /// Role name.
    pub role: String,
    /// KYC status name.
    pub kyc_status: String,
    /// Expiry as Unix epoch seconds.
    pub expires_at_epoch_seconds: u64,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    subject_id: String,
    role: Role,
    kyc_status: KycStatus,
    expires_at: u64,
}

impl Identity {
    /// Creates an identity.
    pub fn new(
        subject_id: impl Into<String>,
        role: Role,
        kyc_status: KycStatus,
        expires_at: u64,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
            kyc_status,
            expires_at,
        }
    }

    /// Subject identifier.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Caller role.
    #[must_use]
    pub const fn role(&self) -> &Role {
        &self.role
    }

    /// KYC status.
    #[must_use]
    pub const fn kyc_status(&self) -> KycStatus {
        self.kyc_status
    }

    /// Expiry as Unix epoch seconds.
    #[must_use]
    pub const fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Returns true if the caller holds the `ADMIN` role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns true if KYC verification has passed.
    #[must_use]
    pub fn is_kyc_verified(&self) -> bool {
        self.kyc_status == KycStatus::Verified
    }

    /// Returns true if the session has expired at `now` (epoch seconds).
    #[must_use]
    pub const fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at <= now
    }

    /// Returns an identifier suitable for logging. Never contains the token.
    #[must_use]
    pub fn log_id(&self) -> String {
        format!("user:{}", self.subject_id)
    }
}

impl TryFrom<VerifiedSession> for Identity {
    type Error = GatewayError;

    fn try_from(session: VerifiedSession) -> Result<Self, Self::Error> {
        if session.subject_id.is_empty() {
            return Err(GatewayError::malformed("session", "empty subject id"));
        }
        let kyc_status = session.kyc_status.parse()?;
        Ok(Self {
            subject_id: session.subject_id,
            role: Role::parse(&session.role),
            kyc_status,
            expires_at: session.expires_at_epoch_seconds,
        })
    }
}

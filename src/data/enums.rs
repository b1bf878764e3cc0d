use std::fmt::Display;
use num_enum::TryFromPrimitive;
use rocket_okapi::JsonSchema;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use serde_repr::{Deserialize_repr, Serialize_repr};

#[derive(Serialize_repr, Deserialize_repr, JsonSchema, Clone, Debug, TryFromPrimitive, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TenantStatus {
    Provisioning = 0,
    Active = 1,
    Suspended = 2,
    Deleting = 3,
    Deleted = 4,
    ProvisionFailed = 5,
}

impl TenantStatus {
    /// Legal lifecycle transitions. Deleted is terminal; a failed
    /// provisioning run may be retried until the tenant first reaches Active.
    pub fn can_transition_to(self, new: TenantStatus) -> bool {
        use TenantStatus::*;
        matches!(
            (self, new),
            (Provisioning, Active)
                | (Provisioning, ProvisionFailed)
                | (Active, Suspended)
                | (Suspended, Active)
                | (Active, Deleting)
                | (Suspended, Deleting)
                | (Deleting, Deleted)
                | (ProvisionFailed, Provisioning)
        )
    }
}

impl FromSql for TenantStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(i) => {
                let value = i as u8;
                TenantStatus::try_from(value)
                    .map_err(|_| FromSqlError::InvalidType)
            },
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TenantStatus::Provisioning => "provisioning",
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Deleting => "deleting",
            TenantStatus::Deleted => "deleted",
            TenantStatus::ProvisionFailed => "provision_failed",
        };
        write!(f, "{name}")
    }
}

/// Fail points for simulating a provisioning fault mid-sequence.
/// Lets tests verify that a half-provisioned namespace is fully rolled back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionFault {
    BeforeObjectSet,
    BeforeAdminPrincipal,
}

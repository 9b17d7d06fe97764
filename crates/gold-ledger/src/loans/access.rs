//! Single authorization seam for the loan engine.
//!
//! Every role-gated operation asks one question, "may this actor perform this action on this
//! loan", so the rules can be audited in one place.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::ActorId;
use super::record::LoanRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    LoanOfficer,
    Employee,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::LoanOfficer => "loan_officer",
            Self::Employee => "employee",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "admin" => Some(Self::Admin),
            "loan_officer" | "officer" => Some(Self::LoanOfficer),
            "employee" => Some(Self::Employee),
            _ => None,
        }
    }

    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Admin | Self::LoanOfficer)
    }
}

/// Authenticated caller as resolved by the external identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: ActorId(id.into()),
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoanAction {
    Create,
    Read,
    Update,
    Transition,
    Close,
    AmendClosure,
    RecordPayment,
    Outsource,
    ViewOutsourcing,
    AttachDocument,
    VerifyDocument,
    RemoveDocument,
    Deactivate,
    ManageEntities,
    ViewDashboard,
    Maintenance,
}

impl LoanAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Transition => "transition",
            Self::Close => "close",
            Self::AmendClosure => "amend closure",
            Self::RecordPayment => "record payment",
            Self::Outsource => "outsource",
            Self::ViewOutsourcing => "view outsourcing",
            Self::AttachDocument => "attach document",
            Self::VerifyDocument => "verify document",
            Self::RemoveDocument => "remove document",
            Self::Deactivate => "deactivate",
            Self::ManageEntities => "manage entities",
            Self::ViewDashboard => "view dashboard",
            Self::Maintenance => "run maintenance",
        }
    }

    /// Actions an employee may take on loans they submitted.
    const fn open_to_submitter(self) -> bool {
        matches!(
            self,
            Self::Create
                | Self::Read
                | Self::Update
                | Self::AttachDocument
                | Self::RemoveDocument
                | Self::ViewDashboard
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDenied {
    pub actor: ActorId,
    pub role: Role,
    pub action: LoanAction,
    pub reason: DenialKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    InsufficientRole,
    NotOwner,
}

impl fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            DenialKind::InsufficientRole => write!(
                f,
                "{} '{}' may not {}",
                self.role.label(),
                self.actor,
                self.action.label()
            ),
            DenialKind::NotOwner => write!(
                f,
                "{} '{}' may only {} loans they submitted",
                self.role.label(),
                self.actor,
                self.action.label()
            ),
        }
    }
}

impl std::error::Error for AccessDenied {}

/// Capability check consulted by the service before every operation.
pub trait AccessPolicy: Send + Sync {
    fn check(
        &self,
        actor: &Actor,
        loan: Option<&LoanRecord>,
        action: LoanAction,
    ) -> Result<(), AccessDenied>;
}

/// Default role matrix: admins and loan officers do everything except that soft-delete and
/// maintenance sweeps are admin-only; employees create loans and work on the ones they submitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAccessPolicy;

impl AccessPolicy for RoleAccessPolicy {
    fn check(
        &self,
        actor: &Actor,
        loan: Option<&LoanRecord>,
        action: LoanAction,
    ) -> Result<(), AccessDenied> {
        let deny = |reason| AccessDenied {
            actor: actor.id.clone(),
            role: actor.role,
            action,
            reason,
        };

        match actor.role {
            Role::Admin => Ok(()),
            Role::LoanOfficer
                if matches!(action, LoanAction::Deactivate | LoanAction::Maintenance) =>
            {
                Err(deny(DenialKind::InsufficientRole))
            }
            Role::LoanOfficer => Ok(()),
            Role::Employee => {
                if !action.open_to_submitter() {
                    return Err(deny(DenialKind::InsufficientRole));
                }
                match loan {
                    Some(record) if record.created_by != actor.id => {
                        Err(deny(DenialKind::NotOwner))
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_labels() {
        assert_eq!(Role::parse("loan-officer"), Some(Role::LoanOfficer));
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
        assert_eq!(Role::parse("auditor"), None);
    }

    #[test]
    fn employees_cannot_transition_even_without_a_record() {
        let actor = Actor::new("emp-7", Role::Employee);
        let denied = RoleAccessPolicy
            .check(&actor, None, LoanAction::Transition)
            .expect_err("employees cannot transition");
        assert_eq!(denied.reason, DenialKind::InsufficientRole);
        assert!(denied.to_string().contains("transition"));
    }

    #[test]
    fn officers_cannot_deactivate() {
        let actor = Actor::new("off-1", Role::LoanOfficer);
        assert!(RoleAccessPolicy
            .check(&actor, None, LoanAction::Deactivate)
            .is_err());
        assert!(RoleAccessPolicy
            .check(&actor, None, LoanAction::Close)
            .is_ok());
    }
}

// src/services/rbac_service.rs

use crate::{
    common::error::AppError,
    models::auth::{Profile, User},
};

/// Operações do ciclo de vida da demanda sujeitas à política de acesso.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandOperation {
    CreateDraft,
    EditDraft,
    Patch,
    DeleteDraft,
    Submit,
    Dispatch,
    UpdateStatus,
    RequestTransfer,
    ApproveTransfer,
    AddHistoryEntry,
}

const ALL_PROFILES: &[Profile] = &Profile::ALL;

// A política como dado: operação -> perfis autorizados
const POLICY: &[(DemandOperation, &[Profile])] = &[
    (DemandOperation::CreateDraft, ALL_PROFILES),
    (DemandOperation::EditDraft, ALL_PROFILES),
    (DemandOperation::Patch, ALL_PROFILES),
    (DemandOperation::DeleteDraft, ALL_PROFILES),
    (DemandOperation::Submit, ALL_PROFILES),
    (DemandOperation::Dispatch, &[Profile::IntakeOffice]),
    (DemandOperation::UpdateStatus, ALL_PROFILES),
    (DemandOperation::RequestTransfer, &[Profile::Department]),
    (DemandOperation::ApproveTransfer, &[Profile::IntakeOffice]),
    (DemandOperation::AddHistoryEntry, ALL_PROFILES),
];

impl DemandOperation {
    pub fn name(&self) -> &'static str {
        match self {
            DemandOperation::CreateDraft => "create",
            DemandOperation::EditDraft => "edit",
            DemandOperation::Patch => "patch",
            DemandOperation::DeleteDraft => "delete",
            DemandOperation::Submit => "submit",
            DemandOperation::Dispatch => "dispatch",
            DemandOperation::UpdateStatus => "update_status",
            DemandOperation::RequestTransfer => "request_transfer",
            DemandOperation::ApproveTransfer => "approve_transfer",
            DemandOperation::AddHistoryEntry => "add_history_entry",
        }
    }

    pub fn allowed_profiles(&self) -> &'static [Profile] {
        POLICY
            .iter()
            .find(|(op, _)| op == self)
            .map(|(_, profiles)| *profiles)
            .unwrap_or(&[])
    }
}

pub fn is_allowed(profile: Profile, operation: DemandOperation) -> bool {
    operation.allowed_profiles().contains(&profile)
}

pub fn ensure_allowed(user: &User, operation: DemandOperation) -> Result<(), AppError> {
    if is_allowed(user.profile, operation) {
        return Ok(());
    }

    tracing::warn!(
        user_id = %user.id,
        profile = %user.profile.label(),
        operation = operation.name(),
        "Operação negada pela política de acesso"
    );
    Err(AppError::Forbidden(operation.name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_has_a_policy_entry() {
        let operations = [
            DemandOperation::CreateDraft,
            DemandOperation::EditDraft,
            DemandOperation::Patch,
            DemandOperation::DeleteDraft,
            DemandOperation::Submit,
            DemandOperation::Dispatch,
            DemandOperation::UpdateStatus,
            DemandOperation::RequestTransfer,
            DemandOperation::ApproveTransfer,
            DemandOperation::AddHistoryEntry,
        ];
        for op in operations {
            assert!(!op.allowed_profiles().is_empty(), "{op:?} sem perfis");
        }
    }

    #[test]
    fn restricted_operations() {
        assert!(is_allowed(Profile::IntakeOffice, DemandOperation::Dispatch));
        assert!(!is_allowed(Profile::Department, DemandOperation::Dispatch));
        assert!(!is_allowed(Profile::Manager, DemandOperation::ApproveTransfer));
        assert!(is_allowed(Profile::Department, DemandOperation::RequestTransfer));
        assert!(!is_allowed(Profile::IntakeOffice, DemandOperation::RequestTransfer));
        assert!(is_allowed(Profile::Representative, DemandOperation::Submit));
        assert!(is_allowed(Profile::Manager, DemandOperation::UpdateStatus));
    }
}

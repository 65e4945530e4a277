use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::reimbursements::models::Reimbursement;
use crate::features::users::models::Actor;
use crate::shared::constants::{
    DEFAULT_ROLE_PERMISSIONS, PERM_CATEGORY_CREATE, PERM_CATEGORY_DELETE, PERM_CATEGORY_UPDATE,
    PERM_CATEGORY_VIEW, PERM_REIMBURSEMENT_APPROVE, PERM_REIMBURSEMENT_CREATE,
    PERM_REIMBURSEMENT_DELETE, PERM_REIMBURSEMENT_VIEW_ALL, PERM_REIMBURSEMENT_VIEW_OWN,
    PERM_REIMBURSEMENT_VIEW_SINGLE, PERM_REIMBURSEMENT_VIEW_TRASHED,
};
use crate::shared::validation::{PERMISSION_REGEX, ROLE_REGEX};

/// Operations guarded by the access policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SubmitReimbursement,
    ViewReimbursement,
    ListReimbursements,
    DecideReimbursement,
    DeleteReimbursement,
    ViewTrashedReimbursements,
    ViewMetrics,
    ViewCategory,
    CreateCategory,
    UpdateCategory,
    DeleteCategory,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::SubmitReimbursement => "submit reimbursements",
            Action::ViewReimbursement => "view this reimbursement",
            Action::ListReimbursements => "list reimbursements",
            Action::DecideReimbursement => "approve or reject reimbursements",
            Action::DeleteReimbursement => "delete this reimbursement",
            Action::ViewTrashedReimbursements => "view deleted reimbursements",
            Action::ViewMetrics => "view reimbursement metrics",
            Action::ViewCategory => "view categories",
            Action::CreateCategory => "create categories",
            Action::UpdateCategory => "update categories",
            Action::DeleteCategory => "delete categories",
        };
        f.write_str(name)
    }
}

/// Which reimbursements a caller may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewScope {
    All,
    Own(Uuid),
}

/// Static role to permission mapping, loaded once at startup
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    roles: HashMap<String, BTreeSet<String>>,
}

impl AccessPolicy {
    /// Build from role/permission pairs. Malformed names are skipped with a warning.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut roles: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (role, permission) in pairs {
            if !ROLE_REGEX.is_match(&role) || !PERMISSION_REGEX.is_match(&permission) {
                tracing::warn!(
                    "Skipping malformed role permission pair: {} -> {}",
                    role,
                    permission
                );
                continue;
            }
            roles.entry(role).or_default().insert(permission);
        }
        Self { roles }
    }

    /// Default admin/manager/employee table
    pub fn with_defaults() -> Self {
        Self::from_pairs(DEFAULT_ROLE_PERMISSIONS.iter().flat_map(|(role, perms)| {
            perms
                .iter()
                .map(move |perm| (role.to_string(), perm.to_string()))
        }))
    }

    /// Use the stored mapping, or the default table when the store has none
    pub fn from_store_or_default(pairs: Vec<(String, String)>) -> Self {
        if pairs.is_empty() {
            tracing::warn!("No role permissions stored, using default role table");
            return Self::with_defaults();
        }
        Self::from_pairs(pairs)
    }

    /// Union of the permissions granted by the actor's roles
    pub fn permissions_of(&self, actor: &Actor) -> BTreeSet<String> {
        actor
            .roles
            .iter()
            .filter_map(|role| self.roles.get(role))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn has_permission(&self, actor: &Actor, permission: &str) -> bool {
        actor
            .roles
            .iter()
            .filter_map(|role| self.roles.get(role))
            .any(|perms| perms.contains(permission))
    }

    /// Role names that grant the permission, sorted
    pub fn roles_granting(&self, permission: &str) -> Vec<String> {
        let mut roles: Vec<String> = self
            .roles
            .iter()
            .filter(|(_, perms)| perms.contains(permission))
            .map(|(role, _)| role.clone())
            .collect();
        roles.sort();
        roles
    }

    /// Which reimbursements the actor may see, if any
    pub fn view_scope(&self, actor: &Actor) -> Option<ViewScope> {
        if self.has_permission(actor, PERM_REIMBURSEMENT_VIEW_ALL) {
            Some(ViewScope::All)
        } else if self.has_permission(actor, PERM_REIMBURSEMENT_VIEW_OWN) {
            Some(ViewScope::Own(actor.id))
        } else {
            None
        }
    }

    fn sees(&self, actor: &Actor, record: &Reimbursement) -> bool {
        match self.view_scope(actor) {
            Some(ViewScope::All) => true,
            Some(ViewScope::Own(id)) => record.is_owned_by(id),
            None => false,
        }
    }

    /// Pure decision for `action`, optionally against a specific record
    pub fn can(&self, actor: &Actor, action: Action, record: Option<&Reimbursement>) -> bool {
        let has = |perm: &str| self.has_permission(actor, perm);

        match action {
            Action::SubmitReimbursement => has(PERM_REIMBURSEMENT_CREATE),
            Action::ViewReimbursement => {
                has(PERM_REIMBURSEMENT_VIEW_SINGLE)
                    && record.map_or(true, |r| {
                        self.sees(actor, r)
                            && (!r.is_deleted() || has(PERM_REIMBURSEMENT_VIEW_TRASHED))
                    })
            }
            Action::ListReimbursements | Action::ViewMetrics => self.view_scope(actor).is_some(),
            Action::DecideReimbursement => has(PERM_REIMBURSEMENT_APPROVE),
            Action::DeleteReimbursement => {
                has(PERM_REIMBURSEMENT_DELETE)
                    && record.map_or(true, |r| {
                        has(PERM_REIMBURSEMENT_VIEW_ALL) || r.is_owned_by(actor.id)
                    })
            }
            Action::ViewTrashedReimbursements => {
                has(PERM_REIMBURSEMENT_VIEW_TRASHED)
                    && self.view_scope(actor) == Some(ViewScope::All)
            }
            Action::ViewCategory => {
                has(PERM_CATEGORY_VIEW)
                    || has(PERM_REIMBURSEMENT_CREATE)
                    || self.view_scope(actor).is_some()
            }
            Action::CreateCategory => has(PERM_CATEGORY_CREATE),
            Action::UpdateCategory => has(PERM_CATEGORY_UPDATE),
            Action::DeleteCategory => has(PERM_CATEGORY_DELETE),
        }
    }

    /// Like [`can`](Self::can), failing with `Forbidden` on deny
    pub fn authorize(
        &self,
        actor: &Actor,
        action: Action,
        record: Option<&Reimbursement>,
    ) -> Result<()> {
        if self.can(actor, action, record) {
            Ok(())
        } else {
            tracing::info!("Denied user {} permission to {}", actor.id, action);
            Err(AppError::Forbidden(format!(
                "You do not have permission to {}",
                action
            )))
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::with_defaults()
    }
}

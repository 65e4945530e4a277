use lazy_static::lazy_static;

// =============================================================================
// PERMISSIONS
// =============================================================================

pub const PERM_REIMBURSEMENT_CREATE: &str = "reimbursement.create";
pub const PERM_REIMBURSEMENT_VIEW_ALL: &str = "reimbursement.view_all";
pub const PERM_REIMBURSEMENT_VIEW_OWN: &str = "reimbursement.view_own";
pub const PERM_REIMBURSEMENT_VIEW_SINGLE: &str = "reimbursement.view_single";
/// Lets a caller see soft-deleted reimbursements
pub const PERM_REIMBURSEMENT_VIEW_TRASHED: &str = "reimbursement.view_trashed";
pub const PERM_REIMBURSEMENT_DELETE: &str = "reimbursement.delete";
pub const PERM_REIMBURSEMENT_APPROVE: &str = "reimbursement.approve";

pub const PERM_CATEGORY_CREATE: &str = "category.create";
pub const PERM_CATEGORY_VIEW: &str = "category.view";
pub const PERM_CATEGORY_UPDATE: &str = "category.update";
pub const PERM_CATEGORY_DELETE: &str = "category.delete";

// =============================================================================
// DEFAULT ROLES
// =============================================================================

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_EMPLOYEE: &str = "employee";

/// Every permission the system knows about
pub const ALL_PERMISSIONS: &[&str] = &[
    PERM_REIMBURSEMENT_CREATE,
    PERM_REIMBURSEMENT_VIEW_ALL,
    PERM_REIMBURSEMENT_VIEW_OWN,
    PERM_REIMBURSEMENT_VIEW_SINGLE,
    PERM_REIMBURSEMENT_VIEW_TRASHED,
    PERM_REIMBURSEMENT_DELETE,
    PERM_REIMBURSEMENT_APPROVE,
    "user.create",
    "user.view",
    "user.update",
    "user.delete",
    "user.assign_role",
    PERM_CATEGORY_CREATE,
    PERM_CATEGORY_VIEW,
    PERM_CATEGORY_UPDATE,
    PERM_CATEGORY_DELETE,
    "role.create",
    "role.view",
    "role.update",
    "role.delete",
    "role.sync_permissions",
    "permission.create",
    "permission.view",
    "permission.update",
    "permission.delete",
];

lazy_static! {
    /// Role to permission table used when the store has no mapping yet.
    /// Mirrors the seed in `migrations/`.
    pub static ref DEFAULT_ROLE_PERMISSIONS: Vec<(&'static str, Vec<&'static str>)> = vec![
        (ROLE_ADMIN, ALL_PERMISSIONS.to_vec()),
        (
            ROLE_MANAGER,
            vec![
                PERM_REIMBURSEMENT_VIEW_ALL,
                PERM_REIMBURSEMENT_VIEW_SINGLE,
                PERM_REIMBURSEMENT_APPROVE,
                "user.view",
                PERM_CATEGORY_VIEW,
            ],
        ),
        (
            ROLE_EMPLOYEE,
            vec![
                PERM_REIMBURSEMENT_CREATE,
                PERM_REIMBURSEMENT_VIEW_OWN,
                PERM_REIMBURSEMENT_VIEW_SINGLE,
                PERM_REIMBURSEMENT_DELETE,
            ],
        ),
    ];
}

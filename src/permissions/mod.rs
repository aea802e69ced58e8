//! Role-based permission registry.
//!
//! Maps each role to a fixed, total set of boolean capabilities. Lookups are
//! fail-closed: an unknown role never grants anything. The admin role is
//! always fully privileged and cannot be edited; receptionist and doctor
//! sets can be adjusted at runtime and are persisted to the database.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::DbPool;

/// Actor roles. Fixed set; there is no dynamic role creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Receptionist,
    Doctor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Receptionist => write!(f, "receptionist"),
            Role::Doctor => write!(f, "doctor"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "receptionist" => Ok(Role::Receptionist),
            "doctor" => Ok(Role::Doctor),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// A single named capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    ViewDashboard,
    ViewAppointments,
    AddAppointment,
    EditAppointment,
    CancelAppointment,
    ViewPatients,
    AddPatient,
    EditPatient,
    DeletePatient,
    ViewDoctors,
    AddDoctor,
    EditDoctor,
    DeleteDoctor,
    ViewBilling,
    AddTransaction,
    ViewReports,
    GenerateReport,
    ViewAnalytics,
    ManageUsers,
    AddUser,
    EditUser,
    DeleteUser,
    ManageSettings,
    UseChat,
    ViewAuditLog,
}

impl Capability {
    /// Every capability key, in wire order.
    pub const ALL: [Capability; 25] = [
        Capability::ViewDashboard,
        Capability::ViewAppointments,
        Capability::AddAppointment,
        Capability::EditAppointment,
        Capability::CancelAppointment,
        Capability::ViewPatients,
        Capability::AddPatient,
        Capability::EditPatient,
        Capability::DeletePatient,
        Capability::ViewDoctors,
        Capability::AddDoctor,
        Capability::EditDoctor,
        Capability::DeleteDoctor,
        Capability::ViewBilling,
        Capability::AddTransaction,
        Capability::ViewReports,
        Capability::GenerateReport,
        Capability::ViewAnalytics,
        Capability::ManageUsers,
        Capability::AddUser,
        Capability::EditUser,
        Capability::DeleteUser,
        Capability::ManageSettings,
        Capability::UseChat,
        Capability::ViewAuditLog,
    ];

    /// Wire name of the capability (camelCase, matching the JSON field)
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewDashboard => "viewDashboard",
            Capability::ViewAppointments => "viewAppointments",
            Capability::AddAppointment => "addAppointment",
            Capability::EditAppointment => "editAppointment",
            Capability::CancelAppointment => "cancelAppointment",
            Capability::ViewPatients => "viewPatients",
            Capability::AddPatient => "addPatient",
            Capability::EditPatient => "editPatient",
            Capability::DeletePatient => "deletePatient",
            Capability::ViewDoctors => "viewDoctors",
            Capability::AddDoctor => "addDoctor",
            Capability::EditDoctor => "editDoctor",
            Capability::DeleteDoctor => "deleteDoctor",
            Capability::ViewBilling => "viewBilling",
            Capability::AddTransaction => "addTransaction",
            Capability::ViewReports => "viewReports",
            Capability::GenerateReport => "generateReport",
            Capability::ViewAnalytics => "viewAnalytics",
            Capability::ManageUsers => "manageUsers",
            Capability::AddUser => "addUser",
            Capability::EditUser => "editUser",
            Capability::DeleteUser => "deleteUser",
            Capability::ManageSettings => "manageSettings",
            Capability::UseChat => "useChat",
            Capability::ViewAuditLog => "viewAuditLog",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A role's full capability record. Total over the key set: every capability
/// has a defined value, never a missing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionSet {
    pub view_dashboard: bool,
    pub view_appointments: bool,
    pub add_appointment: bool,
    pub edit_appointment: bool,
    pub cancel_appointment: bool,
    pub view_patients: bool,
    pub add_patient: bool,
    pub edit_patient: bool,
    pub delete_patient: bool,
    pub view_doctors: bool,
    pub add_doctor: bool,
    pub edit_doctor: bool,
    pub delete_doctor: bool,
    pub view_billing: bool,
    pub add_transaction: bool,
    pub view_reports: bool,
    pub generate_report: bool,
    pub view_analytics: bool,
    pub manage_users: bool,
    pub add_user: bool,
    pub edit_user: bool,
    pub delete_user: bool,
    pub manage_settings: bool,
    pub use_chat: bool,
    pub view_audit_log: bool,
}

impl Default for PermissionSet {
    /// Default is deny-everything; absent data never grants access.
    fn default() -> Self {
        Self::all(false)
    }
}

impl PermissionSet {
    /// A set with every capability fixed to `value`.
    pub const fn all(value: bool) -> Self {
        Self {
            view_dashboard: value,
            view_appointments: value,
            add_appointment: value,
            edit_appointment: value,
            cancel_appointment: value,
            view_patients: value,
            add_patient: value,
            edit_patient: value,
            delete_patient: value,
            view_doctors: value,
            add_doctor: value,
            edit_doctor: value,
            delete_doctor: value,
            view_billing: value,
            add_transaction: value,
            view_reports: value,
            generate_report: value,
            view_analytics: value,
            manage_users: value,
            add_user: value,
            edit_user: value,
            delete_user: value,
            manage_settings: value,
            use_chat: value,
            view_audit_log: value,
        }
    }

    /// Built-in defaults for a role.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self::all(true),
            Role::Receptionist => Self {
                delete_patient: false,
                add_doctor: false,
                edit_doctor: false,
                delete_doctor: false,
                view_reports: false,
                generate_report: false,
                view_analytics: false,
                delete_user: false,
                view_audit_log: false,
                ..Self::all(true)
            },
            Role::Doctor => Self {
                view_dashboard: true,
                view_appointments: true,
                edit_appointment: true,
                view_patients: true,
                use_chat: true,
                ..Self::all(false)
            },
        }
    }

    /// Pure capability lookup.
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ViewDashboard => self.view_dashboard,
            Capability::ViewAppointments => self.view_appointments,
            Capability::AddAppointment => self.add_appointment,
            Capability::EditAppointment => self.edit_appointment,
            Capability::CancelAppointment => self.cancel_appointment,
            Capability::ViewPatients => self.view_patients,
            Capability::AddPatient => self.add_patient,
            Capability::EditPatient => self.edit_patient,
            Capability::DeletePatient => self.delete_patient,
            Capability::ViewDoctors => self.view_doctors,
            Capability::AddDoctor => self.add_doctor,
            Capability::EditDoctor => self.edit_doctor,
            Capability::DeleteDoctor => self.delete_doctor,
            Capability::ViewBilling => self.view_billing,
            Capability::AddTransaction => self.add_transaction,
            Capability::ViewReports => self.view_reports,
            Capability::GenerateReport => self.generate_report,
            Capability::ViewAnalytics => self.view_analytics,
            Capability::ManageUsers => self.manage_users,
            Capability::AddUser => self.add_user,
            Capability::EditUser => self.edit_user,
            Capability::DeleteUser => self.delete_user,
            Capability::ManageSettings => self.manage_settings,
            Capability::UseChat => self.use_chat,
            Capability::ViewAuditLog => self.view_audit_log,
        }
    }

    fn set(&mut self, capability: Capability, value: bool) {
        match capability {
            Capability::ViewDashboard => self.view_dashboard = value,
            Capability::ViewAppointments => self.view_appointments = value,
            Capability::AddAppointment => self.add_appointment = value,
            Capability::EditAppointment => self.edit_appointment = value,
            Capability::CancelAppointment => self.cancel_appointment = value,
            Capability::ViewPatients => self.view_patients = value,
            Capability::AddPatient => self.add_patient = value,
            Capability::EditPatient => self.edit_patient = value,
            Capability::DeletePatient => self.delete_patient = value,
            Capability::ViewDoctors => self.view_doctors = value,
            Capability::AddDoctor => self.add_doctor = value,
            Capability::EditDoctor => self.edit_doctor = value,
            Capability::DeleteDoctor => self.delete_doctor = value,
            Capability::ViewBilling => self.view_billing = value,
            Capability::AddTransaction => self.add_transaction = value,
            Capability::ViewReports => self.view_reports = value,
            Capability::GenerateReport => self.generate_report = value,
            Capability::ViewAnalytics => self.view_analytics = value,
            Capability::ManageUsers => self.manage_users = value,
            Capability::AddUser => self.add_user = value,
            Capability::EditUser => self.edit_user = value,
            Capability::DeleteUser => self.delete_user = value,
            Capability::ManageSettings => self.manage_settings = value,
            Capability::UseChat => self.use_chat = value,
            Capability::ViewAuditLog => self.view_audit_log = value,
        }
    }
}

/// Editable working copies for the non-admin roles.
#[derive(Debug, Clone)]
struct PermissionTable {
    receptionist: PermissionSet,
    doctor: PermissionSet,
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self {
            receptionist: PermissionSet::for_role(Role::Receptionist),
            doctor: PermissionSet::for_role(Role::Doctor),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("The admin role is always fully privileged and cannot be edited")]
    AdminImmutable,
}

/// Process-wide permission registry.
///
/// Reads are lock-free snapshots; edits swap the whole table atomically.
pub struct PermissionRegistry {
    table: ArcSwap<PermissionTable>,
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionRegistry {
    /// Registry with the built-in defaults.
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(PermissionTable::default()),
        }
    }

    /// Registry with defaults overlaid by any persisted role overrides.
    pub async fn load(pool: &DbPool) -> Result<Self, sqlx::Error> {
        let mut table = PermissionTable::default();

        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT role, permissions FROM role_permissions")
                .fetch_all(pool)
                .await?;

        for (role, json) in rows {
            let set: PermissionSet = match serde_json::from_str(&json) {
                Ok(set) => set,
                Err(e) => {
                    tracing::warn!(role = %role, error = %e, "Ignoring unparseable permission override");
                    continue;
                }
            };
            match role.parse::<Role>() {
                // Admin overrides are never honored, even if a row sneaks in
                Ok(Role::Admin) | Err(_) => {}
                Ok(Role::Receptionist) => table.receptionist = set,
                Ok(Role::Doctor) => table.doctor = set,
            }
        }

        Ok(Self {
            table: ArcSwap::from_pointee(table),
        })
    }

    /// Capability set for a known role. Admin is always all-true.
    pub fn permissions_for(&self, role: Role) -> PermissionSet {
        match role {
            Role::Admin => PermissionSet::all(true),
            Role::Receptionist => self.table.load().receptionist,
            Role::Doctor => self.table.load().doctor,
        }
    }

    /// Capability set for an arbitrary role string.
    ///
    /// Unknown or empty roles resolve to the all-false set: an unknown role
    /// never grants access.
    pub fn permissions_for_str(&self, role: &str) -> PermissionSet {
        match role.parse::<Role>() {
            Ok(role) => self.permissions_for(role),
            Err(_) => PermissionSet::all(false),
        }
    }

    /// Update one capability in a role's working copy and return the new set.
    ///
    /// Rejects edits to the admin role; the table is left unchanged.
    pub fn set_capability(
        &self,
        role: Role,
        capability: Capability,
        value: bool,
    ) -> Result<PermissionSet, PermissionError> {
        if role == Role::Admin {
            return Err(PermissionError::AdminImmutable);
        }

        let mut table = PermissionTable::clone(&self.table.load());
        let set = match role {
            Role::Admin => unreachable!(),
            Role::Receptionist => &mut table.receptionist,
            Role::Doctor => &mut table.doctor,
        };
        set.set(capability, value);
        let updated = *set;
        self.table.store(Arc::new(table));
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_is_all_true() {
        let set = PermissionSet::for_role(Role::Admin);
        for cap in Capability::ALL {
            assert!(set.allows(cap), "admin should allow {}", cap);
        }
    }

    #[test]
    fn test_unknown_role_is_all_false() {
        let registry = PermissionRegistry::new();
        for role in ["guest", "superuser", "", "ADMIN2"] {
            let set = registry.permissions_for_str(role);
            for cap in Capability::ALL {
                assert!(!set.allows(cap), "role {:?} should not allow {}", role, cap);
            }
        }
    }

    #[test]
    fn test_receptionist_defaults() {
        let set = PermissionSet::for_role(Role::Receptionist);
        assert!(set.allows(Capability::ViewDashboard));
        assert!(set.allows(Capability::AddPatient));
        assert!(set.allows(Capability::AddTransaction));
        assert!(set.allows(Capability::ManageUsers));
        assert!(!set.allows(Capability::DeletePatient));
        assert!(!set.allows(Capability::AddDoctor));
        assert!(!set.allows(Capability::ViewAuditLog));
        assert!(!set.allows(Capability::ViewAnalytics));
    }

    #[test]
    fn test_doctor_defaults() {
        let set = PermissionSet::for_role(Role::Doctor);
        assert!(set.allows(Capability::ViewAppointments));
        assert!(set.allows(Capability::EditAppointment));
        assert!(set.allows(Capability::ViewPatients));
        assert!(set.allows(Capability::UseChat));
        assert!(!set.allows(Capability::AddAppointment));
        assert!(!set.allows(Capability::CancelAppointment));
        assert!(!set.allows(Capability::ViewBilling));
        assert!(!set.allows(Capability::ManageUsers));
    }

    #[test]
    fn test_admin_set_is_rejected_and_unchanged() {
        let registry = PermissionRegistry::new();
        let before = registry.permissions_for(Role::Admin);

        let result = registry.set_capability(Role::Admin, Capability::DeleteUser, false);
        assert!(matches!(result, Err(PermissionError::AdminImmutable)));

        let after = registry.permissions_for(Role::Admin);
        assert_eq!(before, after);
        assert!(after.allows(Capability::DeleteUser));
    }

    #[test]
    fn test_set_capability_swaps_working_copy() {
        let registry = PermissionRegistry::new();
        assert!(!registry
            .permissions_for(Role::Doctor)
            .allows(Capability::AddAppointment));

        let updated = registry
            .set_capability(Role::Doctor, Capability::AddAppointment, true)
            .unwrap();
        assert!(updated.allows(Capability::AddAppointment));
        assert!(registry
            .permissions_for(Role::Doctor)
            .allows(Capability::AddAppointment));

        // Other roles are untouched
        assert!(registry
            .permissions_for(Role::Receptionist)
            .allows(Capability::AddAppointment));
    }

    #[test]
    fn test_serde_camel_case_round_trip() {
        let set = PermissionSet::for_role(Role::Receptionist);
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.contains("\"viewDashboard\":true"));
        assert!(json.contains("\"deletePatient\":false"));

        let parsed: PermissionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, parsed);
    }

    #[test]
    fn test_missing_keys_deserialize_to_deny() {
        // Partial records degrade to deny, never to grant
        let parsed: PermissionSet = serde_json::from_str(r#"{"viewDashboard":true}"#).unwrap();
        assert!(parsed.allows(Capability::ViewDashboard));
        assert!(!parsed.allows(Capability::DeleteUser));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Receptionist".parse::<Role>().unwrap(), Role::Receptionist);
        assert!("guest".parse::<Role>().is_err());
    }

    #[tokio::test]
    async fn test_load_applies_persisted_overrides() {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();

        // Persist an edited doctor set
        let mut edited = PermissionSet::for_role(Role::Doctor);
        edited.add_appointment = true;
        sqlx::query("UPDATE role_permissions SET permissions = ? WHERE role = 'doctor'")
            .bind(serde_json::to_string(&edited).unwrap())
            .execute(&pool)
            .await
            .unwrap();

        let registry = PermissionRegistry::load(&pool).await.unwrap();
        assert!(registry
            .permissions_for(Role::Doctor)
            .allows(Capability::AddAppointment));
        // Receptionist keeps its seeded defaults
        assert!(!registry
            .permissions_for(Role::Receptionist)
            .allows(Capability::ViewAuditLog));
    }

    #[tokio::test]
    async fn test_load_ignores_admin_rows() {
        let pool = crate::db::connect("sqlite::memory:").await.unwrap();

        // Even a tampered admin row must not weaken the admin role
        sqlx::query(
            "INSERT INTO role_permissions (role, permissions, updated_at) VALUES ('admin', ?, '')",
        )
        .bind(serde_json::to_string(&PermissionSet::all(false)).unwrap())
        .execute(&pool)
        .await
        .unwrap();

        let registry = PermissionRegistry::load(&pool).await.unwrap();
        for cap in Capability::ALL {
            assert!(registry.permissions_for(Role::Admin).allows(cap));
        }
    }
}

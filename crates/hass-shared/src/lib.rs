//! HASS Shared Utilities
//!
//! This crate provides common functionality for all HASS services:
//! - Role-based access control
//! - Audit logging
//! - Pagination types
//! - Field validation

use serde::{Deserialize, Serialize};

// Re-export commonly used items
pub use access_control::*;
pub use audit::*;
pub use types::*;
pub use validation::*;

/// Access control module - maps every role to the data it may touch
pub mod access_control {
    use super::*;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    /// The fixed set of user roles. Each user holds exactly one.
    #[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[serde(rename_all = "snake_case")]
    pub enum Role {
        Doctor,
        Nurse,
        Patient,
        Pharmacist,
        LabTech,
        Manager,
        Admin,
        RegionalAdmin,
        SuperAdmin,
        Reception,
    }

    impl Role {
        pub const ALL: [Role; 10] = [
            Role::Doctor,
            Role::Nurse,
            Role::Patient,
            Role::Pharmacist,
            Role::LabTech,
            Role::Manager,
            Role::Admin,
            Role::RegionalAdmin,
            Role::SuperAdmin,
            Role::Reception,
        ];

        pub fn as_str(&self) -> &'static str {
            match self {
                Role::Doctor => "doctor",
                Role::Nurse => "nurse",
                Role::Patient => "patient",
                Role::Pharmacist => "pharmacist",
                Role::LabTech => "lab_tech",
                Role::Manager => "manager",
                Role::Admin => "admin",
                Role::RegionalAdmin => "regional_admin",
                Role::SuperAdmin => "super_admin",
                Role::Reception => "reception",
            }
        }

        /// URL segment of the role's dashboard. Regional admins share the admin dashboard.
        pub fn dashboard_slug(&self) -> &'static str {
            match self {
                Role::Doctor => "doctor",
                Role::Nurse => "nurse",
                Role::Patient => "patient",
                Role::Pharmacist => "pharmacist",
                Role::LabTech => "lab-tech",
                Role::Manager => "manager",
                Role::Admin | Role::RegionalAdmin => "admin",
                Role::SuperAdmin => "super-admin",
                Role::Reception => "reception",
            }
        }

        /// Landing route after login
        pub fn dashboard_path(&self) -> String {
            format!("/dashboard/{}", self.dashboard_slug())
        }

        /// Whether this role may perform `permission` on `category`
        pub fn allows(&self, category: DataCategory, permission: Permission) -> bool {
            use DataCategory as C;
            use Permission as P;

            match self {
                Role::Doctor => match category {
                    C::Demographics | C::Visits | C::VitalSigns | C::Medications
                    | C::LabResults | C::Appointments | C::Messages | C::Files => {
                        matches!(permission, P::Read | P::Write)
                    }
                    C::CaseSheets => matches!(permission, P::Read | P::Write | P::Acknowledge),
                    C::Nursing | C::Beds | C::Analytics => permission == P::Read,
                    _ => false,
                },
                Role::Nurse => match category {
                    C::VitalSigns | C::Nursing | C::Beds | C::Messages | C::Files => {
                        matches!(permission, P::Read | P::Write)
                    }
                    C::Medications => matches!(permission, P::Read | P::Administer),
                    C::LabResults => matches!(permission, P::Read | P::Write),
                    C::CaseSheets => matches!(permission, P::Read | P::Write | P::Acknowledge),
                    C::Demographics | C::Visits | C::Appointments | C::Analytics => {
                        permission == P::Read
                    }
                    _ => false,
                },
                Role::Pharmacist => match category {
                    C::Medications => matches!(permission, P::Read | P::Dispense),
                    C::Messages => matches!(permission, P::Read | P::Write),
                    C::Demographics | C::Visits | C::Files | C::Analytics => permission == P::Read,
                    _ => false,
                },
                Role::LabTech => match category {
                    C::LabResults | C::Messages | C::Files => matches!(permission, P::Read | P::Write),
                    C::Demographics | C::Visits | C::Analytics => permission == P::Read,
                    _ => false,
                },
                Role::Reception => match category {
                    C::Demographics | C::Visits | C::Appointments | C::Messages | C::Files => {
                        matches!(permission, P::Read | P::Write)
                    }
                    C::Beds => matches!(permission, P::Read | P::Write),
                    C::CaseSheets => matches!(permission, P::Read | P::Acknowledge),
                    C::Billing | C::Analytics => permission == P::Read,
                    _ => false,
                },
                Role::Manager => match category {
                    C::Beds => matches!(permission, P::Read | P::Write | P::Manage),
                    C::Messages => matches!(permission, P::Read | P::Write),
                    C::Demographics | C::Visits | C::Appointments | C::Administration
                    | C::Analytics | C::Billing | C::Files | C::Medications | C::LabResults => {
                        permission == P::Read
                    }
                    _ => false,
                },
                Role::Admin | Role::RegionalAdmin => match category {
                    C::Administration | C::Beds => {
                        matches!(permission, P::Read | P::Write | P::Manage)
                    }
                    C::Demographics | C::Appointments | C::Messages | C::Files => {
                        matches!(permission, P::Read | P::Write)
                    }
                    C::Visits | C::VitalSigns | C::Medications | C::LabResults | C::Nursing
                    | C::CaseSheets | C::Analytics | C::Billing => permission == P::Read,
                },
                Role::Patient => match category {
                    C::Appointments | C::Messages => matches!(permission, P::Read | P::Write),
                    C::Demographics | C::Visits | C::VitalSigns | C::Medications
                    | C::LabResults | C::Files | C::Billing | C::Analytics => permission == P::Read,
                    _ => false,
                },
                Role::SuperAdmin => true,
            }
        }

        /// Permission map keyed by data category, as reported to clients
        pub fn permission_map(&self) -> BTreeMap<DataCategory, Vec<Permission>> {
            DataCategory::ALL
                .iter()
                .filter_map(|category| {
                    let granted: Vec<Permission> = Permission::ALL
                        .iter()
                        .copied()
                        .filter(|permission| self.allows(*category, *permission))
                        .collect();
                    (!granted.is_empty()).then_some((*category, granted))
                })
                .collect()
        }
    }

    impl std::fmt::Display for Role {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Error returned when parsing an unknown role name
    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("unknown role '{0}'")]
    pub struct UnknownRole(pub String);

    impl FromStr for Role {
        type Err = UnknownRole;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Role::ALL
                .iter()
                .copied()
                .find(|role| role.as_str() == s)
                .ok_or_else(|| UnknownRole(s.to_string()))
        }
    }

    /// Permission types for data access
    #[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[serde(rename_all = "snake_case")]
    pub enum Permission {
        Read,
        Write,
        Dispense,
        Administer,
        Acknowledge,
        Manage,
    }

    impl Permission {
        pub const ALL: [Permission; 6] = [
            Permission::Read,
            Permission::Write,
            Permission::Dispense,
            Permission::Administer,
            Permission::Acknowledge,
            Permission::Manage,
        ];

        pub fn as_str(&self) -> &'static str {
            match self {
                Permission::Read => "read",
                Permission::Write => "write",
                Permission::Dispense => "dispense",
                Permission::Administer => "administer",
                Permission::Acknowledge => "acknowledge",
                Permission::Manage => "manage",
            }
        }
    }

    impl std::fmt::Display for Permission {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Data categories that can be protected
    #[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[serde(rename_all = "snake_case")]
    pub enum DataCategory {
        Demographics,
        Visits,
        VitalSigns,
        Medications,
        LabResults,
        Nursing,
        Appointments,
        Beds,
        CaseSheets,
        Messages,
        Administration,
        Analytics,
        Files,
        Billing,
    }

    impl DataCategory {
        pub const ALL: [DataCategory; 14] = [
            DataCategory::Demographics,
            DataCategory::Visits,
            DataCategory::VitalSigns,
            DataCategory::Medications,
            DataCategory::LabResults,
            DataCategory::Nursing,
            DataCategory::Appointments,
            DataCategory::Beds,
            DataCategory::CaseSheets,
            DataCategory::Messages,
            DataCategory::Administration,
            DataCategory::Analytics,
            DataCategory::Files,
            DataCategory::Billing,
        ];
    }

    impl std::fmt::Display for DataCategory {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                DataCategory::Demographics => write!(f, "Demographics"),
                DataCategory::Visits => write!(f, "Visits"),
                DataCategory::VitalSigns => write!(f, "VitalSigns"),
                DataCategory::Medications => write!(f, "Medications"),
                DataCategory::LabResults => write!(f, "LabResults"),
                DataCategory::Nursing => write!(f, "Nursing"),
                DataCategory::Appointments => write!(f, "Appointments"),
                DataCategory::Beds => write!(f, "Beds"),
                DataCategory::CaseSheets => write!(f, "CaseSheets"),
                DataCategory::Messages => write!(f, "Messages"),
                DataCategory::Administration => write!(f, "Administration"),
                DataCategory::Analytics => write!(f, "Analytics"),
                DataCategory::Files => write!(f, "Files"),
                DataCategory::Billing => write!(f, "Billing"),
            }
        }
    }

    /// Result of an authorization check
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    pub struct AuthorizationResult {
        /// Whether access is authorized
        pub authorized: bool,
        /// Reason for the authorization decision
        pub reason: String,
        pub category: DataCategory,
        pub permission: Permission,
    }

    /// Check a role against the permission map.
    ///
    /// Record-level scoping (hospital boundaries, a patient reading only
    /// their own chart) is layered on top of this by the server.
    pub fn check_authorization(
        role: Role,
        category: DataCategory,
        permission: Permission,
    ) -> AuthorizationResult {
        let authorized = role.allows(category, permission);
        let reason = if authorized {
            format!("Role {} grants {:?} on {}", role, permission, category)
        } else {
            format!("Role {} may not {:?} {}", role, permission, category)
        };
        AuthorizationResult {
            authorized,
            reason,
            category,
            permission,
        }
    }
}

/// Audit logging module - tracks all PHI access
pub mod audit {
    use super::*;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    /// Access log entry for audit trail
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    pub struct AccessLogEntry {
        pub id: Uuid,
        pub patient_id: Option<Uuid>,
        pub hospital_id: Option<Uuid>,
        pub accessor_id: Uuid,
        pub accessor_role: access_control::Role,
        pub data_categories: Vec<access_control::DataCategory>,
        pub access_type: access_control::Permission,
        /// Method and path of the request that caused the access
        pub action: String,
        pub accessed_at: DateTime<Utc>,
    }

    impl AccessLogEntry {
        pub fn new(
            accessor_id: Uuid,
            accessor_role: access_control::Role,
            patient_id: Option<Uuid>,
            categories: Vec<access_control::DataCategory>,
            access_type: access_control::Permission,
            action: impl Into<String>,
        ) -> Self {
            Self {
                id: Uuid::new_v4(),
                patient_id,
                hospital_id: None,
                accessor_id,
                accessor_role,
                data_categories: categories,
                access_type,
                action: action.into(),
                accessed_at: Utc::now(),
            }
        }

        pub fn with_hospital(mut self, hospital_id: Option<Uuid>) -> Self {
            self.hospital_id = hospital_id;
            self
        }
    }
}

/// Common types used across services
pub mod types {
    use super::*;

    /// Input for paginated queries
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    pub struct PaginationInput {
        pub offset: usize,
        pub limit: usize,
    }

    impl PaginationInput {
        pub const MAX_LIMIT: usize = 100;

        /// Build from optional query-string parts, falling back to defaults
        pub fn from_parts(offset: Option<usize>, limit: Option<usize>) -> Self {
            let default = Self::default();
            Self {
                offset: offset.unwrap_or(default.offset),
                limit: limit.unwrap_or(default.limit),
            }
        }

        pub fn validate(&self) -> Result<(), validation::ValidationFailed> {
            let mut result = validation::ValidationResult::new();
            if self.limit > Self::MAX_LIMIT {
                result.add_error(
                    "limit",
                    &format!("Limit cannot exceed {}", Self::MAX_LIMIT),
                    validation::ValidationErrorCode::OutOfRange,
                );
            }
            if self.limit == 0 {
                result.add_error(
                    "limit",
                    "Limit must be greater than 0",
                    validation::ValidationErrorCode::OutOfRange,
                );
            }
            result.into_result()
        }
    }

    impl Default for PaginationInput {
        fn default() -> Self {
            Self {
                offset: 0,
                limit: 50,
            }
        }
    }

    /// Result wrapper for paginated queries
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    pub struct PaginatedResult<T> {
        pub items: Vec<T>,
        pub total: usize,
        pub offset: usize,
        pub limit: usize,
        pub has_more: bool,
    }

    impl<T> PaginatedResult<T> {
        pub fn new(items: Vec<T>, total: usize, pagination: &PaginationInput) -> Self {
            Self {
                has_more: pagination.offset + items.len() < total,
                items,
                total,
                offset: pagination.offset,
                limit: pagination.limit,
            }
        }

        pub fn empty(pagination: &PaginationInput) -> Self {
            Self {
                items: Vec::new(),
                total: 0,
                offset: pagination.offset,
                limit: pagination.limit,
                has_more: false,
            }
        }

        pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
            PaginatedResult {
                items: self.items.into_iter().map(f).collect(),
                total: self.total,
                offset: self.offset,
                limit: self.limit,
                has_more: self.has_more,
            }
        }
    }
}

/// Input validation shared by every entry type
pub mod validation {
    use super::*;

    /// Validation error with detailed context
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    pub struct ValidationError {
        pub field: String,
        pub message: String,
        pub code: ValidationErrorCode,
    }

    /// Specific validation error codes for programmatic handling
    #[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum ValidationErrorCode {
        Required,
        InvalidFormat,
        OutOfRange,
        TooLong,
        TooShort,
        InvalidCharacters,
        DuplicateValue,
        InvalidReference,
    }

    impl std::fmt::Display for ValidationError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}: {} ({:?})", self.field, self.message, self.code)
        }
    }

    /// Error carrying every failed rule of a validation pass
    #[derive(Clone, Debug, PartialEq, thiserror::Error)]
    #[error("Validation failed: {}", join_errors(.errors))]
    pub struct ValidationFailed {
        pub errors: Vec<ValidationError>,
    }

    fn join_errors(errors: &[ValidationError]) -> String {
        errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
    }

    /// Validation result that can accumulate multiple errors
    #[derive(Clone, Debug, Default)]
    pub struct ValidationResult {
        pub errors: Vec<ValidationError>,
    }

    impl ValidationResult {
        pub fn new() -> Self {
            Self { errors: Vec::new() }
        }

        pub fn add_error(&mut self, field: &str, message: &str, code: ValidationErrorCode) {
            self.errors.push(ValidationError {
                field: field.to_string(),
                message: message.to_string(),
                code,
            });
        }

        pub fn is_valid(&self) -> bool {
            self.errors.is_empty()
        }

        pub fn into_result(self) -> Result<(), ValidationFailed> {
            if self.is_valid() {
                Ok(())
            } else {
                Err(ValidationFailed {
                    errors: self.errors,
                })
            }
        }

        pub fn merge(&mut self, other: ValidationResult) {
            self.errors.extend(other.errors);
        }

        /// Record a `Required` error when `value` is blank
        pub fn require(&mut self, field: &str, value: &str) {
            if value.trim().is_empty() {
                self.add_error(field, &format!("{} is required", field), ValidationErrorCode::Required);
            }
        }

        /// Record a `TooLong` error when `value` exceeds `max` characters
        pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
            if value.chars().count() > max {
                self.add_error(
                    field,
                    &format!("{} cannot exceed {} characters", field, max),
                    ValidationErrorCode::TooLong,
                );
            }
        }

        /// Record an `OutOfRange` error when `value` is outside `min..=max`
        pub fn in_range<T>(&mut self, field: &str, value: T, min: T, max: T)
        where
            T: PartialOrd + std::fmt::Display + Copy,
        {
            if value < min || value > max {
                self.add_error(
                    field,
                    &format!("{} must be between {} and {}", field, min, max),
                    ValidationErrorCode::OutOfRange,
                );
            }
        }
    }

    /// Validate a Medical Record Number (MRN)
    ///
    /// MRN must be:
    /// - 4-20 characters long
    /// - Alphanumeric with optional hyphens
    /// - Not empty
    pub fn validate_mrn(mrn: &str) -> ValidationResult {
        let mut result = ValidationResult::new();

        if mrn.is_empty() {
            result.add_error("mrn", "MRN is required", ValidationErrorCode::Required);
            return result;
        }

        if mrn.len() < 4 {
            result.add_error("mrn", "MRN must be at least 4 characters", ValidationErrorCode::TooShort);
        }

        if mrn.len() > 20 {
            result.add_error("mrn", "MRN cannot exceed 20 characters", ValidationErrorCode::TooLong);
        }

        if !mrn.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            result.add_error(
                "mrn",
                "MRN can only contain letters, numbers, and hyphens",
                ValidationErrorCode::InvalidCharacters,
            );
        }

        result
    }

    /// Validate an email address (shape only: local@domain.tld)
    pub fn validate_email(email: &str, field_name: &str) -> ValidationResult {
        let mut result = ValidationResult::new();

        if email.is_empty() {
            result.add_error(field_name, "Email is required", ValidationErrorCode::Required);
            return result;
        }

        if email.len() > 254 {
            result.add_error(field_name, "Email cannot exceed 254 characters", ValidationErrorCode::TooLong);
        }

        let valid_shape = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && domain.contains('.')
                    && !domain.contains('@')
            }
            None => false,
        };
        if !valid_shape || email.chars().any(char::is_whitespace) {
            result.add_error(field_name, "Email must look like name@example.org", ValidationErrorCode::InvalidFormat);
        }

        result
    }

    /// Validate a calendar date in YYYY-MM-DD form
    pub fn validate_date(date: &str, field_name: &str) -> ValidationResult {
        let mut result = ValidationResult::new();
        if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            result.add_error(
                field_name,
                "Date must be in YYYY-MM-DD format",
                ValidationErrorCode::InvalidFormat,
            );
        }
        result
    }

    /// Validate password strength for new accounts
    pub fn validate_password(password: &str) -> ValidationResult {
        let mut result = ValidationResult::new();

        if password.len() < 8 {
            result.add_error("password", "Password must be at least 8 characters", ValidationErrorCode::TooShort);
        }
        if password.len() > 128 {
            result.add_error("password", "Password cannot exceed 128 characters", ValidationErrorCode::TooLong);
        }
        let has_letter = password.chars().any(|c| c.is_alphabetic());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        if !(has_letter && has_digit) {
            result.add_error(
                "password",
                "Password must contain letters and numbers",
                ValidationErrorCode::InvalidFormat,
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_validation() {
        let valid = PaginationInput { offset: 0, limit: 50 };
        assert!(valid.validate().is_ok());

        let invalid = PaginationInput { offset: 0, limit: 200 };
        assert!(invalid.validate().is_err());

        let zero_limit = PaginationInput { offset: 0, limit: 0 };
        assert!(zero_limit.validate().is_err());
    }

    #[test]
    fn test_pagination_from_parts() {
        let p = PaginationInput::from_parts(None, Some(10));
        assert_eq!(p, PaginationInput { offset: 0, limit: 10 });
    }

    #[test]
    fn test_paginated_result() {
        let pagination = PaginationInput { offset: 0, limit: 10 };
        let result: PaginatedResult<u32> = PaginatedResult::new(vec![1, 2, 3, 4, 5], 20, &pagination);

        assert_eq!(result.items.len(), 5);
        assert_eq!(result.total, 20);
        assert!(result.has_more);

        let last_page = PaginatedResult::new(vec![1, 2], 12, &PaginationInput { offset: 10, limit: 10 });
        assert!(!last_page.has_more);
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn test_dashboard_paths() {
        assert_eq!(Role::Doctor.dashboard_path(), "/dashboard/doctor");
        assert_eq!(Role::LabTech.dashboard_path(), "/dashboard/lab-tech");
        assert_eq!(Role::SuperAdmin.dashboard_path(), "/dashboard/super-admin");
        assert_eq!(Role::RegionalAdmin.dashboard_path(), "/dashboard/admin");
    }

    #[test]
    fn test_clinical_actions_are_split_between_roles() {
        assert!(Role::Pharmacist.allows(DataCategory::Medications, Permission::Dispense));
        assert!(!Role::Pharmacist.allows(DataCategory::Medications, Permission::Administer));
        assert!(Role::Nurse.allows(DataCategory::Medications, Permission::Administer));
        assert!(!Role::Nurse.allows(DataCategory::Medications, Permission::Dispense));
        assert!(Role::Doctor.allows(DataCategory::Medications, Permission::Write));
        assert!(!Role::Patient.allows(DataCategory::Medications, Permission::Write));
    }

    #[test]
    fn test_super_admin_has_everything() {
        let map = Role::SuperAdmin.permission_map();
        assert_eq!(map.len(), DataCategory::ALL.len());
        assert!(map.values().all(|perms| perms.len() == Permission::ALL.len()));
    }

    #[test]
    fn test_patient_cannot_touch_administration() {
        let result = check_authorization(Role::Patient, DataCategory::Administration, Permission::Read);
        assert!(!result.authorized);
        assert!(result.reason.contains("patient"));
    }

    #[test]
    fn test_every_role_can_reach_messages() {
        for role in Role::ALL {
            assert!(role.allows(DataCategory::Messages, Permission::Read), "{}", role);
        }
    }

    #[test]
    fn test_data_category_display() {
        assert_eq!(format!("{}", DataCategory::Demographics), "Demographics");
        assert_eq!(format!("{}", DataCategory::LabResults), "LabResults");
    }

    // ============== Validation Module Tests ==============

    #[test]
    fn test_validate_mrn_valid() {
        assert!(validation::validate_mrn("MRN-12345").is_valid());
        assert!(validation::validate_mrn("ABC123").is_valid());
        assert!(validation::validate_mrn("1234").is_valid());
        assert!(validation::validate_mrn("MRN-261016-4F7KQ").is_valid());
    }

    #[test]
    fn test_validate_mrn_invalid() {
        let result = validation::validate_mrn("AB");
        assert!(result.errors.iter().any(|e| e.code == ValidationErrorCode::TooShort));

        let result = validation::validate_mrn("");
        assert!(result.errors.iter().any(|e| e.code == ValidationErrorCode::Required));

        let result = validation::validate_mrn("MRN@123!");
        assert!(result.errors.iter().any(|e| e.code == ValidationErrorCode::InvalidCharacters));

        let result = validation::validate_mrn("123456789012345678901");
        assert!(result.errors.iter().any(|e| e.code == ValidationErrorCode::TooLong));
    }

    #[test]
    fn test_validate_email() {
        assert!(validation::validate_email("doctor@hass.local", "email").is_valid());
        assert!(!validation::validate_email("doctor", "email").is_valid());
        assert!(!validation::validate_email("doctor@local", "email").is_valid());
        assert!(!validation::validate_email("a b@x.org", "email").is_valid());
        assert!(!validation::validate_email("", "email").is_valid());
    }

    #[test]
    fn test_validate_date() {
        assert!(validation::validate_date("1990-02-28", "date_of_birth").is_valid());
        assert!(!validation::validate_date("1990-02-30", "date_of_birth").is_valid());
        assert!(!validation::validate_date("28/02/1990", "date_of_birth").is_valid());
    }

    #[test]
    fn test_validate_password() {
        assert!(validation::validate_password("Password123!").is_valid());
        assert!(!validation::validate_password("short1").is_valid());
        assert!(!validation::validate_password("lettersonly").is_valid());
    }

    #[test]
    fn test_validation_failed_message_lists_every_error() {
        let mut result = ValidationResult::new();
        result.require("first_name", "");
        result.in_range("spo2", 120, 0, 100);
        let err = result.into_result().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("first_name"));
        assert!(message.contains("spo2"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn well_formed_mrns_validate(body in "[A-Z0-9]{4,16}") {
                prop_assert!(validation::validate_mrn(&body).is_valid());
            }

            #[test]
            fn mrns_with_symbols_are_rejected(prefix in "[A-Z]{2,6}", symbol in "[!@#$%^&*]") {
                let mrn = format!("{}{}99", prefix, symbol);
                prop_assert!(!validation::validate_mrn(&mrn).is_valid());
            }

            #[test]
            fn in_range_accepts_only_bounds(value in -50i32..250) {
                let mut result = ValidationResult::new();
                result.in_range("heart_rate", value, 20, 250);
                prop_assert_eq!(result.is_valid(), value >= 20);
            }
        }
    }
}

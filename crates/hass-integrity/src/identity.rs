//! Organisations and accounts: regions, hospitals, users.

use chrono::{DateTime, Utc};
use hass_shared::{validate_email, Role, ValidationErrorCode, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Group of hospitals administered together
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Region {
    pub id: Uuid,
    pub name: String,
    /// Short unique code, e.g. "NORTH"
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Hospital {
    pub id: Uuid,
    pub name: String,
    /// Short unique code, e.g. "GH"
    pub code: String,
    pub region_id: Option<Uuid>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A login account. Credentials live in [`UserCredentials`] and never leave the server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    /// Unique, stored lower-cased
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub hospital_id: Option<Uuid>,
    pub region_id: Option<Uuid>,
    pub phone: Option<String>,
    pub is_active: bool,
    /// Soft-delete flag; deleted users keep their audit history
    pub is_deleted: bool,
    pub two_factor_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Active and not soft-deleted
    pub fn can_sign_in(&self) -> bool {
        self.is_active && !self.is_deleted
    }
}

/// Secrets for a user, keyed by the user's id
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub password_hash: String,
    /// Hex-encoded TOTP secret once two-factor is enabled
    pub totp_secret: Option<String>,
    /// Secret issued by setup but not yet confirmed with a code
    pub pending_totp_secret: Option<String>,
    pub updated_at: DateTime<Utc>,
}

fn validate_code(code: &str, result: &mut ValidationResult) {
    result.require("code", code);
    result.max_len("code", code, 16);
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        result.add_error(
            "code",
            "Code can only contain letters, numbers, and hyphens",
            ValidationErrorCode::InvalidCharacters,
        );
    }
}

pub fn validate_region(region: &Region) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.require("name", &region.name);
    result.max_len("name", &region.name, 120);
    validate_code(&region.code, &mut result);
    result
}

pub fn validate_hospital(hospital: &Hospital) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.require("name", &hospital.name);
    result.max_len("name", &hospital.name, 200);
    validate_code(&hospital.code, &mut result);
    result
}

pub fn validate_user(user: &User) -> ValidationResult {
    let mut result = validate_email(&user.email, "email");
    result.require("full_name", &user.full_name);
    result.max_len("full_name", &user.full_name, 200);

    if user.email != user.email.to_lowercase() {
        result.add_error("email", "Email must be stored lower-cased", ValidationErrorCode::InvalidFormat);
    }

    match user.role {
        Role::RegionalAdmin if user.region_id.is_none() => {
            result.add_error(
                "region_id",
                "Regional admins must be assigned to a region",
                ValidationErrorCode::Required,
            );
        }
        Role::Doctor
        | Role::Nurse
        | Role::Pharmacist
        | Role::LabTech
        | Role::Manager
        | Role::Admin
        | Role::Reception
            if user.hospital_id.is_none() =>
        {
            result.add_error(
                "hospital_id",
                "Hospital staff must be assigned to a hospital",
                ValidationErrorCode::Required,
            );
        }
        _ => {}
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "nurse@hass.local".to_string(),
            full_name: "Ward Nurse".to_string(),
            role,
            hospital_id: Some(Uuid::new_v4()),
            region_id: None,
            phone: None,
            is_active: true,
            is_deleted: false,
            two_factor_enabled: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_staff_need_a_hospital() {
        let mut user = staff(Role::Nurse);
        assert!(validate_user(&user).is_valid());
        user.hospital_id = None;
        let result = validate_user(&user);
        assert!(result.errors.iter().any(|e| e.field == "hospital_id"));
    }

    #[test]
    fn test_regional_admin_needs_region() {
        let mut user = staff(Role::RegionalAdmin);
        user.hospital_id = None;
        assert!(!validate_user(&user).is_valid());
        user.region_id = Some(Uuid::new_v4());
        assert!(validate_user(&user).is_valid());
    }

    #[test]
    fn test_patient_accounts_are_unscoped() {
        let mut user = staff(Role::Patient);
        user.hospital_id = None;
        assert!(validate_user(&user).is_valid());
    }

    #[test]
    fn test_mixed_case_email_rejected() {
        let mut user = staff(Role::Doctor);
        user.email = "Doctor@Hass.Local".to_string();
        assert!(!validate_user(&user).is_valid());
    }

    #[test]
    fn test_soft_deleted_user_cannot_sign_in() {
        let mut user = staff(Role::Doctor);
        assert!(user.can_sign_in());
        user.is_deleted = true;
        assert!(!user.can_sign_in());
    }

    #[test]
    fn test_hospital_code_rules() {
        let now = Utc::now();
        let mut hospital = Hospital {
            id: Uuid::new_v4(),
            name: "General Hospital".to_string(),
            code: "GH-01".to_string(),
            region_id: None,
            address: None,
            phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(validate_hospital(&hospital).is_valid());
        hospital.code = "G H".to_string();
        assert!(!validate_hospital(&hospital).is_valid());
    }
}

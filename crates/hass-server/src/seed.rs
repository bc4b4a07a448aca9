//! First-start accounts and the demo hospital.

use chrono::Utc;
use hass_integrity::{
    Bed, BedStatus, BedType, Gender, Hospital, Patient, Region, User, Visit, VisitStatus, VisitType,
};
use hass_shared::Role;
use uuid::Uuid;

use crate::api::{admin, patients};
use crate::store::Filter;
use crate::AppState;

pub const DEMO_HOSPITAL_CODE: &str = "GH";
pub const DEMO_PASSWORD: &str = "Password123!";

/// Login email of the demo account for `role`
pub fn demo_email(role: Role) -> String {
    format!("{}@hass.local", role.as_str())
}

fn new_user(email: String, full_name: String, role: Role, hospital_id: Option<Uuid>, region_id: Option<Uuid>) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email,
        full_name,
        role,
        hospital_id,
        region_id,
        phone: None,
        is_active: true,
        is_deleted: false,
        two_factor_enabled: false,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Create the configured super admin when the database has no users.
pub async fn bootstrap(state: &AppState) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&state.config.bootstrap_email, &state.config.bootstrap_password) else {
        return Ok(());
    };
    if state.store.count::<User>(&Filter::default()).await? > 0 {
        return Ok(());
    }

    let user = new_user(email.to_lowercase(), "System Administrator".to_string(), Role::SuperAdmin, None, None);
    admin::create_account(state, user, password).await?;
    tracing::info!(%email, "bootstrap super admin created");
    Ok(())
}

/// Demo region and hospital with one account per role, a registered
/// patient with an open visit, and a few beds. Skipped if already present.
pub async fn demo(state: &AppState) -> anyhow::Result<()> {
    if state.store.find_by_key::<Hospital>(DEMO_HOSPITAL_CODE).await?.is_some() {
        return Ok(());
    }
    let now = Utc::now();

    let region = Region {
        id: Uuid::new_v4(),
        name: "Central Region".to_string(),
        code: "CENTRAL".to_string(),
        created_at: now,
        updated_at: now,
    };
    state.store.create(&region).await?;

    let hospital = Hospital {
        id: Uuid::new_v4(),
        name: "General Hospital".to_string(),
        code: DEMO_HOSPITAL_CODE.to_string(),
        region_id: Some(region.id),
        address: Some("1 Hospital Road".to_string()),
        phone: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    state.store.create(&hospital).await?;

    let mut patient_account = None;
    let mut reception = None;
    for role in Role::ALL {
        let (hospital_id, region_id) = match role {
            Role::SuperAdmin => (None, None),
            Role::RegionalAdmin => (None, Some(region.id)),
            Role::Patient => (None, None),
            _ => (Some(hospital.id), None),
        };
        let name = format!("Demo {}", role.as_str().replace('_', " "));
        let user = new_user(demo_email(role), name, role, hospital_id, region_id);
        let user = admin::create_account(state, user, DEMO_PASSWORD).await?;
        match role {
            Role::Patient => patient_account = Some(user),
            Role::Reception => reception = Some(user),
            _ => {}
        }
    }

    if let (Some(account), Some(registrar)) = (patient_account, reception) {
        let patient = Patient {
            id: Uuid::new_v4(),
            mrn: String::new(),
            hospital_id: hospital.id,
            first_name: "Demo".to_string(),
            last_name: "Patient".to_string(),
            date_of_birth: "1980-01-01".to_string(),
            gender: Gender::Female,
            blood_group: None,
            phone: None,
            email: Some(account.email.clone()),
            address: None,
            emergency_contact: None,
            allergies: vec!["Penicillin".to_string()],
            user_id: Some(account.id),
            registered_by: registrar.id,
            created_at: now,
            updated_at: now,
        };
        let patient = patients::register(state, patient).await?;

        let visit = Visit {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            hospital_id: hospital.id,
            visit_type: VisitType::Outpatient,
            status: VisitStatus::Pending,
            attending_doctor_id: None,
            chief_complaint: Some("Routine check-up".to_string()),
            department: Some("General Medicine".to_string()),
            admitted_at: None,
            discharged_at: None,
            discharge_summary: None,
            created_by: registrar.id,
            created_at: now,
            updated_at: now,
        };
        state.store.create(&visit).await?;
    }

    for (ward, number, bed_type) in [
        ("Ward A", "A-1", BedType::General),
        ("Ward A", "A-2", BedType::General),
        ("ICU", "ICU-1", BedType::Icu),
        ("Maternity", "M-1", BedType::Maternity),
    ] {
        let bed = Bed {
            id: Uuid::new_v4(),
            hospital_id: hospital.id,
            ward: ward.to_string(),
            bed_number: number.to_string(),
            bed_type,
            status: BedStatus::Available,
            patient_id: None,
            visit_id: None,
            assigned_at: None,
            created_at: now,
            updated_at: now,
        };
        state.store.create(&bed).await?;
    }

    tracing::info!(hospital = %hospital.code, "demo data seeded");
    Ok(())
}

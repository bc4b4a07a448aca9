//! Per-role dashboard navigation.
//!
//! Every sidebar item names the page route, a stable test id and the API
//! endpoint that backs the page. A role's items only point at endpoints
//! that role may read.

use hass_shared::Role;
use serde::{Deserialize, Serialize};

pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavItem {
    /// `nav-<role-slug>-<item>`
    pub test_id: String,
    pub label: String,
    pub href: String,
    /// GET endpoint the page loads first
    pub endpoint: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Navigation {
    pub role: Role,
    pub dashboard: String,
    pub items: Vec<NavItem>,
}

/// (item slug, label, endpoint relative to the API prefix)
type ItemSpec = (&'static str, &'static str, &'static str);

const OVERVIEW: ItemSpec = ("overview", "Overview", "/analytics/dashboard");
const MESSAGES: ItemSpec = ("messages", "Messages", "/messages/threads");
const PATIENTS: ItemSpec = ("patients", "Patients", "/patients");
const APPOINTMENTS: ItemSpec = ("appointments", "Appointments", "/appointments");
const BEDS: ItemSpec = ("beds", "Beds", "/beds");
const BILLING: ItemSpec = ("billing", "Billing", "/billing/invoices");
const USERS: ItemSpec = ("users", "Users", "/admin/users");
const HOSPITALS: ItemSpec = ("hospitals", "Hospitals", "/admin/hospitals");
const AUDIT_LOGS: ItemSpec = ("audit-logs", "Audit Logs", "/admin/audit-logs");
const ANALYTICS: ItemSpec = ("analytics", "Analytics", "/analytics/summary");

fn items_for(role: Role) -> Vec<ItemSpec> {
    match role {
        Role::Doctor => vec![
            OVERVIEW,
            PATIENTS,
            APPOINTMENTS,
            ("prescriptions", "Prescriptions", "/clinical/prescriptions"),
            ("lab-tests", "Lab Tests", "/clinical/lab-tests"),
            ("case-sheets", "Case Sheets", "/case-sheets"),
            MESSAGES,
        ],
        Role::Nurse => vec![
            OVERVIEW,
            PATIENTS,
            ("vitals", "Vitals", "/clinical/vitals"),
            ("medications", "Medications", "/clinical/prescriptions"),
            ("nurse-logs", "Nurse Logs", "/clinical/nurse-logs"),
            BEDS,
            MESSAGES,
        ],
        Role::Patient => vec![
            OVERVIEW,
            APPOINTMENTS,
            ("prescriptions", "My Prescriptions", "/clinical/prescriptions"),
            ("lab-results", "Lab Results", "/clinical/lab-tests"),
            BILLING,
            MESSAGES,
        ],
        Role::Pharmacist => vec![
            OVERVIEW,
            ("prescriptions", "Prescriptions", "/clinical/prescriptions"),
            PATIENTS,
            MESSAGES,
        ],
        Role::LabTech => vec![
            OVERVIEW,
            ("lab-tests", "Lab Queue", "/clinical/lab-tests"),
            PATIENTS,
            MESSAGES,
        ],
        Role::Manager => vec![
            OVERVIEW,
            BEDS,
            ANALYTICS,
            ("staff", "Staff", "/admin/users"),
            BILLING,
            MESSAGES,
        ],
        Role::Admin | Role::RegionalAdmin => {
            vec![OVERVIEW, USERS, HOSPITALS, BEDS, AUDIT_LOGS, MESSAGES]
        }
        Role::Reception => vec![
            OVERVIEW,
            PATIENTS,
            APPOINTMENTS,
            BEDS,
            (
                "discharge-requests",
                "Discharge Requests",
                "/case-sheets/discharge-requests/pending",
            ),
            BILLING,
            MESSAGES,
        ],
        Role::SuperAdmin => vec![
            OVERVIEW,
            USERS,
            HOSPITALS,
            ("regions", "Regions", "/admin/regions"),
            ANALYTICS,
            AUDIT_LOGS,
            MESSAGES,
        ],
    }
}

/// Sidebar manifest for a role
pub fn navigation_for(role: Role) -> Navigation {
    let slug = role.dashboard_slug();
    let dashboard = role.dashboard_path();

    let items = items_for(role)
        .into_iter()
        .map(|(item, label, endpoint)| NavItem {
            test_id: format!("nav-{}-{}", slug, item),
            label: label.to_string(),
            href: if item == "overview" {
                dashboard.clone()
            } else {
                format!("{}/{}", dashboard, item)
            },
            endpoint: format!("{}{}", API_PREFIX, endpoint),
        })
        .collect();

    Navigation { role, dashboard, items }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_prefixed_and_unique() {
        for role in Role::ALL {
            let nav = navigation_for(role);
            let prefix = format!("nav-{}-", role.dashboard_slug());
            let mut seen = HashSet::new();
            for item in &nav.items {
                assert!(item.test_id.starts_with(&prefix), "{}", item.test_id);
                assert!(seen.insert(item.test_id.clone()), "duplicate {}", item.test_id);
                assert!(item.endpoint.starts_with("/api/v1/"));
                assert!(item.href.starts_with(&nav.dashboard));
            }
        }
    }

    #[test]
    fn test_lab_tech_slug() {
        let nav = navigation_for(Role::LabTech);
        assert_eq!(nav.dashboard, "/dashboard/lab-tech");
        assert_eq!(nav.items[1].test_id, "nav-lab-tech-lab-tests");
        assert_eq!(nav.items[1].href, "/dashboard/lab-tech/lab-tests");
    }

    #[test]
    fn test_reception_sees_discharge_queue() {
        let nav = navigation_for(Role::Reception);
        assert!(nav
            .items
            .iter()
            .any(|i| i.endpoint == "/api/v1/case-sheets/discharge-requests/pending"));
    }
}

//! Sidebar navigation: every entry a role sees must load for that role.

#[cfg(test)]
mod tests {
    use crate::Harness;
    use hass_shared::Role;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_every_sidebar_entry_loads_for_every_role() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        for role in Role::ALL {
            let client = harness.client_as(role).await?;
            let nav = client.navigation().await?;
            assert_eq!(nav.role, role);
            assert_eq!(nav.dashboard, role.dashboard_path());

            for item in &nav.items {
                let loaded = client.get_json(&item.endpoint).await;
                assert!(loaded.is_ok(), "{} {} ({}): {:?}", role, item.test_id, item.endpoint, loaded.err());
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_test_ids_are_unique_and_role_scoped() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        for role in [Role::Doctor, Role::Reception, Role::LabTech, Role::SuperAdmin] {
            let nav = harness.client_as(role).await?.navigation().await?;
            let prefix = format!("nav-{}-", role.dashboard_slug());

            let mut seen = HashSet::new();
            for item in &nav.items {
                assert!(item.test_id.starts_with(&prefix), "{}", item.test_id);
                assert!(item.href.starts_with(&nav.dashboard), "{}", item.href);
                assert!(seen.insert(item.test_id.clone()), "duplicate {}", item.test_id);
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_patient_sidebar_has_no_staff_pages() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let nav = harness.client_as(Role::Patient).await?.navigation().await?;
        for item in &nav.items {
            assert!(!item.endpoint.contains("/admin/"), "{}", item.endpoint);
            assert!(!item.endpoint.ends_with("/patients"), "{}", item.endpoint);
        }
        Ok(())
    }
}

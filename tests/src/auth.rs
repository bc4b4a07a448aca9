//! Sign-in, dashboard routing, session handling.

#[cfg(test)]
mod tests {
    use crate::{operator_credentials, Harness};
    use hass_client::ClientError;
    use hass_server::seed::{demo_email, DEMO_PASSWORD};
    use hass_shared::Role;

    #[tokio::test]
    async fn test_server_is_healthy() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let health = harness.client()?.health().await?;
        assert_eq!(health["status"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_operator_can_sign_in() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let (email, password) = operator_credentials();
        let client = harness.client()?;
        let tokens = client.login(&email, &password, None).await?;
        assert_eq!(tokens.redirect_to, tokens.user.role.dashboard_path());
        assert!(client.is_signed_in());
        Ok(())
    }

    #[tokio::test]
    async fn test_each_role_lands_on_its_dashboard() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        for role in Role::ALL {
            let client = harness.client()?;
            let tokens = client.login(&demo_email(role), DEMO_PASSWORD, None).await?;
            assert_eq!(tokens.redirect_to, role.dashboard_path(), "{}", role);

            let me = client.me().await?;
            assert_eq!(me.user.role, role);
            assert_eq!(me.dashboard, role.dashboard_path());
            assert_eq!(client.current_user().map(|u| u.role), Some(role));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_password_keeps_user_signed_out() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let client = harness.client()?;
        let err = client
            .login(&demo_email(Role::Nurse), "Wrong-password-1", None)
            .await
            .unwrap_err();
        match err {
            ClientError::Api(api) => {
                assert_eq!(api.status, 401);
                assert_eq!(api.message, "Incorrect email or password");
                assert_eq!(api.redirect_to.as_deref(), Some("/login"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!client.is_signed_in());
        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_and_logout() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let client = harness.client_as(Role::Pharmacist).await?;

        let refreshed = client.refresh().await?;
        assert_eq!(refreshed.user.role, Role::Pharmacist);
        client.me().await?;

        client.logout().await?;
        assert!(!client.is_signed_in());
        assert!(matches!(client.me().await, Err(ClientError::Api(api)) if api.status == 401));
        Ok(())
    }
}

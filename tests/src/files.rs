//! File upload and download.

#[cfg(test)]
mod tests {
    use crate::{unique_suffix, Harness};
    use hass_client::{ListParams, Upload};
    use hass_shared::Role;

    #[tokio::test]
    async fn test_upload_then_download() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let (patient, _visit) = harness.admit_walk_in("Fay", &format!("F{}", unique_suffix())).await?;
        let reception = harness.client_as(Role::Reception).await?;

        let contents = b"Referral letter\nPlease review chest X-ray.\n".to_vec();
        let stored = reception
            .upload_file(Upload {
                filename: "../referral.txt".to_string(),
                content_type: "text/plain".to_string(),
                bytes: contents.clone(),
                patient_id: Some(patient.id),
                description: Some("GP referral".to_string()),
            })
            .await?;
        assert_eq!(stored.filename, "referral.txt");
        assert_eq!(stored.size_bytes, contents.len() as u64);
        assert_eq!(stored.sha256.len(), 64);
        assert!(stored.sha256.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(stored.patient_id, Some(patient.id));

        let doctor = harness.client_as(Role::Doctor).await?;
        let fetched = doctor.get_file(stored.id).await?;
        assert_eq!(fetched.sha256, stored.sha256);
        assert_eq!(doctor.download_file(stored.id).await?, contents);

        let listed = doctor.list_files(&ListParams::for_patient(patient.id)).await?;
        assert_eq!(listed.total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_patient_cannot_upload() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let patient = harness.client_as(Role::Patient).await?;
        let err = patient
            .upload_file(Upload {
                filename: "note.txt".to_string(),
                content_type: "text/plain".to_string(),
                bytes: b"hello".to_vec(),
                patient_id: None,
                description: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
        Ok(())
    }
}

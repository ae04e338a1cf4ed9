//! Pre-flight checks run before anything destructive

use tracing::info;

use crate::migration::types::MigrationRequest;
use crate::services::client::DashboardApi;
use crate::services::errors::MigrationError;

fn invalid(field: &str, message: impl Into<String>) -> MigrationError {
    MigrationError::Validation {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Reject requests with missing identifiers or a target equal to the source
pub fn validate_request(request: &MigrationRequest) -> Result<(), MigrationError> {
    let required = [
        ("source_org.id", &request.source_org.id),
        ("source_org.name", &request.source_org.name),
        ("source_network.id", &request.source_network.id),
        ("source_network.name", &request.source_network.name),
        ("target_org.id", &request.target_org.id),
        ("target_org.name", &request.target_org.name),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(invalid(field, "must not be empty"));
        }
    }
    if request.source_org.id == request.target_org.id {
        return Err(invalid(
            "target_org.id",
            "target organization must differ from the source organization",
        ));
    }
    if let Some(name) = &request.target_network_name {
        if name.trim().is_empty() {
            return Err(invalid("target_network_name", "must not be blank when given"));
        }
    }
    Ok(())
}

/// Confirm both API keys can see the organizations and network named in the
/// request, and that ids and names agree.
pub async fn verify_access(
    source: &dyn DashboardApi,
    target: &dyn DashboardApi,
    request: &MigrationRequest,
) -> Result<(), MigrationError> {
    validate_request(request)?;

    let source_org = source
        .get_organization(&request.source_org.id)
        .await
        .map_err(|e| MigrationError::api("verify source organization", e))?
        .ok_or_else(|| {
            invalid(
                "source_org.id",
                format!("organization {} is not accessible with the source key", request.source_org.id),
            )
        })?;
    if source_org.name != request.source_org.name {
        return Err(invalid(
            "source_org.name",
            format!("expected '{}', dashboard reports '{}'", request.source_org.name, source_org.name),
        ));
    }

    let network = source
        .get_network(&request.source_network.id)
        .await
        .map_err(|e| MigrationError::api("verify source network", e))?
        .ok_or_else(|| {
            invalid(
                "source_network.id",
                format!("network {} is not accessible with the source key", request.source_network.id),
            )
        })?;
    if network.name != request.source_network.name {
        return Err(invalid(
            "source_network.name",
            format!("expected '{}', dashboard reports '{}'", request.source_network.name, network.name),
        ));
    }
    if let Some(org_id) = &network.organization_id {
        if org_id != &request.source_org.id {
            return Err(invalid(
                "source_network.id",
                format!("network belongs to organization {}", org_id),
            ));
        }
    }

    let target_org = target
        .get_organization(&request.target_org.id)
        .await
        .map_err(|e| MigrationError::api("verify target organization", e))?
        .ok_or_else(|| {
            invalid(
                "target_org.id",
                format!("organization {} is not accessible with the target key", request.target_org.id),
            )
        })?;
    if target_org.name != request.target_org.name {
        return Err(invalid(
            "target_org.name",
            format!("expected '{}', dashboard reports '{}'", request.target_org.name, target_org.name),
        ));
    }

    info!(
        "[Validation] Access verified: {} / {} -> {}",
        source_org.name, network.name, target_org.name
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::test_fixtures::*;

    #[tokio::test]
    async fn test_fixture_request_is_accessible() {
        verify_access(&source_dashboard(), &target_dashboard(), &request())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_name_mismatch_is_rejected() {
        let mut req = request();
        req.source_network.name = "HQ".into();

        let err = verify_access(&source_dashboard(), &target_dashboard(), &req)
            .await
            .unwrap_err();
        match err {
            MigrationError::Validation { field, .. } => assert_eq!(field, "source_network.name"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inaccessible_target_org_is_rejected() {
        let mut req = request();
        req.target_org.id = "999".into();

        let err = verify_access(&source_dashboard(), &target_dashboard(), &req)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Validation { ref field, .. } if field == "target_org.id"));
    }

    #[test]
    fn test_same_org_migration_is_rejected() {
        let mut req = request();
        req.target_org = req.source_org.clone();
        assert!(validate_request(&req).is_err());
    }
}

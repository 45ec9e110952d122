//! Stable identifiers for reconciled resources.
//!
//! A declarative caller stores these strings and hands them back on import,
//! so the formats are fixed:
//!
//! | Resource | Format |
//! |----------|--------|
//! | Secret access | `{model_uuid}:{secret_id}` |
//! | Action | `{model}/{action}/{id}` |

use uuid::Uuid;

use crate::error::ClientError;

pub fn secret_resource_id(model_uuid: Uuid, secret_id: &str) -> String {
    format!("{model_uuid}:{secret_id}")
}

/// Split a secret access identifier back into model UUID and secret ID.
pub fn parse_secret_resource_id(id: &str) -> Result<(Uuid, String), ClientError> {
    let invalid = || ClientError::InvalidResourceId {
        id: id.to_string(),
        expected: "<model uuid>:<secret id>",
    };
    let (model, secret) = id.split_once(':').ok_or_else(invalid)?;
    if secret.is_empty() || secret.contains(':') {
        return Err(invalid());
    }
    let model_uuid = Uuid::parse_str(model).map_err(|_| invalid())?;
    Ok((model_uuid, secret.to_string()))
}

pub fn action_resource_id(model: &str, action: &str, id: &str) -> String {
    format!("{model}/{action}/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "6f1c1a7e-3b4d-4c8e-9a51-0e2f3d4c5b6a";

    #[test]
    fn secret_id_round_trips() {
        let uuid = Uuid::parse_str(MODEL).unwrap();
        let id = secret_resource_id(uuid, "coj8mulh8b41e8nv6p90");
        assert_eq!(id, format!("{MODEL}:coj8mulh8b41e8nv6p90"));
        assert_eq!(
            parse_secret_resource_id(&id).unwrap(),
            (uuid, "coj8mulh8b41e8nv6p90".to_string())
        );
    }

    #[test]
    fn malformed_secret_ids_are_rejected() {
        for bad in [
            "no-separator".to_string(),
            format!("{MODEL}:"),
            format!("{MODEL}:a:b"),
            "not-a-uuid:secret".to_string(),
        ] {
            assert!(matches!(
                parse_secret_resource_id(&bad),
                Err(ClientError::InvalidResourceId { .. })
            ));
        }
    }

    #[test]
    fn action_id_format() {
        assert_eq!(action_resource_id("dev", "backup", "42"), "dev/backup/42");
    }
}

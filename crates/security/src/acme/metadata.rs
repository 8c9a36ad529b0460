//! ACME directory metadata.

use serde::{Deserialize, Serialize};

/// The `meta` object of an ACME directory.
///
/// Every field is optional; absent fields are omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcmeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caa_identities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_account_required: Option<bool>,
}

impl AcmeMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_omitted() {
        let metadata = AcmeMetadata {
            terms_of_service: Some("https://ca.example/tos".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&metadata).unwrap(),
            r#"{"termsOfService":"https://ca.example/tos"}"#
        );
        assert_eq!(serde_json::to_string(&AcmeMetadata::default()).unwrap(), "{}");
        assert!(AcmeMetadata::default().is_empty());
        assert!(!metadata.is_empty());
    }

    #[test]
    fn test_parse_directory_meta() {
        let metadata: AcmeMetadata = serde_json::from_str(
            r#"{
                "termsOfService": "https://ca.example/tos",
                "website": "https://ca.example",
                "caaIdentities": ["ca.example"],
                "externalAccountRequired": false
            }"#,
        )
        .unwrap();

        assert_eq!(metadata.website.as_deref(), Some("https://ca.example"));
        assert_eq!(metadata.caa_identities, Some(vec!["ca.example".to_string()]));
        assert_eq!(metadata.external_account_required, Some(false));
    }
}

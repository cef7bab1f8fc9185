//! Type detection for documents that arrive untagged.

use serde_json::Value;

use docgraph_shared::DocumentType;

/// Type of a parsed JSON document, judged by its top-level markers.
pub(crate) fn guess_type(root: &Value) -> DocumentType {
    let Some(obj) = root.as_object() else {
        return DocumentType::Unknown;
    };
    if obj.get("spdxVersion").and_then(Value::as_str).is_some() {
        return DocumentType::Spdx;
    }
    if obj.get("bomFormat").and_then(Value::as_str) == Some("CycloneDX") {
        return DocumentType::CycloneDx;
    }
    DocumentType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spdx_detected_by_version_key() {
        assert_eq!(guess_type(&json!({"spdxVersion": "SPDX-2.3"})), DocumentType::Spdx);
    }

    #[test]
    fn cyclonedx_detected_by_bom_format() {
        assert_eq!(
            guess_type(&json!({"bomFormat": "CycloneDX", "specVersion": "1.5"})),
            DocumentType::CycloneDx
        );
        assert_eq!(guess_type(&json!({"bomFormat": "Other"})), DocumentType::Unknown);
    }

    #[test]
    fn non_object_is_unknown() {
        assert_eq!(guess_type(&json!([{"spdxVersion": "SPDX-2.3"}])), DocumentType::Unknown);
    }
}

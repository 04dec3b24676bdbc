//! Import helpers for resource `import_state` implementations

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Writes the import ID verbatim into one state attribute.
///
/// Example: ID "file-abc123" -> state.id = "file-abc123"
pub fn import_state_passthrough_id(
    _ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::object();

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!(
                    "Could not set attribute '{}' to value '{}'",
                    attr_path, request.id
                ),
            )
            .with_attribute(attr_path),
        );
        return;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
        private: Vec::new(),
    });
}

/// Splits a composite import ID on `separator` and writes each part into
/// the matching attribute.
///
/// Example: ID "proj_1/svc_2" with paths [project_id, id]
pub fn import_state_split_id(
    _ctx: &Context,
    separator: char,
    attr_paths: &[AttributePath],
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let parts: Vec<&str> = request.id.split(separator).collect();
    if parts.len() != attr_paths.len() || parts.iter().any(|p| p.is_empty()) {
        let expected: Vec<String> = attr_paths.iter().map(|p| p.to_string()).collect();
        response.diagnostics.push(Diagnostic::error(
            "Unexpected Import Identifier",
            format!(
                "Expected import identifier with format: {}. Got: {:?}",
                expected.join(&separator.to_string()),
                request.id
            ),
        ));
        return;
    }

    let mut state = DynamicValue::object();
    for (path, part) in attr_paths.iter().zip(parts) {
        if let Err(e) = state.set_string(path, part) {
            response.diagnostics.push(
                Diagnostic::error(format!("Failed to set import ID: {}", e), "")
                    .with_attribute(path.clone()),
            );
            return;
        }
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
        private: Vec::new(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientCapabilities;

    fn request(id: &str) -> ImportResourceStateRequest {
        ImportResourceStateRequest {
            type_name: "openai_project_service_account".to_string(),
            id: id.to_string(),
            client_capabilities: ClientCapabilities::default(),
        }
    }

    fn empty_response() -> ImportResourceStateResponse {
        ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
            deferred: None,
        }
    }

    #[test]
    fn passthrough_sets_id() {
        let mut response = empty_response();
        import_state_passthrough_id(
            &Context::new(),
            AttributePath::new("id"),
            &request("file-abc"),
            &mut response,
        );

        assert!(response.diagnostics.is_empty());
        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "file-abc");
    }

    #[test]
    fn split_id_sets_each_part() {
        let mut response = empty_response();
        import_state_split_id(
            &Context::new(),
            '/',
            &[AttributePath::new("project_id"), AttributePath::new("id")],
            &request("proj_1/svc_2"),
            &mut response,
        );

        let state = &response.imported_resources[0].state;
        assert_eq!(
            state.get_string(&AttributePath::new("project_id")).unwrap(),
            "proj_1"
        );
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "svc_2");
    }

    #[test]
    fn split_id_rejects_wrong_shape() {
        let mut response = empty_response();
        import_state_split_id(
            &Context::new(),
            '/',
            &[AttributePath::new("project_id"), AttributePath::new("id")],
            &request("svc_2"),
            &mut response,
        );

        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Unexpected Import Identifier");
    }
}

//! Request matchers.

use super::multimap::Multimap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Matcher over HTTP requests; also the shape of recorded requests.
///
/// An empty matcher (`HttpRequest::default()`) matches every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Multimap::is_empty")]
    pub query_string_parameters: Multimap,
    #[serde(default, skip_serializing_if = "Multimap::is_empty")]
    pub headers: Multimap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, String>,
    /// Body matcher; a plain string or a typed body object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<bool>,
}

impl HttpRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_query_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<serde_json::Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }
}

/// Matcher defined by an OpenAPI specification (optionally one operation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenApiDefinition {
    /// URL, classpath location or inline JSON/YAML of the specification
    pub spec_url_or_payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

impl OpenApiDefinition {
    pub fn new(spec_url_or_payload: impl Into<String>) -> Self {
        Self {
            spec_url_or_payload: spec_url_or_payload.into(),
            operation_id: None,
        }
    }

    #[must_use]
    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }
}

/// Any request matcher accepted by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestDefinition {
    // OpenAPI first: every object would deserialize as an (empty) HttpRequest
    OpenApi(OpenApiDefinition),
    Http(HttpRequest),
}

impl Default for RequestDefinition {
    fn default() -> Self {
        RequestDefinition::Http(HttpRequest::default())
    }
}

impl From<HttpRequest> for RequestDefinition {
    fn from(request: HttpRequest) -> Self {
        RequestDefinition::Http(request)
    }
}

impl From<OpenApiDefinition> for RequestDefinition {
    fn from(definition: OpenApiDefinition) -> Self {
        RequestDefinition::OpenApi(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_matcher_serializes_to_empty_object() {
        assert_eq!(serde_json::to_value(HttpRequest::new()).unwrap(), json!({}));
    }

    #[test]
    fn test_matcher_wire_shape() {
        let request = HttpRequest::new()
            .with_method("GET")
            .with_path("/orders")
            .with_query_parameter("page", "2")
            .with_header("Accept", "application/json")
            .with_secure(true);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "method": "GET",
                "path": "/orders",
                "queryStringParameters": {"page": ["2"]},
                "headers": {"Accept": ["application/json"]},
                "secure": true
            })
        );
    }

    #[test]
    fn test_definition_deserializes_openapi_before_http() {
        let def: RequestDefinition =
            serde_json::from_str(r#"{"specUrlOrPayload": "petstore.yaml", "operationId": "listPets"}"#)
                .unwrap();
        assert_eq!(
            def,
            RequestDefinition::OpenApi(
                OpenApiDefinition::new("petstore.yaml").with_operation_id("listPets")
            )
        );

        let def: RequestDefinition = serde_json::from_str(r#"{"path": "/pets"}"#).unwrap();
        assert_eq!(
            def,
            RequestDefinition::Http(HttpRequest::new().with_path("/pets"))
        );
    }
}

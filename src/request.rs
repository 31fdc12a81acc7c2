//! Request descriptors consumed by the interception pipeline

use reqwest::Method;
use serde_json::Value;

/// Describes an outbound API request.
///
/// This is the unit the key generators, predicates and transport all
/// operate on. The interceptor clones it before tagging so caller-owned
/// descriptors are never mutated.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    /// Query parameters, appended to the URL by the transport.
    pub params: Vec<(String, String)>,
    /// JSON body, sent for mutating requests.
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let descriptor = RequestDescriptor::get("/players")
            .with_param("team", "42")
            .with_body(json!({"name": "X"}));

        assert_eq!(descriptor.method, Method::GET);
        assert_eq!(descriptor.url, "/players");
        assert_eq!(descriptor.params, vec![("team".to_string(), "42".to_string())]);
        assert_eq!(descriptor.body, Some(json!({"name": "X"})));
    }
}

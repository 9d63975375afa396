use axum::extract::Query;
use axum::http::{Method, Uri};
use regex::RegexSet;
use serde_json::Value;

use crate::{config::security::SecurityConfig, errors::RejectReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Empty,
    Json,
}

impl ContentClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentClass::Empty => "empty",
            ContentClass::Json => "json",
        }
    }
}

/// Stateless pre-handler screening: media type, size and injection-style
/// content. Holds only the compiled pattern set.
pub struct RequestValidator {
    patterns: RegexSet,
    max_body_bytes: usize,
}

impl RequestValidator {
    pub fn new(config: &SecurityConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: RegexSet::new(&config.injection_patterns)?,
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn carries_body(method: &Method) -> bool {
        matches!(*method, Method::POST | Method::PUT | Method::PATCH)
    }

    /// A declared `Content-Length` over the limit is rejected before the body
    /// is read.
    pub fn check_declared_length(&self, content_length: Option<u64>) -> Result<(), RejectReason> {
        match content_length {
            Some(len) if len > self.max_body_bytes as u64 => Err(RejectReason::PayloadTooLarge),
            _ => Ok(()),
        }
    }

    /// Body-carrying methods must declare JSON, unless they carry no body and
    /// declare nothing at all.
    pub fn check_content_type(
        &self,
        method: &Method,
        content_type: Option<&str>,
        body_len: usize,
    ) -> Result<ContentClass, RejectReason> {
        if !Self::carries_body(method) {
            return Ok(if body_len == 0 {
                ContentClass::Empty
            } else {
                ContentClass::Json
            });
        }
        match content_type {
            Some(ct) if is_json(ct) => Ok(ContentClass::Json),
            None if body_len == 0 => Ok(ContentClass::Empty),
            _ => Err(RejectReason::UnsupportedMediaType),
        }
    }

    pub fn is_suspicious(&self, text: &str) -> bool {
        self.patterns.is_match(text)
    }

    /// Scans the raw body and, when it is JSON, every decoded key and string
    /// value so escape sequences cannot hide a pattern.
    pub fn scan_body(&self, body: &[u8]) -> Result<(), RejectReason> {
        if body.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(body);
        if self.is_suspicious(&text) {
            return Err(RejectReason::SuspiciousContent);
        }
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            if self.json_is_suspicious(&value) {
                return Err(RejectReason::SuspiciousContent);
            }
        }
        Ok(())
    }

    /// Scans the raw query string and its percent-decoded pairs.
    pub fn scan_query(&self, uri: &Uri) -> Result<(), RejectReason> {
        let Some(raw) = uri.query() else {
            return Ok(());
        };
        if self.is_suspicious(raw) {
            return Err(RejectReason::SuspiciousContent);
        }
        if let Ok(Query(pairs)) = Query::<Vec<(String, String)>>::try_from_uri(uri) {
            if pairs
                .iter()
                .any(|(k, v)| self.is_suspicious(k) || self.is_suspicious(v))
            {
                return Err(RejectReason::SuspiciousContent);
            }
        }
        Ok(())
    }

    fn json_is_suspicious(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => self.is_suspicious(s),
            Value::Array(items) => items.iter().any(|v| self.json_is_suspicious(v)),
            Value::Object(map) => map
                .iter()
                .any(|(k, v)| self.is_suspicious(k) || self.json_is_suspicious(v)),
            _ => false,
        }
    }
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn validator() -> RequestValidator {
        RequestValidator::new(&SecurityConfig::default()).unwrap()
    }

    #[test_case(r#"{"message":"<script>alert(1)</script>"}"# ; "script tag")]
    #[test_case(r#"{"q":"1 UNION SELECT password FROM users"}"# ; "union select")]
    #[test_case(r#"{"cmd":"x; rm -rf /"}"# ; "shell chain")]
    #[test_case(r#"{"u":"javascript:alert(1)"}"# ; "js url")]
    #[test_case(r#"{"m":"\u003cscript\u003e"}"# ; "escaped script")]
    #[test_case(r#"{"<script>":1}"# ; "suspicious key")]
    fn injection_bodies_are_rejected(body: &str) {
        assert_eq!(
            validator().scan_body(body.as_bytes()),
            Err(RejectReason::SuspiciousContent)
        );
    }

    #[test_case(r#"{"code":"ABC-123","userId":"user1"}"# ; "activation")]
    #[test_case(r#"{"ipAddress":"203.0.113.5"}"# ; "ip")]
    #[test_case(r#"{"reason":"Selected for union membership review"}"# ; "benign words")]
    #[test_case("" ; "empty")]
    fn ordinary_bodies_pass(body: &str) {
        assert_eq!(validator().scan_body(body.as_bytes()), Ok(()));
    }

    #[test]
    fn encoded_query_injection_is_rejected() {
        let v = validator();
        let uri: Uri = "/ip?next=%3Cscript%3Ealert(1)%3C%2Fscript%3E".parse().unwrap();
        assert_eq!(v.scan_query(&uri), Err(RejectReason::SuspiciousContent));
        let ok: Uri = "/ip?page=2".parse().unwrap();
        assert_eq!(v.scan_query(&ok), Ok(()));
    }

    #[test_case(Method::POST, Some("application/json"), 10, Ok(ContentClass::Json) ; "json")]
    #[test_case(Method::POST, Some("Application/JSON; charset=utf-8"), 10, Ok(ContentClass::Json) ; "json with params")]
    #[test_case(Method::PUT, Some("text/plain"), 10, Err(RejectReason::UnsupportedMediaType) ; "text")]
    #[test_case(Method::POST, None, 10, Err(RejectReason::UnsupportedMediaType) ; "undeclared body")]
    #[test_case(Method::POST, None, 0, Ok(ContentClass::Empty) ; "empty post")]
    #[test_case(Method::GET, Some("text/plain"), 0, Ok(ContentClass::Empty) ; "get ignores type")]
    fn content_type_rules(
        method: Method,
        content_type: Option<&str>,
        len: usize,
        expected: Result<ContentClass, RejectReason>,
    ) {
        assert_eq!(validator().check_content_type(&method, content_type, len), expected);
    }

    #[test]
    fn declared_length_over_limit_is_rejected() {
        let v = validator();
        assert_eq!(
            v.check_declared_length(Some(10 * 1024 * 1024 + 1)),
            Err(RejectReason::PayloadTooLarge)
        );
        assert_eq!(v.check_declared_length(Some(512)), Ok(()));
        assert_eq!(v.check_declared_length(None), Ok(()));
    }
}

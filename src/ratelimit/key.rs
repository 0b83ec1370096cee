//! Rate limit key generation and handling.

use axum::http::HeaderMap;

/// Client identifier used when no forwarded address is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// A key that uniquely identifies a rate limit record.
///
/// Records are tracked per client and per matched endpoint prefix, so every
/// path under `/api/artigos` shares one counter for a given client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// The client identifier (usually the first forwarded address)
    pub client: String,
    /// The rule prefix the request path matched
    pub prefix: String,
}

impl RateLimitKey {
    /// Create a new key from a client identifier and matched prefix.
    pub fn new(client: &str, prefix: &str) -> Self {
        Self {
            client: client.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

impl std::fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.client, self.prefix)
    }
}

/// Derive the client identifier from request headers.
///
/// Takes the first hop of `X-Forwarded-For`. A missing, non-UTF-8 or empty
/// value falls back to the shared [`UNKNOWN_CLIENT`] bucket instead of
/// failing the request.
pub fn client_id(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|client| !client.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_key_display() {
        let key = RateLimitKey::new("1.2.3.4", "/api/newsletter");
        assert_eq!(key.to_string(), "1.2.3.4:/api/newsletter");
    }

    #[test]
    fn test_key_equality() {
        let key1 = RateLimitKey::new("1.2.3.4", "/api/");
        let key2 = RateLimitKey::new("1.2.3.4", "/api/");
        let key3 = RateLimitKey::new("5.6.7.8", "/api/");

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_client_id_first_hop() {
        let headers = headers_with(" 203.0.113.7 , 10.0.0.1, 10.0.0.2");
        assert_eq!(client_id(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_id_single_value() {
        assert_eq!(client_id(&headers_with("198.51.100.2")), "198.51.100.2");
    }

    #[test]
    fn test_client_id_missing_header() {
        assert_eq!(client_id(&HeaderMap::new()), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_client_id_empty_first_hop() {
        assert_eq!(client_id(&headers_with(" , 10.0.0.1")), UNKNOWN_CLIENT);
        assert_eq!(client_id(&headers_with("")), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_client_id_non_utf8() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_bytes(b"\xff\xfe").unwrap(),
        );
        assert_eq!(client_id(&headers), UNKNOWN_CLIENT);
    }
}

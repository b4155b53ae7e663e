//! Caller key derivation.
//!
//! The limiter itself only sees opaque key strings. Transport-facing
//! collaborators extract a client identity from the request and compose
//! the key with these helpers.

/// Sentinel identity used when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive a client identity from proxy-forwarded address headers.
///
/// Prefers the first hop of the forwarded-client list (the
/// `X-Forwarded-For` value), falls back to the real-IP header value,
/// and finally to [`UNKNOWN_CLIENT`].
pub fn client_ip(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    if let Some(list) = forwarded_for {
        if let Some(first) = list.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(addr) = real_ip {
        let addr = addr.trim();
        if !addr.is_empty() {
            return addr.to_string();
        }
    }

    UNKNOWN_CLIENT.to_string()
}

/// Compose a namespaced limiter key, e.g. `"webhook:42"` or `"ip:10.0.0.1"`.
///
/// Namespacing keeps quotas for different protected routes independent
/// even when they are keyed by the same underlying identity.
pub fn scoped(namespace: &str, id: &str) -> String {
    format!("{}:{}", namespace, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_takes_first_forwarded_hop() {
        let key = client_ip(Some("203.0.113.9, 10.0.0.2, 10.0.0.1"), Some("10.0.0.1"));
        assert_eq!(key, "203.0.113.9");
    }

    #[test]
    fn test_client_ip_trims_whitespace() {
        let key = client_ip(Some("  203.0.113.9 , 10.0.0.2"), None);
        assert_eq!(key, "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip() {
        assert_eq!(client_ip(None, Some("198.51.100.4")), "198.51.100.4");
        assert_eq!(client_ip(Some(""), Some(" 198.51.100.4 ")), "198.51.100.4");
    }

    #[test]
    fn test_client_ip_unknown_when_nothing_available() {
        assert_eq!(client_ip(None, None), UNKNOWN_CLIENT);
        assert_eq!(client_ip(Some("  "), Some("")), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_scoped_key_format() {
        assert_eq!(scoped("webhook", "42"), "webhook:42");
        assert_eq!(scoped("ip", "10.0.0.1"), "ip:10.0.0.1");
    }
}

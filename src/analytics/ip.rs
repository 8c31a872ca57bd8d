//! Client IP extraction from HTTP headers
//!
//! Walks the X-Forwarded-For chain right to left, skipping addresses inside
//! the configured trusted-proxy CIDRs, and falls back to the socket remote
//! address when the header is absent or unparseable.

use axum::http::HeaderMap;
use ipnet::IpNet;
use std::net::IpAddr;

/// Extract the client IP address for visit recording.
///
/// With no trusted proxies configured, the rightmost X-Forwarded-For entry
/// is used (the hop closest to this service). With trusted CIDRs, the first
/// address from the right that is outside every trusted range wins.
pub fn client_ip(headers: &HeaderMap, socket_addr: IpAddr, trusted: &[IpNet]) -> IpAddr {
    let Some(ips) = forwarded_chain(headers) else {
        return socket_addr;
    };

    if trusted.is_empty() {
        return *ips.last().unwrap_or(&socket_addr);
    }

    for ip in ips.iter().rev() {
        if !trusted.iter().any(|net| net.contains(ip)) {
            return *ip;
        }
    }

    // Every hop was a trusted proxy; the leftmost entry is the best guess.
    *ips.first().unwrap_or(&socket_addr)
}

fn forwarded_chain(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    let ips: Vec<IpAddr> = xff
        .split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    if ips.is_empty() {
        None
    } else {
        Some(ips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn socket() -> IpAddr {
        "192.168.1.1".parse().unwrap()
    }

    #[test]
    fn no_header_uses_socket_address() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, socket(), &[]), socket());
    }

    #[test]
    fn rightmost_entry_without_trust_config() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );

        assert_eq!(
            client_ip(&headers, socket(), &[]),
            "198.51.100.1".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn trusted_proxies_are_skipped_right_to_left() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 10.0.0.5, 10.0.0.9"),
        );
        let trusted = vec!["10.0.0.0/8".parse::<IpNet>().unwrap()];

        assert_eq!(
            client_ip(&headers, socket(), &trusted),
            "203.0.113.1".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn all_trusted_falls_back_to_leftmost() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.1.0.1, 10.0.0.9"),
        );
        let trusted = vec!["10.0.0.0/8".parse::<IpNet>().unwrap()];

        assert_eq!(
            client_ip(&headers, socket(), &trusted),
            "10.1.0.1".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn garbage_header_uses_socket_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));

        assert_eq!(client_ip(&headers, socket(), &[]), socket());
    }

    #[test]
    fn ipv6_chain() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("2001:db8::1, 2001:db8::2"),
        );

        assert_eq!(
            client_ip(&headers, socket(), &[]),
            "2001:db8::2".parse::<IpAddr>().unwrap()
        );
    }
}

use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::config;
use crate::error::ApiError;

/// Refuses clients outside `security.whitelisted_ips`; an empty list admits everyone
pub async fn ip_allow_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let security = &config::config().security;
    if security.whitelisted_ips.is_empty() {
        return Ok(next.run(request).await);
    }

    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip());
    check_client(&security.whitelisted_ips, &security.trusted_proxies, request.headers(), peer)?;
    Ok(next.run(request).await)
}

fn check_client(
    allowed: &[String],
    trusted_proxies: &[String],
    headers: &HeaderMap,
    peer: Option<IpAddr>,
) -> Result<(), ApiError> {
    let Some(ip) = client_ip(headers, peer, trusted_proxies) else {
        warn!("request without a client address refused");
        return Err(ApiError::forbidden("client address unknown"));
    };

    if !is_allowed(allowed, &ip) {
        warn!(ip = %ip, "request from address outside the allow-list refused");
        return Err(ApiError::forbidden(format!("address {} is not allowed", ip)));
    }
    Ok(())
}

/// The socket peer, or the first `X-Forwarded-For` hop when the peer is a trusted proxy
fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trusted_proxies: &[String]) -> Option<String> {
    let peer = peer?;
    if !trusted_proxies.iter().any(|p| p.parse::<IpAddr>().is_ok_and(|p| p == peer)) {
        return Some(peer.to_string());
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| Some(peer.to_string()))
}

/// IPv6 loopback is always admitted; otherwise an entry must match every
/// IPv4 octet, where a `0` octet in the entry matches anything
fn is_allowed(allowed: &[String], ip: &str) -> bool {
    if ip.parse::<IpAddr>().is_ok_and(|addr| addr == IpAddr::V6(Ipv6Addr::LOCALHOST)) {
        return true;
    }
    allowed.iter().any(|entry| entry == ip || octets_match(entry, ip))
}

fn octets_match(entry: &str, ip: &str) -> bool {
    let entry: Vec<&str> = entry.trim().split('.').collect();
    let ip: Vec<&str> = ip.split('.').collect();
    entry.len() == 4
        && ip.len() == 4
        && entry.iter().zip(&ip).all(|(want, got)| *want == "0" || want == got)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn list(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| e.to_string()).collect()
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn forwarded_header_is_read_only_from_trusted_proxies() {
        let headers = forwarded("10.0.0.7, 172.16.0.1");
        let proxy: IpAddr = "172.16.0.1".parse().unwrap();
        let stranger: IpAddr = "203.0.113.9".parse().unwrap();
        let trusted = list(&["172.16.0.1"]);

        assert_eq!(client_ip(&headers, Some(proxy), &trusted).as_deref(), Some("10.0.0.7"));
        assert_eq!(client_ip(&headers, Some(stranger), &trusted).as_deref(), Some("203.0.113.9"));
        assert_eq!(client_ip(&HeaderMap::new(), Some(proxy), &trusted).as_deref(), Some("172.16.0.1"));
        assert_eq!(client_ip(&headers, None, &trusted), None);
    }

    #[test]
    fn spoofed_forwarded_header_does_not_get_past_the_list() {
        let allowed = list(&["10.0.0.7"]);
        let headers = forwarded("10.0.0.7");
        let stranger: IpAddr = "203.0.113.9".parse().unwrap();

        let err = check_client(&allowed, &[], &headers, Some(stranger)).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(check_client(&allowed, &list(&["203.0.113.9"]), &headers, Some(stranger)).is_ok());
    }

    #[test]
    fn matches_exact_addresses() {
        let allowed = list(&["10.0.0.7"]);
        assert!(is_allowed(&allowed, "10.0.0.7"));
        assert!(!is_allowed(&allowed, "10.0.0.70"));
    }

    #[test]
    fn zero_octets_are_wildcards() {
        let allowed = list(&["192.168.1.10", " 10.0.0.0"]);
        assert!(is_allowed(&allowed, "10.0.0.42"));
        assert!(is_allowed(&allowed, "10.3.200.1"));
        assert!(!is_allowed(&allowed, "11.0.0.42"));
        assert!(!is_allowed(&allowed, "192.168.1.11"));
        assert!(!is_allowed(&list(&["10.0"]), "10.1.2.3"));
    }

    #[test]
    fn ipv6_loopback_is_always_admitted() {
        assert!(is_allowed(&list(&["10.0.0.7"]), "::1"));
        assert!(!is_allowed(&list(&["10.0.0.7"]), "::2"));
    }
}

//! Address normalisation.
//!
//! Addresses are accepted in `host:port` form. A leading colon with no host
//! (`":8080"`) means every interface when listening and the local host when
//! dialing.

/// Address to bind a listener to.
pub fn listen_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => addr.to_string(),
    }
}

/// Address to dial.
pub fn dial_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("127.0.0.1:{}", port),
        None => addr.to_string(),
    }
}

/// Split `host:port` into its parts. IPv6 hosts must be bracketed.
pub fn split_host_port(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    let port = port.parse().ok()?;
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return None;
    }
    Some((host, port))
}

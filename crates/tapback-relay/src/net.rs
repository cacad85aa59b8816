//! Host address detection.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Primary LAN address of this host, or loopback when there is none.
///
/// Connecting a UDP socket only selects a route; no packet is sent.
pub fn detect_lan_address() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            tracing::debug!(error = %e, "No LAN route, falling back to loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// Configured relay address, or the detected LAN address when blank.
pub fn resolve_relay_address(configured: &str) -> String {
    match configured.trim() {
        "" => detect_lan_address().to_string(),
        addr => addr.to_string(),
    }
}

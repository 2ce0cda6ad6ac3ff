//! Local address discovery for the printed access URLs.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Address used to pick the outbound interface. Nothing is ever sent to it.
const PROBE_ADDR: (Ipv4Addr, u16) = (Ipv4Addr::new(10, 254, 254, 254), 1);

/// Best guess at this machine's address on the local network.
///
/// Connecting a UDP socket sends no packets but makes the OS choose the
/// interface it would route through. Falls back to loopback when there is
/// no route.
pub fn local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(PROBE_ADDR)?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            tracing::debug!(error = %e, "no route for local address discovery, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// Hosts to advertise for a listener bound to `bind`.
///
/// A wildcard bind is reachable on the local network address, anything
/// else only on itself.
pub fn advertised_hosts(bind: IpAddr) -> Vec<IpAddr> {
    if bind.is_unspecified() {
        vec![local_ip()]
    } else {
        vec![bind]
    }
}

/// URL a browser opens to log in with `token`.
pub fn access_url(host: IpAddr, port: u16, token: &str) -> String {
    match host {
        IpAddr::V4(v4) => format!("http://{v4}:{port}/?token={token}"),
        IpAddr::V6(v6) => format!("http://[{v6}]:{port}/?token={token}"),
    }
}

/// Every access URL for a listener on `bind`:`port`.
pub fn access_urls(bind: IpAddr, port: u16, token: &str) -> Vec<String> {
    advertised_hosts(bind)
        .into_iter()
        .map(|host| access_url(host, port, token))
        .collect()
}

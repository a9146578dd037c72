use std::fmt;
use std::net::IpAddr;

use log::debug;

pub const LOOPBACK_HOST: &str = "localhost";

/// A host and port the user can type into a browser. Not a URL; callers add the scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => write!(f, "[{}]:{}", ip, self.port),
            _ => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

/// Best-effort address a browser can reach a server bound to `bind` on `port`. Never fails.
pub fn reachable_address(bind: IpAddr, port: u16) -> Address {
    Address { host: host_for_bind(bind, local_ip), port }
}

/// Picks the host for a bind address. Only an unspecified bind consults `probe` for a LAN
/// address; a loopback bind is `localhost` and any other bind is reported as-is.
pub fn host_for_bind(bind: IpAddr, probe: impl FnOnce() -> Option<IpAddr>) -> String {
    if bind.is_unspecified() {
        reachable_host_with(probe)
    } else if bind.is_loopback() {
        LOOPBACK_HOST.to_string()
    } else {
        bind.to_string()
    }
}

/// The LAN address from `probe`, or `localhost` when there is none.
pub fn reachable_host_with(probe: impl FnOnce() -> Option<IpAddr>) -> String {
    match probe() {
        Some(ip) if !ip.is_loopback() && !ip.is_unspecified() => ip.to_string(),
        _ => LOOPBACK_HOST.to_string(),
    }
}

/// First non-loopback, non-link-local IPv4 address of any interface.
pub fn local_ip() -> Option<IpAddr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            debug!("listing interfaces failed: {}", e);
            return None;
        }
    };
    let found = interfaces.into_iter().find_map(|iface| match iface.addr {
        if_addrs::IfAddr::V4(addr) if !addr.ip.is_loopback() && !addr.ip.is_link_local() => {
            Some(IpAddr::V4(addr.ip))
        }
        _ => None,
    });
    if found.is_none() {
        debug!("no LAN address available");
    }
    found
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::Ipv4Addr;

    const LAN: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));

    #[test]
    fn falls_back_to_loopback() {
        assert_eq!(reachable_host_with(|| None), "localhost");
        assert_eq!(reachable_host_with(|| Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED))), "localhost");
        assert_eq!(reachable_host_with(|| Some(IpAddr::V4(Ipv4Addr::LOCALHOST))), "localhost");
    }

    #[test]
    fn uses_lan_ip_when_known() {
        assert_eq!(reachable_host_with(|| Some(LAN)), "192.168.1.20");
    }

    #[test]
    fn bind_address_decides_the_host() {
        let all = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        assert_eq!(host_for_bind(all, || Some(LAN)), "192.168.1.20");
        assert_eq!(host_for_bind(all, || None), "localhost");

        // a loopback or specific bind never reports the LAN address
        assert_eq!(host_for_bind(IpAddr::V4(Ipv4Addr::LOCALHOST), || Some(LAN)), "localhost");
        assert_eq!(host_for_bind("::1".parse().unwrap(), || Some(LAN)), "localhost");
        assert_eq!(host_for_bind("10.0.0.7".parse().unwrap(), || Some(LAN)), "10.0.0.7");
    }

    #[test]
    fn display() {
        let addr = Address { host: "localhost".to_string(), port: 8000 };
        assert_eq!(addr.to_string(), "localhost:8000");
        let addr = Address { host: "fe80::1".to_string(), port: 8000 };
        assert_eq!(addr.to_string(), "[fe80::1]:8000");
    }

    #[test]
    fn reachable_address_never_fails() {
        let addr = reachable_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8123);
        assert_eq!(addr.port, 8123);
        assert!(!addr.host.is_empty());
        assert_eq!(reachable_address(IpAddr::V4(Ipv4Addr::LOCALHOST), 8123).host, "localhost");
    }
}

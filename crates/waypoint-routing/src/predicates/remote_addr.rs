use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use waypoint_core::{Exchange, Result, RoutePredicate};

use crate::args::{BoundArgs, ShortcutType};
use crate::registry::{BuildContext, PredicateFactory};

/// Address block in CIDR notation; a bare address is a single-host block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
            v4 => v4,
        };
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for IpNetwork {
    type Err = String;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        let (addr, prefix) = match text.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (text, None),
        };
        let addr: IpAddr = addr
            .trim()
            .parse()
            .map_err(|_| format!("invalid address '{}'", addr))?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(prefix) => prefix
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|prefix| *prefix <= max)
                .ok_or_else(|| format!("invalid prefix length '{}'", prefix))?,
            None => max,
        };
        Ok(Self { addr, prefix })
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// `RemoteAddr=10.0.0.0/8,192.168.1.10`
pub struct RemoteAddrPredicateFactory;

struct RemoteAddrPredicate {
    sources: Vec<IpNetwork>,
}

#[async_trait]
impl RoutePredicate for RemoteAddrPredicate {
    async fn test(&self, exchange: &Exchange) -> Result<bool> {
        let Some(remote) = exchange.request.remote_addr else {
            return Ok(false);
        };
        Ok(self.sources.iter().any(|net| net.contains(remote.ip())))
    }
}

impl PredicateFactory for RemoteAddrPredicateFactory {
    fn name(&self) -> &str {
        "RemoteAddr"
    }

    fn shortcut_fields(&self) -> &[&'static str] {
        &["sources"]
    }

    fn shortcut_type(&self) -> ShortcutType {
        ShortcutType::GatherList
    }

    fn build(&self, args: &BoundArgs, _ctx: BuildContext<'_>) -> Result<Arc<dyn RoutePredicate>> {
        let sources = args
            .required_list("sources")?
            .iter()
            .map(|source| source.parse::<IpNetwork>().map_err(|e| args.error(e)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(RemoteAddrPredicate { sources }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FactoryRegistry;
    use std::net::SocketAddr;
    use waypoint_core::{ComponentSpec, GatewayRequest};

    fn ip(text: &str) -> IpAddr {
        text.parse().unwrap()
    }

    #[test]
    fn test_cidr_contains() {
        let net: IpNetwork = "10.1.0.0/16".parse().unwrap();
        assert!(net.contains(ip("10.1.200.3")));
        assert!(!net.contains(ip("10.2.0.1")));
        assert!(net.contains(ip("::ffff:10.1.0.9")));
    }

    #[test]
    fn test_bare_address_is_single_host() {
        let net: IpNetwork = "192.168.1.10".parse().unwrap();
        assert_eq!(net.to_string(), "192.168.1.10/32");
        assert!(net.contains(ip("192.168.1.10")));
        assert!(!net.contains(ip("192.168.1.11")));

        let v6: IpNetwork = "::1".parse().unwrap();
        assert_eq!(v6.to_string(), "::1/128");
    }

    #[test]
    fn test_zero_prefix_matches_family() {
        let any: IpNetwork = "0.0.0.0/0".parse().unwrap();
        assert!(any.contains(ip("8.8.8.8")));
        assert!(!any.contains(ip("2001:db8::1")));
    }

    #[test]
    fn test_invalid_networks() {
        assert!("10.0.0.0/33".parse::<IpNetwork>().is_err());
        assert!("not-an-ip".parse::<IpNetwork>().is_err());
    }

    #[tokio::test]
    async fn test_remote_addr_predicate() {
        let registry = FactoryRegistry::with_builtins();
        let spec: ComponentSpec = "RemoteAddr=10.0.0.0/8, 192.168.1.10".parse().unwrap();
        let built = registry.build_predicate("r1", &spec).unwrap();

        let inside = GatewayRequest::get("/")
            .with_remote_addr("10.20.30.40:5000".parse::<SocketAddr>().unwrap());
        let outside = GatewayRequest::get("/")
            .with_remote_addr("172.16.0.1:5000".parse::<SocketAddr>().unwrap());

        assert!(built.predicate.test(&Exchange::new(inside)).await.unwrap());
        assert!(!built.predicate.test(&Exchange::new(outside)).await.unwrap());
        assert!(
            !built
                .predicate
                .test(&Exchange::new(GatewayRequest::get("/")))
                .await
                .unwrap()
        );
    }
}

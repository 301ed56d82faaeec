//! TCP connect scan over a host list with timeouts and concurrency.

use anyhow::{anyhow, Result};
use log::{debug, info};
use pscan_core::HostsList;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;

/// State of a single probed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortState {
    pub port: u16,
    pub open: bool,
}

impl PortState {
    /// Human-readable state label used by the text output.
    pub fn label(&self) -> &'static str {
        if self.open {
            "open"
        } else {
            "closed"
        }
    }
}

/// Scan outcome for one host. `port_states` follows the input port order
/// and is empty when the host did not resolve.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub host: String,
    pub not_found: bool,
    pub port_states: Vec<PortState>,
}

/// Tunables for a scan run.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Connect timeout per probe.
    pub timeout: Duration,
    /// Max concurrent connection attempts per host.
    pub port_concurrency: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            port_concurrency: 256,
        }
    }
}

/// Parse a comma-separated list of ports/ranges (e.g., "22,80,443", "1-1024,8080").
pub fn parse_ports(spec: &str) -> Result<Vec<u16>> {
    let mut ports = Vec::new();
    for part in spec.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let s: u16 = start.parse()?;
            let e: u16 = end.parse()?;
            if s == 0 || e == 0 || s > e {
                return Err(anyhow!("invalid port range: {}", part));
            }
            ports.extend(s..=e);
        } else {
            let p: u16 = part.parse()?;
            if p == 0 {
                return Err(anyhow!("invalid port: {}", part));
            }
            ports.push(p);
        }
    }
    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

/// Ports probed when the caller does not specify any.
pub fn default_ports() -> Vec<u16> {
    vec![22, 80, 443]
}

/// Resolve a host to a single IP address, if it resolves at all.
async fn resolve(host: &str) -> Option<IpAddr> {
    match lookup_host((host, 0u16)).await {
        Ok(mut addrs) => addrs.next().map(|sa| sa.ip()),
        Err(e) => {
            debug!("failed to resolve {}: {}", host, e);
            None
        }
    }
}

/// Probe every port on one resolved host. One task per port, bounded by a
/// per-host permit pool; states come back in input port order.
async fn scan_host(ip: IpAddr, ports: &[u16], opts: &ScanOptions) -> Vec<PortState> {
    let sem = Arc::new(Semaphore::new(opts.port_concurrency.max(1)));
    let mut handles = Vec::with_capacity(ports.len());
    for &port in ports {
        let sem = sem.clone();
        let per_probe = opts.timeout;
        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.unwrap();
            let addr = SocketAddr::new(ip, port);
            let open = matches!(timeout(per_probe, TcpStream::connect(addr)).await, Ok(Ok(_)));
            PortState { port, open }
        }));
    }

    // Join in spawn order, not completion order, so every port keeps its slot.
    let mut states = Vec::with_capacity(ports.len());
    for (i, h) in handles.into_iter().enumerate() {
        states.push(h.await.unwrap_or(PortState {
            port: ports[i],
            open: false,
        }));
    }
    states
}

/// Scan every host in the list against the given ports. Individual host or
/// port failures are encoded in the results, never returned as errors, and
/// results follow the input host order.
pub async fn run(hl: &HostsList, ports: &[u16], opts: &ScanOptions) -> Vec<ScanResult> {
    let start = Instant::now();
    info!("scanning {} hosts on {} ports", hl.len(), ports.len());

    let mut handles = Vec::with_capacity(hl.len());
    for host in hl.hosts() {
        let host = host.clone();
        let ports = ports.to_vec();
        let opts = opts.clone();
        handles.push(tokio::spawn(async move {
            match resolve(&host).await {
                Some(ip) => {
                    let port_states = scan_host(ip, &ports, &opts).await;
                    ScanResult {
                        host,
                        not_found: false,
                        port_states,
                    }
                }
                None => ScanResult {
                    host,
                    not_found: true,
                    port_states: Vec::new(),
                },
            }
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (i, h) in handles.into_iter().enumerate() {
        results.push(h.await.unwrap_or_else(|_| ScanResult {
            host: hl.hosts()[i].clone(),
            not_found: true,
            port_states: Vec::new(),
        }));
    }

    info!("scan finished in {} ms", start.elapsed().as_millis());
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn parse_simple_list() {
        let v = parse_ports("22,80,443").unwrap();
        assert_eq!(v, vec![22, 80, 443]);
    }

    #[test]
    fn parse_ranges_and_list() {
        let v = parse_ports("1-3,5,3").unwrap();
        assert_eq!(v, vec![1, 2, 3, 5]);
    }

    #[test]
    fn reject_invalid() {
        assert!(parse_ports("0").is_err());
        assert!(parse_ports("10-5").is_err());
    }

    #[test]
    fn state_labels() {
        let ps = PortState { port: 80, open: false };
        assert_eq!(ps.label(), "closed");
        let ps = PortState { port: 80, open: true };
        assert_eq!(ps.label(), "open");
    }

    #[tokio::test]
    async fn run_host_found() {
        let host = "127.0.0.1";
        let mut hl = HostsList::new();
        hl.add(host).unwrap();

        // One listener held open, one bound and dropped to free its port.
        let open_ln = TcpListener::bind((host, 0)).await.unwrap();
        let open_port = open_ln.local_addr().unwrap().port();
        let closed_port = {
            let ln = TcpListener::bind((host, 0)).await.unwrap();
            ln.local_addr().unwrap().port()
        };
        let ports = vec![open_port, closed_port];

        let res = run(&hl, &ports, &ScanOptions::default()).await;

        assert_eq!(res.len(), 1);
        assert_eq!(res[0].host, host);
        assert!(!res[0].not_found);
        assert_eq!(res[0].port_states.len(), 2);
        assert_eq!(res[0].port_states[0], PortState { port: open_port, open: true });
        assert_eq!(res[0].port_states[1], PortState { port: closed_port, open: false });
    }

    #[tokio::test]
    async fn run_host_not_found() {
        let mut hl = HostsList::new();
        hl.add("unresolvable.invalid").unwrap();

        let res = run(&hl, &[80, 443], &ScanOptions::default()).await;

        assert_eq!(res.len(), 1);
        assert_eq!(res[0].host, "unresolvable.invalid");
        assert!(res[0].not_found);
        assert!(res[0].port_states.is_empty());
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let mut hl = HostsList::new();
        hl.add("localhost").unwrap();
        hl.add("127.0.0.1").unwrap();
        let ports = vec![65_100, 65_001]; // deliberately unsorted

        let res = run(&hl, &ports, &ScanOptions::default()).await;

        assert_eq!(res.len(), 2);
        assert_eq!(res[0].host, hl.hosts()[0]);
        assert_eq!(res[1].host, hl.hosts()[1]);
        for r in &res {
            let got: Vec<u16> = r.port_states.iter().map(|p| p.port).collect();
            assert_eq!(got, ports);
        }
    }

    #[tokio::test]
    async fn no_ports_requested_yields_empty_states() {
        let mut hl = HostsList::new();
        hl.add("127.0.0.1").unwrap();

        let res = run(&hl, &[], &ScanOptions::default()).await;

        assert_eq!(res.len(), 1);
        assert!(!res[0].not_found);
        assert!(res[0].port_states.is_empty());
    }
}

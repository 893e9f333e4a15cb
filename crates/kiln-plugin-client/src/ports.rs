//! RPC port leases for plugin sessions.
//!
//! Every launched plugin negotiates its RPC channel on a port the host
//! hands it. The allocator keeps an in-use set guarded by a mutex and
//! probes each candidate with a bind before leasing it, so concurrent
//! launches get disjoint ports even when something else on the machine
//! already occupies part of the range.

use kiln_core::{Error, Result};
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};
use std::sync::{Arc, Mutex, PoisonError};

/// Hands out single-port leases inside a configured range.
///
/// Leases are RAII: dropping a [`PortLease`] returns its port to the pool,
/// which a [`PluginSession`](crate::PluginSession) does when the session
/// ends.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use kiln_plugin_client::PortAllocator;
///
/// let ports = Arc::new(PortAllocator::new(14_000, 14_010));
/// let lease = ports.acquire().unwrap();
/// assert!((14_000..=14_010).contains(&lease.port()));
/// ```
#[derive(Debug)]
pub struct PortAllocator {
    min: u16,
    max: u16,
    in_use: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    /// Creates an allocator for the inclusive range `min..=max`.
    #[must_use]
    pub fn new(min: u16, max: u16) -> Self {
        Self {
            min,
            max,
            in_use: Mutex::new(HashSet::new()),
        }
    }

    /// Lower bound of the configured range.
    #[must_use]
    pub const fn min(&self) -> u16 {
        self.min
    }

    /// Upper bound of the configured range.
    #[must_use]
    pub const fn max(&self) -> u16 {
        self.max
    }

    /// Leases the first port in the range that is neither leased already
    /// nor bound by another process.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFreePort`] when the whole range is exhausted.
    pub fn acquire(self: &Arc<Self>) -> Result<PortLease> {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        for port in self.min..=self.max {
            if in_use.contains(&port) {
                continue;
            }
            if !port_is_free(port) {
                tracing::trace!(port, "port already bound by another process");
                continue;
            }
            in_use.insert(port);
            return Ok(PortLease {
                port,
                allocator: Arc::clone(self),
            });
        }
        Err(Error::NoFreePort {
            min: self.min,
            max: self.max,
        })
    }

    /// Number of leases currently outstanding.
    #[must_use]
    pub fn leased(&self) -> usize {
        self.in_use
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, port: u16) {
        self.in_use
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&port);
    }
}

fn port_is_free(port: u16) -> bool {
    TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// Exclusive lease on one RPC port, released on drop.
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    allocator: Arc<PortAllocator>,
}

impl PortLease {
    /// The leased port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.allocator.release(self.port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_distinct_ports() {
        let ports = Arc::new(PortAllocator::new(15_100, 15_110));
        let a = ports.acquire().unwrap();
        let b = ports.acquire().unwrap();
        assert_ne!(a.port(), b.port());
        assert_eq!(ports.leased(), 2);
    }

    #[test]
    fn test_release_on_drop() {
        let ports = Arc::new(PortAllocator::new(15_120, 15_120));
        let lease = ports.acquire().unwrap();
        assert_eq!(lease.port(), 15_120);
        drop(lease);
        assert_eq!(ports.leased(), 0);

        // The single port is usable again once released.
        let again = ports.acquire().unwrap();
        assert_eq!(again.port(), 15_120);
    }

    #[test]
    fn test_exhaustion_reports_range() {
        let ports = Arc::new(PortAllocator::new(15_130, 15_131));
        let _a = ports.acquire().unwrap();
        let _b = ports.acquire().unwrap();

        let err = ports.acquire().unwrap_err();
        assert!(matches!(
            err,
            Error::NoFreePort {
                min: 15_130,
                max: 15_131
            }
        ));
    }

    #[test]
    fn test_skips_externally_bound_port() {
        let listener =
            TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        let taken = listener.local_addr().unwrap().port();

        let ports = Arc::new(PortAllocator::new(taken, taken));
        let err = ports.acquire().unwrap_err();
        assert!(matches!(err, Error::NoFreePort { .. }));
        drop(listener);
    }

    #[test]
    fn test_concurrent_acquisition() {
        use std::thread;

        let ports = Arc::new(PortAllocator::new(15_140, 15_160));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ports = Arc::clone(&ports);
                thread::spawn(move || ports.acquire().map(|l| l.port()))
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let port = handle.join().unwrap().unwrap();
            assert!(seen.insert(port), "port {port} leased twice");
        }
    }
}

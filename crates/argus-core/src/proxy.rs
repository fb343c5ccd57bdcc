use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::AppError;

/// Cursor wrap bound. Rotation only needs distinct tickets, so the reset
/// does not have to land exactly on a pool-size multiple.
const CURSOR_BOUND: usize = 1_000_000;

/// One egress identity from the proxy pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl ProxyEndpoint {
    /// `host:port` form, without credentials. Safe to log.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.authority())
    }
}

impl FromStr for ProxyEndpoint {
    type Err = AppError;

    /// Parse a `host:port` or `host:port:user:pass` pool line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let (host, port, user, pass) = match parts.as_slice() {
            [host, port] => (*host, *port, None, None),
            [host, port, user, pass] => {
                (*host, *port, Some(user.to_string()), Some(pass.to_string()))
            }
            _ => {
                return Err(AppError::Config(format!(
                    "Malformed proxy line '{s}': expected host:port[:user:pass]"
                )));
            }
        };

        if host.is_empty() {
            return Err(AppError::Config(format!("Malformed proxy line '{s}': empty host")));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid proxy port in '{s}'")))?;

        Ok(ProxyEndpoint {
            host: host.to_string(),
            port,
            user,
            pass,
        })
    }
}

/// Round-robin proxy rotation, safe for concurrent use by many workers.
///
/// The cursor is the only mutable state shared across fetch workers; an
/// atomic read-increment guarantees no two concurrent `next` calls observe
/// the same ticket.
#[derive(Debug)]
pub struct ProxyRotator {
    pool: Vec<ProxyEndpoint>,
    cursor: AtomicUsize,
}

impl ProxyRotator {
    /// Build a rotator over a fixed pool. An empty pool is a configuration
    /// error at startup, never a runtime error.
    pub fn new(pool: Vec<ProxyEndpoint>) -> Result<Self, AppError> {
        if pool.is_empty() {
            return Err(AppError::Config("Proxy pool is empty".into()));
        }
        Ok(Self {
            pool,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Load a newline-delimited `host:port:user:pass` pool file.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Could not read proxy pool {}: {e}", path.display()))
        })?;

        let pool = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ProxyEndpoint::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(path = %path.display(), proxies = pool.len(), "Loaded proxy pool");
        Self::new(pool)
    }

    /// Next proxy, round-robin over the pool.
    pub fn next(&self) -> ProxyEndpoint {
        let ticket = self.cursor.fetch_add(1, Ordering::Relaxed);
        if ticket >= CURSOR_BOUND {
            // Best-effort reset; losing the race just means another caller
            // already pulled the cursor back.
            let _ = self.cursor.compare_exchange(
                ticket + 1,
                0,
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        }
        self.pool[ticket % self.pool.len()].clone()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

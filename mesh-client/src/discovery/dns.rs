//! DNS discovery, e.g. Docker Swarm's `tasks.<service>` records.
//!
//! A service scaled to zero has no `tasks.<service>` name at all, so NXDOMAIN
//! and empty answers mean an empty group. Only resolver failures are errors.

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;

use super::{dedup_preserving_order, Discovery, DiscoveryError};

/// Resolves `<prefix><group>` and returns every address record.
#[derive(Clone)]
pub struct DnsDiscovery {
    prefix: String,
    resolver: TokioAsyncResolver,
}

impl std::fmt::Debug for DnsDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsDiscovery")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl DnsDiscovery {
    /// Create a resolver that prepends `prefix` to the group name.
    ///
    /// Uses the system resolver configuration (`/etc/resolv.conf`), falling
    /// back to the resolver defaults when it cannot be read.
    pub fn new(prefix: impl Into<String>) -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "system resolver config unavailable; using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self::with_resolver(prefix, resolver)
    }

    /// Create a discovery backend over an explicit resolver.
    pub fn with_resolver(prefix: impl Into<String>, resolver: TokioAsyncResolver) -> Self {
        Self {
            prefix: prefix.into(),
            resolver,
        }
    }

    /// Hostname looked up for `group`.
    pub fn hostname(&self, group: &str) -> String {
        format!("{}{}", self.prefix, group)
    }
}

#[async_trait]
impl Discovery for DnsDiscovery {
    async fn list_peers(&self, group: &str) -> Result<Vec<IpAddr>, DiscoveryError> {
        let host = self.hostname(group);
        match self.resolver.lookup_ip(host.as_str()).await {
            Ok(lookup) => Ok(dedup_preserving_order(lookup.iter())),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => {
                    tracing::debug!(host = %host, "no address records");
                    Ok(Vec::new())
                }
                _ => Err(DiscoveryError::Unavailable(format!(
                    "resolving {}: {}",
                    host, e
                ))),
            },
        }
    }
}

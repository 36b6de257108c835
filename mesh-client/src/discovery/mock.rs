//! Mock discovery for testing.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Discovery, DiscoveryError};

/// Mock discovery with settable answers and failure injection.
#[derive(Debug, Default, Clone)]
pub struct MockDiscovery {
    inner: Arc<Mutex<MockDiscoveryInner>>,
}

#[derive(Debug, Default)]
struct MockDiscoveryInner {
    peers: Vec<IpAddr>,
    fail_next: Option<String>,
    queried_groups: Vec<String>,
    latency: Option<Duration>,
}

impl MockDiscovery {
    /// Create a mock that reports no peers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the addresses returned from now on.
    pub fn set_peers(&self, peers: Vec<IpAddr>) {
        self.inner.lock().unwrap().peers = peers;
    }

    /// Cause the next lookup to fail as unavailable.
    pub fn fail_next(&self, error: &str) {
        self.inner.lock().unwrap().fail_next = Some(error.to_string());
    }

    /// Delay every lookup by `latency` (tokio time, so pausable).
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().unwrap().latency = Some(latency);
    }

    /// Groups queried so far, in order.
    pub fn queried_groups(&self) -> Vec<String> {
        self.inner.lock().unwrap().queried_groups.clone()
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    async fn list_peers(&self, group: &str) -> Result<Vec<IpAddr>, DiscoveryError> {
        let (answer, latency) = {
            let mut inner = self.inner.lock().unwrap();
            inner.queried_groups.push(group.to_string());
            let answer = match inner.fail_next.take() {
                Some(error) => Err(DiscoveryError::Unavailable(error)),
                None => Ok(inner.peers.clone()),
            };
            (answer, inner.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forced_failure_is_one_shot() {
        let discovery = MockDiscovery::new();
        discovery.set_peers(vec!["10.0.0.1".parse().unwrap()]);
        discovery.fail_next("socket gone");

        assert!(discovery.list_peers("g").await.is_err());
        assert_eq!(discovery.list_peers("g").await.unwrap().len(), 1);
        assert_eq!(discovery.queried_groups(), vec!["g", "g"]);
    }
}

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::Url;
use std::sync::Arc;

use crate::client::JobServerClient;
use crate::config::TransportConfig;
use crate::error::ClientError;

/// Hands out one [`JobServerClient`] per job server URL.
///
/// Owned by the caller and shared by reference or `Arc`; there is no
/// process-wide instance. Entries are created on first request and kept for
/// the registry's lifetime.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    transport: TransportConfig,
    clients: DashMap<String, Arc<JobServerClient>>,
}

impl ClientRegistry {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            clients: DashMap::new(),
        }
    }

    /// Returns the client for `url`, building it on first use. URLs are
    /// keyed after trimming surrounding whitespace.
    ///
    /// Empty URLs are rejected. A URL that does not parse is logged and still
    /// gets a client; its calls fail with a transport error.
    pub fn client(&self, url: &str) -> Result<Arc<JobServerClient>, ClientError> {
        let url = url.trim();
        if url.is_empty() {
            log::error!("The given url is empty");
            return Err(ClientError::validation(
                "Invalid url can't be used to create a job server client",
            ));
        }
        if let Err(e) = Url::parse(url) {
            log::warn!("The given url {} is invalid: {}", url, e);
        }

        // The shard lock is held while constructing, so concurrent callers
        // for the same URL get the same instance.
        match self.clients.entry(url.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let client = Arc::new(JobServerClient::new(url, &self.transport)?);
                log::debug!("Created job server client for {}", url);
                entry.insert(Arc::clone(&client));
                Ok(client)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_url_same_instance() {
        let registry = ClientRegistry::default();
        let a = registry.client("http://localhost:8090").unwrap();
        let b = registry.client("http://localhost:8090").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_different_urls_different_instances() {
        let registry = ClientRegistry::default();
        let a = registry.client("http://localhost:8090").unwrap();
        let b = registry.client("http://spark-master:8090").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let registry = ClientRegistry::default();
        let a = registry.client("http://localhost:8090").unwrap();
        let b = registry.client("  http://localhost:8090\n").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_empty_url_rejected() {
        let registry = ClientRegistry::default();
        assert!(registry.client("").unwrap_err().is_validation());
        assert!(registry.client("   ").unwrap_err().is_validation());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_malformed_url_still_builds() {
        let registry = ClientRegistry::default();
        assert!(registry.client("spark master").is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_callers_share_one_client() {
        let registry = Arc::new(ClientRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.client("http://localhost:8090").unwrap())
            })
            .collect();
        let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
        assert_eq!(registry.len(), 1);
    }
}

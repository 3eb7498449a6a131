use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::ServerConfig;
use crate::coordinator::RoomCoordinator;
use crate::external::{
    ChatStore, FixedGenerator, HttpGenerator, MedalStore, NoopChatStore, NoopMedalStore,
    QuestionGenerator,
};
use crate::registry::ConnectionRegistry;

pub type SharedIpCounts = Arc<Mutex<HashMap<IpAddr, usize>>>;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RoomCoordinator>,
    pub registry: Arc<ConnectionRegistry>,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub ws_per_ip: SharedIpCounts,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let generator: Arc<dyn QuestionGenerator> = match &config.generator.endpoint {
            Some(endpoint) => Arc::new(HttpGenerator::from_config(
                &config.generator,
                endpoint.clone(),
            )),
            None => Arc::new(FixedGenerator),
        };
        Self::with_collaborators(
            config,
            generator,
            Arc::new(NoopMedalStore),
            Arc::new(NoopChatStore),
        )
    }

    /// Injection point for the test suite and for deployments with real
    /// stats/chat backends.
    pub fn with_collaborators(
        config: ServerConfig,
        generator: Arc<dyn QuestionGenerator>,
        medals: Arc<dyn MedalStore>,
        chat: Arc<dyn ChatStore>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let coordinator = Arc::new(RoomCoordinator::new(
            Arc::clone(&registry),
            generator,
            medals,
            chat,
        ));
        Self {
            coordinator,
            registry,
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            ws_per_ip: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// RAII guard for the global WebSocket connection count.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}

/// RAII guard for the per-IP WebSocket connection count.
pub struct IpConnectionGuard {
    ip: IpAddr,
    counts: SharedIpCounts,
}

impl IpConnectionGuard {
    /// Returns `None` when the IP is already at its connection cap.
    pub fn try_acquire(ip: IpAddr, counts: SharedIpCounts, max_per_ip: usize) -> Option<Self> {
        {
            let mut map = counts.lock().unwrap();
            let entry = map.entry(ip).or_insert(0);
            if *entry >= max_per_ip {
                return None;
            }
            *entry += 1;
        }
        Some(Self { ip, counts })
    }
}

impl Drop for IpConnectionGuard {
    fn drop(&mut self) {
        let mut map = self.counts.lock().unwrap();
        if let Some(entry) = map.get_mut(&self.ip) {
            *entry -= 1;
            if *entry == 0 {
                map.remove(&self.ip);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn connection_guard_tracks_count() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _a = ConnectionGuard::new(Arc::clone(&count));
            let _b = ConnectionGuard::new(Arc::clone(&count));
            assert_eq!(count.load(Ordering::Relaxed), 2);
        }
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn ip_guard_enforces_cap_and_cleans_up() {
        let counts: SharedIpCounts = Arc::new(Mutex::new(HashMap::new()));
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);

        let a = IpConnectionGuard::try_acquire(ip, Arc::clone(&counts), 2);
        let b = IpConnectionGuard::try_acquire(ip, Arc::clone(&counts), 2);
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(IpConnectionGuard::try_acquire(ip, Arc::clone(&counts), 2).is_none());

        drop(a);
        drop(b);
        assert!(counts.lock().unwrap().is_empty());
    }
}

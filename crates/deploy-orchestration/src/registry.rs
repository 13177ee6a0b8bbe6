//! Registry of configured server instances
//!
//! Maps server instance ids to the capability bundles their plugins offer.
//! One registry is built at process start and shared by reference.

use crate::{ServerCapabilities, ServerInstanceRef};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Resolves server instance ids to capability bundles
pub trait CapabilityResolver: Send + Sync {
    /// Resolve the capabilities of `server`.
    ///
    /// Never fails: an unknown id yields a bundle with every capability
    /// absent.
    fn resolve(&self, server: &ServerInstanceRef) -> ServerCapabilities;

    /// Whether `server` is currently a live, registered instance
    fn is_registered(&self, server: &ServerInstanceRef) -> bool;
}

/// A registered server instance
#[derive(Debug, Clone)]
pub struct ServerInstance {
    /// Instance id
    pub id: ServerInstanceRef,
    /// Name shown to users
    pub display_name: String,
    /// Capabilities offered by the instance's plugin
    pub capabilities: ServerCapabilities,
}

impl ServerInstance {
    /// Create a server instance
    pub fn new(
        id: ServerInstanceRef,
        display_name: impl Into<String>,
        capabilities: ServerCapabilities,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            capabilities,
        }
    }
}

/// Process-wide registry of server instances
#[derive(Default)]
pub struct ServerRegistry {
    instances: RwLock<HashMap<ServerInstanceRef, Arc<ServerInstance>>>,
}

impl ServerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a server instance
    pub fn register(&self, instance: ServerInstance) {
        info!("Registering server instance: {}", instance.id);
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(instance.id.clone(), Arc::new(instance));
    }

    /// Remove a server instance, returning it if it was registered
    pub fn remove(&self, server: &ServerInstanceRef) -> Option<Arc<ServerInstance>> {
        let removed = self
            .instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(server);
        if removed.is_some() {
            info!("Removed server instance: {}", server);
        }
        removed
    }

    /// Look up a registered instance
    pub fn get(&self, server: &ServerInstanceRef) -> Option<Arc<ServerInstance>> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(server)
            .cloned()
    }

    /// Whether `server` is registered
    pub fn contains(&self, server: &ServerInstanceRef) -> bool {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(server)
    }

    /// Display name of a registered instance
    pub fn display_name(&self, server: &ServerInstanceRef) -> Option<String> {
        self.get(server).map(|instance| instance.display_name.clone())
    }

    /// All registered instance ids, sorted
    pub fn instance_ids(&self) -> Vec<ServerInstanceRef> {
        let mut ids: Vec<_> = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl CapabilityResolver for ServerRegistry {
    fn resolve(&self, server: &ServerInstanceRef) -> ServerCapabilities {
        match self.get(server) {
            Some(instance) => instance.capabilities.clone(),
            None => {
                debug!("Server instance {} is not registered", server);
                ServerCapabilities::none()
            }
        }
    }

    fn is_registered(&self, server: &ServerInstanceRef) -> bool {
        self.contains(server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerDescriptor;

    struct FixedDescriptor;

    impl ServerDescriptor for FixedDescriptor {
        fn is_local(&self) -> bool {
            true
        }

        fn hostname(&self) -> String {
            "localhost".to_string()
        }

        fn http_port(&self) -> u16 {
            8080
        }
    }

    #[test]
    fn test_unknown_server_resolves_to_empty_bundle() {
        let registry = ServerRegistry::new();
        let capabilities = registry.resolve(&ServerInstanceRef::new("ghost"));
        assert!(capabilities.is_empty());
        assert!(!registry.is_registered(&ServerInstanceRef::new("ghost")));
    }

    #[test]
    fn test_register_resolve_remove() {
        let registry = ServerRegistry::new();
        let id = ServerInstanceRef::new("s1");
        registry.register(ServerInstance::new(
            id.clone(),
            "Server One",
            ServerCapabilities::none().with_descriptor(Arc::new(FixedDescriptor)),
        ));

        assert!(registry.is_registered(&id));
        assert_eq!(registry.display_name(&id).as_deref(), Some("Server One"));
        let capabilities = registry.resolve(&id);
        assert!(capabilities.descriptor.is_some());
        assert!(capabilities.lifecycle.is_none());

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.resolve(&id).is_empty());
    }

    #[test]
    fn test_instance_ids_sorted() {
        let registry = ServerRegistry::new();
        for id in ["b", "a", "c"] {
            registry.register(ServerInstance::new(
                ServerInstanceRef::new(id),
                id,
                ServerCapabilities::none(),
            ));
        }
        let ids: Vec<_> = registry
            .instance_ids()
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}

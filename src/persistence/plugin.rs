//! Object-store plugin client management

use tracing::debug;

/// Owner of the plugin clients used by backup stores
pub trait PluginManager: Send + Sync {
    /// Release every client created by this manager
    fn cleanup_clients(&self);
}

/// Plugin manager for the in-process local store, which holds no clients
#[derive(Debug, Default)]
pub struct LocalPluginManager;

impl PluginManager for LocalPluginManager {
    fn cleanup_clients(&self) {
        debug!("Local plugin manager has no clients to clean up");
    }
}

/// Cleans up its plugin manager's clients when dropped
pub struct PluginManagerGuard {
    manager: Box<dyn PluginManager>,
}

impl PluginManagerGuard {
    pub fn new(manager: Box<dyn PluginManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &dyn PluginManager {
        self.manager.as_ref()
    }
}

impl Drop for PluginManagerGuard {
    fn drop(&mut self) {
        self.manager.cleanup_clients();
    }
}

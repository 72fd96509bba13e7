use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::{PluginDescriptor, PluginError, PluginInstance};

pub type InstanceId = usize;
pub type SharedInstance = Arc<Mutex<Box<dyn PluginInstance>>>;

#[derive(Clone)]
pub struct PluginInstanceHandle {
    pub id: InstanceId,
    pub descriptor: PluginDescriptor,
    pub instance: SharedInstance,
}

impl PluginInstanceHandle {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl std::fmt::Debug for PluginInstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstanceHandle")
            .field("id", &self.id)
            .field("plugin", &self.descriptor.id)
            .finish()
    }
}

/// Directory of live plugin instances. Ids are assigned in creation order.
#[derive(Default)]
pub struct InstanceRegister {
    instances: ArcSwap<Vec<PluginInstanceHandle>>,
}

impl InstanceRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates `descriptor` and records the instance.
    pub fn register(&self, descriptor: &PluginDescriptor) -> Result<InstanceId, PluginError> {
        let instance: SharedInstance = Arc::new(Mutex::new(descriptor.create_instance()?));

        let previous = self.instances.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(PluginInstanceHandle {
                id: current.len(),
                descriptor: descriptor.clone(),
                instance: instance.clone(),
            });
            next
        });
        let id = previous.len();

        tracing::info!(id, plugin = %descriptor.id, "plugin instance created");
        Ok(id)
    }

    pub fn instance(&self, id: InstanceId) -> Option<PluginInstanceHandle> {
        self.instances.load().get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.instances.load().len()
    }

    pub fn instances(&self) -> Vec<PluginInstanceHandle> {
        (*self.instances.load_full()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginType;

    #[test]
    fn ids_follow_creation_order() {
        let register = InstanceRegister::new();
        assert_eq!(register.count(), 0);
        assert!(register.instance(0).is_none());

        let synth = PluginDescriptor::new("synth", "Synth", PluginType::Instrument);
        let monitor = PluginDescriptor::new("mon", "Monitor", PluginType::MidiMonitor);
        assert_eq!(register.register(&synth).unwrap(), 0);
        assert_eq!(register.register(&monitor).unwrap(), 1);

        assert_eq!(register.count(), 2);
        let handle = register.instance(1).unwrap();
        assert_eq!(handle.id, 1);
        assert_eq!(handle.name(), "Monitor");
        assert_eq!(handle.instance.lock().name(), "Monitor");
        assert_eq!(register.instances().len(), 2);
    }

    #[test]
    fn unknown_type_is_not_registered() {
        let register = InstanceRegister::new();
        let unknown = PluginDescriptor::new("x", "Mystery", PluginType::Unknown);
        assert!(register.register(&unknown).is_err());
        assert_eq!(register.count(), 0);
    }
}

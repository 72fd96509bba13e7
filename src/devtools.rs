//! Developer panel for trying out plugins: list the catalog, create
//! instances, open their editor and play a test arpeggio through them.

use std::sync::Arc;

use thiserror::Error;

use crate::engine::{AudioEngine, MidiSource};
use crate::interactive::{EDITOR_URI, Interactive, NavigationError, UriQuery};
use crate::plugin::{
    InstanceId, InstanceRegister, PluginDescriptor, PluginError, PluginScanner, PluginType,
    Synthesizer,
};
use crate::settings::ConfigError;
use crate::timing::{ArpeggioConfig, ArpeggioGenerator, StreamError, spawn_stream_server};

pub const INSTANCE_ID_PARAM: &str = "instanceId";

#[derive(Debug, Error)]
pub enum DevToolsError {
    #[error("no plugin at index {index} (catalog has {len})")]
    NoSuchPlugin { index: usize, len: usize },
    #[error("unknown plugin type of '{0}'")]
    UnknownPluginType(String),
    #[error("instance {0} not found")]
    InstanceNotFound(InstanceId),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

/// What the editor view shows for one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceEditorModel {
    pub id: InstanceId,
    pub name: String,
    pub parameters: Vec<(String, f32)>,
}

impl InstanceEditorModel {
    pub fn load(register: &InstanceRegister, id: InstanceId) -> Option<Self> {
        let handle = register.instance(id)?;
        let parameters = handle.instance.lock().parameters();
        Some(Self {
            id,
            name: handle.name().to_string(),
            parameters,
        })
    }
}

/// Reads the instance id of an editor query.
pub fn editor_instance_id(query: &UriQuery) -> Result<InstanceId, NavigationError> {
    let raw = query
        .param(INSTANCE_ID_PARAM)
        .ok_or_else(|| NavigationError::MissingParam {
            uri: query.uri().to_string(),
            param: INSTANCE_ID_PARAM.to_string(),
        })?;
    raw.parse().map_err(|e: std::num::ParseIntError| NavigationError::InvalidParam {
        uri: query.uri().to_string(),
        param: INSTANCE_ID_PARAM.to_string(),
        reason: e.to_string(),
    })
}

pub struct DevTools<E, I> {
    plugins: Vec<PluginDescriptor>,
    register: Arc<InstanceRegister>,
    engine: E,
    interactive: I,
    arpeggio: ArpeggioConfig,
}

impl<E: AudioEngine, I: Interactive> DevTools<E, I> {
    pub fn new(
        scanner: &dyn PluginScanner,
        register: Arc<InstanceRegister>,
        engine: E,
        interactive: I,
        arpeggio: ArpeggioConfig,
    ) -> Self {
        Self {
            plugins: scanner.scan(),
            register,
            engine,
            interactive,
            arpeggio,
        }
    }

    pub fn plugins(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn add_instance(&self, index: usize) -> Result<InstanceId, DevToolsError> {
        let Some(plugin) = self.plugins.get(index) else {
            let err = DevToolsError::NoSuchPlugin {
                index,
                len: self.plugins.len(),
            };
            tracing::error!(%err, "cannot add instance");
            return Err(err);
        };
        if plugin.plugin_type == PluginType::Unknown {
            let err = DevToolsError::UnknownPluginType(plugin.name.clone());
            tracing::error!(%err, "cannot add instance");
            return Err(err);
        }

        let id = self.register.register(plugin).inspect_err(|err| {
            tracing::error!(%err, "cannot add instance");
        })?;
        tracing::info!(id, count = self.register.count(), "instances changed");
        Ok(id)
    }

    pub fn plugin_name(&self, id: InstanceId) -> Result<String, DevToolsError> {
        self.register
            .instance(id)
            .map(|handle| handle.name().to_string())
            .ok_or_else(|| {
                tracing::error!(id, "instance not found");
                DevToolsError::InstanceNotFound(id)
            })
    }

    /// Plays a fresh arpeggio session through instance `id`.
    pub fn play(&self, id: InstanceId) -> Result<(), DevToolsError> {
        let Some(handle) = self.register.instance(id) else {
            tracing::error!(id, "instance not found");
            return Err(DevToolsError::InstanceNotFound(id));
        };

        let mut generator = ArpeggioGenerator::new(self.arpeggio.clone())?;
        let init = generator.initialize()?;
        let stream = spawn_stream_server(generator);

        let mut source = MidiSource::new(init, stream);
        source.load_synth(0, Synthesizer::create(&handle));

        tracing::info!(id, plugin = handle.name(), "playing test arpeggio");
        self.engine.play(source);
        Ok(())
    }

    pub fn show_editor(&self, id: InstanceId) -> Result<(), DevToolsError> {
        let query = UriQuery::new(EDITOR_URI).with_param(INSTANCE_ID_PARAM, id);
        self.interactive.open(&query).inspect_err(|err| {
            tracing::error!(%err, %query, "cannot open editor");
        })?;
        Ok(())
    }

    pub fn instances(&self) -> Vec<InstanceEditorModel> {
        (0..self.instances_count())
            .filter_map(|id| InstanceEditorModel::load(&self.register, id))
            .collect()
    }

    pub fn instances_count(&self) -> usize {
        self.register.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactive::Navigator;
    use crate::plugin::CatalogScanner;
    use crate::timing::Chunk;
    use parking_lot::Mutex;

    #[derive(Default, Clone)]
    struct RecordingEngine {
        sources: Arc<Mutex<Vec<MidiSource>>>,
    }

    impl AudioEngine for RecordingEngine {
        fn play(&self, source: MidiSource) {
            self.sources.lock().push(source);
        }
    }

    fn catalog() -> Vec<PluginDescriptor> {
        vec![
            PluginDescriptor::new("synth", "Synth", PluginType::Instrument),
            PluginDescriptor::new("legacy", "Legacy Bridge", PluginType::Unknown),
            PluginDescriptor::new("mon", "Monitor", PluginType::MidiMonitor),
        ]
    }

    fn devtools() -> (DevTools<RecordingEngine, Arc<Navigator>>, Arc<Mutex<Vec<InstanceId>>>) {
        let register = Arc::new(InstanceRegister::new());
        let navigator = Arc::new(Navigator::new());
        let opened = Arc::new(Mutex::new(Vec::new()));

        let log = opened.clone();
        navigator.register(EDITOR_URI, move |query| {
            log.lock().push(editor_instance_id(query)?);
            Ok(())
        });

        let tools = DevTools::new(
            &CatalogScanner::new(catalog()),
            register,
            RecordingEngine::default(),
            navigator,
            ArpeggioConfig::default(),
        );
        (tools, opened)
    }

    #[test]
    fn add_instance_skips_unknown_types() {
        let (tools, _) = devtools();
        assert_eq!(tools.plugins().len(), 3);

        assert_eq!(tools.add_instance(0).unwrap(), 0);
        assert!(matches!(
            tools.add_instance(1),
            Err(DevToolsError::UnknownPluginType(name)) if name == "Legacy Bridge"
        ));
        assert!(matches!(
            tools.add_instance(7),
            Err(DevToolsError::NoSuchPlugin { index: 7, len: 3 })
        ));
        assert_eq!(tools.add_instance(2).unwrap(), 1);

        assert_eq!(tools.instances_count(), 2);
        assert_eq!(tools.plugin_name(1).unwrap(), "Monitor");
        assert!(matches!(
            tools.plugin_name(5),
            Err(DevToolsError::InstanceNotFound(5))
        ));

        let models = tools.instances();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "Synth");
        assert!(!models[0].parameters.is_empty());
    }

    #[test]
    fn play_hands_a_fresh_session_to_the_engine() {
        let (tools, _) = devtools();
        assert!(matches!(tools.play(0), Err(DevToolsError::InstanceNotFound(0))));
        assert!(tools.engine().sources.lock().is_empty());

        let id = tools.add_instance(0).unwrap();
        tools.play(id).unwrap();
        tools.play(id).unwrap();

        let mut sources = tools.engine().sources.lock();
        assert_eq!(sources.len(), 2);
        for source in sources.iter_mut() {
            let init = source.init_data();
            assert_eq!(init.synth_map[&0], "synth#0");
            assert_eq!(init.chunks.len(), 1);
            assert_eq!(init.next_tick(), 4440);
        }

        // each session starts its own pitch cycle
        let first: Vec<Option<Chunk>> = sources
            .iter_mut()
            .map(|s| s.stream_mut().request(4440))
            .collect();
        assert_eq!(first[0], first[1]);
        assert_eq!(
            first[0].as_ref().and_then(|c| c.events().next()).map(|(t, e)| (t, e.pitch())),
            Some((4810, Some(50)))
        );
    }

    #[test]
    fn show_editor_opens_instance_view() {
        let (tools, opened) = devtools();
        tools.show_editor(4).unwrap();
        assert_eq!(*opened.lock(), vec![4]);
    }

    #[test]
    fn invalid_arpeggio_aborts_play() {
        let (mut tools, _) = devtools();
        tools.arpeggio.degrees.clear();
        let id = tools.add_instance(0).unwrap();
        assert!(matches!(tools.play(id), Err(DevToolsError::Config(_))));
    }

    #[test]
    fn editor_id_parsing() {
        let query = UriQuery::new(EDITOR_URI).with_param(INSTANCE_ID_PARAM, "x");
        assert!(matches!(
            editor_instance_id(&query),
            Err(NavigationError::InvalidParam { .. })
        ));
        assert!(matches!(
            editor_instance_id(&UriQuery::new(EDITOR_URI)),
            Err(NavigationError::MissingParam { .. })
        ));
    }
}

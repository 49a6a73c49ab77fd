use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use crate::error::{BrtError, BrtResult};
use crate::graph::command::Command;
use crate::math::Transform;
use crate::model::listener::CranialGeometry;
use crate::model::{Listener, Source};
use crate::processing::{
    DirectivityConvolverProcessor, DistanceAttenuationProcessor, HrtfConvolverProcessor, NearFieldFilterProcessor,
};
use crate::services::directivity::DirectivityService;
use crate::services::hrtf::HrtfService;
use crate::services::sos::SosFilterService;

const DEFAULT_MAX_ITD_DELAY_SAMPLES: usize = 256;

struct Connection {
    source_id: String,
    listener_id: String,
    directivity: Rc<RefCell<DirectivityConvolverProcessor>>,
    attenuation: Rc<RefCell<DistanceAttenuationProcessor>>,
    hrtf: Rc<RefCell<HrtfConvolverProcessor>>,
    near_field: Rc<RefCell<NearFieldFilterProcessor>>,
}

/// Owns every live source, listener and processor plus the command bus, and drives one
/// tick of audio through the whole graph (§4.1, §6). Structural edits (create/connect)
/// are only valid while `setup_active` is set; `process_all` is only valid once it is
/// cleared.
///
/// One source connects to at most one listener at a time: this crate does not implement
/// multi-listener broadcast for a single source (an explicit non-goal), so `disconnect`
/// can safely detach every observer on the shared exit points without touching other
/// connections.
pub struct Manager {
    setup_active: bool,
    block_size: usize,
    sample_rate: u32,
    sources: HashMap<String, Rc<RefCell<Source>>>,
    listeners: HashMap<String, Rc<RefCell<Listener>>>,
    connections: Vec<Connection>,
    hrtf_services: HashMap<String, Arc<Mutex<HrtfService>>>,
    hrbrir_services: HashMap<String, Arc<Mutex<HrtfService>>>,
    directivity_services: HashMap<String, Arc<Mutex<DirectivityService>>>,
    sos_services: HashMap<String, Arc<Mutex<SosFilterService>>>,
}

impl Manager {
    pub fn new(block_size: usize, sample_rate: u32) -> Self {
        Manager {
            setup_active: false,
            block_size,
            sample_rate,
            sources: HashMap::new(),
            listeners: HashMap::new(),
            connections: Vec::new(),
            hrtf_services: HashMap::new(),
            hrbrir_services: HashMap::new(),
            directivity_services: HashMap::new(),
            sos_services: HashMap::new(),
        }
    }

    pub fn begin_setup(&mut self) {
        self.setup_active = true;
    }

    /// Always succeeds, matching the source library's actual `EndSetup` behaviour; call
    /// [`Manager::validate`] separately for the consistency diagnostics its name implies.
    pub fn end_setup(&mut self) -> bool {
        self.setup_active = false;
        true
    }

    pub fn is_setup_active(&self) -> bool {
        self.setup_active
    }

    fn require_setup(&self) -> BrtResult<()> {
        if !self.setup_active {
            return Err(BrtError::NotAllowed("structural edit outside setup".to_string()));
        }
        Ok(())
    }

    pub fn create_source(&mut self, id: impl Into<String>) -> BrtResult<()> {
        self.require_setup()?;
        let id = id.into();
        if self.sources.contains_key(&id) {
            return Err(BrtError::NotAllowed(format!("duplicate source id {}", id)));
        }
        self.sources.insert(id.clone(), Rc::new(RefCell::new(Source::new(id, self.block_size))));
        Ok(())
    }

    pub fn create_listener(&mut self, id: impl Into<String>, head_radius_m: f32) -> BrtResult<()> {
        self.require_setup()?;
        let id = id.into();
        if self.listeners.contains_key(&id) {
            return Err(BrtError::NotAllowed(format!("duplicate listener id {}", id)));
        }
        let geometry = CranialGeometry::new(head_radius_m);
        self.listeners.insert(id.clone(), Rc::new(RefCell::new(Listener::new(id, self.block_size, geometry))));
        Ok(())
    }

    pub fn bind_hrtf_service(&mut self, listener_id: &str, service: Arc<Mutex<HrtfService>>) {
        self.hrtf_services.insert(listener_id.to_string(), service);
    }

    /// Binds a room-measured HRBRIR table, used when no plain HRTF service is bound for
    /// this listener (§4.6 step 2's "prefer HRTF if present, else HRBRIR").
    pub fn bind_hrbrir_service(&mut self, listener_id: &str, service: Arc<Mutex<HrtfService>>) {
        self.hrbrir_services.insert(listener_id.to_string(), service);
    }

    pub fn bind_directivity_service(&mut self, source_id: &str, service: Arc<Mutex<DirectivityService>>) {
        self.directivity_services.insert(source_id.to_string(), service);
    }

    pub fn bind_sos_service(&mut self, listener_id: &str, service: Arc<Mutex<SosFilterService>>) {
        self.sos_services.insert(listener_id.to_string(), service);
    }

    /// Wires `source -> [directivity] -> [distance attenuation] -> [hrtf convolver] ->
    /// [near-field filter] -> listener`, creating one processor of each kind for this
    /// pair (§4.3, §4.6-§4.8).
    pub fn connect_source_to_listener(&mut self, source_id: &str, listener_id: &str) -> BrtResult<()> {
        self.require_setup()?;
        let source = self.sources.get(source_id).ok_or_else(|| BrtError::NotAllowed(format!("unknown source {}", source_id)))?.clone();
        let listener = self.listeners.get(listener_id).ok_or_else(|| BrtError::NotAllowed(format!("unknown listener {}", listener_id)))?.clone();

        let head_radius = listener.borrow().geometry().head_radius_m;
        let directivity = Rc::new(RefCell::new(DirectivityConvolverProcessor::new(self.block_size)));
        let attenuation = Rc::new(RefCell::new(DistanceAttenuationProcessor::new(self.block_size, self.sample_rate)));
        let hrtf = Rc::new(RefCell::new(HrtfConvolverProcessor::new(self.block_size, DEFAULT_MAX_ITD_DELAY_SAMPLES, head_radius)));
        let near_field = Rc::new(RefCell::new(NearFieldFilterProcessor::new(self.block_size)));

        if let Some(service) = self.directivity_services.get(source_id) {
            directivity.borrow_mut().directivity_tf.set(Arc::downgrade(service));
        }
        if let Some(service) = self.hrtf_services.get(listener_id) {
            hrtf.borrow_mut().listener_hrtf.set(Arc::downgrade(service));
        }
        if let Some(service) = self.hrbrir_services.get(listener_id) {
            hrtf.borrow_mut().listener_hrbrir.set(Arc::downgrade(service));
        }
        if let Some(service) = self.sos_services.get(listener_id) {
            near_field.borrow_mut().sos_tf.set(Arc::downgrade(service));
        }

        {
            let d = directivity.clone();
            source.borrow().samples.attach(Box::new(move |v: Vec<f32>| d.borrow_mut().notify_input_samples(v)));
        }
        {
            let a = attenuation.clone();
            directivity.borrow().output_samples.attach(Box::new(move |v: Vec<f32>| a.borrow_mut().notify_input_samples(v)));
        }
        {
            let h = hrtf.clone();
            attenuation.borrow().output_samples.attach(Box::new(move |v: Vec<f32>| h.borrow_mut().notify_input_samples(v)));
        }
        {
            let (d, a, h, nf) = (directivity.clone(), attenuation.clone(), hrtf.clone(), near_field.clone());
            source.borrow().transform_exit.attach(Box::new(move |v: Transform| {
                d.borrow_mut().notify_source_position(v);
                a.borrow_mut().notify_source_position(v);
                h.borrow_mut().notify_source_position(v);
                nf.borrow_mut().notify_source_position(v);
            }));
        }
        {
            let (h, d) = (hrtf.clone(), directivity.clone());
            source.borrow().id_exit.attach(Box::new(move |v: String| {
                h.borrow_mut().source_id.set(v.clone());
                d.borrow_mut().source_id.set(v);
            }));
        }
        {
            let nf = near_field.clone();
            hrtf.borrow().left_ear.attach(Box::new(move |v: Vec<f32>| nf.borrow_mut().notify_left_input(v)));
        }
        {
            let nf = near_field.clone();
            hrtf.borrow().right_ear.attach(Box::new(move |v: Vec<f32>| nf.borrow_mut().notify_right_input(v)));
        }
        {
            let l = listener.clone();
            near_field.borrow().left_output.attach(Box::new(move |v: Vec<f32>| l.borrow_mut().accumulate_left(&v)));
        }
        {
            let l = listener.clone();
            near_field.borrow().right_output.attach(Box::new(move |v: Vec<f32>| l.borrow_mut().accumulate_right(&v)));
        }

        listener.borrow_mut().attach_processor(Rc::downgrade(&hrtf));
        listener.borrow_mut().attach_near_field_processor(Rc::downgrade(&near_field));
        self.connections.push(Connection {
            source_id: source_id.to_string(),
            listener_id: listener_id.to_string(),
            directivity,
            attenuation,
            hrtf,
            near_field,
        });
        Ok(())
    }

    /// Detaches every observer from the pair's shared exit points and drops the
    /// connection's processors.
    pub fn disconnect_source_from_listener(&mut self, source_id: &str, listener_id: &str) -> BrtResult<()> {
        self.require_setup()?;
        let before = self.connections.len();
        self.connections.retain(|c| !(c.source_id == source_id && c.listener_id == listener_id));
        if self.connections.len() == before {
            return Err(BrtError::NotAllowed(format!("no connection between {} and {}", source_id, listener_id)));
        }
        if let Some(source) = self.sources.get(source_id) {
            source.borrow().samples.detach_all();
            source.borrow().transform_exit.detach_all();
            source.borrow().id_exit.detach_all();
        }
        Ok(())
    }

    /// Drives one tick: each connection's processors receive their listener's current
    /// transform and id directly (a listener's transform is shared by every source
    /// connected to it, so it cannot be delivered via a single-owner exit-point
    /// subscription the way a source's one-to-one outputs are), then each source
    /// publishes its own transform/id/samples, which completes the firing gate.
    pub fn process_all(&mut self) -> BrtResult<()> {
        if self.setup_active {
            return Err(BrtError::NotAllowed("process_all called while setup is active".to_string()));
        }
        for listener in self.listeners.values() {
            listener.borrow_mut().process();
        }
        for connection in &self.connections {
            if let Some(listener) = self.listeners.get(&connection.listener_id) {
                let transform = listener.borrow().transform();
                let id = listener.borrow().id().to_string();
                connection.directivity.borrow_mut().notify_listener_position(transform);
                connection.attenuation.borrow_mut().notify_listener_position(transform);
                connection.hrtf.borrow_mut().listener_id.set(id);
                connection.hrtf.borrow_mut().notify_listener_position(transform);
                connection.near_field.borrow_mut().notify_listener_position(transform);
            }
        }
        for source in self.sources.values() {
            source.borrow_mut().process();
        }
        Ok(())
    }

    pub fn execute_command(&mut self, cmd: &Command) {
        for source in self.sources.values() {
            source.borrow_mut().execute_command(cmd);
        }
        for listener in self.listeners.values() {
            listener.borrow_mut().execute_command(cmd);
        }
        for connection in &self.connections {
            connection.directivity.borrow_mut().execute_command(cmd);
            connection.hrtf.borrow_mut().execute_command(cmd);
        }
    }

    pub fn source(&self, id: &str) -> Option<Rc<RefCell<Source>>> {
        self.sources.get(id).cloned()
    }

    pub fn listener(&self, id: &str) -> Option<Rc<RefCell<Listener>>> {
        self.listeners.get(id).cloned()
    }

    /// Diagnostic pass the original's `EndSetup` claims to run but doesn't: reports
    /// sources with no outgoing connection and listeners with neither an HRTF nor an
    /// HRBRIR service bound. Does not affect `end_setup`'s own success/failure.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for id in self.sources.keys() {
            if !self.connections.iter().any(|c| &c.source_id == id) {
                issues.push(format!("source '{}' has no outgoing connection", id));
            }
        }
        for id in self.listeners.keys() {
            if !self.hrtf_services.contains_key(id) && !self.hrbrir_services.contains_key(id) {
                issues.push(format!("listener '{}' has no bound hrtf/hrbrir service", id));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_outside_setup_is_rejected() {
        let mut manager = Manager::new(4, 48_000);
        assert!(manager.create_source("src").is_err());
    }

    #[test]
    fn duplicate_source_id_is_rejected() {
        let mut manager = Manager::new(4, 48_000);
        manager.begin_setup();
        manager.create_source("src").unwrap();
        assert!(manager.create_source("src").is_err());
    }

    #[test]
    fn validate_flags_unconnected_source_and_unbound_listener() {
        let mut manager = Manager::new(4, 48_000);
        manager.begin_setup();
        manager.create_source("src").unwrap();
        manager.create_listener("lst", 0.0875).unwrap();
        manager.end_setup();

        let issues = manager.validate();
        assert!(issues.iter().any(|i| i.contains("src")));
        assert!(issues.iter().any(|i| i.contains("lst")));
    }

    #[test]
    fn process_all_fails_while_setup_active() {
        let mut manager = Manager::new(4, 48_000);
        manager.begin_setup();
        assert!(manager.process_all().is_err());
    }

    #[test]
    fn connected_source_delivers_samples_to_listener() {
        let mut manager = Manager::new(4, 48_000);
        manager.begin_setup();
        manager.create_source("src").unwrap();
        manager.create_listener("lst", 0.0).unwrap();
        manager.connect_source_to_listener("src", "lst").unwrap();
        manager.end_setup();

        manager.source("src").unwrap().borrow_mut().set_buffer(vec![1.0, 1.0, 1.0, 1.0]);
        manager.source("src").unwrap().borrow_mut().set_transform(Transform::from_position(crate::math::Vec3::new(1.0, 0.0, 0.0)));
        manager.process_all().unwrap();

        let (left, right) = manager.listener("lst").unwrap().borrow_mut().get_buffers();
        assert_eq!(left.len(), 4);
        assert_eq!(right.len(), 4);
    }

    #[test]
    fn enable_directivity_command_reaches_connection_processor() {
        let mut manager = Manager::new(4, 48_000);
        manager.begin_setup();
        manager.create_source("src").unwrap();
        manager.create_listener("lst", 0.0).unwrap();
        manager.connect_source_to_listener("src", "lst").unwrap();
        manager.end_setup();

        assert!(manager.connections[0].directivity.borrow().enabled);
        let cmd = Command::new("/source/enableDirectivity")
            .with_param("sourceID", crate::graph::command::CommandParam::Str("src".to_string()))
            .with_param("enabled", crate::graph::command::CommandParam::Bool(false));
        manager.execute_command(&cmd);

        assert!(!manager.connections[0].directivity.borrow().enabled);
    }

    #[test]
    fn validate_accepts_hrbrir_only_binding() {
        use crate::services::hrtf::ExtrapolationMethod;
        use std::sync::{Arc, Mutex};

        let mut manager = Manager::new(4, 48_000);
        manager.begin_setup();
        manager.create_source("src").unwrap();
        manager.create_listener("lst", 0.0875).unwrap();
        manager.connect_source_to_listener("src", "lst").unwrap();

        let mut svc = HrtfService::new(crate::config::GlobalParameters::new(4, 48_000));
        svc.begin_setup(1, ExtrapolationMethod::NearestPoint);
        svc.add_hrir(0.0, 0.0, 48_000, vec![1.0], vec![1.0], 0, 0).unwrap();
        svc.end_setup().unwrap();
        manager.bind_hrbrir_service("lst", Arc::new(Mutex::new(svc)));
        manager.end_setup();

        let issues = manager.validate();
        assert!(!issues.iter().any(|i| i.contains("lst")));
    }
}

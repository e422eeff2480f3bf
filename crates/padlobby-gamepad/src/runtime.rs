use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use crossbeam_channel::Receiver;
use log::{debug, info, warn};

use crate::classify::{detect_trigger_pair, is_gamepad};
use crate::combo::{DeviceState, InputSignal};
use crate::command::Command;
use crate::events::DeviceEvent;
use crate::identity::identify;
use crate::manager::Inner;
use crate::settings::RuntimeSettings;
use crate::source::{InputNode, InputSource, ReadError};
use crate::types::{ButtonCode, DeviceIdentity, DevicePath};

/// Boxed error returned by start button lookups.
pub type ResolveError = Box<dyn std::error::Error + Send + Sync>;

/// Looks up per-type start button overrides.
pub trait StartButtonResolver: Send + Sync {
    /// Returns the override for the device type, or `None` when the type uses
    /// the generic start button.
    fn start_button(
        &self,
        name: &str,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Option<ButtonCode>, ResolveError>;
}

/// Resolver without overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStartButton;

impl StartButtonResolver for DefaultStartButton {
    fn start_button(&self, _: &str, _: u16, _: u16) -> Result<Option<ButtonCode>, ResolveError> {
        Ok(None)
    }
}

/// True when a device belongs to the type described by `vendor_id`,
/// `product_id` and `name`. Types without ids match by case-insensitive name
/// substring.
pub fn matches_type(identity: &DeviceIdentity, vendor_id: u16, product_id: u16, name: &str) -> bool {
    if vendor_id != 0 || product_id != 0 {
        return identity.vendor_id == vendor_id && identity.product_id == product_id;
    }
    !name.is_empty() && identity.name.to_lowercase().contains(&name.to_lowercase())
}

struct Tracked<N> {
    node: N,
    identity: DeviceIdentity,
    state: DeviceState,
}

/// The device discovery loop body.
///
/// Owns every open gamepad handle together with its identity and input
/// state in a single table keyed by path; all of it is created on connect and
/// dropped on removal.
pub struct Discovery<S: InputSource> {
    source: S,
    settings: RuntimeSettings,
    resolver: Arc<dyn StartButtonResolver>,
    seen: AHashSet<DevicePath>,
    devices: AHashMap<DevicePath, Tracked<S::Node>>,
}

impl<S: InputSource> Discovery<S> {
    pub fn new(source: S, settings: RuntimeSettings, resolver: Arc<dyn StartButtonResolver>) -> Self {
        Self {
            source,
            settings,
            resolver,
            seen: AHashSet::new(),
            devices: AHashMap::new(),
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Identities of the tracked gamepads.
    pub fn devices(&self) -> Vec<DeviceIdentity> {
        self.devices.values().map(|t| t.identity.clone()).collect()
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        self.devices.contains_key(path)
    }

    pub fn start_button(&self, path: &str) -> Option<ButtonCode> {
        self.devices.get(path).map(|t| t.state.start_button())
    }

    /// Runs one iteration: diff the node list, then drain readable handles.
    pub fn cycle(&mut self, now: Instant, emit: &mut dyn FnMut(DeviceEvent)) -> std::io::Result<()> {
        let present: AHashSet<DevicePath> = self.source.enumerate()?.into_iter().collect();

        let mut fresh: Vec<&DevicePath> = present.iter().filter(|p| !self.seen.contains(*p)).collect();
        fresh.sort();
        for path in fresh {
            self.admit(path, now, emit);
        }

        let gone: Vec<DevicePath> = self.seen.iter().filter(|p| !present.contains(*p)).cloned().collect();
        for path in gone {
            self.forget(&path, emit);
        }

        self.drain(now, emit)
    }

    /// Applies a start button override to every tracked device of the type.
    pub fn set_start_button(&mut self, vendor_id: u16, product_id: u16, name: &str, code: ButtonCode) {
        for tracked in self.devices.values_mut() {
            if matches_type(&tracked.identity, vendor_id, product_id, name) {
                debug!("{}: start button set to {code:#x}", tracked.identity.path);
                tracked.state.set_start_button(code);
            }
        }
    }

    /// Drops every open handle.
    pub fn close_all(&mut self) {
        self.devices.clear();
        self.seen.clear();
    }

    fn admit(&mut self, path: &str, now: Instant, emit: &mut dyn FnMut(DeviceEvent)) {
        let node = match self.source.open(path) {
            Ok(node) => node,
            Err(e) => {
                // Not remembered: permissions may still be settling.
                debug!("{path}: open failed: {e}");
                return;
            }
        };
        self.seen.insert(path.to_string());

        let caps = node.capabilities();
        if !is_gamepad(&caps) {
            debug!("{path}: not a gamepad");
            return;
        }

        let descriptor = node.descriptor();
        let identity = identify(path, &descriptor, self.source.port(path));
        let calibration = detect_trigger_pair(&caps);
        let start_button = self.resolve_start_button(&identity);
        let state = DeviceState::new(calibration, start_button, now, &self.settings.classifier);

        info!(
            "Connected {} ({:04x}:{:04x}) at {path}, port {}",
            identity.name, identity.vendor_id, identity.product_id, identity.port
        );
        self.devices.insert(
            path.to_string(),
            Tracked {
                node,
                identity: identity.clone(),
                state,
            },
        );
        emit(DeviceEvent::Connected(identity));
    }

    fn resolve_start_button(&self, identity: &DeviceIdentity) -> ButtonCode {
        let fallback = self.settings.classifier.default_start_button;
        match self
            .resolver
            .start_button(&identity.name, identity.vendor_id, identity.product_id)
        {
            Ok(code) => code.unwrap_or(fallback),
            Err(e) => {
                warn!("{}: start button lookup failed: {e}", identity.path);
                fallback
            }
        }
    }

    fn forget(&mut self, path: &str, emit: &mut dyn FnMut(DeviceEvent)) {
        self.seen.remove(path);
        if let Some(tracked) = self.devices.remove(path) {
            info!("Disconnected {} at {path}", tracked.identity.name);
            emit(DeviceEvent::Disconnected {
                path: path.to_string(),
            });
        }
    }

    fn drain(&mut self, now: Instant, emit: &mut dyn FnMut(DeviceEvent)) -> std::io::Result<()> {
        if self.devices.is_empty() {
            return Ok(());
        }

        let mut paths: Vec<DevicePath> = self.devices.keys().cloned().collect();
        paths.sort();
        let readable: AHashSet<usize> = {
            let nodes: Vec<&S::Node> = paths.iter().filter_map(|p| self.devices.get(p)).map(|t| &t.node).collect();
            self.source
                .wait_readable(&nodes, self.settings.wait_timeout)?
                .into_iter()
                .collect()
        };

        let classifier = &self.settings.classifier;
        let mut removed = Vec::new();
        for (index, path) in paths.iter().enumerate() {
            let Some(tracked) = self.devices.get_mut(path) else {
                continue;
            };
            if readable.contains(&index) {
                let events = match tracked.node.read_events() {
                    Ok(events) => events,
                    Err(ReadError::Removed) => {
                        removed.push(path.clone());
                        continue;
                    }
                    Err(ReadError::Io(e)) => {
                        debug!("{path}: read failed: {e}");
                        Vec::new()
                    }
                };
                for event in events {
                    for signal in tracked.state.handle_event(event, now) {
                        let path = path.clone();
                        emit(match signal {
                            InputSignal::Activity => DeviceEvent::Activity { path },
                            InputSignal::StartPressed => DeviceEvent::StartPressed { path },
                        });
                    }
                }
            } else if !tracked.state.has_held_buttons() {
                continue;
            }

            if let Some(matched) = tracked.state.check_combo(now, classifier) {
                debug!("{path}: ready combo {matched:?}");
                emit(DeviceEvent::ComboFired { path: path.clone() });
            }
        }

        for path in removed {
            self.forget(&path, emit);
        }
        Ok(())
    }
}

/// Starts the thread that drives discovery until the stop flag is raised.
pub(crate) fn start_runtime_thread<S>(
    inner: Arc<Inner>,
    mut discovery: Discovery<S>,
    cmd_rx: Receiver<Command>,
    ready_tx: Option<std::sync::mpsc::Sender<()>>,
) -> std::io::Result<JoinHandle<()>>
where
    S: InputSource + 'static,
{
    thread::Builder::new()
        .name("padlobby-discovery".into())
        .spawn(move || {
            let mut ready_tx = ready_tx;
            let poll_interval = discovery.settings().poll_interval;
            let retry_delay = discovery.settings().retry_delay;

            while !inner.stop.load(Ordering::Relaxed) {
                while let Ok(cmd) = cmd_rx.try_recv() {
                    match cmd {
                        Command::SetStartButton {
                            vendor_id,
                            product_id,
                            name,
                            code,
                        } => discovery.set_start_button(vendor_id, product_id, &name, code),
                    }
                }

                let result = discovery.cycle(Instant::now(), &mut |event| inner.publish(event));
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(());
                }
                if let Err(e) = result {
                    warn!("Discovery cycle failed: {e}");
                    thread::sleep(retry_delay);
                    continue;
                }

                thread::sleep(poll_interval);
            }

            discovery.close_all();
            inner.clear_devices();
            debug!("Discovery stopped");
        })
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::source::MemorySource;
    use crate::types::{codes, AxisRange, Capabilities, DeviceDescriptor};

    const PAD: &str = "/dev/input/event20";

    fn pro_controller() -> DeviceDescriptor {
        DeviceDescriptor {
            name: "Pro Controller".into(),
            bus_type: 0x03,
            vendor_id: 0x057e,
            product_id: 0x2009,
            version: 0x0111,
            uniq: Some("98:b6:e9:00:00:01".into()),
        }
    }

    fn pad_caps() -> Capabilities {
        let mut caps = Capabilities::default();
        caps.buttons.extend([codes::BTN_SOUTH, codes::BTN_START, codes::BTN_TL, codes::BTN_TR, codes::BTN_TR2]);
        caps.axes.insert(codes::ABS_Z, AxisRange { min: 0, max: 255 });
        caps.axes.insert(codes::ABS_RZ, AxisRange { min: 0, max: 255 });
        caps
    }

    fn keyboard_caps() -> Capabilities {
        let mut caps = Capabilities::default();
        caps.buttons.extend([0x1e, 0x39]);
        caps
    }

    fn discovery(source: &MemorySource) -> Discovery<MemorySource> {
        Discovery::new(source.clone(), RuntimeSettings::default(), Arc::new(DefaultStartButton))
    }

    fn run(discovery: &mut Discovery<MemorySource>, now: Instant) -> Vec<DeviceEvent> {
        let mut events = Vec::new();
        discovery.cycle(now, &mut |e| events.push(e)).expect("cycle");
        events
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn path() -> String {
        PAD.to_string()
    }

    #[test]
    fn connects_gamepad_with_identity() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 2);
        let mut discovery = discovery(&source);

        let events = run(&mut discovery, Instant::now());
        let [DeviceEvent::Connected(identity)] = events.as_slice() else {
            panic!("unexpected events: {events:?}");
        };
        assert_eq!(identity.path, PAD);
        assert_eq!(identity.unique_id, "98:b6:e9:00:00:01");
        assert_eq!(identity.guid, "030000007e0500000920000011010000");
        assert_eq!(identity.port, 2);
        assert!(discovery.is_tracked(PAD));
    }

    #[test]
    fn non_gamepad_is_classified_once() {
        let source = MemorySource::new();
        source.plug("/dev/input/event3", DeviceDescriptor::default(), keyboard_caps(), 3);
        let mut discovery = discovery(&source);
        let t0 = Instant::now();

        assert!(run(&mut discovery, t0).is_empty());
        assert!(run(&mut discovery, t0 + ms(20)).is_empty());
        assert_eq!(source.open_count("/dev/input/event3"), 1);
        assert!(discovery.devices().is_empty());
    }

    #[test]
    fn failed_open_is_retried() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        source.mark_removed(PAD);
        let mut discovery = discovery(&source);
        let t0 = Instant::now();
        assert!(run(&mut discovery, t0).is_empty());

        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let events = run(&mut discovery, t0 + ms(20));
        assert!(matches!(events.as_slice(), [DeviceEvent::Connected(_)]));
    }

    #[test]
    fn press_while_settling_reports_input_but_no_combo() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let mut discovery = discovery(&source);
        let t0 = Instant::now();
        run(&mut discovery, t0);

        source.press(PAD, codes::BTN_START);
        let events = run(&mut discovery, t0 + ms(200));
        assert_eq!(
            events,
            vec![
                DeviceEvent::Activity { path: path() },
                DeviceEvent::StartPressed { path: path() },
            ]
        );
    }

    #[test]
    fn start_press_after_settle_fires_combo() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let mut discovery = discovery(&source);
        let t0 = Instant::now();
        run(&mut discovery, t0);

        source.press(PAD, codes::BTN_START);
        let events = run(&mut discovery, t0 + ms(1200));
        assert_eq!(
            events,
            vec![
                DeviceEvent::Activity { path: path() },
                DeviceEvent::StartPressed { path: path() },
                DeviceEvent::ComboFired { path: path() },
            ]
        );
    }

    #[test]
    fn held_button_fires_without_new_events() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let mut discovery = discovery(&source);
        let t0 = Instant::now();
        run(&mut discovery, t0);

        source.press(PAD, codes::BTN_START);
        run(&mut discovery, t0 + ms(900));
        let events = run(&mut discovery, t0 + ms(1000));
        assert_eq!(events, vec![DeviceEvent::ComboFired { path: path() }]);
        assert!(run(&mut discovery, t0 + ms(1100)).is_empty());
    }

    #[test]
    fn start_tapped_while_settling_does_not_fire_on_later_noise() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let mut discovery = discovery(&source);
        let t0 = Instant::now();
        run(&mut discovery, t0);

        source.press(PAD, codes::BTN_START);
        source.release(PAD, codes::BTN_START);
        run(&mut discovery, t0 + ms(300));

        source.push(PAD, [crate::types::RawEvent::Axis { code: codes::ABS_X, value: 40 }]);
        let events = run(&mut discovery, t0 + ms(1100));
        assert!(events.is_empty(), "unexpected events: {events:?}");
    }

    #[test]
    fn unplug_emits_disconnect_and_drops_state() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let mut discovery = discovery(&source);
        let t0 = Instant::now();
        run(&mut discovery, t0);

        source.unplug(PAD);
        let events = run(&mut discovery, t0 + ms(20));
        assert_eq!(events, vec![DeviceEvent::Disconnected { path: path() }]);
        assert!(!discovery.is_tracked(PAD));
        assert!(run(&mut discovery, t0 + ms(40)).is_empty());
    }

    #[test]
    fn removal_during_read_is_a_disconnect() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let mut discovery = discovery(&source);
        let t0 = Instant::now();
        run(&mut discovery, t0);

        source.mark_removed(PAD);
        let events = run(&mut discovery, t0 + ms(20));
        assert_eq!(events, vec![DeviceEvent::Disconnected { path: path() }]);
        // Still listed but unopenable: no reconnect.
        assert!(run(&mut discovery, t0 + ms(40)).is_empty());
    }

    #[test]
    fn replug_gets_fresh_state() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let mut discovery = discovery(&source);
        let t0 = Instant::now();
        run(&mut discovery, t0);
        source.press(PAD, codes::BTN_TL);
        run(&mut discovery, t0 + ms(100));

        source.unplug(PAD);
        run(&mut discovery, t0 + ms(200));
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let events = run(&mut discovery, t0 + ms(1500));
        assert!(matches!(events.as_slice(), [DeviceEvent::Connected(_)]));

        // The new incarnation is settling again and holds nothing.
        source.press(PAD, codes::BTN_TR);
        let events = run(&mut discovery, t0 + ms(1600));
        assert!(!events.contains(&DeviceEvent::ComboFired { path: path() }));
    }

    struct Overrides(Mutex<Vec<(u16, u16, ButtonCode)>>);

    impl StartButtonResolver for Overrides {
        fn start_button(&self, _: &str, vendor_id: u16, product_id: u16) -> Result<Option<ButtonCode>, ResolveError> {
            let table = self.0.lock().map_err(|e| e.to_string())?;
            Ok(table
                .iter()
                .find(|(v, p, _)| *v == vendor_id && *p == product_id)
                .map(|(_, _, code)| *code))
        }
    }

    struct Failing;

    impl StartButtonResolver for Failing {
        fn start_button(&self, _: &str, _: u16, _: u16) -> Result<Option<ButtonCode>, ResolveError> {
            Err(Box::new(io::Error::other("store offline")))
        }
    }

    #[test]
    fn resolves_start_button_override_on_connect() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let resolver = Arc::new(Overrides(Mutex::new(vec![(0x057e, 0x2009, codes::BTN_TR2)])));
        let mut discovery = Discovery::new(source.clone(), RuntimeSettings::default(), resolver);
        let t0 = Instant::now();
        run(&mut discovery, t0);
        assert_eq!(discovery.start_button(PAD), Some(codes::BTN_TR2));

        source.press(PAD, codes::BTN_TR2);
        let events = run(&mut discovery, t0 + ms(1100));
        assert!(events.contains(&DeviceEvent::StartPressed { path: path() }));
    }

    #[test]
    fn failed_lookup_falls_back_to_generic_start() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let mut discovery = Discovery::new(source.clone(), RuntimeSettings::default(), Arc::new(Failing));
        run(&mut discovery, Instant::now());
        assert_eq!(discovery.start_button(PAD), Some(codes::BTN_START));
    }

    #[test]
    fn start_button_update_applies_to_tracked_devices_of_type() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let other = DeviceDescriptor {
            name: "Xbox Wireless Controller".into(),
            vendor_id: 0x045e,
            product_id: 0x0b13,
            ..DeviceDescriptor::default()
        };
        source.plug("/dev/input/event21", other, pad_caps(), 1);
        let mut discovery = discovery(&source);
        run(&mut discovery, Instant::now());

        discovery.set_start_button(0x057e, 0x2009, "Pro Controller", codes::BTN_TR2);
        assert_eq!(discovery.start_button(PAD), Some(codes::BTN_TR2));
        assert_eq!(discovery.start_button("/dev/input/event21"), Some(codes::BTN_START));
    }

    #[test]
    fn type_without_ids_matches_by_name() {
        let identity = identify(
            PAD,
            &DeviceDescriptor {
                name: "8BitDo SN30 Pro".into(),
                ..DeviceDescriptor::default()
            },
            0,
        );
        assert!(matches_type(&identity, 0, 0, "8bitdo"));
        assert!(!matches_type(&identity, 0, 0, ""));
        assert!(!matches_type(&identity, 0x2dc8, 0x6001, "8bitdo"));
    }

    #[test]
    fn dual_trigger_hold_fires() {
        let source = MemorySource::new();
        source.plug(PAD, pro_controller(), pad_caps(), 0);
        let mut discovery = discovery(&source);
        let t0 = Instant::now();
        run(&mut discovery, t0);

        source.push(
            PAD,
            [
                crate::types::RawEvent::Axis { code: codes::ABS_Z, value: 250 },
                crate::types::RawEvent::Axis { code: codes::ABS_RZ, value: 250 },
            ],
        );
        let events = run(&mut discovery, t0 + ms(1100));
        assert_eq!(
            events,
            vec![
                DeviceEvent::Activity { path: path() },
                DeviceEvent::Activity { path: path() },
                DeviceEvent::ComboFired { path: path() },
            ]
        );
    }
}

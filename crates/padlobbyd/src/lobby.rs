//! Glue between the discovery runtime, the presence collections and the
//! outbound signals.

use std::sync::Arc;

use padlobby_gamepad::{ButtonCode, DeviceEvent, DeviceIdentity};
use padlobby_workspace::{Profile, ProfileStore, StoreError};

use crate::presence::{Presence, PresenceError, ReadyRecord, Snapshot};
use crate::signals::{Signal, SignalHub};
use crate::{print_debug, print_info, print_warning};

pub struct Lobby {
    presence: Presence,
    store: Arc<dyn ProfileStore>,
    signals: Arc<SignalHub>,
}

impl Lobby {
    pub fn new(store: Arc<dyn ProfileStore>, signals: Arc<SignalHub>) -> Self {
        Self {
            presence: Presence::new(store.clone()),
            store,
            signals,
        }
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn snapshot(&self) -> Snapshot {
        self.presence.snapshot()
    }

    pub fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected(identity) => self.on_connected(&identity),
            DeviceEvent::Disconnected { path } => self.on_disconnected(&path),
            DeviceEvent::Activity { path } => {
                if let Some(unique_id) = self.presence.unique_id_for_path(&path) {
                    self.signals.emit(Signal::Activity { unique_id });
                }
            }
            DeviceEvent::StartPressed { path } => {
                if let Some(unique_id) = self.presence.unique_id_for_path(&path) {
                    self.signals.emit(Signal::StartPressed { unique_id });
                }
            }
            DeviceEvent::ComboFired { path } => {
                self.ready_up(&path);
            }
        }
    }

    fn on_connected(&mut self, identity: &DeviceIdentity) {
        match self.presence.add_connected(identity) {
            Ok(record) => {
                print_info!("{} connected as {}", record.name, record.unique_id);
                self.signals.emit(Signal::Connected(record));
            }
            Err(e) => print_debug!("ignoring connect: {e}"),
        }
    }

    fn on_disconnected(&mut self, path: &str) {
        let Some(unique_id) = self.presence.unique_id_for_path(path) else {
            return;
        };
        match self.presence.remove_connected(path) {
            Ok(was_ready) => {
                print_info!("{unique_id} disconnected");
                if was_ready {
                    self.signals.emit(Signal::Unreadied {
                        unique_id: unique_id.clone(),
                    });
                }
                self.signals.emit(Signal::Disconnected { unique_id });
            }
            Err(e) => print_debug!("ignoring disconnect: {e}"),
        }
    }

    fn ready_up(&mut self, path: &str) -> Option<ReadyRecord> {
        match self.presence.move_to_ready(path) {
            Ok(ready) => {
                print_info!("{} is ready in slot {}", ready.record.name, ready.slot_index);
                self.signals.emit(Signal::Ready(ready.clone()));
                Some(ready)
            }
            Err(PresenceError::AlreadyReady(_)) => None,
            Err(e) => {
                print_debug!("cannot promote: {e}");
                None
            }
        }
    }

    /// Promotes the controller tracked under `unique_id`.
    pub fn promote(&mut self, unique_id: &str) -> Option<ReadyRecord> {
        let Some(path) = self.presence.path_for_unique_id(unique_id) else {
            print_warning!("promote: unknown controller {unique_id}");
            return None;
        };
        self.ready_up(&path)
    }

    /// Moves every ready controller back to connected. Returns how many moved.
    pub fn clear_ready(&mut self) -> usize {
        let moved = self.presence.clear_ready();
        for record in &moved {
            self.signals.emit(Signal::Unreadied {
                unique_id: record.unique_id.clone(),
            });
            self.signals.emit(Signal::Connected(record.clone()));
        }
        if !moved.is_empty() {
            print_info!("cleared {} ready controllers", moved.len());
        }
        moved.len()
    }

    pub fn update_battery(&mut self, unique_id: &str, percent: u8) -> bool {
        if !self.presence.update_battery(unique_id, percent) {
            print_debug!("battery reading for untracked {unique_id}");
            return false;
        }
        self.signals.emit(Signal::Battery {
            unique_id: unique_id.to_string(),
            percent,
        });
        true
    }

    /// Stores a start button override for a controller type. Live devices
    /// pick it up through the device manager.
    pub fn set_start_button(
        &self,
        vendor_id: u16,
        product_id: u16,
        name: &str,
        code: ButtonCode,
    ) -> Result<(), StoreError> {
        self.store.set_start_button(vendor_id, product_id, name, code)?;
        print_info!("start button for {vendor_id:04x}:{product_id:04x} {name} set to {code:#x}");
        Ok(())
    }

    /// Pushes edited profiles into the live records.
    pub fn refresh_profiles(&mut self, profiles: &[Profile]) {
        for profile in profiles {
            for unique_id in self.presence.refresh_profile(&profile.unique_id, profile) {
                if let Some(record) = self.presence.record(&unique_id) {
                    self.signals.emit(Signal::Updated(record));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crossbeam_channel::Receiver;
    use padlobby_gamepad::source::MemorySource;
    use padlobby_gamepad::types::{AxisRange, Capabilities, DeviceDescriptor};
    use padlobby_gamepad::{codes, Discovery, RuntimeSettings};
    use padlobby_workspace::{MemoryProfileStore, ProfileUpdate, StartButtonLookup, WorkspaceConfig};

    use super::*;

    const PAD_A: &str = "/dev/input/event10";
    const PAD_B: &str = "/dev/input/event11";

    fn switch_pro(uniq: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            name: "Pro Controller".into(),
            bus_type: 0x05,
            vendor_id: 0x057e,
            product_id: 0x2009,
            version: 0x8001,
            uniq: Some(uniq.into()),
        }
    }

    fn pad_caps() -> Capabilities {
        let mut caps = Capabilities::default();
        caps.buttons.extend([
            codes::BTN_SOUTH,
            codes::BTN_START,
            codes::BTN_TL,
            codes::BTN_TR,
            codes::BTN_TR2,
        ]);
        caps.axes.insert(codes::ABS_Z, AxisRange { min: 0, max: 255 });
        caps.axes.insert(codes::ABS_RZ, AxisRange { min: 0, max: 255 });
        caps
    }

    struct Harness {
        source: MemorySource,
        discovery: Discovery<MemorySource>,
        store: Arc<MemoryProfileStore>,
        lobby: Lobby,
        signals: Receiver<Signal>,
        t0: Instant,
    }

    impl Harness {
        fn new() -> Self {
            let source = MemorySource::new();
            let store = Arc::new(MemoryProfileStore::new());
            let discovery = Discovery::new(
                source.clone(),
                RuntimeSettings::default(),
                Arc::new(StartButtonLookup(store.clone())),
            );
            let hub = Arc::new(SignalHub::new());
            let signals = hub.subscribe();
            Self {
                source,
                discovery,
                lobby: Lobby::new(store.clone(), hub),
                store,
                signals,
                t0: Instant::now(),
            }
        }

        fn cycle_at(&mut self, ms: u64) {
            let now = self.t0 + Duration::from_millis(ms);
            let lobby = &mut self.lobby;
            self.discovery
                .cycle(now, &mut |event| lobby.handle_device_event(event))
                .expect("cycle");
        }

        fn drain(&self) -> Vec<Signal> {
            self.signals.try_iter().collect()
        }
    }

    fn kinds(signals: &[Signal]) -> Vec<(&'static str, String)> {
        signals
            .iter()
            .map(|s| {
                let kind = match s {
                    Signal::Connected(_) => "connected",
                    Signal::Disconnected { .. } => "disconnected",
                    Signal::Unreadied { .. } => "unreadied",
                    Signal::Ready(_) => "ready",
                    Signal::Activity { .. } => "activity",
                    Signal::StartPressed { .. } => "start",
                    Signal::Battery { .. } => "battery",
                    Signal::Updated(_) => "updated",
                };
                (kind, s.unique_id().to_string())
            })
            .collect()
    }

    #[test]
    fn two_switch_pros_ready_up_in_order_and_clear() {
        let mut h = Harness::new();
        h.source.plug(PAD_A, switch_pro("aa"), pad_caps(), 0);
        h.source.plug(PAD_B, switch_pro("bb"), pad_caps(), 1);
        h.cycle_at(0);

        let connected = h.lobby.presence().connected();
        assert_eq!(connected.len(), 2);
        assert_eq!(connected[0].image, "switch_pro.png");
        assert_eq!(connected[0].sound, "switch.mp3");
        assert_eq!(
            kinds(&h.drain()),
            vec![("connected", "aa".into()), ("connected", "bb".into())]
        );

        h.source.press(PAD_A, codes::BTN_START);
        h.cycle_at(1100);
        h.source.release(PAD_A, codes::BTN_START);
        h.source.press(PAD_B, codes::BTN_START);
        h.cycle_at(1200);

        let ready = h.lobby.presence().ready();
        assert_eq!(ready.len(), 2);
        assert_eq!((ready[0].unique_id(), ready[0].slot_index), ("aa", 0));
        assert_eq!((ready[1].unique_id(), ready[1].slot_index), ("bb", 1));
        assert!(h.lobby.presence().connected().is_empty());
        let readied: Vec<_> = kinds(&h.drain())
            .into_iter()
            .filter(|(kind, _)| *kind == "ready")
            .collect();
        assert_eq!(readied, vec![("ready", "aa".into()), ("ready", "bb".into())]);

        assert_eq!(h.lobby.clear_ready(), 2);
        assert!(h.lobby.presence().ready().is_empty());
        assert_eq!(h.lobby.presence().connected().len(), 2);
        assert_eq!(
            kinds(&h.drain()),
            vec![
                ("unreadied", "aa".into()),
                ("connected", "aa".into()),
                ("unreadied", "bb".into()),
                ("connected", "bb".into()),
            ]
        );
    }

    #[test]
    fn press_during_settle_reports_input_without_promoting() {
        let mut h = Harness::new();
        h.source.plug(PAD_A, switch_pro("aa"), pad_caps(), 0);
        h.cycle_at(0);
        h.drain();

        h.source.press(PAD_A, codes::BTN_START);
        h.cycle_at(200);
        assert_eq!(
            kinds(&h.drain()),
            vec![("activity", "aa".into()), ("start", "aa".into())]
        );
        assert!(h.lobby.presence().ready().is_empty());
    }

    #[test]
    fn disconnect_of_ready_device_unreadies_first() {
        let mut h = Harness::new();
        h.source.plug(PAD_A, switch_pro("aa"), pad_caps(), 0);
        h.cycle_at(0);
        h.source.press(PAD_A, codes::BTN_START);
        h.cycle_at(1100);
        h.drain();

        h.source.unplug(PAD_A);
        h.cycle_at(1200);
        assert_eq!(
            kinds(&h.drain()),
            vec![("unreadied", "aa".into()), ("disconnected", "aa".into())]
        );
        assert_eq!(h.lobby.snapshot(), Snapshot::default());
    }

    #[test]
    fn removal_error_while_draining_disconnects() {
        let mut h = Harness::new();
        h.source.plug(PAD_A, switch_pro("aa"), pad_caps(), 0);
        h.cycle_at(0);
        h.drain();

        h.source.mark_removed(PAD_A);
        h.cycle_at(20);
        assert_eq!(kinds(&h.drain()), vec![("disconnected", "aa".into())]);
        assert!(h.lobby.presence().connected().is_empty());
    }

    #[test]
    fn promote_by_id_and_unknown_id() {
        let mut h = Harness::new();
        h.source.plug(PAD_A, switch_pro("aa"), pad_caps(), 0);
        h.cycle_at(0);
        h.drain();

        assert!(h.lobby.promote("nope").is_none());
        assert!(h.drain().is_empty());

        let ready = h.lobby.promote("aa").expect("ready");
        assert_eq!(ready.slot_index, 0);
        assert!(h.lobby.promote("aa").is_none());
        assert_eq!(kinds(&h.drain()), vec![("ready", "aa".into())]);
    }

    #[test]
    fn start_button_override_applies_to_new_connections() {
        let mut h = Harness::new();
        h.lobby
            .set_start_button(0x057e, 0x2009, "Pro Controller", codes::BTN_TR2)
            .expect("override");
        h.source.plug(PAD_A, switch_pro("aa"), pad_caps(), 0);
        h.cycle_at(0);
        assert_eq!(h.discovery.start_button(PAD_A), Some(codes::BTN_TR2));
        assert!(h.store.profile("aa").expect("store").is_some());
    }

    #[test]
    fn name_only_override_survives_reconnect() {
        let mut h = Harness::new();
        let lic = DeviceDescriptor {
            name: "Lic Pro Controller".into(),
            bus_type: 0x03,
            vendor_id: 0,
            product_id: 0,
            version: 0,
            uniq: Some("lic".into()),
        };
        h.source.plug(PAD_A, lic.clone(), pad_caps(), 0);
        h.cycle_at(0);
        assert_eq!(h.discovery.start_button(PAD_A), Some(codes::BTN_TR2));

        h.lobby
            .set_start_button(0, 0, "Lic Pro", codes::BTN_MODE)
            .expect("override");
        h.source.unplug(PAD_A);
        h.cycle_at(100);
        h.source.plug(PAD_A, lic, pad_caps(), 0);
        h.cycle_at(200);
        assert_eq!(h.discovery.start_button(PAD_A), Some(codes::BTN_MODE));
    }

    #[test]
    fn battery_updates_are_signalled_for_tracked_devices() {
        let mut h = Harness::new();
        h.source.plug(PAD_A, switch_pro("aa"), pad_caps(), 0);
        h.cycle_at(0);
        h.drain();

        assert!(h.lobby.update_battery("aa", 55));
        assert!(!h.lobby.update_battery("zz", 55));
        assert_eq!(
            h.drain(),
            vec![Signal::Battery {
                unique_id: "aa".into(),
                percent: 55
            }]
        );
    }

    #[test]
    fn config_reload_refreshes_live_records() {
        let mut h = Harness::new();
        h.source.plug(PAD_A, switch_pro("aa"), pad_caps(), 0);
        h.cycle_at(0);
        h.drain();

        let mut config = WorkspaceConfig::default();
        config.profiles.insert(
            "aa".into(),
            ProfileUpdate {
                custom_name: Some("Player One".into()),
                ..ProfileUpdate::default()
            },
        );
        let changed = h.store.apply_config(&config).expect("reload");
        h.lobby.refresh_profiles(&changed);

        let signals = h.drain();
        let [Signal::Updated(record)] = signals.as_slice() else {
            panic!("unexpected signals: {signals:?}");
        };
        assert_eq!(record.name, "Player One");
        assert_eq!(h.lobby.presence().connected()[0].name, "Player One");
    }
}

//! Shared, thread-safe state: the single engine value that readers, the
//! command sender, and the TUI all hold a handle to.
//!
//! Mirrors the teacher's preference for an explicit owning struct over
//! process-wide singletons: every mutable store here is an `Arc<Mutex<_>>`
//! cloned into whichever thread needs it, rather than a global.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use rvc_decoder::{MappingTables, SpecRegistry};
use socketcan::CanSocket;

/// One interface's latest-seen frame for one message name.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub first_received: SystemTime,
    pub last_received: SystemTime,
    pub raw_id: String,
    pub raw_data: String,
    /// (signal name, formatted value), in the message spec's declaration order.
    pub decoded: Vec<(String, String)>,
    pub interface: String,
    pub message_name: String,
    pub dgn_hex: String,
    /// The message definition this record was decoded against, kept around
    /// so the Raw tab can pretty-print it for the selected message.
    pub spec: Arc<rvc_decoder::MessageSpec>,
}

/// On/off state of a light entity, as reported by the bus or assumed
/// optimistically after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
    Unavailable,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::On => "ON",
            PowerState::Off => "OFF",
            PowerState::Unavailable => "unavailable",
        }
    }
}

/// Per-entity light state.
#[derive(Debug, Clone)]
pub struct LightState {
    pub entity_id: String,
    pub friendly_name: String,
    pub suggested_area: Option<String>,
    pub dimmable: bool,
    pub last_updated: SystemTime,
    pub last_interface: Option<String>,
    pub last_raw_values: HashMap<String, u64>,
    pub state: PowerState,
    /// 0..100, present whenever the light declares the `brightness` capability.
    pub brightness: Option<u8>,
    /// Last non-zero brightness, preserved across OFF transitions so Toggle
    /// can restore it.
    pub prev_brightness: Option<u8>,
}

impl LightState {
    fn initial(entity: &rvc_decoder::MappingEntry) -> Self {
        LightState {
            entity_id: entity.entity_id.clone(),
            friendly_name: entity.friendly_name.clone(),
            suggested_area: entity.suggested_area.clone(),
            dimmable: entity.is_dimmable(),
            last_updated: SystemTime::now(),
            last_interface: None,
            last_raw_values: HashMap::new(),
            state: PowerState::Off,
            brightness: entity.is_dimmable().then_some(0),
            prev_brightness: None,
        }
    }
}

/// interface -> (message name -> record)
pub type RawRecordStore = HashMap<String, HashMap<String, RawRecord>>;
/// entity_id -> state
pub type LightStateStore = HashMap<String, LightState>;
/// interface -> open bus handle
pub type ActiveBusRegistry = HashMap<String, Arc<CanSocket>>;

/// The engine: spec + mapping (read-only after load) plus the mutable state
/// stores shared across reader threads, the command sender, and the TUI.
pub struct Engine {
    pub registry: Arc<SpecRegistry>,
    pub mapping: Arc<MappingTables>,
    pub raw_records: Arc<Mutex<RawRecordStore>>,
    pub light_states: Arc<Mutex<LightStateStore>>,
    pub active_buses: Arc<Mutex<ActiveBusRegistry>>,
    pub stop: Arc<AtomicBool>,
}

impl Engine {
    pub fn new(registry: SpecRegistry, mapping: MappingTables) -> Self {
        let mut light_states = HashMap::new();
        for entity in mapping.light_entities() {
            light_states.insert(entity.entity_id.clone(), LightState::initial(entity));
        }

        Engine {
            registry: Arc::new(registry),
            mapping: Arc::new(mapping),
            raw_records: Arc::new(Mutex::new(HashMap::new())),
            light_states: Arc::new(Mutex::new(light_states)),
            active_buses: Arc::new(Mutex::new(HashMap::new())),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot every light state, sorted by entity id for a stable base
    /// ordering before the TUI applies its own sort mode.
    pub fn snapshot_lights(&self) -> Vec<LightState> {
        let states = self.light_states.lock().unwrap();
        let mut values: Vec<LightState> = states.values().cloned().collect();
        values.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        values
    }

    /// Snapshot the raw records for one interface.
    pub fn snapshot_raw(&self, interface: &str) -> Vec<RawRecord> {
        let records = self.raw_records.lock().unwrap();
        records
            .get(interface)
            .map(|per_message| per_message.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvc_decoder::MappingTables;

    fn registry() -> SpecRegistry {
        SpecRegistry::load_str(r#"{"messages": []}"#).unwrap()
    }

    #[test]
    fn lights_are_pre_created_off_at_startup() {
        let mapping = MappingTables::load_str(
            r#"
1FED9:
  "33":
    - entity_id: e1
      friendly_name: "Light One"
      device_type: light
      capabilities: [brightness]
"#,
        );
        let engine = Engine::new(registry(), mapping);
        let lights = engine.snapshot_lights();
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].state, PowerState::Off);
        assert_eq!(lights[0].brightness, Some(0));
    }
}

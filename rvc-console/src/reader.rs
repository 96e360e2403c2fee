//! Interface Reader: one OS thread per configured CAN interface.
//!
//! Grounded in the teacher's synchronous, thread-per-worker style (no async
//! runtime anywhere in the crate) and in `socketcan`'s blocking read API as
//! used for J1939 traffic in the retrieved pack.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use socketcan::{CanSocket, EmbeddedFrame, Socket};

use crate::engine::{Engine, LightState, PowerState, RawRecord};
use crate::error::ConsoleError;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Run the reader loop for `interface` until the engine's stop signal is
/// raised. Blocks the calling thread; intended to be spawned via
/// `std::thread::spawn`.
pub fn run(engine: Arc<Engine>, interface: String) {
    let socket = match CanSocket::open(&interface) {
        Ok(socket) => socket,
        Err(source) => {
            let err = ConsoleError::InterfaceOpen { interface: interface.clone(), source };
            log::error!("{err}");
            return;
        }
    };

    if let Err(err) = socket.set_read_timeout(RECV_TIMEOUT) {
        log::error!("failed to set receive timeout on {interface}: {err}");
        return;
    }

    engine
        .active_buses
        .lock()
        .unwrap()
        .insert(interface.clone(), Arc::new(socket));

    log::info!("interface {interface} opened");

    while !engine.stop.load(Ordering::Relaxed) {
        let frame = {
            let buses = engine.active_buses.lock().unwrap();
            let bus = match buses.get(&interface) {
                Some(bus) => bus.clone(),
                None => break,
            };
            drop(buses);
            bus.read_frame()
        };

        match frame {
            Ok(frame) => {
                let socketcan::Id::Extended(id) = frame.id() else {
                    continue;
                };
                process_frame(&engine, &interface, id.as_raw(), frame.data());
            }
            Err(err) => match err.kind() {
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => continue,
                _ => {
                    log::error!("CAN receive error on {interface}: {err}");
                    std::thread::sleep(ERROR_BACKOFF);
                }
            },
        }
    }

    engine.active_buses.lock().unwrap().remove(&interface);
    log::info!("interface {interface} closed");
}

fn process_frame(engine: &Engine, interface: &str, can_id: u32, payload: &[u8]) {
    let Some(spec) = engine.registry.get(can_id) else {
        return;
    };
    if spec.is_unknown() {
        return;
    }

    let decoded = rvc_decoder::message::decode_message(payload, spec);
    let now = std::time::SystemTime::now();

    {
        let mut records = engine.raw_records.lock().unwrap();
        let per_interface = records.entry(interface.to_string()).or_default();
        let entry = per_interface
            .entry(spec.name.clone())
            .or_insert_with(|| RawRecord {
                first_received: now,
                last_received: now,
                raw_id: format!("{:08X}", can_id),
                raw_data: hex_payload(payload),
                decoded: Vec::new(),
                interface: interface.to_string(),
                message_name: spec.name.clone(),
                dgn_hex: spec.dgn_hex.clone(),
                spec: Arc::new(spec.clone()),
            });
        entry.last_received = now;
        entry.raw_data = hex_payload(payload);
        entry.decoded = decoded
            .iter()
            .map(|signal| (signal.name.clone(), signal.formatted.clone()))
            .collect();
    }

    let Some(instance_signal) = decoded.iter().find(|s| s.name == "instance") else {
        return;
    };
    let instance = instance_signal.raw.to_string();

    let Some(mapping_entry) = engine.mapping.resolve_status(&spec.dgn_hex, &instance) else {
        return;
    };
    if !mapping_entry.is_light() {
        return;
    }

    let raw_values: std::collections::HashMap<String, u64> =
        decoded.iter().map(|s| (s.name.clone(), s.raw)).collect();

    let operating_status = raw_values.get("operating_status").copied();

    let mut states = engine.light_states.lock().unwrap();
    let state = states
        .entry(mapping_entry.entity_id.clone())
        .or_insert_with(|| LightState {
            entity_id: mapping_entry.entity_id.clone(),
            friendly_name: mapping_entry.friendly_name.clone(),
            suggested_area: mapping_entry.suggested_area.clone(),
            dimmable: mapping_entry.is_dimmable(),
            last_updated: now,
            last_interface: None,
            last_raw_values: std::collections::HashMap::new(),
            state: PowerState::Unavailable,
            brightness: mapping_entry.is_dimmable().then_some(0),
            prev_brightness: None,
        });

    state.last_updated = now;
    state.last_interface = Some(interface.to_string());
    state.last_raw_values = raw_values;

    // Observed RV-C convention: operating_status (0..200, 0.5% steps) carries
    // level, not a separate on/off boolean.
    if let Some(v) = operating_status {
        let v = v.min(200);
        state.brightness = Some((v / 2) as u8);
        state.state = if v > 0 { PowerState::On } else { PowerState::Off };
    }
}

fn hex_payload(payload: &[u8]) -> String {
    payload.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvc_decoder::{MappingTables, SpecRegistry};

    fn engine_with_dimmer_status() -> Arc<Engine> {
        let registry = SpecRegistry::load_str(
            r#"{
                "messages": [
                    {"id": "19FEDA99", "name": "DC_DIMMER_STATUS", "signals": [
                        {"name": "instance", "start_bit": 0, "length": 8},
                        {"name": "operating_status", "start_bit": 16, "length": 8, "scale": 0.5, "unit": "%"}
                    ]}
                ]
            }"#,
        )
        .unwrap();

        let mapping = MappingTables::load_str(
            r#"
1FEDA:
  "33":
    - entity_id: light_a
      friendly_name: "Light A"
      device_type: light
      capabilities: [brightness]
"#,
        );

        Arc::new(Engine::new(registry, mapping))
    }

    #[test]
    fn decodes_and_applies_operating_status_override() {
        let engine = engine_with_dimmer_status();
        let payload = [0x21, 0xFF, 0xC8, 0xFC, 0x00, 0xFF, 0xFF, 0xFF];
        process_frame(&engine, "can0", 0x19FEDA99, &payload);

        let states = engine.light_states.lock().unwrap();
        let light = states.get("light_a").unwrap();
        assert_eq!(light.state, PowerState::On);
        assert_eq!(light.brightness, Some(100));
    }

    #[test]
    fn unknown_id_updates_nothing() {
        let engine = engine_with_dimmer_status();
        process_frame(&engine, "can0", 0xDEADBEEF, &[0; 8]);

        assert!(engine.raw_records.lock().unwrap().is_empty());
        assert!(engine.light_states.lock().unwrap().get("light_a").unwrap().last_interface.is_none());
    }

    #[test]
    fn raw_record_is_created_on_first_frame_and_updated_after() {
        let engine = engine_with_dimmer_status();
        let payload = [0x21, 0xFF, 0x64, 0x00, 0x00, 0xFF, 0xFF, 0xFF];
        process_frame(&engine, "can0", 0x19FEDA99, &payload);
        let first_seen = {
            let records = engine.raw_records.lock().unwrap();
            records["can0"]["DC_DIMMER_STATUS"].first_received
        };

        let payload2 = [0x21, 0xFF, 0xC8, 0x00, 0x00, 0xFF, 0xFF, 0xFF];
        process_frame(&engine, "can0", 0x19FEDA99, &payload2);
        let records = engine.raw_records.lock().unwrap();
        let record = &records["can0"]["DC_DIMMER_STATUS"];
        assert_eq!(record.first_received, first_seen);
        assert_eq!(record.raw_data, "21 FF C8 00 00 FF FF FF");
    }
}

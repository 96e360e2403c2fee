//! Command Builder & Sender: composes the J1939/RV-C identifier and payload
//! for a light action, transmits it twice, and applies the optimistic local
//! state update.
//!
//! The original implementation built this CAN id/payload pair three times
//! (two near-identical brightness helpers plus an inline copy in the
//! keyboard handler); this unifies all three call sites into one function
//! parameterized by `LightAction`.

use std::thread;
use std::time::{Duration, SystemTime};

use socketcan::{CanFrame, EmbeddedFrame, ExtendedId};

use crate::engine::{Engine, PowerState};

const PRIORITY: u32 = 6;
const SOURCE_ADDRESS: u32 = 0xF9;
const DESTINATION_ADDRESS: u32 = 0xFF;
const GROUP_MASK: u8 = 0x7C;
const SEND_GAP: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightAction {
    Toggle,
    StepBrightness(i32),
    SetExactBrightness(u8),
}

/// Map the Lights tab's digit shortcuts to a target percent: `0` means full
/// brightness, `1..9` means `10..90`.
pub fn digit_to_percent(digit: u8) -> u8 {
    if digit == 0 {
        100
    } else {
        digit * 10
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Both transmits succeeded.
    Sent { percent: u8 },
    /// Only the first transmit succeeded; optimistic state was still applied.
    PartiallySent { percent: u8 },
    /// A precondition or transmit failure; no frame reached the bus, or
    /// (for a second-send failure) the first has already updated local state.
    Failed(String),
}

impl CommandOutcome {
    pub fn notification(&self, entity_id: &str) -> String {
        match self {
            CommandOutcome::Sent { percent } => format!("{entity_id}: sent (2/2), {percent}%"),
            CommandOutcome::PartiallySent { percent } => {
                format!("{entity_id}: sent (1/2), {percent}%")
            }
            CommandOutcome::Failed(reason) => format!("{entity_id}: {reason}"),
        }
    }
}

/// Build the 29-bit extended CAN identifier for a light command targeting
/// `dgn`, per the J1939 PDU1/PDU2 split.
pub fn build_identifier(dgn: u32) -> u32 {
    let dp = (dgn >> 16) & 1;
    let pf = (dgn >> 8) & 0xFF;

    if pf < 0xF0 {
        (PRIORITY << 26) | (dp << 24) | (pf << 16) | (DESTINATION_ADDRESS << 8) | SOURCE_ADDRESS
    } else {
        let ps = dgn & 0xFF;
        (PRIORITY << 26) | (dp << 24) | (pf << 16) | (ps << 8) | SOURCE_ADDRESS
    }
}

/// Build the 8-byte dimmer command payload for `instance` at `percent`
/// (0..100).
pub fn build_payload(instance: u32, percent: u8) -> [u8; 8] {
    let level = ((percent as u32) * 2).min(0xC8) as u8;
    [instance as u8, GROUP_MASK, level, 0x00, 0x00, 0xFF, 0xFF, 0xFF]
}

/// Resolve the target UI brightness percent for `action` given the light's
/// current state, without mutating anything.
fn resolve_percent(state: &crate::engine::LightState, action: LightAction) -> u8 {
    match action {
        LightAction::Toggle => {
            if state.state == PowerState::On {
                0
            } else {
                state.prev_brightness.filter(|&b| b > 0).unwrap_or(100)
            }
        }
        LightAction::StepBrightness(delta) => {
            let current = state.brightness.unwrap_or(0) as i32;
            (current + delta).clamp(0, 100) as u8
        }
        LightAction::SetExactBrightness(n) => n.min(100),
    }
}

/// Send a light command and report the outcome. Never panics or propagates
/// an error: all failure modes are reported through the returned
/// `CommandOutcome` for the TUI's notification banner.
pub fn send_light_command(engine: &Engine, entity_id: &str, action: LightAction) -> CommandOutcome {
    let Some(info) = engine.mapping.light_command_info(entity_id) else {
        return CommandOutcome::Failed("not a commandable light".to_string());
    };
    let Some(interface) = info.interface.clone() else {
        return CommandOutcome::Failed("no interface configured".to_string());
    };

    let percent = {
        let states = engine.light_states.lock().unwrap();
        match states.get(entity_id) {
            Some(state) => resolve_percent(state, action),
            None => return CommandOutcome::Failed("unknown entity".to_string()),
        }
    };

    let bus = {
        let buses = engine.active_buses.lock().unwrap();
        match buses.get(&interface) {
            Some(bus) => bus.clone(),
            None => return CommandOutcome::Failed(format!("interface {interface} not active")),
        }
    };

    let can_id = build_identifier(info.dgn);
    let payload = build_payload(info.instance, percent);

    if let Err(err) = transmit(&bus, can_id, &payload) {
        log::error!("first send to {entity_id} failed: {err}");
        return CommandOutcome::Failed(format!("send failed: {err}"));
    }

    apply_optimistic_update(engine, entity_id, &interface, action, percent);

    thread::sleep(SEND_GAP);

    match transmit(&bus, can_id, &payload) {
        Ok(()) => CommandOutcome::Sent { percent },
        Err(err) => {
            log::error!("second send to {entity_id} failed: {err}");
            CommandOutcome::PartiallySent { percent }
        }
    }
}

fn apply_optimistic_update(
    engine: &Engine,
    entity_id: &str,
    interface: &str,
    action: LightAction,
    percent: u8,
) {
    let mut states = engine.light_states.lock().unwrap();
    let Some(state) = states.get_mut(entity_id) else {
        return;
    };

    if action == LightAction::Toggle && percent == 0 {
        if let Some(prior) = state.brightness.filter(|&b| b > 0) {
            state.prev_brightness = Some(prior);
        }
    }

    state.state = if percent > 0 { PowerState::On } else { PowerState::Off };
    state.brightness = Some(percent);
    if percent > 0 {
        state.prev_brightness = Some(percent);
    }
    state.last_updated = SystemTime::now();
    state.last_interface = Some(interface.to_string());
}

fn transmit(bus: &socketcan::CanSocket, can_id: u32, payload: &[u8; 8]) -> std::io::Result<()> {
    let id = ExtendedId::new(can_id).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "CAN id exceeds 29 bits")
    })?;
    let frame = CanFrame::new(id, payload).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "payload too long for a CAN frame")
    })?;
    use socketcan::Socket;
    bus.write_frame(&frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, LightState};
    use rvc_decoder::{MappingTables, SpecRegistry};

    fn mapping_with_light() -> MappingTables {
        MappingTables::load_str(
            r#"
1FED9:
  "33":
    - entity_id: e1
      friendly_name: "Light One"
      device_type: light
      capabilities: [brightness]
      interface: can1
"#,
        )
    }

    #[test]
    fn can_id_for_pdu2_dgn() {
        // dgn = 0x1FED9 (PF = 0xFE, PDU2, DP = 1, PS = 0xD9)
        assert_eq!(build_identifier(0x1FED9), 0x19FED9F9);
    }

    #[test]
    fn payload_layout_for_on_command() {
        let payload = build_payload(0x21, 50);
        assert_eq!(payload, [0x21, 0x7C, 0x64, 0x00, 0x00, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn payload_clamps_level_at_200() {
        let payload = build_payload(1, 100);
        assert_eq!(payload[2], 0xC8);
    }

    #[test]
    fn step_brightness_clamps_at_bounds() {
        let mut state = light_state(PowerState::On, Some(95));
        assert_eq!(resolve_percent(&state, LightAction::StepBrightness(10)), 100);
        state.brightness = Some(100);
        assert_eq!(resolve_percent(&state, LightAction::StepBrightness(10)), 100);
        state.brightness = Some(5);
        assert_eq!(resolve_percent(&state, LightAction::StepBrightness(-10)), 0);
        state.brightness = Some(0);
        assert_eq!(resolve_percent(&state, LightAction::StepBrightness(-10)), 0);
    }

    #[test]
    fn toggle_off_then_on_restores_prior_brightness() {
        let state = light_state(PowerState::On, Some(70));
        assert_eq!(resolve_percent(&state, LightAction::Toggle), 0);

        let off_state = LightState {
            prev_brightness: Some(70),
            ..light_state(PowerState::Off, Some(0))
        };
        assert_eq!(resolve_percent(&off_state, LightAction::Toggle), 70);
    }

    #[test]
    fn toggle_restores_100_when_no_prior_brightness() {
        let state = light_state(PowerState::Off, Some(0));
        assert_eq!(resolve_percent(&state, LightAction::Toggle), 100);
    }

    fn light_state(power: PowerState, brightness: Option<u8>) -> LightState {
        LightState {
            entity_id: "e1".to_string(),
            friendly_name: "Light One".to_string(),
            suggested_area: None,
            dimmable: true,
            last_updated: SystemTime::now(),
            last_interface: None,
            last_raw_values: Default::default(),
            state: power,
            brightness,
            prev_brightness: None,
        }
    }

    #[test]
    fn missing_interface_precondition_is_reported_without_crashing() {
        let mapping = MappingTables::load_str(
            r#"
1FED9:
  "33":
    - entity_id: e1
      friendly_name: "Light One"
      device_type: light
"#,
        );
        let engine = Engine::new(SpecRegistry::load_str(r#"{"messages": []}"#).unwrap(), mapping);
        let outcome = send_light_command(&engine, "e1", LightAction::Toggle);
        assert!(matches!(outcome, CommandOutcome::Failed(_)));
    }

    #[test]
    fn bus_not_active_precondition_is_reported() {
        let engine = Engine::new(
            SpecRegistry::load_str(r#"{"messages": []}"#).unwrap(),
            mapping_with_light(),
        );
        let outcome = send_light_command(&engine, "e1", LightAction::Toggle);
        assert!(matches!(outcome, CommandOutcome::Failed(ref reason) if reason.contains("not active")));
    }

    #[test]
    fn unknown_entity_precondition_is_reported() {
        let engine = Engine::new(
            SpecRegistry::load_str(r#"{"messages": []}"#).unwrap(),
            MappingTables::load_str(""),
        );
        let outcome = send_light_command(&engine, "nope", LightAction::Toggle);
        assert!(matches!(outcome, CommandOutcome::Failed(_)));
    }
}

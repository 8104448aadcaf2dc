//! Arm / disarm decisions.
//!
//! Everything here is pure: the pilot-command handler gathers the inputs, asks for a
//! [`Transition`], and applies it. A refused arm leaves the state untouched.

use micromath::F32Ext;

use crate::state::{Orientation, OrchestratorState};

/// Receiver inputs relevant to arming, sampled once per pilot-command pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PilotCommand {
    pub changed: bool,
    pub arming: bool,
    pub disarming: bool,
    pub aux_state: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    Arm { yaw_initial: f32 },
    Disarm,
}

/// Why an arm request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmRefusal {
    Failsafe,
    NotLevel,
    AuxNotNeutral,
}

/// Guards for `Disarmed → Armed`, checked in order.
pub fn check_arm(state: &OrchestratorState, aux_state: u8) -> Result<(), ArmRefusal> {
    if state.failsafe {
        return Err(ArmRefusal::Failsafe);
    }
    if !state.safe_to_arm {
        return Err(ArmRefusal::NotLevel);
    }
    if aux_state != 0 {
        return Err(ArmRefusal::AuxNotNeutral);
    }
    Ok(())
}

/// Decides the transition for this pass, if any.
///
/// Nothing happens unless the receiver inputs changed. Disarming is always allowed; arming
/// needs the arm gesture and every guard of [`check_arm`].
pub fn evaluate(
    state: &OrchestratorState,
    cmd: &PilotCommand,
) -> Result<Option<Transition>, ArmRefusal> {
    if !cmd.changed {
        return Ok(None);
    }

    if state.armed {
        return Ok(cmd.disarming.then_some(Transition::Disarm));
    }

    if !cmd.arming {
        return Ok(None);
    }

    check_arm(state, cmd.aux_state)?;
    Ok(Some(Transition::Arm {
        yaw_initial: state.orientation.yaw,
    }))
}

pub fn apply(state: &mut OrchestratorState, transition: Transition) {
    match transition {
        Transition::Arm { yaw_initial } => {
            state.yaw_initial = yaw_initial;
            state.armed = true;
        }
        Transition::Disarm => state.armed = false,
    }
}

/// Arming-angle check: both roll and pitch strictly inside `max_angle`.
pub fn is_level(orientation: &Orientation, max_angle: f32) -> bool {
    orientation.roll.abs() < max_angle && orientation.pitch.abs() < max_angle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_to_arm() -> (OrchestratorState, PilotCommand) {
        let mut state = OrchestratorState::new();
        state.safe_to_arm = true;
        state.orientation.yaw = 1.25;
        let cmd = PilotCommand {
            changed: true,
            arming: true,
            disarming: false,
            aux_state: 0,
        };
        (state, cmd)
    }

    #[test]
    fn arms_when_every_guard_holds() {
        let (state, cmd) = ready_to_arm();
        assert_eq!(
            evaluate(&state, &cmd),
            Ok(Some(Transition::Arm { yaw_initial: 1.25 }))
        );
    }

    #[test]
    fn failsafe_blocks_arming() {
        let (mut state, cmd) = ready_to_arm();
        state.failsafe = true;
        assert_eq!(evaluate(&state, &cmd), Err(ArmRefusal::Failsafe));
    }

    #[test]
    fn tilt_blocks_arming() {
        let (mut state, cmd) = ready_to_arm();
        state.safe_to_arm = false;
        assert_eq!(evaluate(&state, &cmd), Err(ArmRefusal::NotLevel));
    }

    #[test]
    fn aux_switch_blocks_arming() {
        let (state, mut cmd) = ready_to_arm();
        cmd.aux_state = 1;
        assert_eq!(evaluate(&state, &cmd), Err(ArmRefusal::AuxNotNeutral));
    }

    #[test]
    fn no_gesture_no_arming() {
        let (state, mut cmd) = ready_to_arm();
        cmd.arming = false;
        assert_eq!(evaluate(&state, &cmd), Ok(None));
    }

    #[test]
    fn unchanged_inputs_are_ignored() {
        let (state, mut cmd) = ready_to_arm();
        cmd.changed = false;
        assert_eq!(evaluate(&state, &cmd), Ok(None));
    }

    #[test]
    fn disarm_needs_no_guard() {
        let (mut state, mut cmd) = ready_to_arm();
        state.armed = true;
        state.safe_to_arm = false;
        cmd.arming = false;
        cmd.disarming = true;
        cmd.aux_state = 2;
        assert_eq!(evaluate(&state, &cmd), Ok(Some(Transition::Disarm)));
    }

    #[test]
    fn arm_gesture_while_armed_is_a_no_op() {
        let (mut state, cmd) = ready_to_arm();
        state.armed = true;
        assert_eq!(evaluate(&state, &cmd), Ok(None));
    }

    #[test]
    fn apply_records_heading() {
        let mut state = OrchestratorState::new();
        apply(&mut state, Transition::Arm { yaw_initial: 3.0 });
        assert!(state.armed);
        assert_eq!(state.yaw_initial, 3.0);
        apply(&mut state, Transition::Disarm);
        assert!(!state.armed);
        assert_eq!(state.yaw_initial, 3.0);
    }

    #[test]
    fn level_check_is_strict() {
        let max = 0.4;
        assert!(is_level(&Orientation { roll: 0.39, pitch: -0.39, yaw: 5.0 }, max));
        assert!(!is_level(&Orientation { roll: 0.4, pitch: 0.0, yaw: 0.0 }, max));
        assert!(!is_level(&Orientation { roll: 0.0, pitch: -0.5, yaw: 0.0 }, max));
    }
}

use crate::arming::{self, PilotCommand, Transition};
use crate::config::{BootConfig, Model, OrchestratorConfig};
use crate::demand::{normalize_yaw, select_actuator_command, ActuatorCommand};
use crate::error::Result;
use crate::hal::{AltitudeHold, Board, Mixer, Receiver, Stabilizer, Telemetry};
use crate::state::{FlightMode, OrchestratorState, TelemetrySnapshot};
use crate::timed_task::TimedTask;

/// Which handlers ran during one [`FlightController::update`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    pub now_us: u32,
    /// Pilot-command loop.
    pub outer: bool,
    /// Altitude PID. Never set together with `outer`.
    pub altitude: bool,
    /// Stabilization loop.
    pub inner: bool,
    pub angle_check: bool,
    /// Signal loss cut the motors this tick.
    pub failsafe_tripped: bool,
}

/// Cooperative dispatcher for the flight-control tasks.
///
/// Owns the collaborators and the [`OrchestratorState`]; every handler gets the state by
/// exclusive reference from [`update`](Self::update), nothing else writes it.
pub struct FlightController<B, R, S, M, A, T> {
    board: B,
    receiver: R,
    stab: S,
    mixer: M,
    alti: A,
    telemetry: T,

    inner_task: TimedTask,
    outer_task: TimedTask,
    altitude_task: TimedTask,
    angle_check_task: TimedTask,

    state: OrchestratorState,
}

impl<B, R, S, M, A, T> FlightController<B, R, S, M, A, T>
where
    B: Board,
    R: Receiver,
    S: Stabilizer,
    M: Mixer,
    A: AltitudeHold,
    T: Telemetry,
{
    /// Brings the board up, flashes the LED, waits for the IMU to settle and initializes
    /// every collaborator. The vehicle starts disarmed and not yet safe to arm.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut board: B,
        mut receiver: R,
        mut stab: S,
        mut mixer: M,
        mut alti: A,
        mut telemetry: T,
        config: &OrchestratorConfig,
        model: &Model,
    ) -> Result<Self> {
        info!("boot: hardware init");
        board.init_hardware()?;

        flash_led(&mut board, &config.boot);
        board.delay_ms(config.boot.startup_delay_ms);

        let timing = &config.timing;
        let inner_task = TimedTask::new(timing.fast_us);
        let outer_task = TimedTask::new(timing.slow_us);
        let angle_check_task = TimedTask::new(timing.angle_check_us);

        receiver.init();

        stab.init(model);
        mixer.init();
        telemetry.init();

        // Altitude estimator, only effective on boards with a barometer
        let altitude_task = TimedTask::new(timing.altitude_us);
        alti.init(model);

        info!("boot: done, disarmed");

        Ok(Self {
            board,
            receiver,
            stab,
            mixer,
            alti,
            telemetry,
            inner_task,
            outer_task,
            altitude_task,
            angle_check_task,
            state: OrchestratorState::new(),
        })
    }

    /// One pass of the main loop.
    pub fn update(&mut self) -> TickReport {
        let now = self.board.micros();
        let mut report = TickReport {
            now_us: now,
            ..TickReport::default()
        };

        // Pilot commands first; the altitude PID only gets the pass when they are idle
        if self.outer_task.check_and_update(now) {
            outer(&mut self.state, &mut self.receiver, &mut self.stab, &mut self.alti);
            report.outer = true;
        } else if self.altitude_task.check_and_update(now) {
            let pressure = self.board.read_barometer();
            self.alti.compute_pid(self.state.armed, pressure);
            report.altitude = true;
        }

        if self.inner_task.check_and_update(now) {
            inner(
                &mut self.state,
                &mut self.board,
                &mut self.receiver,
                &mut self.stab,
                &mut self.mixer,
                &mut self.alti,
                &mut self.telemetry,
            );
            report.inner = true;
        }

        if self.angle_check_task.check_and_update(now) {
            check_angle(&mut self.state, &self.stab);
            report.angle_check = true;
        }

        // Last word on the motors for this tick
        if self.state.armed && self.receiver.lost_signal() {
            self.mixer.cut_motors();
            self.state.armed = false;
            self.state.failsafe = true;
            self.board.set_led(false);
            report.failsafe_tripped = true;
            warn!("failsafe: signal lost while armed, motors cut");
        }

        report
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn mode(&self) -> FlightMode {
        self.state.mode()
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut R {
        &mut self.receiver
    }

    pub fn stabilizer(&self) -> &S {
        &self.stab
    }

    pub fn mixer(&self) -> &M {
        &self.mixer
    }

    pub fn altitude(&self) -> &A {
        &self.alti
    }

    pub fn altitude_mut(&mut self) -> &mut A {
        &mut self.alti
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }
}

fn flash_led<B: Board>(board: &mut B, boot: &BootConfig) {
    let pause_ms = boot.flash_half_cycle_ms();
    board.set_led(false);
    for _ in 0..boot.led_flash_count {
        board.set_led(true);
        board.delay_ms(pause_ms);
        board.set_led(false);
        board.delay_ms(pause_ms);
    }
    board.set_led(false);
}

/// Pilot-command handler.
fn outer<R, S, A>(state: &mut OrchestratorState, receiver: &mut R, stab: &mut S, alti: &mut A)
where
    R: Receiver,
    S: Stabilizer,
    A: AltitudeHold,
{
    receiver.update();

    // Keep the integrator from winding up on the ground
    if receiver.throttle_is_down() {
        stab.reset_integral();
    }

    let cmd = PilotCommand {
        changed: receiver.changed(),
        arming: receiver.arming(),
        disarming: receiver.disarming(),
        aux_state: receiver.aux_state(),
    };

    match arming::evaluate(state, &cmd) {
        Ok(Some(transition)) => {
            arming::apply(state, transition);
            match transition {
                Transition::Arm { yaw_initial } => info!("armed, heading {}", yaw_initial),
                Transition::Disarm => info!("disarmed"),
            }
        }
        Ok(None) => {}
        Err(refusal) => debug!("arm refused: {}", refusal),
    }

    // Aux switch edges toggle altitude hold independently of arming
    if cmd.aux_state != state.aux_state {
        state.aux_state = cmd.aux_state;
        let throttle = receiver.demands().throttle;
        info!("aux switch -> {}", state.aux_state);
        alti.handle_aux_switch(state.aux_state, throttle);
    }
}

/// Stabilization handler.
fn inner<B, R, S, M, A, T>(
    state: &mut OrchestratorState,
    board: &mut B,
    receiver: &mut R,
    stab: &mut S,
    mixer: &mut M,
    alti: &mut A,
    telemetry: &mut T,
) where
    B: Board,
    R: Receiver,
    S: Stabilizer,
    M: Mixer,
    A: AltitudeHold,
    T: Telemetry,
{
    // Heading relative to arming, for headless mode
    receiver.compute_expo(state.yaw_delta());

    let sample = match board.read_imu() {
        Ok(sample) => sample,
        Err(e) => {
            warn!("imu read failed: {}", e);
            state.orientation_valid = false;
            return;
        }
    };
    let mut orientation = sample.orientation;
    orientation.yaw = normalize_yaw(orientation.yaw);
    state.orientation = orientation;
    state.orientation_valid = true;

    board.set_led(state.armed);

    alti.fuse_with_imu(&orientation, state.armed);
    alti.modify_demand(&mut receiver.demands_mut().throttle);

    let demands = receiver.demands();
    stab.update(&demands, &orientation, &sample.rates);

    match select_actuator_command(state.armed, state.failsafe, receiver.throttle_is_down()) {
        ActuatorCommand::Disarmed => mixer.run_disarmed(),
        ActuatorCommand::Armed => mixer.run_armed(demands.throttle, &stab.trims()),
        ActuatorCommand::Cut => mixer.cut_motors(),
    }

    telemetry.update(&TelemetrySnapshot {
        orientation,
        armed: state.armed,
        failsafe: state.failsafe,
        demands,
    });
}

/// Arming-angle handler.
fn check_angle<S: Stabilizer>(state: &mut OrchestratorState, stab: &S) {
    // No fresh sample means no proof the frame is level
    let safe =
        state.orientation_valid && arming::is_level(&state.orientation, stab.max_arming_angle());
    if safe != state.safe_to_arm {
        debug!("safe to arm: {}", safe);
    }
    state.safe_to_arm = safe;
}

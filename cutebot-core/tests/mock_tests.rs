use core::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use cutebot_core::utils::controllers::{
    protocol::{color, LightTarget, ServoTarget, Unit},
    Buzzer, CommandError, Cutebot, CutebotCommand, I2CDevices, PixelStrip, TonePwm,
};
use cutebot_core::utils::sensors::{
    AnalogInput, DistanceError, ExpansionPorts, RangeFinder, Sensors, TrackingState,
};
use cutebot_core::utils::CutebotConfig;
use embassy_sync::blocking_mutex::{raw::NoopRawMutex, Mutex};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::ErrorKind;
use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTrans,
};
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};
use smart_leds_trait::{SmartLedsWrite, RGB8};

/// Default I2C address of the Cutebot expansion board.
pub const CUTEBOT_ADDRESS: u8 = 0x10;

/// Create a write transaction for the Cutebot with the given frame.
pub fn write(data: [u8; 4]) -> I2cTrans {
    I2cTrans::write(CUTEBOT_ADDRESS, data.to_vec())
}

/// Create a write transaction that fails on the bus.
pub fn failed_write(data: [u8; 4]) -> I2cTrans {
    write(data).with_error(ErrorKind::Other)
}

/// Delay that only adds up the requested time.
#[derive(Clone, Default)]
struct RecordingDelay(Rc<Cell<u64>>);

impl RecordingDelay {
    fn total_ms(&self) -> u64 {
        self.0.get() / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        self.0.set(self.0.get() + u64::from(ns));
    }

    fn delay_us(
        &mut self,
        us: u32,
    ) {
        self.0.set(self.0.get() + u64::from(us) * 1_000);
    }

    fn delay_ms(
        &mut self,
        ms: u32,
    ) {
        self.0.set(self.0.get() + u64::from(ms) * 1_000_000);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct EchoTimeout;

/// Range finder that replays a fixed script of readings.
struct ScriptedSonar(VecDeque<Result<f32, EchoTimeout>>);

impl ScriptedSonar {
    fn new(script: &[Result<f32, EchoTimeout>]) -> Self {
        ScriptedSonar(script.iter().copied().collect())
    }
}

impl RangeFinder for ScriptedSonar {
    type Error = EchoTimeout;

    fn measure_once(&mut self) -> Result<f32, Self::Error> {
        self.0.pop_front().unwrap_or(Err(EchoTimeout))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PwmEvent {
    Frequency(u32),
    Duty(u16),
}

#[derive(Clone, Default)]
struct RecordingPwm(Rc<RefCell<Vec<PwmEvent>>>);

impl ErrorType for RecordingPwm {
    type Error = Infallible;
}

impl SetDutyCycle for RecordingPwm {
    fn max_duty_cycle(&self) -> u16 {
        u16::MAX
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(PwmEvent::Duty(duty));
        Ok(())
    }
}

impl TonePwm for RecordingPwm {
    fn set_frequency(
        &mut self,
        hz: u32,
    ) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(PwmEvent::Frequency(hz));
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingStrip(Rc<RefCell<Vec<Vec<RGB8>>>>);

impl SmartLedsWrite for RecordingStrip {
    type Error = Infallible;
    type Color = RGB8;

    fn write<T, I>(
        &mut self,
        iterator: T,
    ) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        let frame = iterator.into_iter().map(Into::into).collect();
        self.0.borrow_mut().push(frame);
        Ok(())
    }
}

struct FixedAdc(u16);

impl AnalogInput for FixedAdc {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        Ok(self.0)
    }
}

/// Tracking pin that is never read.
fn unused_pin() -> PinMock {
    let pin = PinMock::new(&[]);
    // marks the shared expectation list as checked
    pin.clone().done();
    pin
}

fn devices<'a>(
    bus: &'a RefCell<I2cMock>,
    delay: &RecordingDelay,
) -> I2CDevices<'a, RefCell<I2cMock>, RecordingDelay> {
    I2CDevices::new(bus, delay.clone(), &CutebotConfig::default())
}

#[test]
fn test_stop_sends_forward_zero_pair() {
    let expectations = [write([0x01, 0x02, 0, 0]), write([0x02, 0x02, 0, 0])];
    let bus = RefCell::new(I2cMock::new(&expectations));
    let delay = RecordingDelay::default();
    let mut devs = devices(&bus, &delay);

    devs.set_motors(0.0, 0.0).unwrap();

    assert_eq!(delay.total_ms(), 100);
    bus.borrow_mut().done();
}

#[test]
fn test_motor_velocities_saturate() {
    let expectations = [
        write([0x01, 0x02, 100, 0]),
        write([0x02, 0x01, 100, 0]),
        write([0x01, 0x01, 55, 0]),
        write([0x02, 0x02, 7, 0]),
    ];
    let bus = RefCell::new(I2cMock::new(&expectations));
    let delay = RecordingDelay::default();
    let mut devs = devices(&bus, &delay);

    devs.set_motors(150.0, -250.0).unwrap();
    devs.set_motors(-55.0, 7.9).unwrap();

    bus.borrow_mut().done();
}

#[test]
fn test_headlights_both_is_idempotent() {
    let pair = [write([0x08, 80, 255, 80]), write([0x04, 80, 255, 80])];
    let expectations = [pair.clone(), pair].concat();
    let bus = RefCell::new(I2cMock::new(&expectations));
    let delay = RecordingDelay::default();
    let mut devs = devices(&bus, &delay);

    devs.set_headlights(LightTarget::Both, color(80, 255, 80)).unwrap();
    devs.set_headlights(LightTarget::Both, color(80, 255, 80)).unwrap();

    assert_eq!(delay.total_ms(), 200);
    bus.borrow_mut().done();
}

#[test]
fn test_headlights_single_and_off() {
    let expectations = [
        write([0x08, 255, 192, 203]),
        write([0x04, 255, 0, 0]),
        write([0x08, 0, 0, 0]),
        write([0x04, 0, 0, 0]),
    ];
    let bus = RefCell::new(I2cMock::new(&expectations));
    let delay = RecordingDelay::default();
    let mut devs = devices(&bus, &delay);

    devs.set_headlights(LightTarget::Left, color(255, 192, 203)).unwrap();
    devs.set_headlights(LightTarget::Right, color(300, -4, 0)).unwrap();
    devs.set_headlights(LightTarget::None, color(1, 2, 3)).unwrap();

    bus.borrow_mut().done();
}

#[test]
fn test_servo_angles_clamp() {
    let expectations = [
        write([0x05, 0, 0, 0]),
        write([0x05, 180, 0, 0]),
        write([0x06, 180, 0, 0]),
        write([0x05, 90, 0, 0]),
        write([0x06, 90, 0, 0]),
    ];
    let bus = RefCell::new(I2cMock::new(&expectations));
    let delay = RecordingDelay::default();
    let mut devs = devices(&bus, &delay);

    devs.set_servos(ServoTarget::S1, -10.0).unwrap();
    devs.set_servos(ServoTarget::Both, 200.0).unwrap();
    devs.center_servos().unwrap();

    bus.borrow_mut().done();
}

#[test]
fn test_transient_bus_fault_is_retried() {
    let frame = [0x05, 45, 0, 0];
    let expectations = [failed_write(frame), failed_write(frame), write(frame)];
    let bus = RefCell::new(I2cMock::new(&expectations));
    let delay = RecordingDelay::default();
    let mut devs = devices(&bus, &delay);

    devs.set_servos(ServoTarget::S1, 45.0).unwrap();

    bus.borrow_mut().done();
}

#[test]
fn test_exhausted_retries_drop_command_and_release_bus() {
    // 1 attempt + 12 retries on the left motor frame; the right frame is never sent
    let frame = [0x01, 0x02, 30, 0];
    let expectations: Vec<_> = (0..13).map(|_| failed_write(frame)).collect();
    let bus = RefCell::new(I2cMock::new(&expectations));
    let delay = RecordingDelay::default();
    let mut devs = devices(&bus, &delay);

    let err = devs.set_motors(30.0, 30.0).unwrap_err();
    assert_eq!(
        err,
        CommandError::Bus {
            unit: Unit::LeftMotor,
            attempts: 13,
            source: ErrorKind::Other,
        }
    );
    // settle delay still applies and the bus is free again
    assert_eq!(delay.total_ms(), 100);
    bus.borrow_mut().done();
}

#[test]
fn test_command_shares_one_retry_budget() {
    // 5 failures on the left frame leave 7 retries for the right one
    let left = [0x01, 0x02, 30, 0];
    let right = [0x02, 0x02, 30, 0];
    let mut expectations: Vec<_> = (0..5).map(|_| failed_write(left)).collect();
    expectations.push(write(left));
    expectations.extend((0..8).map(|_| failed_write(right)));
    let bus = RefCell::new(I2cMock::new(&expectations));
    let delay = RecordingDelay::default();
    let mut devs = devices(&bus, &delay);

    assert_eq!(
        devs.set_motors(30.0, 30.0),
        Err(CommandError::Bus {
            unit: Unit::RightMotor,
            attempts: 13,
            source: ErrorKind::Other,
        })
    );
    bus.borrow_mut().done();
}

#[test]
fn test_largest_bus_budget_is_bounded() {
    let frame = [0x05, 10, 0, 0];
    let expectations: Vec<_> = (0..256).map(|_| failed_write(frame)).collect();
    let bus = RefCell::new(I2cMock::new(&expectations));
    let config = CutebotConfig {
        bus_retries: u8::MAX,
        ..CutebotConfig::default()
    };
    let mut devs = I2CDevices::new(&bus, RecordingDelay::default(), &config);

    let err = devs.set_servos(ServoTarget::S1, 10.0).unwrap_err();

    assert_eq!(
        err,
        CommandError::Bus {
            unit: Unit::ServoS1,
            attempts: 256,
            source: ErrorKind::Other,
        }
    );
    bus.borrow_mut().done();
}

#[test]
fn test_mutex_session() {
    let expectations = [write([0x06, 120, 0, 0])];
    let mock = I2cMock::new(&expectations);
    let bus: Mutex<NoopRawMutex, RefCell<I2cMock>> = Mutex::new(RefCell::new(mock.clone()));
    let mut devs = I2CDevices::new(&bus, RecordingDelay::default(), &CutebotConfig::default());

    devs.set_servos(ServoTarget::S2, 120.0).unwrap();

    let mut mock = mock;
    mock.done();
}

#[test]
fn test_tracking_is_active_low() {
    let mut left = PinMock::new(&[PinTrans::get(PinState::Low)]);
    let mut right = PinMock::new(&[PinTrans::get(PinState::High)]);
    let mut sensors = Sensors::new(
        left.clone(),
        right.clone(),
        ScriptedSonar::new(&[]),
        RecordingDelay::default(),
        &CutebotConfig::default(),
    );

    let state = sensors.read_tracking().unwrap();

    assert_eq!(
        state,
        TrackingState {
            left: true,
            right: false
        }
    );
    left.done();
    right.done();
}

fn sonar_only(
    script: &[Result<f32, EchoTimeout>],
    delay: &RecordingDelay,
) -> Sensors<PinMock, PinMock, ScriptedSonar, RecordingDelay> {
    Sensors::new(
        unused_pin(),
        unused_pin(),
        ScriptedSonar::new(script),
        delay.clone(),
        &CutebotConfig::default(),
    )
}

#[test]
fn test_distance_is_median_of_three() {
    let delay = RecordingDelay::default();
    let mut sensors = sonar_only(&[Ok(10.0), Ok(12.0), Ok(50.0)], &delay);

    assert_eq!(sensors.read_distance_cm(), 12.0);
    // one re-trigger pause per ping
    assert_eq!(delay.total_ms(), 75);
}

#[test]
fn test_distance_tolerates_timeouts_within_budget() {
    let delay = RecordingDelay::default();
    let mut script = vec![Err(EchoTimeout); 8];
    script.extend([Ok(30.0), Ok(31.0), Ok(29.0)]);
    let mut sensors = sonar_only(&script, &delay);

    assert_eq!(sensors.try_read_distance_cm(), Ok(30.0));
    assert_eq!(delay.total_ms(), 11 * 25);
}

#[test]
fn test_distance_sentinel_after_nine_timeouts() {
    let delay = RecordingDelay::default();
    let mut sensors = sonar_only(&[Ok(40.0)], &delay);

    assert_eq!(
        sensors.try_read_distance_cm(),
        Err(DistanceError::Disconnected {
            failures: 9,
            last_error: EchoTimeout
        })
    );

    let mut sensors = sonar_only(&[], &RecordingDelay::default());
    assert_eq!(sensors.read_distance_cm(), 0.0);
}

#[test]
fn test_largest_sonar_budget_is_bounded() {
    let delay = RecordingDelay::default();
    let config = CutebotConfig {
        sonar_retries: u8::MAX,
        ..CutebotConfig::default()
    };
    let mut sensors = Sensors::new(
        unused_pin(),
        unused_pin(),
        ScriptedSonar::new(&[]),
        delay.clone(),
        &config,
    );

    assert_eq!(
        sensors.try_read_distance_cm(),
        Err(DistanceError::Disconnected {
            failures: 256,
            last_error: EchoTimeout
        })
    );
    // no pause after the ping that exhausts the budget
    assert_eq!(delay.total_ms(), 255 * 25);
    assert_eq!(sensors.read_distance_cm(), 0.0);
}

#[test]
fn test_neopixels_use_local_buffer() {
    let strip = RecordingStrip::default();
    let mut pixels = PixelStrip::new(strip.clone());
    let pink = color(255, 192, 203);

    pixels.set_neopixels(LightTarget::Left, pink).unwrap();
    pixels.set_neopixels(LightTarget::Right, color(0, 0, 255)).unwrap();
    pixels.set_neopixels(LightTarget::None, pink).unwrap();

    let frames = strip.0.borrow();
    let black = RGB8::default();
    assert_eq!(frames[0], vec![pink, black]);
    assert_eq!(frames[1], vec![pink, RGB8 { r: 0, g: 0, b: 255 }]);
    assert_eq!(frames[2], vec![black, black]);
}

#[test]
fn test_play_tone_blocks_for_duration() {
    let pwm = RecordingPwm::default();
    let delay = RecordingDelay::default();
    let mut buzzer = Buzzer::new(pwm.clone(), delay.clone());

    buzzer.play_tone(440, 0.5).unwrap();

    assert_eq!(
        *pwm.0.borrow(),
        vec![
            PwmEvent::Frequency(440),
            PwmEvent::Duty(u16::MAX / 2),
            PwmEvent::Duty(0),
        ]
    );
    assert_eq!(delay.total_ms(), 500);
    assert!(buzzer.play_tone(0, 1.0).is_err());
}

type TestBot<'a> = Cutebot<
    'a,
    RefCell<I2cMock>,
    RecordingDelay,
    RecordingStrip,
    RecordingPwm,
    PinMock,
    PinMock,
    ScriptedSonar,
    FixedAdc,
>;

fn cutebot<'a>(
    bus: &'a RefCell<I2cMock>,
    strip: &RecordingStrip,
    tracking: (PinMock, PinMock),
    sonar: ScriptedSonar,
) -> TestBot<'a> {
    let config = CutebotConfig::default();
    let delay = RecordingDelay::default();
    Cutebot::new(
        I2CDevices::new(bus, delay.clone(), &config),
        PixelStrip::new(strip.clone()),
        Buzzer::new(RecordingPwm::default(), delay.clone()),
        Sensors::new(tracking.0, tracking.1, sonar, delay, &config),
        ExpansionPorts::new(FixedAdc(512), FixedAdc(1023)),
    )
}

/// Frames written when the robot handle is created.
fn reset_frames() -> Vec<I2cTrans> {
    vec![
        write([0x01, 0x02, 0, 0]),
        write([0x02, 0x02, 0, 0]),
        write([0x08, 0, 0, 0]),
        write([0x04, 0, 0, 0]),
    ]
}

#[test]
fn test_new_resets_robot() {
    let bus = RefCell::new(I2cMock::new(&reset_frames()));
    let strip = RecordingStrip::default();

    let _bot = cutebot(
        &bus,
        &strip,
        (unused_pin(), unused_pin()),
        ScriptedSonar::new(&[]),
    );

    assert_eq!(*strip.0.borrow(), vec![vec![RGB8::default(); 2]]);
    bus.borrow_mut().done();
}

#[test]
fn test_execute_json_commands() {
    let mut expectations = reset_frames();
    expectations.extend([
        write([0x01, 0x02, 30, 0]),
        write([0x02, 0x01, 30, 0]),
        write([0x04, 150, 100, 0]),
    ]);
    let bus = RefCell::new(I2cMock::new(&expectations));
    let strip = RecordingStrip::default();
    let mut bot = cutebot(
        &bus,
        &strip,
        (unused_pin(), unused_pin()),
        ScriptedSonar::new(&[]),
    );

    for json in [
        r#"{"cc":"m","l":30,"r":-30}"#,
        r#"{"cc":"h","w":2,"r":150,"g":100,"b":0}"#,
    ] {
        let cmd: CutebotCommand = serde_json::from_str(json).unwrap();
        assert_eq!(bot.execute_command(cmd), Ok(None));
    }

    bus.borrow_mut().done();
}

#[test]
fn test_invalid_selector_is_a_noop() {
    let bus = RefCell::new(I2cMock::new(&reset_frames()));
    let strip = RecordingStrip::default();
    let mut bot = cutebot(
        &bus,
        &strip,
        (unused_pin(), unused_pin()),
        ScriptedSonar::new(&[]),
    );

    let light = CutebotCommand::H {
        w: 7,
        r: 1,
        g: 2,
        b: 3,
    };
    assert_eq!(bot.execute_command(light), Err(CommandError::InvalidTarget(7)));
    let servo = CutebotCommand::S { w: 0, a: 90.0 };
    assert_eq!(bot.execute_command(servo), Err(CommandError::InvalidTarget(0)));

    // nothing beyond the reset frames reached the bus
    bus.borrow_mut().done();
}

#[test]
fn test_read_sensors_command() {
    let bus = RefCell::new(I2cMock::new(&reset_frames()));
    let strip = RecordingStrip::default();
    let mut left = PinMock::new(&[PinTrans::get(PinState::High)]);
    let mut right = PinMock::new(&[PinTrans::get(PinState::Low)]);
    let mut bot = cutebot(
        &bus,
        &strip,
        (left.clone(), right.clone()),
        ScriptedSonar::new(&[Ok(22.0), Ok(21.5), Ok(80.0)]),
    );

    let snapshot = bot
        .execute_command(CutebotCommand::ReadSensors)
        .unwrap()
        .unwrap();

    assert_eq!(snapshot.distance_cm, 22.0);
    assert_eq!(
        snapshot.tracking,
        TrackingState {
            left: false,
            right: true
        }
    );
    assert_eq!((snapshot.p1, snapshot.p2), (Some(512), Some(1023)));
    left.done();
    right.done();
    bus.borrow_mut().done();
}

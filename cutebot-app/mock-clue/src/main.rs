use core::cell::RefCell;
use std::io::BufRead;
use std::path::PathBuf;
use std::rc::Rc;

use clap::{Parser, Subcommand, ValueEnum};
use cutebot_core::utils::behaviors::{
    countdown, Avoidance, ButtonPacket, ControlPad, IrKeymap, IrRemote, LineFollowMode,
    LineFollower,
};
use cutebot_core::utils::controllers::{
    protocol::LightTarget, Buzzer, CutebotCommand, I2CDevices, PixelStrip,
};
use cutebot_core::utils::sensors::{ExpansionPorts, Sensors};
use cutebot_core::utils::{Cutebot, CutebotConfig};
use embassy_sync::blocking_mutex::{raw::NoopRawMutex, Mutex};
use embedded_hal::delay::DelayNs;
use serde::Deserialize;
use tracing::{error, info, warn};

mod sim;
use sim::{ConsoleBuzzer, ConsoleStrip, HostDelay, SimAdc, SimBus, SimSonar, SimTrackPin, World};

type Bus = Mutex<NoopRawMutex, RefCell<SimBus>>;
type Bot<'a> = Cutebot<
    'a,
    Bus,
    HostDelay,
    ConsoleStrip,
    ConsoleBuzzer,
    SimTrackPin,
    SimTrackPin,
    SimSonar,
    SimAdc,
>;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// JSON config file (`cutebot` timing and `ir_keymap` codes)
    #[clap(long)]
    config: Option<PathBuf>,
    /// probability that a simulated I2C write fails
    #[clap(long, default_value_t = 0.0)]
    bus_fault_rate: f64,
    /// probability that a simulated sonar ping times out
    #[clap(long, default_value_t = 0.05)]
    sonar_timeout_rate: f64,
    /// divide every hardware delay by this factor
    #[clap(long, default_value_t = 1)]
    speedup: u32,
    #[clap(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Follow a simulated line
    LineFollow {
        #[clap(long, default_value_t = 20.0)]
        speed: f32,
        #[clap(long, value_enum, default_value_t = FollowMode::Memory)]
        mode: FollowMode,
        #[clap(long, default_value_t = 50)]
        steps: u32,
    },
    /// Drive around simulated obstacles
    Avoid {
        #[clap(long, default_value_t = 50.0)]
        speed: f32,
        #[clap(long, default_value_t = 50)]
        steps: u32,
    },
    /// Read JSON commands, control-pad packets (`!B51`) or IR codes (`ir 255 8 79 176`) from stdin
    Teleop {
        #[clap(long, default_value_t = 35.0)]
        speed: f32,
    },
    /// Exercise every actuator and print a sensor report
    Demo,
}

#[derive(Clone, Copy, ValueEnum)]
enum FollowMode {
    Simple,
    Memory,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AppConfig {
    cutebot: CutebotConfig,
    ir_keymap: Option<IrKeymap>,
}

impl AppConfig {
    fn load(path: Option<&PathBuf>) -> Self {
        let Some(path) = path else {
            return AppConfig::default();
        };
        match std::fs::read_to_string(path).map(|s| serde_json::from_str::<AppConfig>(&s)) {
            Ok(Ok(cfg)) => cfg,
            Ok(Err(e)) => {
                error!("invalid config {}: {}", path.display(), e);
                AppConfig::default()
            }
            Err(e) => {
                error!("cannot read config {}: {}", path.display(), e);
                AppConfig::default()
            }
        }
    }

    /// Keymap of the remote used while writing the drivers.
    fn keymap(&self) -> IrKeymap {
        self.ir_keymap.unwrap_or(IrKeymap {
            up: Some([255, 8, 79, 176]),
            down: Some([255, 8, 87, 168]),
            left: Some([255, 8, 247, 8]),
            right: Some([255, 8, 183, 72]),
            stop: Some([255, 8, 191, 64]),
            one: Some([255, 8, 63, 192]),
        })
    }
}

fn build<'a>(
    bus: &'a Bus,
    world: &Rc<World>,
    opts: &Opts,
    config: &CutebotConfig,
) -> Bot<'a> {
    let delay = HostDelay {
        speedup: opts.speedup,
    };
    Cutebot::new(
        I2CDevices::new(bus, delay, config),
        PixelStrip::new(ConsoleStrip),
        Buzzer::new(ConsoleBuzzer::default(), delay),
        Sensors::new(
            SimTrackPin::left(world.clone()),
            SimTrackPin::right(world.clone()),
            SimSonar::new(world.clone(), opts.sonar_timeout_rate),
            delay,
            config,
        ),
        ExpansionPorts::new(SimAdc(512), SimAdc(0)),
    )
}

fn line_follow(
    bot: &mut Bot<'_>,
    world: &World,
    speed: f32,
    mode: FollowMode,
    steps: u32,
) {
    info!("Press Ctrl-C to stop. Starting in...");
    for (hz, secs) in countdown(3.0) {
        let _ = bot.play_tone(hz, secs);
    }
    info!("Looking for line!");

    let mode = match mode {
        FollowMode::Simple => LineFollowMode::Simple,
        FollowMode::Memory => LineFollowMode::Memory,
    };
    let mut follower = LineFollower::new(speed, mode);
    for _ in 0..steps {
        let tracking = match bot.sensors.read_tracking() {
            Ok(t) => t,
            Err(e) => match e {},
        };
        let steer = follower.step(tracking);
        info!(?tracking, maneuver = ?steer.maneuver, "line follow");
        let _ = bot.devices.set_motors(steer.left, steer.right);
        world.drive(steer.left, steer.right);
    }
}

fn avoid(
    bot: &mut Bot<'_>,
    world: &World,
    mut delay: HostDelay,
    speed: f32,
    steps: u32,
) {
    world.distance_cm.set(80.0);
    let avoidance = Avoidance::new(speed);
    for _ in 0..steps {
        let distance = bot.sensors.read_distance_cm();
        let proximity = world.proximity();
        let action = avoidance.step(distance, Some(proximity));
        info!(distance, proximity, left = action.left, right = action.right, "avoid");
        let _ = bot.devices.set_motors(action.left, action.right);
        let _ = bot.set_neopixels(LightTarget::Both, action.color);
        if action.hold_ms > 0 {
            delay.delay_ms(action.hold_ms);
        }
        world.drive(action.left, action.right);
    }
}

fn run(
    bot: &mut Bot<'_>,
    commands: &[CutebotCommand],
) {
    for &cmd in commands {
        match bot.execute_command(cmd) {
            Ok(Some(snapshot)) => {
                info!("----------------------------------");
                info!("Sonar: {:.2}", snapshot.distance_cm);
                info!("Left Line Tracking: {}", snapshot.tracking.left);
                info!("Right Line Tracking: {}", snapshot.tracking.right);
                info!("P1: {:?}", snapshot.p1);
                info!("P2: {:?}", snapshot.p2);
                info!("----------------------------------");
            }
            Ok(None) => {}
            Err(e) => warn!("command {:?} failed: {}", cmd, e),
        }
    }
}

fn teleop(
    bot: &mut Bot<'_>,
    speed: f32,
    keymap: IrKeymap,
) {
    let pad = ControlPad::new(speed);
    let remote = IrRemote::new(keymap, speed);
    let mut rng = rand::rng();

    info!("Waiting for commands on stdin...");
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("stdin: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.starts_with('{') {
            match serde_json::from_str::<CutebotCommand>(line) {
                Ok(cmd) => run(bot, &[cmd]),
                Err(e) => warn!("bad command {:?}: {}", line, e),
            }
        } else if line.starts_with("!B") {
            let mut bytes = line.as_bytes().to_vec();
            if bytes.len() == 4 {
                bytes.push(cutebot_core::utils::behaviors::teleop::checksum(&bytes));
            }
            match ButtonPacket::parse(&bytes) {
                Ok(packet) => {
                    info!(?packet, "control pad");
                    run(bot, &pad.commands(packet, &mut rng));
                }
                Err(e) => warn!("bad packet {:?}: {:?}", line, e),
            }
        } else if let Some(rest) = line.strip_prefix("ir ") {
            let code: Vec<u8> = rest
                .split_whitespace()
                .filter_map(|b| b.parse().ok())
                .collect();
            match <[u8; 4]>::try_from(code.as_slice()) {
                Ok(code) => run(bot, &remote.commands(code)),
                Err(_) => warn!("IR codes have four bytes, got {:?}", code),
            }
        } else if !line.is_empty() {
            warn!("I don't know: {:?}", line);
        }
    }
}

fn demo(bot: &mut Bot<'_>) {
    run(
        bot,
        &[
            CutebotCommand::M { l: 50.0, r: 20.0 },
            CutebotCommand::M {
                l: -100.0,
                r: 100.0,
            },
            CutebotCommand::Stop,
            CutebotCommand::H {
                w: 3,
                r: 80,
                g: 255,
                b: 80,
            },
            CutebotCommand::P {
                w: 1,
                r: 255,
                g: 192,
                b: 203,
            },
            CutebotCommand::S { w: 1, a: 90.0 },
            CutebotCommand::CenterServos,
            CutebotCommand::T { f: 440, d: 0.5 },
            CutebotCommand::ReadSensors,
            CutebotCommand::LightsOff,
        ],
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts: Opts = Opts::parse();
    let app = AppConfig::load(opts.config.as_ref());

    let bus: Bus = Mutex::new(RefCell::new(SimBus::new(opts.bus_fault_rate)));
    let world = Rc::new(World::default());
    let mut bot = build(&bus, &world, &opts, &app.cutebot);

    match opts.mode {
        Mode::LineFollow { speed, mode, steps } => {
            line_follow(&mut bot, &world, speed, mode, steps)
        }
        Mode::Avoid { speed, steps } => avoid(
            &mut bot,
            &world,
            HostDelay {
                speedup: opts.speedup,
            },
            speed,
            steps,
        ),
        Mode::Teleop { speed } => teleop(&mut bot, speed, app.keymap()),
        Mode::Demo => demo(&mut bot),
    }

    if bot.reset().is_err() {
        error!("could not stop the robot cleanly");
    }
}

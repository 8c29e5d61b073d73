//! Remote control front ends.
//!
//! Two input sources are mapped onto [`CutebotCommand`]s:
//!
//! - Bluefruit Connect control-pad packets received over a BLE UART:
//!   `b"!B" + button + pressed + checksum`, where the checksum is the bitwise
//!   NOT of the byte sum of the first four bytes.
//! - Already decoded 4-byte infrared remote codes, looked up in an
//!   [`IrKeymap`].
//!
//! Receiving packets and decoding IR pulses is left to the caller.

use heapless::Vec;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};

use crate::utils::controllers::CutebotCommand;

/// Length of a control-pad button packet.
pub const BUTTON_PACKET_LEN: usize = 5;

/// Commands produced by a single key press.
pub type Commands = Vec<CutebotCommand, 3>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlPadButton {
    Button1,
    Button2,
    Button3,
    Button4,
    Up,
    Down,
    Left,
    Right,
}

impl ControlPadButton {
    fn from_ascii(b: u8) -> Option<Self> {
        Some(match b {
            b'1' => ControlPadButton::Button1,
            b'2' => ControlPadButton::Button2,
            b'3' => ControlPadButton::Button3,
            b'4' => ControlPadButton::Button4,
            b'5' => ControlPadButton::Up,
            b'6' => ControlPadButton::Down,
            b'7' => ControlPadButton::Left,
            b'8' => ControlPadButton::Right,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// Not a `!B` button packet.
    Header,
    /// Fewer than five bytes.
    Truncated,
    UnknownButton(u8),
    /// Pressed flag is neither `'0'` nor `'1'`.
    BadState(u8),
    Checksum { expected: u8, found: u8 },
}

/// A decoded control-pad event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPacket {
    pub button: ControlPadButton,
    pub pressed: bool,
}

impl ButtonPacket {
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        let packet: &[u8; BUTTON_PACKET_LEN] = bytes
            .get(..BUTTON_PACKET_LEN)
            .and_then(|p| p.try_into().ok())
            .ok_or(PacketError::Truncated)?;
        if packet[..2] != *b"!B" {
            return Err(PacketError::Header);
        }
        let expected = checksum(&packet[..4]);
        if packet[4] != expected {
            return Err(PacketError::Checksum {
                expected,
                found: packet[4],
            });
        }
        let button =
            ControlPadButton::from_ascii(packet[2]).ok_or(PacketError::UnknownButton(packet[2]))?;
        let pressed = match packet[3] {
            b'1' => true,
            b'0' => false,
            other => return Err(PacketError::BadState(other)),
        };
        Ok(ButtonPacket { button, pressed })
    }
}

/// Bluefruit packet checksum.
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

const WHITE: (i32, i32, i32) = (255, 255, 255);
const OFF: (i32, i32, i32) = (0, 0, 0);

fn headlights(
    w: u8,
    (r, g, b): (i32, i32, i32),
) -> CutebotCommand {
    CutebotCommand::H { w, r, g, b }
}

fn push_all(cmds: &[CutebotCommand]) -> Commands {
    let mut out = Commands::new();
    for &c in cmds {
        // never more than the capacity
        let _ = out.push(c);
    }
    out
}

/// Drive and light commands for a direction key.
fn drive(
    speed: f32,
    key: ControlPadButton,
    turn_color: (i32, i32, i32),
) -> Commands {
    let half = ((speed / 2.0) as i32) as f32;
    match key {
        ControlPadButton::Up => push_all(&[
            CutebotCommand::M { l: speed, r: speed },
            headlights(3, WHITE),
        ]),
        ControlPadButton::Down => push_all(&[
            CutebotCommand::M {
                l: -speed,
                r: -speed,
            },
            headlights(0, OFF),
        ]),
        ControlPadButton::Left => push_all(&[
            CutebotCommand::M { l: half, r: speed },
            headlights(1, (150, 50, 0)),
            headlights(2, OFF),
        ]),
        ControlPadButton::Right => push_all(&[
            CutebotCommand::M { l: speed, r: half },
            headlights(1, OFF),
            headlights(2, turn_color),
        ]),
        _ => Commands::new(),
    }
}

/// Control-pad mapping.
pub struct ControlPad {
    max_speed: f32,
}

impl ControlPad {
    pub fn new(max_speed: f32) -> Self {
        ControlPad { max_speed }
    }

    /// Commands for a packet. Releases produce nothing.
    ///
    /// Button 2 picks a random neopixel color from `rng`. Button 4 asks for
    /// the controller board's own sensors, which this crate does not drive,
    /// so it yields no commands.
    pub fn commands<G: RngCore>(
        &self,
        packet: ButtonPacket,
        rng: &mut G,
    ) -> Commands {
        if !packet.pressed {
            return Commands::new();
        }
        match packet.button {
            ControlPadButton::Button1 => {
                push_all(&[CutebotCommand::Stop, CutebotCommand::LightsOff])
            }
            ControlPadButton::Button2 => {
                let [r, g, b, _] = rng.next_u32().to_le_bytes();
                push_all(&[CutebotCommand::P {
                    w: 3,
                    r: r.into(),
                    g: g.into(),
                    b: b.into(),
                }])
            }
            ControlPadButton::Button3 => push_all(&[CutebotCommand::ReadSensors]),
            ControlPadButton::Button4 => Commands::new(),
            key => drive(self.max_speed, key, (200, 100, 0)),
        }
    }
}

/// An already decoded infrared remote code.
pub type IrCode = [u8; 4];

/// Keys understood by the infrared remote mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrKey {
    Up,
    Down,
    Left,
    Right,
    Stop,
    One,
}

/// Codes of the remote in use. Unset keys never match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrKeymap {
    pub up: Option<IrCode>,
    pub down: Option<IrCode>,
    pub left: Option<IrCode>,
    pub right: Option<IrCode>,
    pub stop: Option<IrCode>,
    pub one: Option<IrCode>,
}

impl IrKeymap {
    pub fn lookup(
        &self,
        code: IrCode,
    ) -> Option<IrKey> {
        [
            (self.up, IrKey::Up),
            (self.down, IrKey::Down),
            (self.left, IrKey::Left),
            (self.right, IrKey::Right),
            (self.stop, IrKey::Stop),
            (self.one, IrKey::One),
        ]
        .into_iter()
        .find_map(|(c, key)| (c == Some(code)).then_some(key))
    }
}

/// Infrared remote mapping.
pub struct IrRemote {
    keymap: IrKeymap,
    max_speed: f32,
}

impl IrRemote {
    pub fn new(
        keymap: IrKeymap,
        max_speed: f32,
    ) -> Self {
        IrRemote { keymap, max_speed }
    }

    /// Commands for a decoded code; unknown codes are logged and ignored.
    pub fn commands(
        &self,
        code: IrCode,
    ) -> Commands {
        let Some(key) = self.keymap.lookup(code) else {
            tracing::info!("unknown IR code {:?}", code);
            return Commands::new();
        };
        let turn = (150, 100, 0);
        match key {
            IrKey::Up => drive(self.max_speed, ControlPadButton::Up, turn),
            IrKey::Down => drive(self.max_speed, ControlPadButton::Down, turn),
            IrKey::Left => drive(self.max_speed, ControlPadButton::Left, turn),
            IrKey::Right => drive(self.max_speed, ControlPadButton::Right, turn),
            IrKey::Stop => push_all(&[CutebotCommand::Stop, CutebotCommand::LightsOff]),
            IrKey::One => push_all(&[CutebotCommand::T { f: 1568, d: 1.0 }]),
        }
    }
}

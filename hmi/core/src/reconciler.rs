//! HMI Reconciler
//!
//! Applies one [`MachineSnapshot`] to the last displayed state and reports
//! what changed. Snapshots are sparse patches: an absent field leaves its
//! display element alone.
//!
//! # Derived indicators
//!
//! The door indicator and motor label depend on several fields at once. They
//! are recomputed only when the fields present in the current snapshot decide
//! them; otherwise the previous value stays.
//!
//! | Present fields | Door | Motor |
//! |---|---|---|
//! | `mc1 = true` | closed | ascending |
//! | `mc1 = false, mc2 = true` | closed | descending |
//! | `mc2 = true`, `mc1` absent | closed | unchanged |
//! | `mc1 = false, mc2 = false, ls* = true` | open | idle |
//! | all four `false` | closed | idle |
//! | anything else | unchanged | unchanged |

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Pixels of car travel per unit of normalized position
pub const CAR_TRAVEL_PX: f64 = 270.0;

/// Motor temperature at the bottom landing, in °C
pub const BASE_TEMPERATURE_C: f64 = 24.0;

/// Temperature rise per unit of normalized position, in °C
pub const TEMPERATURE_SPAN_C: f64 = 5.0;

/// Partial machine-state update from the controller
///
/// Unknown fields (such as an embedded `timestamp`) are ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    /// Normalized car position, 0.0 (bottom) to 1.0 (top)
    #[serde(default)]
    pub pos: Option<f64>,
    /// Up contactor
    #[serde(default)]
    pub mc1: Option<bool>,
    /// Down contactor
    #[serde(default)]
    pub mc2: Option<bool>,
    /// Bottom limit switch
    #[serde(default)]
    pub ls1: Option<bool>,
    /// Top limit switch
    #[serde(default)]
    pub ls2: Option<bool>,
    /// Bottom landing lamp
    #[serde(default)]
    pub l1: Option<bool>,
    /// Top landing lamp
    #[serde(default)]
    pub l2: Option<bool>,
    /// Up push-button input
    #[serde(default)]
    pub bp1: Option<bool>,
    /// Down push-button input
    #[serde(default)]
    pub bp2: Option<bool>,
}

/// Motor direction label
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MotorLabel {
    /// Neither contactor energised
    #[default]
    Idle,
    /// Up contactor energised
    Ascending,
    /// Down contactor energised
    Descending,
}

impl fmt::Display for MotorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Ascending => "ASCENDING",
            Self::Descending => "DESCENDING",
        })
    }
}

/// Landing lamps
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lamp {
    /// Bottom landing
    L1,
    /// Top landing
    L2,
}

impl Lamp {
    /// Every lamp, in display order
    pub const ALL: [Lamp; 2] = [Lamp::L1, Lamp::L2];

    fn read(self, snapshot: &MachineSnapshot) -> Option<bool> {
        match self {
            Self::L1 => snapshot.l1,
            Self::L2 => snapshot.l2,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Wire name
    pub fn name(self) -> &'static str {
        match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
        }
    }
}

/// I/O tags shown in the diagnostics table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Up push-button
    Bp1,
    /// Down push-button
    Bp2,
    /// Bottom limit switch
    Ls1,
    /// Top limit switch
    Ls2,
    /// Up contactor
    Mc1,
    /// Down contactor
    Mc2,
}

impl Tag {
    /// Every tag, in display order
    pub const ALL: [Tag; 6] = [Tag::Bp1, Tag::Bp2, Tag::Ls1, Tag::Ls2, Tag::Mc1, Tag::Mc2];

    fn read(self, snapshot: &MachineSnapshot) -> Option<bool> {
        match self {
            Self::Bp1 => snapshot.bp1,
            Self::Bp2 => snapshot.bp2,
            Self::Ls1 => snapshot.ls1,
            Self::Ls2 => snapshot.ls2,
            Self::Mc1 => snapshot.mc1,
            Self::Mc2 => snapshot.mc2,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Wire name
    pub fn name(self) -> &'static str {
        match self {
            Self::Bp1 => "bp1",
            Self::Bp2 => "bp2",
            Self::Ls1 => "ls1",
            Self::Ls2 => "ls2",
            Self::Mc1 => "mc1",
            Self::Mc2 => "mc2",
        }
    }
}

/// Last displayed machine state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HmiDisplay {
    position: Option<f64>,
    door_open: bool,
    motor: MotorLabel,
    lamps: [bool; 2],
    tags: [bool; 6],
}

impl HmiDisplay {
    /// Nothing displayed yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Last displayed normalized position
    pub fn position(&self) -> Option<f64> {
        self.position
    }

    /// Car offset from the bottom of the shaft, in pixels
    pub fn car_offset_px(&self) -> Option<f64> {
        self.position.map(car_offset_px)
    }

    /// Displayed motor temperature, in °C
    pub fn motor_temperature_c(&self) -> Option<f64> {
        self.position.map(motor_temperature_c)
    }

    /// Door indicator
    pub fn door_open(&self) -> bool {
        self.door_open
    }

    /// Motor label
    pub fn motor(&self) -> MotorLabel {
        self.motor
    }

    /// Lamp state
    pub fn lamp(&self, lamp: Lamp) -> bool {
        self.lamps[lamp.index()]
    }

    /// Tag state
    pub fn tag(&self, tag: Tag) -> bool {
        self.tags[tag.index()]
    }
}

/// Car offset for a normalized position
pub fn car_offset_px(pos: f64) -> f64 {
    pos * CAR_TRAVEL_PX
}

/// Motor temperature for a normalized position
pub fn motor_temperature_c(pos: f64) -> f64 {
    BASE_TEMPERATURE_C + pos * TEMPERATURE_SPAN_C
}

/// One element of the display that changed
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DisplayChange {
    /// Car moved
    Position {
        /// Offset from the bottom, in pixels
        offset_px: f64,
        /// Derived motor temperature, in °C
        temperature_c: f64,
    },
    /// Door indicator flipped
    DoorOpen(bool),
    /// Motor label changed
    Motor(MotorLabel),
    /// Lamp switched
    Lamp {
        /// Which lamp
        lamp: Lamp,
        /// New state
        lit: bool,
    },
    /// Tag switched
    Tag {
        /// Which tag
        tag: Tag,
        /// New state
        active: bool,
    },
}

/// Result of one reconciliation pass
#[derive(Clone, Debug, PartialEq)]
pub struct ReconcileReport {
    /// Elements that changed, in display order
    pub changes: Vec<DisplayChange>,
    /// Wall-clock duration of the pass
    pub elapsed: Duration,
}

/// Apply `snapshot` to `display`
pub fn reconcile(display: &mut HmiDisplay, snapshot: &MachineSnapshot) -> ReconcileReport {
    let start = Instant::now();
    let mut changes = Vec::new();

    if let Some(pos) = snapshot.pos {
        if display.position != Some(pos) {
            display.position = Some(pos);
            changes.push(DisplayChange::Position {
                offset_px: car_offset_px(pos),
                temperature_c: motor_temperature_c(pos),
            });
        }
    }

    if let Some(open) = derive_door_open(snapshot) {
        if display.door_open != open {
            display.door_open = open;
            changes.push(DisplayChange::DoorOpen(open));
        }
    }

    if let Some(motor) = derive_motor(snapshot) {
        if display.motor != motor {
            display.motor = motor;
            changes.push(DisplayChange::Motor(motor));
        }
    }

    for lamp in Lamp::ALL {
        if let Some(lit) = lamp.read(snapshot) {
            let slot = &mut display.lamps[lamp.index()];
            if *slot != lit {
                *slot = lit;
                changes.push(DisplayChange::Lamp { lamp, lit });
            }
        }
    }

    for tag in Tag::ALL {
        if let Some(active) = tag.read(snapshot) {
            let slot = &mut display.tags[tag.index()];
            if *slot != active {
                *slot = active;
                changes.push(DisplayChange::Tag { tag, active });
            }
        }
    }

    ReconcileReport {
        changes,
        elapsed: start.elapsed(),
    }
}

fn derive_door_open(s: &MachineSnapshot) -> Option<bool> {
    if s.mc1 == Some(true) || s.mc2 == Some(true) {
        return Some(false);
    }
    let (Some(false), Some(false)) = (s.mc1, s.mc2) else {
        return None;
    };
    match (s.ls1, s.ls2) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn derive_motor(s: &MachineSnapshot) -> Option<MotorLabel> {
    match (s.mc1, s.mc2) {
        (Some(true), _) => Some(MotorLabel::Ascending),
        (Some(false), Some(true)) => Some(MotorLabel::Descending),
        (Some(false), Some(false)) => Some(MotorLabel::Idle),
        _ => None,
    }
}

//! Fixed physical topology of the rack PDU array and typed coordinates into it.
//!
//! The array is 4 rack PDUs, each with 4 branches of 9 receptacles, and 3
//! line-to-line phases per rack. These counts are compiled in; nothing
//! discovers or changes them at runtime. Each coordinate is a newtype over a
//! 0-based index that can only be constructed inside its range, so a
//! `MetricPoint` is always a valid location in the array.

use serde::{Deserialize, Serialize};

/// Number of rack PDUs in the array.
pub const RACKS: usize = 4;
/// Number of branches per rack PDU.
pub const BRANCHES: usize = 4;
/// Number of receptacles per branch.
pub const RECEPTACLES: usize = 9;
/// Number of line-to-line phases measured per rack.
pub const PHASES: usize = 3;

macro_rules! coordinate {
    ($(#[$meta:meta])* $name:ident, $count:expr, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            /// Coordinate from a 0-based index, or `None` when out of range.
            pub const fn new(index: usize) -> Option<Self> {
                if index < $count { Some(Self(index)) } else { None }
            }

            /// 0-based index, for addressing arrays.
            pub const fn index(self) -> usize {
                self.0
            }

            /// 1-based number, as used in OIDs and on the hardware labels.
            pub const fn number(self) -> usize {
                self.0 + 1
            }

            /// Every value in ascending order.
            pub fn all() -> impl Iterator<Item = Self> + Clone {
                (0..$count).map(Self)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "{}"), self.number())
            }
        }
    };
}

coordinate!(
    /// One rack PDU (1..=4 on the hardware).
    Rack,
    RACKS,
    "pdu"
);
coordinate!(
    /// One branch within a rack PDU (1..=4).
    Branch,
    BRANCHES,
    "branch"
);
coordinate!(
    /// One receptacle within a branch (1..=9).
    Receptacle,
    RECEPTACLES,
    "rcp"
);

/// Line-to-line phase conductor of a rack's 3-phase feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    L1L2,
    L2L3,
    L3L1,
}

impl Phase {
    pub const ALL: [Phase; PHASES] = [Phase::L1L2, Phase::L2L3, Phase::L3L1];

    /// 0-based index in `ALL`.
    pub const fn index(self) -> usize {
        match self {
            Self::L1L2 => 0,
            Self::L2L3 => 1,
            Self::L3L1 => 2,
        }
    }

    /// 1-based number used in the branch current OID column.
    pub const fn number(self) -> usize {
        self.index() + 1
    }

    /// Line label as shown to clients (`"L1-L2"` etc.).
    pub const fn label(self) -> &'static str {
        match self {
            Self::L1L2 => "L1-L2",
            Self::L2L3 => "L2-L3",
            Self::L3L1 => "L3-L1",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Phase labels in index order, as served in the `lineMap` field.
pub const LINE_MAP: [&str; PHASES] = [
    Phase::L1L2.label(),
    Phase::L2L3.label(),
    Phase::L3L1.label(),
];

/// Kind of metric collected from the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// Total input power per rack PDU.
    TotalInputPower,
    /// Accumulated energy per rack PDU.
    AccumulatedEnergy,
    /// Current per rack PDU and phase.
    BranchCurrent,
    /// On/off state per receptacle.
    ReceptacleState,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::TotalInputPower,
        MetricKind::AccumulatedEnergy,
        MetricKind::BranchCurrent,
        MetricKind::ReceptacleState,
    ];

    /// Unit label as served to clients.
    pub const fn units(self) -> &'static str {
        match self {
            Self::TotalInputPower => "Watts",
            Self::AccumulatedEnergy => "Kilowatt Hours",
            Self::BranchCurrent => "A AC",
            Self::ReceptacleState => "state",
        }
    }

    /// Number of points of this kind in the fixed topology.
    pub const fn point_count(self) -> usize {
        match self {
            Self::TotalInputPower | Self::AccumulatedEnergy => RACKS,
            Self::BranchCurrent => RACKS * PHASES,
            Self::ReceptacleState => RACKS * BRANCHES * RECEPTACLES,
        }
    }

    /// Every point of this kind in batch order (rack-major).
    pub fn points(self) -> Vec<MetricPoint> {
        match self {
            Self::TotalInputPower => Rack::all()
                .map(|rack| MetricPoint::TotalInputPower { rack })
                .collect(),
            Self::AccumulatedEnergy => Rack::all()
                .map(|rack| MetricPoint::AccumulatedEnergy { rack })
                .collect(),
            Self::BranchCurrent => Rack::all()
                .flat_map(|rack| {
                    Phase::ALL
                        .into_iter()
                        .map(move |phase| MetricPoint::BranchCurrent { rack, phase })
                })
                .collect(),
            Self::ReceptacleState => Rack::all()
                .flat_map(|rack| {
                    Branch::all().flat_map(move |branch| {
                        Receptacle::all().map(move |receptacle| MetricPoint::ReceptacleState {
                            rack,
                            branch,
                            receptacle,
                        })
                    })
                })
                .collect(),
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TotalInputPower => write!(f, "total_input_power"),
            Self::AccumulatedEnergy => write!(f, "accumulated_energy"),
            Self::BranchCurrent => write!(f, "branch_current"),
            Self::ReceptacleState => write!(f, "receptacle_state"),
        }
    }
}

/// A single addressable value: a metric kind plus exactly the coordinates
/// that apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricPoint {
    TotalInputPower { rack: Rack },
    AccumulatedEnergy { rack: Rack },
    BranchCurrent { rack: Rack, phase: Phase },
    ReceptacleState {
        rack: Rack,
        branch: Branch,
        receptacle: Receptacle,
    },
}

impl MetricPoint {
    pub const fn kind(self) -> MetricKind {
        match self {
            Self::TotalInputPower { .. } => MetricKind::TotalInputPower,
            Self::AccumulatedEnergy { .. } => MetricKind::AccumulatedEnergy,
            Self::BranchCurrent { .. } => MetricKind::BranchCurrent,
            Self::ReceptacleState { .. } => MetricKind::ReceptacleState,
        }
    }

    pub const fn rack(self) -> Rack {
        match self {
            Self::TotalInputPower { rack }
            | Self::AccumulatedEnergy { rack }
            | Self::BranchCurrent { rack, .. }
            | Self::ReceptacleState { rack, .. } => rack,
        }
    }
}

impl std::fmt::Display for MetricPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TotalInputPower { rack } | Self::AccumulatedEnergy { rack } => {
                write!(f, "{}/{rack}", self.kind())
            }
            Self::BranchCurrent { rack, phase } => write!(f, "{}/{rack}/{phase}", self.kind()),
            Self::ReceptacleState {
                rack,
                branch,
                receptacle,
            } => write!(f, "{}/{rack}/{branch}/{receptacle}", self.kind()),
        }
    }
}

//! Static mapping from topology coordinates to Liebert MPH OIDs.
//!
//! Every address is `BASE_OID + group + column + 1-based coordinates`. The
//! prefixes below are the vendor's numbering and must stay byte-identical.
//! The table is built once at startup; a [`ConfigError`] from
//! [`AddressTable::build`] is fatal.

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::topology::{MetricKind, MetricPoint};

/// Enterprise prefix shared by all PDU parameter OIDs.
pub const BASE_OID: &str = "1.3.6.1.4.1.476.1.42.3.8.";
/// PDU power-source parameter group.
pub const PDU_PS: &str = "30.20.1.";
/// Rack branch parameter group.
pub const PDU_RB: &str = "40.20.1.";
/// Receptacle parameter group.
pub const PDU_RCP: &str = "50.20.1.";

const TOTAL_INPUT_POWER_COLUMN: &str = "65.";
const ACCUMULATED_ENERGY_COLUMN: &str = "50.";
const BRANCH_CURRENT_COLUMN: &str = "130.";
const RECEPTACLE_STATE_COLUMN: &str = "95.";

/// Opaque identifier for one remote counter (a dotted OID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    /// Address of `point`. Pure: the same point always yields the same string.
    pub fn of(point: MetricPoint) -> Self {
        let oid = match point {
            MetricPoint::TotalInputPower { rack } => format!(
                "{BASE_OID}{PDU_PS}{TOTAL_INPUT_POWER_COLUMN}{}.1",
                rack.number()
            ),
            MetricPoint::AccumulatedEnergy { rack } => format!(
                "{BASE_OID}{PDU_PS}{ACCUMULATED_ENERGY_COLUMN}{}.1",
                rack.number()
            ),
            MetricPoint::BranchCurrent { rack, phase } => format!(
                "{BASE_OID}{PDU_RB}{BRANCH_CURRENT_COLUMN}{}.{}",
                rack.number(),
                phase.number()
            ),
            MetricPoint::ReceptacleState {
                rack,
                branch,
                receptacle,
            } => format!(
                "{BASE_OID}{PDU_RCP}{RECEPTACLE_STATE_COLUMN}{}.{}.{}",
                rack.number(),
                branch.number(),
                receptacle.number()
            ),
        };
        Self(oid)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric arcs of the OID, or `None` if the string is not a dotted OID.
    pub fn arcs(&self) -> Option<Vec<u32>> {
        if self.0.is_empty() {
            return None;
        }
        self.0.split('.').map(|arc| arc.parse().ok()).collect()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Immutable table of every address in the topology, grouped by kind.
#[derive(Debug, Clone)]
pub struct AddressTable {
    groups: HashMap<MetricKind, Vec<(MetricPoint, Address)>>,
    by_point: HashMap<MetricPoint, Address>,
}

impl AddressTable {
    /// Enumerate and validate every address.
    pub fn build() -> Result<Self, ConfigError> {
        let mut groups = HashMap::new();
        let mut by_point = HashMap::new();
        let mut seen: HashMap<Address, MetricPoint> = HashMap::new();

        for kind in MetricKind::ALL {
            let entries: Vec<(MetricPoint, Address)> = kind
                .points()
                .into_iter()
                .map(|point| (point, Address::of(point)))
                .collect();

            if entries.len() != kind.point_count() {
                return Err(ConfigError::TopologyMismatch {
                    kind,
                    expected: kind.point_count(),
                    actual: entries.len(),
                });
            }

            for (point, address) in &entries {
                validate_oid(*point, address)?;
                if let Some(first) = seen.insert(address.clone(), *point) {
                    return Err(ConfigError::DuplicateAddress {
                        address: address.to_string(),
                        first: first.to_string(),
                        second: point.to_string(),
                    });
                }
                by_point.insert(*point, address.clone());
            }

            groups.insert(kind, entries);
        }

        Ok(Self { groups, by_point })
    }

    /// Address of a point. Every valid point is in the table.
    pub fn address(&self, point: MetricPoint) -> &Address {
        &self.by_point[&point]
    }

    /// Points and addresses of one group, in batch order.
    pub fn group(&self, kind: MetricKind) -> &[(MetricPoint, Address)] {
        self.groups.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Addresses of one group, in batch order.
    pub fn batch(&self, kind: MetricKind) -> Vec<Address> {
        self.group(kind).iter().map(|(_, a)| a.clone()).collect()
    }

    /// Total number of addresses.
    pub fn len(&self) -> usize {
        self.by_point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_point.is_empty()
    }

    /// Every (point, address) pair, grouped by kind in `MetricKind::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = &(MetricPoint, Address)> {
        MetricKind::ALL.iter().flat_map(|kind| self.group(*kind))
    }
}

fn validate_oid(point: MetricPoint, address: &Address) -> Result<(), ConfigError> {
    let well_formed = address
        .arcs()
        .is_some_and(|arcs| arcs.len() >= 2 && arcs[0] <= 2);
    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::MalformedAddress {
            point: point.to_string(),
            address: address.to_string(),
        })
    }
}

//! Current-value store for every metric, plus the shared [`MetricStore`].
//!
//! The snapshot is a plain `Copy` record. [`MetricStore`] wraps it in an
//! `RwLock` that is only held for a synchronous commit or copy-out, never
//! across an await, so readers never wait on a cycle that is mid-fetch.
//! Writes go through crate-private methods used by the collection cycle.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Serialize, Serializer};

use crate::history::{CurrentSample, RollingHistory};
use crate::topology::{BRANCHES, MetricKind, MetricPoint, PHASES, Phase, RACKS, RECEPTACLES, Rack};

/// Current on the three line-to-line phases of one rack.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseCurrent {
    pub l1_l2: f64,
    pub l2_l3: f64,
    pub l3_l1: f64,
}

impl PhaseCurrent {
    pub fn uniform(value: f64) -> Self {
        Self {
            l1_l2: value,
            l2_l3: value,
            l3_l1: value,
        }
    }

    pub fn get(&self, phase: Phase) -> f64 {
        match phase {
            Phase::L1L2 => self.l1_l2,
            Phase::L2L3 => self.l2_l3,
            Phase::L3L1 => self.l3_l1,
        }
    }

    pub fn set(&mut self, phase: Phase, value: f64) {
        match phase {
            Phase::L1L2 => self.l1_l2 = value,
            Phase::L2L3 => self.l2_l3 = value,
            Phase::L3L1 => self.l3_l1 = value,
        }
    }

    /// Values in `Phase::ALL` order.
    pub fn to_array(&self) -> [f64; PHASES] {
        Phase::ALL.map(|phase| self.get(phase))
    }
}

// Clients expect `[l1_l2, l2_l3, l3_l1]`, matching `lineMap`.
impl Serialize for PhaseCurrent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

/// Receptacle states of one rack, indexed `[branch][receptacle]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RackReceptacles {
    pub branches: [[f64; RECEPTACLES]; BRANCHES],
}

/// Last observed value of every metric, plus the derived energy totals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    /// Watts, per rack.
    pub total_input_power: [f64; RACKS],
    /// Kilowatt hours, per rack.
    pub accumulated_energy: [f64; RACKS],
    /// Sum of `accumulated_energy`, served with the per-rack breakdown.
    pub total_energy: f64,
    /// Same sum, served on its own. Always equal to `total_energy` after a cycle.
    pub grand_total_energy: f64,
    /// Amps, per rack and phase.
    pub branch_current: [PhaseCurrent; RACKS],
    /// Raw receptacle state values; zero until receptacle polling is enabled.
    pub receptacle_state: [RackReceptacles; RACKS],
}

impl Snapshot {
    /// Stored value at `point`.
    pub fn value(&self, point: MetricPoint) -> f64 {
        match point {
            MetricPoint::TotalInputPower { rack } => self.total_input_power[rack.index()],
            MetricPoint::AccumulatedEnergy { rack } => self.accumulated_energy[rack.index()],
            MetricPoint::BranchCurrent { rack, phase } => {
                self.branch_current[rack.index()].get(phase)
            }
            MetricPoint::ReceptacleState {
                rack,
                branch,
                receptacle,
            } => self.receptacle_state[rack.index()].branches[branch.index()][receptacle.index()],
        }
    }

    fn set(&mut self, point: MetricPoint, value: f64) {
        match point {
            MetricPoint::TotalInputPower { rack } => self.total_input_power[rack.index()] = value,
            MetricPoint::AccumulatedEnergy { rack } => {
                self.accumulated_energy[rack.index()] = value
            }
            MetricPoint::BranchCurrent { rack, phase } => {
                self.branch_current[rack.index()].set(phase, value)
            }
            MetricPoint::ReceptacleState {
                rack,
                branch,
                receptacle,
            } => {
                self.receptacle_state[rack.index()].branches[branch.index()]
                    [receptacle.index()] = value
            }
        }
    }

    /// Sum of accumulated energy across all racks.
    pub fn energy_sum(&self) -> f64 {
        Rack::all()
            .map(|rack| self.accumulated_energy[rack.index()])
            .sum()
    }
}

/// Counters describing collector activity since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectorStats {
    /// Completed collection cycles.
    pub cycles: u64,
    /// Individual values skipped because they did not resolve.
    pub unresolvable_values: u64,
    /// Group fetches that failed as a whole.
    pub failed_fetches: u64,
}

/// Shared store read by the query layer and written by the collection cycle.
pub struct MetricStore {
    snapshot: RwLock<Snapshot>,
    history: RollingHistory,
    /// Bit `rack * PHASES + phase` is set once that current point has resolved.
    current_observed: AtomicU16,
    receptacles_enabled: AtomicBool,
    last_cycle_degraded: AtomicBool,
    cycles: AtomicU64,
    unresolvable_values: AtomicU64,
    failed_fetches: AtomicU64,
}

impl MetricStore {
    /// Zero-filled store.
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Snapshot::default()),
            history: RollingHistory::new(),
            current_observed: AtomicU16::new(0),
            receptacles_enabled: AtomicBool::new(false),
            last_cycle_degraded: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            unresolvable_values: AtomicU64::new(0),
            failed_fetches: AtomicU64::new(0),
        }
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        *self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    /// Whether receptacle state is being collected.
    pub fn receptacles_enabled(&self) -> bool {
        self.receptacles_enabled.load(Ordering::Relaxed)
    }

    /// Whether the most recently completed cycle had a failed group fetch.
    pub fn last_cycle_degraded(&self) -> bool {
        self.last_cycle_degraded.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CollectorStats {
        CollectorStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            unresolvable_values: self.unresolvable_values.load(Ordering::Relaxed),
            failed_fetches: self.failed_fetches.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn set_receptacles_enabled(&self, enabled: bool) {
        self.receptacles_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Commit resolved values of one group, in order, under a single write lock.
    pub(crate) fn commit(&self, kind: MetricKind, values: &[(MetricPoint, f64)]) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        for &(point, value) in values {
            debug_assert_eq!(point.kind(), kind);
            snapshot.set(point, value);
            if let MetricPoint::BranchCurrent { rack, phase } = point {
                self.current_observed
                    .fetch_or(current_bit(rack, phase), Ordering::Relaxed);
            }
        }
    }

    /// Retained branch current for the history, leaving out points that have
    /// never resolved.
    pub(crate) fn current_sample(&self) -> CurrentSample {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        let observed = self.current_observed.load(Ordering::Relaxed);
        let mut sample = CurrentSample::default();
        for rack in Rack::all() {
            for phase in Phase::ALL {
                if observed & current_bit(rack, phase) != 0 {
                    sample.set(rack, phase, snapshot.branch_current[rack.index()].get(phase));
                }
            }
        }
        sample
    }

    /// Recompute the energy sum and write it to both total fields.
    pub(crate) fn refresh_totals(&self) -> f64 {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let total = snapshot.energy_sum();
        snapshot.total_energy = total;
        snapshot.grand_total_energy = total;
        total
    }

    pub(crate) fn record_cycle(&self, unresolvable: u64, failed_fetches: u64) -> u64 {
        self.unresolvable_values
            .fetch_add(unresolvable, Ordering::Relaxed);
        self.failed_fetches
            .fetch_add(failed_fetches, Ordering::Relaxed);
        self.last_cycle_degraded
            .store(failed_fetches > 0, Ordering::Relaxed);
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn current_bit(rack: Rack, phase: Phase) -> u16 {
    1 << (rack.index() * PHASES + phase.index())
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new()
    }
}

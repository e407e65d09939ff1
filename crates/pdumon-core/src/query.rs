//! Read-only views of the [`MetricStore`] in the JSON shapes clients expect.
//!
//! Every view is a copy taken under a short lock; none of them waits on a
//! cycle that is fetching. There is no "last updated" field: a stale value is
//! served exactly like a fresh one, and `/health` is the only staleness signal.

use serde::Serialize;

use crate::history::{HistoryEntry, TICK_SIZE};
use crate::snapshot::{CollectorStats, MetricStore, PhaseCurrent, RackReceptacles};
use crate::topology::{LINE_MAP, MetricKind, PHASES, RACKS};

/// Sum of accumulated energy over every rack.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalEnergyView {
    pub total_energy: f64,
    pub units: &'static str,
}

/// Accumulated energy per rack plus the sum.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedEnergyView {
    pub total_energy: f64,
    pub pdu: [f64; RACKS],
    pub units: &'static str,
}

/// Total input power per rack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputPowerView {
    pub pdu: [f64; RACKS],
    pub units: &'static str,
}

/// Current per rack and phase; `lineMap` labels the inner index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentView {
    pub pdu: [PhaseCurrent; RACKS],
    pub units: &'static str,
    pub line_map: [&'static str; PHASES],
}

/// Receptacle states per rack, branch, and receptacle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceptacleView {
    pub pdu: [RackReceptacles; RACKS],
    pub enabled: bool,
}

/// Collector liveness and error counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthView {
    pub status: &'static str,
    #[serde(flatten)]
    pub stats: CollectorStats,
    pub history_ticks: u64,
}

impl MetricStore {
    /// `{totalEnergy, units}`. Reads the grand total field.
    pub fn total_accumulated_energy(&self) -> TotalEnergyView {
        TotalEnergyView {
            total_energy: self.snapshot().grand_total_energy,
            units: MetricKind::AccumulatedEnergy.units(),
        }
    }

    /// `{totalEnergy, pdu, units}`. Reads the per-rack total field.
    pub fn accumulated_energy(&self) -> AccumulatedEnergyView {
        let snapshot = self.snapshot();
        AccumulatedEnergyView {
            total_energy: snapshot.total_energy,
            pdu: snapshot.accumulated_energy,
            units: MetricKind::AccumulatedEnergy.units(),
        }
    }

    /// `{pdu, units}`.
    pub fn total_input_power(&self) -> InputPowerView {
        InputPowerView {
            pdu: self.snapshot().total_input_power,
            units: MetricKind::TotalInputPower.units(),
        }
    }

    /// `{pdu, units, lineMap}`.
    pub fn current(&self) -> CurrentView {
        CurrentView {
            pdu: self.snapshot().branch_current,
            units: MetricKind::BranchCurrent.units(),
            line_map: LINE_MAP,
        }
    }

    /// Raw history slots, slot 0 first (not oldest first).
    pub fn current_history(&self) -> [HistoryEntry; TICK_SIZE] {
        self.history().snapshot_all()
    }

    pub fn receptacle_state(&self) -> ReceptacleView {
        ReceptacleView {
            pdu: self.snapshot().receptacle_state,
            enabled: self.receptacles_enabled(),
        }
    }

    /// `"starting"` before the first cycle completes, `"degraded"` when the
    /// latest completed cycle had a failed group fetch, `"ok"` otherwise.
    pub fn health(&self) -> HealthView {
        let stats = self.stats();
        let status = if stats.cycles == 0 {
            "starting"
        } else if self.last_cycle_degraded() {
            "degraded"
        } else {
            "ok"
        };
        HealthView {
            status,
            stats,
            history_ticks: self.history().tick(),
        }
    }
}

//! Integration tests for pdumon-core.
//!
//! These drive full collection cycles against scripted sources:
//! address table → source → cycle → store → query views.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use pdumon_core::{
    Address, AddressTable, CollectionCycle, CycleWarning, MetricKind, MetricPoint, MetricSource,
    MetricStore, PhaseCurrent, Rack, Reading, SimulatedSource, TICK_SIZE, TransportError,
    Unresolvable,
};

/// Answers from a per-address script; unscripted addresses return `default`.
/// Whole groups can be made to fail.
struct ScriptedSource {
    values: Mutex<HashMap<Address, Reading>>,
    failing: Mutex<HashSet<MetricKind>>,
    table: AddressTable,
    default: f64,
}

impl ScriptedSource {
    fn new(default: f64) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            table: AddressTable::build().unwrap(),
            default,
        }
    }

    fn set(&self, point: MetricPoint, reading: Reading) {
        let address = self.table.address(point).clone();
        self.values.lock().unwrap().insert(address, reading);
    }

    fn fail(&self, kind: MetricKind, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(kind);
        } else {
            set.remove(&kind);
        }
    }

    fn kind_of(&self, batch: &[Address]) -> Option<MetricKind> {
        let first = batch.first()?;
        MetricKind::ALL
            .into_iter()
            .find(|kind| self.table.group(*kind).iter().any(|(_, a)| a == first))
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, batch: &[Address]) -> Result<Vec<Reading>, TransportError> {
        if let Some(kind) = self.kind_of(batch) {
            if self.failing.lock().unwrap().contains(&kind) {
                return Err(TransportError::Timeout);
            }
        }
        let values = self.values.lock().unwrap();
        Ok(batch
            .iter()
            .map(|a| values.get(a).copied().unwrap_or(Ok(self.default)))
            .collect())
    }
}

fn rack(i: usize) -> Rack {
    Rack::new(i).unwrap()
}

fn cycle(source: Arc<ScriptedSource>) -> CollectionCycle {
    CollectionCycle::new(
        Arc::new(AddressTable::build().unwrap()),
        source,
        Arc::new(MetricStore::new()),
    )
}

#[tokio::test]
async fn constant_source_is_idempotent() {
    let cycle = cycle(Arc::new(ScriptedSource::new(7.0)));
    cycle.run().await;
    let first = cycle.store().snapshot();
    cycle.run().await;
    assert_eq!(cycle.store().snapshot(), first);
}

#[tokio::test]
async fn unresolvable_value_keeps_previous() {
    let source = Arc::new(ScriptedSource::new(1.0));
    let cycle = cycle(source.clone());
    let point = MetricPoint::TotalInputPower { rack: rack(2) };

    source.set(point, Ok(1500.0));
    cycle.run().await;
    assert_eq!(cycle.store().snapshot().value(point), 1500.0);

    source.set(point, Err(Unresolvable::NoSuchInstance));
    let result = cycle.run().await;
    assert_eq!(cycle.store().snapshot().value(point), 1500.0);
    assert!(result.updated.contains(&MetricKind::TotalInputPower));
    assert!(result.warnings.iter().any(|w| matches!(
        w,
        CycleWarning::Unresolvable { point: p, reason: Unresolvable::NoSuchInstance, .. } if *p == point
    )));
    assert_eq!(cycle.store().stats().unresolvable_values, 1);
}

#[tokio::test]
async fn failed_group_does_not_block_others() {
    let source = Arc::new(ScriptedSource::new(3.0));
    let cycle = cycle(source.clone());
    cycle.run().await;

    source.fail(MetricKind::BranchCurrent, true);
    source.set(MetricPoint::TotalInputPower { rack: rack(0) }, Ok(99.0));
    let result = cycle.run().await;

    assert_eq!(result.failed, vec![MetricKind::BranchCurrent]);
    let snapshot = cycle.store().snapshot();
    assert_eq!(snapshot.total_input_power[0], 99.0);
    assert_eq!(snapshot.branch_current, [PhaseCurrent::uniform(3.0); 4]);
    assert_eq!(cycle.store().health().status, "degraded");

    source.fail(MetricKind::BranchCurrent, false);
    cycle.run().await;
    assert_eq!(cycle.store().health().status, "ok");
}

#[tokio::test]
async fn energy_totals_agree() {
    let source = Arc::new(ScriptedSource::new(0.0));
    for (i, value) in [10.0, 20.0, 5.0, 0.0].into_iter().enumerate() {
        source.set(MetricPoint::AccumulatedEnergy { rack: rack(i) }, Ok(value));
    }
    let cycle = cycle(source);
    let result = cycle.run().await;
    assert_eq!(result.total_energy, 35.0);

    let store = cycle.store();
    assert_eq!(
        serde_json::to_value(store.total_accumulated_energy()).unwrap(),
        json!({"totalEnergy": 35.0, "units": "Kilowatt Hours"})
    );
    assert_eq!(
        serde_json::to_value(store.accumulated_energy()).unwrap(),
        json!({"totalEnergy": 35.0, "pdu": [10.0, 20.0, 5.0, 0.0], "units": "Kilowatt Hours"})
    );
}

#[tokio::test]
async fn energy_total_survives_partial_failure() {
    let source = Arc::new(ScriptedSource::new(4.0));
    let cycle = cycle(source.clone());
    cycle.run().await;

    source.fail(MetricKind::AccumulatedEnergy, true);
    let result = cycle.run().await;
    // Recomputed from the retained per-rack values.
    assert_eq!(result.total_energy, 16.0);
    assert_eq!(cycle.store().accumulated_energy().total_energy, 16.0);
}

#[tokio::test]
async fn current_view_end_to_end() {
    let cycle = cycle(Arc::new(ScriptedSource::new(3.1)));
    cycle.run().await;
    assert_eq!(
        serde_json::to_value(cycle.store().current()).unwrap(),
        json!({
            "pdu": [[3.1, 3.1, 3.1], [3.1, 3.1, 3.1], [3.1, 3.1, 3.1], [3.1, 3.1, 3.1]],
            "units": "A AC",
            "lineMap": ["L1-L2", "L2-L3", "L3-L1"],
        })
    );
}

#[tokio::test]
async fn history_wraps_after_tick_size_cycles() {
    let source = Arc::new(ScriptedSource::new(0.0));
    let cycle = cycle(source.clone());
    let point = MetricPoint::BranchCurrent {
        rack: rack(0),
        phase: pdumon_core::Phase::L1L2,
    };

    for i in 0..(TICK_SIZE as u64 + 2) {
        source.set(point, Ok(i as f64));
        cycle.run().await;
    }

    let history = cycle.store().history();
    assert_eq!(history.tick(), TICK_SIZE as u64 + 2);
    let slots = cycle.store().current_history();
    // Slots 0 and 1 were overwritten by cycles 10 and 11.
    assert_eq!(slots[0].racks[0].l1_l2, 10.0);
    assert_eq!(slots[1].racks[0].l1_l2, 11.0);
    assert_eq!(slots[2].racks[0].l1_l2, 2.0);

    let ordered: Vec<f64> = history
        .chronological()
        .iter()
        .map(|e| e.racks[0].l1_l2)
        .collect();
    assert_eq!(ordered, (2..12).map(|i| i as f64).collect::<Vec<_>>());
}

#[tokio::test]
async fn failed_current_fetch_records_retained_values() {
    let source = Arc::new(ScriptedSource::new(2.0));
    let cycle = cycle(source.clone());
    cycle.run().await;

    source.fail(MetricKind::BranchCurrent, true);
    cycle.run().await;
    let slots = cycle.store().current_history();
    assert_eq!(slots[0].racks, [PhaseCurrent::uniform(2.0); 4]);
    assert_eq!(slots[1].racks, [PhaseCurrent::uniform(2.0); 4]);
    assert_eq!(cycle.store().history().tick(), 2);
}

#[tokio::test]
async fn failed_current_fetch_after_wrap_overwrites_old_slot() {
    let source = Arc::new(ScriptedSource::new(0.0));
    let cycle = cycle(source.clone());
    let point = MetricPoint::BranchCurrent {
        rack: rack(1),
        phase: pdumon_core::Phase::L2L3,
    };

    for i in 0..TICK_SIZE as u64 {
        source.set(point, Ok(i as f64));
        cycle.run().await;
    }
    source.fail(MetricKind::BranchCurrent, true);
    cycle.run().await;

    // Slot 0 held the first reading (0.0); it now holds the latest retained one.
    let slots = cycle.store().current_history();
    assert_eq!(slots[0].racks[1].l2_l3, 9.0);
    let latest = cycle.store().history().latest().unwrap();
    assert_eq!(latest.racks[1].l2_l3, 9.0);
}

#[tokio::test]
async fn never_observed_current_stays_zero_in_history() {
    let source = Arc::new(ScriptedSource::new(5.0));
    source.fail(MetricKind::BranchCurrent, true);
    let cycle = cycle(source);
    cycle.run().await;

    let slots = cycle.store().current_history();
    assert_eq!(slots[0].racks, [PhaseCurrent::default(); 4]);
    assert_eq!(cycle.store().history().tick(), 1);
}

#[test]
fn address_table_is_a_bijection() {
    let table = AddressTable::build().unwrap();
    let expected: usize = MetricKind::ALL.iter().map(|k| k.point_count()).sum();
    assert_eq!(table.len(), expected);

    let unique: HashSet<&Address> = table.iter().map(|(_, a)| a).collect();
    assert_eq!(unique.len(), expected);

    let again = AddressTable::build().unwrap();
    for (point, address) in table.iter() {
        assert_eq!(again.address(*point), address);
        assert!(address.as_str().starts_with(pdumon_core::BASE_OID));
    }
}

#[tokio::test]
async fn simulated_source_fills_every_view() {
    let addresses = Arc::new(AddressTable::build().unwrap());
    let source = Arc::new(SimulatedSource::new(&addresses));
    let store = Arc::new(MetricStore::new());
    let cycle = CollectionCycle::new(addresses, source, store.clone()).with_receptacles(true);

    let result = cycle.run().await;
    assert!(result.is_clean());
    assert_eq!(result.updated.len(), 4);

    let receptacles = serde_json::to_value(store.receptacle_state()).unwrap();
    assert_eq!(receptacles["enabled"], true);
    assert!(store.total_accumulated_energy().total_energy > 0.0);
    assert_eq!(store.health().status, "ok");
}

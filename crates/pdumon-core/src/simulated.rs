//! Deterministic stand-in for a live PDU, for demos and for running the
//! server without an agent on the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::address::{Address, AddressTable};
use crate::error::{TransportError, Unresolvable};
use crate::source::{MetricSource, Reading};
use crate::topology::MetricPoint;

/// Answers every known address with a plausible, slowly varying value.
///
/// Energy only ever grows, currents and power wobble around a per-rack
/// baseline, and receptacles report on (1) or off (2). Addresses outside the
/// table resolve to `noSuchObject`.
pub struct SimulatedSource {
    points: HashMap<Address, MetricPoint>,
    step: AtomicU64,
}

impl SimulatedSource {
    pub fn new(addresses: &AddressTable) -> Self {
        Self {
            points: addresses
                .iter()
                .map(|(point, address)| (address.clone(), *point))
                .collect(),
            step: AtomicU64::new(0),
        }
    }

    fn value(point: MetricPoint, step: u64) -> f64 {
        let t = step as f64;
        match point {
            MetricPoint::TotalInputPower { rack } => {
                let base = 1800.0 + 150.0 * rack.index() as f64;
                base + 40.0 * (t / 5.0 + rack.index() as f64).sin()
            }
            MetricPoint::AccumulatedEnergy { rack } => {
                1000.0 * rack.number() as f64 + 0.01 * t
            }
            MetricPoint::BranchCurrent { rack, phase } => {
                let base = 4.0 + 0.5 * rack.index() as f64 + 0.2 * phase.index() as f64;
                base + 0.3 * (t / 3.0 + phase.index() as f64).sin()
            }
            MetricPoint::ReceptacleState {
                branch, receptacle, ..
            } => {
                if (branch.index() + receptacle.index()) % 5 == 4 {
                    2.0
                } else {
                    1.0
                }
            }
        }
    }
}

#[async_trait]
impl MetricSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn fetch(&self, batch: &[Address]) -> Result<Vec<Reading>, TransportError> {
        let step = self.step.fetch_add(1, Ordering::Relaxed);
        Ok(batch
            .iter()
            .map(|address| match self.points.get(address) {
                Some(point) => Ok(Self::value(*point, step)),
                None => Err(Unresolvable::NoSuchObject),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::MetricKind;

    #[tokio::test]
    async fn test_answers_every_group() {
        let table = AddressTable::build().unwrap();
        let source = SimulatedSource::new(&table);
        for kind in MetricKind::ALL {
            let readings = source.fetch(&table.batch(kind)).await.unwrap();
            assert_eq!(readings.len(), kind.point_count());
            assert!(readings.iter().all(|r| r.is_ok_and(f64::is_finite)));
        }
    }

    #[tokio::test]
    async fn test_energy_never_decreases() {
        let table = AddressTable::build().unwrap();
        let source = SimulatedSource::new(&table);
        let batch = table.batch(MetricKind::AccumulatedEnergy);
        let first = source.fetch(&batch).await.unwrap();
        let second = source.fetch(&batch).await.unwrap();
        for (a, b) in first.iter().zip(&second) {
            assert!(b.unwrap() >= a.unwrap());
        }
    }

    #[tokio::test]
    async fn test_unknown_address() {
        let table = AddressTable::build().unwrap();
        let source = SimulatedSource::new(&table);
        let readings = source.fetch(&[Address::from("1.3.6.1.2.1.1.1.0")]).await.unwrap();
        assert_eq!(readings, vec![Err(Unresolvable::NoSuchObject)]);
    }
}

//! One polling round: fetch every enabled metric group, commit what resolved,
//! refresh the energy totals, and append the retained current to the history.
//!
//! Groups are fetched concurrently and each commits as soon as its own
//! response arrives. Failures never escape [`CollectionCycle::run`]:
//!
//! - an unresolvable value is skipped and its previous value stays in place;
//! - a failed or timed-out batch skips that group for this cycle only.
//!
//! Both are reported as [`CycleWarning`]s in the [`CycleResult`] and logged.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::address::{Address, AddressTable};
use crate::error::{TransportError, Unresolvable};
use crate::snapshot::MetricStore;
use crate::source::MetricSource;
use crate::topology::{MetricKind, MetricPoint};

/// Default upper bound on one group fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Something that went wrong in a cycle without stopping it.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleWarning {
    /// One value did not resolve; its previous value was kept.
    Unresolvable {
        point: MetricPoint,
        address: Address,
        reason: Unresolvable,
    },
    /// A whole group fetch failed; all its previous values were kept.
    TransportFailure { kind: MetricKind, error: String },
}

impl std::fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolvable {
                point,
                address,
                reason,
            } => write!(f, "{reason}: {address} ({point})"),
            Self::TransportFailure { kind, error } => write!(f, "{kind} fetch failed: {error}"),
        }
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleResult {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Groups whose batch was answered (possibly with some unresolved values).
    pub updated: Vec<MetricKind>,
    /// Groups skipped because the batch failed.
    pub failed: Vec<MetricKind>,
    pub warnings: Vec<CycleWarning>,
    /// Energy sum written to both totals.
    pub total_energy: f64,
}

impl CycleResult {
    /// No warnings of any kind.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn unresolvable_count(&self) -> u64 {
        self.warnings
            .iter()
            .filter(|w| matches!(w, CycleWarning::Unresolvable { .. }))
            .count() as u64
    }
}

struct GroupReport {
    kind: MetricKind,
    warnings: Vec<CycleWarning>,
    failed: bool,
}

impl GroupReport {
    fn failed(kind: MetricKind, error: &TransportError) -> Self {
        Self {
            kind,
            warnings: vec![CycleWarning::TransportFailure {
                kind,
                error: error.to_string(),
            }],
            failed: true,
        }
    }
}

/// Collection pipeline bound to an address table, a source, and a store.
pub struct CollectionCycle {
    addresses: Arc<AddressTable>,
    source: Arc<dyn MetricSource>,
    store: Arc<MetricStore>,
    fetch_timeout: Duration,
    poll_receptacles: bool,
}

impl CollectionCycle {
    pub fn new(
        addresses: Arc<AddressTable>,
        source: Arc<dyn MetricSource>,
        store: Arc<MetricStore>,
    ) -> Self {
        Self {
            addresses,
            source,
            store,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            poll_receptacles: false,
        }
    }

    /// Bound each group fetch; a timeout counts as a transport failure.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Also fetch receptacle state, as one batch per cycle.
    ///
    /// That batch is a single GET of 144 OIDs. An agent whose response would
    /// exceed its maximum message size answers `tooBig` (error-status 1), and
    /// then only the receptacle group fails each cycle.
    pub fn with_receptacles(mut self, enabled: bool) -> Self {
        self.poll_receptacles = enabled;
        self.store.set_receptacles_enabled(enabled);
        self
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    /// Groups fetched each cycle.
    pub fn enabled_groups(&self) -> Vec<MetricKind> {
        MetricKind::ALL
            .into_iter()
            .filter(|k| *k != MetricKind::ReceptacleState || self.poll_receptacles)
            .collect()
    }

    /// Run one cycle.
    pub async fn run(&self) -> CycleResult {
        let receptacles = async {
            if self.poll_receptacles {
                Some(self.collect(MetricKind::ReceptacleState).await)
            } else {
                None
            }
        };
        let (power, energy, current, receptacles) = tokio::join!(
            self.collect(MetricKind::TotalInputPower),
            self.collect(MetricKind::AccumulatedEnergy),
            self.collect(MetricKind::BranchCurrent),
            receptacles,
        );

        let total_energy = self.store.refresh_totals();

        // A group that failed this cycle still contributes its retained values.
        self.store.history().append(&self.store.current_sample());

        let mut result = CycleResult {
            cycle: 0,
            updated: Vec::new(),
            failed: Vec::new(),
            warnings: Vec::new(),
            total_energy,
        };
        for report in [Some(power), Some(energy), Some(current), receptacles]
            .into_iter()
            .flatten()
        {
            if report.failed {
                result.failed.push(report.kind);
            } else {
                result.updated.push(report.kind);
            }
            result.warnings.extend(report.warnings);
        }

        result.cycle = self
            .store
            .record_cycle(result.unresolvable_count(), result.failed.len() as u64);

        for warning in &result.warnings {
            warn!("cycle {}: {warning}", result.cycle);
        }
        debug!(
            "cycle {} complete: {} groups updated, {} failed, total energy {} kWh",
            result.cycle,
            result.updated.len(),
            result.failed.len(),
            total_energy
        );
        result
    }

    async fn collect(&self, kind: MetricKind) -> GroupReport {
        let group = self.addresses.group(kind);
        let batch: Vec<Address> = group.iter().map(|(_, a)| a.clone()).collect();

        let readings =
            match tokio::time::timeout(self.fetch_timeout, self.source.fetch(&batch)).await {
                Ok(Ok(readings)) => readings,
                Ok(Err(e)) => return GroupReport::failed(kind, &e),
                Err(_) => return GroupReport::failed(kind, &TransportError::Timeout),
            };

        let mut resolved = Vec::with_capacity(group.len());
        let mut warnings = Vec::new();
        for (i, (point, address)) in group.iter().enumerate() {
            let reading = readings
                .get(i)
                .copied()
                .unwrap_or(Err(Unresolvable::Missing));
            match reading {
                Ok(value) if value.is_finite() => resolved.push((*point, value)),
                Ok(_) => warnings.push(CycleWarning::Unresolvable {
                    point: *point,
                    address: address.clone(),
                    reason: Unresolvable::NotNumeric,
                }),
                Err(reason) => warnings.push(CycleWarning::Unresolvable {
                    point: *point,
                    address: address.clone(),
                    reason,
                }),
            }
        }

        self.store.commit(kind, &resolved);
        GroupReport {
            kind,
            warnings,
            failed: false,
        }
    }
}

//! # pdumon-core
//!
//! **Polls a rack PDU over SNMP and keeps the latest readings in memory.**
//!
//! `pdumon-core` collects total input power, accumulated energy, per-phase
//! branch current and (optionally) receptacle state from a four-rack Liebert
//! MPH power distribution unit, and serves them as JSON-ready views.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use pdumon_core::{AddressTable, CollectionCycle, MetricStore, Scheduler, SimulatedSource};
//!
//! # async fn demo() -> Result<(), pdumon_core::ConfigError> {
//! let addresses = Arc::new(AddressTable::build()?);
//! let source = Arc::new(SimulatedSource::new(&addresses));
//! let store = Arc::new(MetricStore::new());
//!
//! let cycle = CollectionCycle::new(addresses, source, store.clone());
//! let handle = Scheduler::new(cycle, Duration::from_secs(1)).start();
//!
//! tokio::time::sleep(Duration::from_secs(3)).await;
//! println!("{} kWh", store.total_accumulated_energy().total_energy);
//! handle.abort();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Scheduler → CollectionCycle → MetricSource (SNMP / simulated) → MetricStore → query views
//!
//! Every metric group is one batch request per cycle. A batch that fails
//! leaves that group's previous values in place; a single value that does not
//! resolve leaves only that value in place. The store therefore always holds
//! the last value successfully observed for every point.

pub mod address;
pub mod config;
pub mod cycle;
pub mod error;
pub mod history;
pub mod query;
pub mod scheduler;
pub mod simulated;
pub mod snapshot;
pub mod snmp;
pub mod source;
pub mod topology;

pub use address::{Address, AddressTable, BASE_OID};
pub use config::CollectorConfig;
pub use cycle::{CollectionCycle, CycleResult, CycleWarning, DEFAULT_FETCH_TIMEOUT};
pub use error::{ConfigError, TransportError, Unresolvable};
pub use history::{CurrentSample, HistoryEntry, RollingHistory, TICK_SIZE};
pub use query::{
    AccumulatedEnergyView, CurrentView, HealthView, InputPowerView, ReceptacleView,
    TotalEnergyView,
};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use simulated::SimulatedSource;
pub use snapshot::{CollectorStats, MetricStore, PhaseCurrent, RackReceptacles, Snapshot};
pub use snmp::SnmpSource;
pub use source::{MetricSource, Reading};
pub use topology::{
    BRANCHES, Branch, LINE_MAP, MetricKind, MetricPoint, PHASES, Phase, RACKS, RECEPTACLES,
    Rack, Receptacle,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod addresses;
pub mod poll;
pub mod serve;

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use log::info;

use pdumon_core::{
    AddressTable, CollectionCycle, CollectorConfig, ConfigError, MetricSource, MetricStore,
    SimulatedSource, SnmpSource,
};

/// Collector options shared by `serve` and `poll`. Each flag overrides the
/// matching key of `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct CollectorArgs {
    /// JSON config file; flags given on the command line take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SNMP agent as host:port (default: 192.168.1.103:161)
    #[arg(long)]
    pub agent: Option<String>,

    /// SNMPv2c community string (default: LiebertEM)
    #[arg(long)]
    pub community: Option<String>,

    /// Milliseconds between collection cycles (default: 1000)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Per-request SNMP timeout in milliseconds (default: 800)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// SNMP retries after a timeout (default: 1)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Upper bound on one group fetch including retries, in milliseconds (default: 2000)
    #[arg(long)]
    pub fetch_timeout_ms: Option<u64>,

    /// Also collect receptacle state (one extra batch per cycle)
    #[arg(long)]
    pub poll_receptacles: bool,

    /// Use a simulated PDU instead of the SNMP agent
    #[arg(long)]
    pub simulate: bool,
}

impl CollectorArgs {
    /// Defaults, then the config file, then flags.
    pub fn resolve(&self) -> Result<CollectorConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => CollectorConfig::load(path)?,
            None => CollectorConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut CollectorConfig) {
        if let Some(agent) = &self.agent {
            config.agent = agent.clone();
        }
        if let Some(community) = &self.community {
            config.community = community.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.interval_ms = interval_ms;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(fetch_timeout_ms) = self.fetch_timeout_ms {
            config.fetch_timeout_ms = fetch_timeout_ms;
        }
        if self.poll_receptacles {
            config.poll_receptacles = true;
        }
    }
}

/// Print a fatal error and exit non-zero.
pub fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("error: {context}: {err}");
    std::process::exit(1);
}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap_or_else(|e| fail("cannot start tokio runtime", e))
}

/// Build the address table, source and cycle for `config`. Exits on any error.
pub async fn make_cycle(
    config: &CollectorConfig,
    simulate: bool,
    store: Arc<MetricStore>,
) -> CollectionCycle {
    let addresses = Arc::new(AddressTable::build().unwrap_or_else(|e| fail("address table", e)));

    let source: Arc<dyn MetricSource> = if simulate {
        Arc::new(SimulatedSource::new(&addresses))
    } else {
        let snmp = SnmpSource::from_config(config)
            .await
            .unwrap_or_else(|e| fail(&format!("agent {}", config.agent), e));
        info!("polling {} (community {:?})", snmp.agent(), config.community);
        Arc::new(snmp)
    };

    CollectionCycle::new(addresses, source, store)
        .with_fetch_timeout(config.fetch_timeout())
        .with_receptacles(config.poll_receptacles)
}

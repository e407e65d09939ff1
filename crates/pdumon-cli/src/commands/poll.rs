use std::sync::Arc;

use pdumon_core::MetricStore;

use super::CollectorArgs;

/// One cycle, then every view as a single JSON document.
pub fn run(args: &CollectorArgs) {
    let config = args
        .resolve()
        .unwrap_or_else(|e| super::fail("configuration", e));

    let rt = super::runtime();
    let (store, result) = rt.block_on(async {
        let store = Arc::new(MetricStore::new());
        let cycle = super::make_cycle(&config, args.simulate, store.clone()).await;
        let result = cycle.run().await;
        (store, result)
    });

    let report = serde_json::json!({
        "totalAccumEnergy": store.total_accumulated_energy(),
        "accumEnergy": store.accumulated_energy(),
        "totalInEnergy": store.total_input_power(),
        "current": store.current(),
        "receptacles": store.receptacle_state(),
        "failed": result.failed.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "warnings": result.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
    });
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => super::fail("cannot encode report", e),
    }

    if !result.failed.is_empty() {
        std::process::exit(2);
    }
}

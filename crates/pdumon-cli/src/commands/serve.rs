use std::sync::Arc;

use pdumon_core::{MetricStore, Scheduler};

use super::CollectorArgs;

pub fn run(args: &CollectorArgs, host: Option<String>, port: Option<u16>) {
    let mut config = args
        .resolve()
        .unwrap_or_else(|e| super::fail("configuration", e));
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let base = format!("http://{}:{}", config.host, config.port);
    let source = if args.simulate {
        "simulated PDU".to_string()
    } else {
        format!("SNMP agent {}", config.agent)
    };

    println!("pdumon v{}", pdumon_core::VERSION);
    println!("   {base}");
    println!("   polling {source} every {} ms", config.interval_ms);
    if config.poll_receptacles {
        println!("   receptacle state enabled");
    }
    println!();
    println!("   Endpoints:");
    println!("     GET /totalAccumEnergy   Energy summed over all racks");
    println!("     GET /accumEnergy        Energy per rack plus the sum");
    println!("     GET /totalInEnergy      Input power per rack");
    println!("     GET /current            Branch current per rack and phase");
    println!("     GET /currentQueue       Last 10 current readings");
    println!("     GET /receptacles        Receptacle state");
    println!("     GET /health             Collector status and counters");
    println!();

    let rt = super::runtime();
    rt.block_on(async {
        let store = Arc::new(MetricStore::new());
        let cycle = super::make_cycle(&config, args.simulate, store.clone()).await;
        let scheduler = Scheduler::new(cycle, config.interval()).start();

        let served = pdumon_server::run_server(store, &config.host, config.port).await;
        scheduler.abort();
        if let Err(e) = served {
            super::fail(&format!("cannot serve on {base}"), e);
        }
    });
}

use pdumon_core::{AddressTable, MetricKind};

pub fn run(json: bool) {
    let table = AddressTable::build().unwrap_or_else(|e| super::fail("address table", e));

    if json {
        let entries: Vec<serde_json::Value> = table
            .iter()
            .map(|(point, address)| {
                serde_json::json!({
                    "kind": point.kind().to_string(),
                    "point": point.to_string(),
                    "address": address.as_str(),
                })
            })
            .collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(out) => println!("{out}"),
            Err(e) => super::fail("cannot encode table", e),
        }
        return;
    }

    for kind in MetricKind::ALL {
        let group = table.group(kind);
        println!("{kind} ({} points, {})", group.len(), kind.units());
        for (point, address) in group {
            println!("  {:<28} {address}", point.to_string());
        }
        println!();
    }
    println!("{} addresses", table.len());
}

//! CLI for pdumon: poll a Liebert MPH rack PDU over SNMP and serve the readings.

mod commands;

use clap::{Parser, Subcommand};

use commands::CollectorArgs;

#[derive(Parser)]
#[command(name = "pdumon")]
#[command(about = "pdumon: rack PDU power, energy and current over SNMP")]
#[command(version = pdumon_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the PDU continuously and serve the latest readings over HTTP
    Serve {
        #[command(flatten)]
        collector: CollectorArgs,

        /// Address to bind the HTTP server to (default: 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// HTTP port (default: 8888)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a single collection cycle and print every view as JSON
    Poll {
        #[command(flatten)]
        collector: CollectorArgs,
    },

    /// Print the OID of every metric point
    Addresses {
        /// Emit a JSON array instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            collector,
            host,
            port,
        } => commands::serve::run(&collector, host, port),
        Commands::Poll { collector } => commands::poll::run(&collector),
        Commands::Addresses { json } => commands::addresses::run(json),
    }
}

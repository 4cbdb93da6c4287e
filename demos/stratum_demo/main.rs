//! # stratum demo application
//!
//! A sample CLI tool that stacks configuration layers with stratum. It
//! exists to demonstrate and manually verify the library.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example stratum_demo -- show
//! cargo run --example stratum_demo -- --file app.json show --key server.address
//! STRATUM_DEMO_SERVER_PORT=9999 cargo run --example stratum_demo -- show
//! cargo run --example stratum_demo -- watch app.properties --interval-ms 500
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature            | How to exercise it                                        |
//! |--------------------|-----------------------------------------------------------|
//! | Item defaults      | `show`                                                    |
//! | File layers        | `--file a.json --file b.toml show` (later files win)      |
//! | Optional files     | `--optional --file missing.json show`                     |
//! | Env layer          | `STRATUM_DEMO_SERVER_HOST=0.0.0.0 ... show`               |
//! | Strict mode        | `--strict --file with_typo.json show`                     |
//! | Lazy items         | `show --key server.address`                               |
//! | Background refresh | `watch app.properties`, then edit the file                |

mod config;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use stratum::{Config, Feature, StratumError, process_env_source};

use config::{DemoItems, demo_config};

/// stratum demo: stack config layers and print the result.
#[derive(Parser, Debug)]
#[command(name = "stratum-demo")]
struct Cli {
    /// Config files to stack, lowest priority first.
    #[arg(long = "file", global = true)]
    files: Vec<PathBuf>,

    /// Skip files that do not exist.
    #[arg(long, global = true)]
    optional: bool,

    /// Reject keys no item declares.
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print resolved values.
    Show {
        /// Print only this dotted item name.
        #[arg(long)]
        key: Option<String>,
    },
    /// Reload a file periodically and print each refresh.
    Watch {
        file: PathBuf,
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many milliseconds.
        #[arg(long, default_value_t = 30_000)]
        run_ms: u64,
    },
}

fn build(cli: &Cli) -> Result<(Config, DemoItems), StratumError> {
    let (defaults, items) = demo_config()?;
    if cli.strict {
        defaults.enable(Feature::FailOnUnknownPath);
    }
    if cli.optional {
        defaults.disable(Feature::FailOnUnfoundSource);
    }
    let mut layer = defaults;
    for file in &cli.files {
        layer = layer.from_files().file(file)?;
    }
    let env = process_env_source(Some("STRATUM_DEMO"))?;
    Ok((layer.with_source(&env)?, items))
}

fn show(config: &Config, items: &DemoItems, key: Option<&str>) -> Result<(), StratumError> {
    match key {
        Some(name) => println!("{name}  {}", config.get_by_name(name)?),
        None => {
            println!("layers: {}", config.layer_names().join(" -> "));
            println!("host: {}", config.get(&items.host)?);
            println!("address: {}", config.get(&items.address)?);
            println!("timeout: {:?}", config.get(&items.timeout)?);
            for (name, value) in config.to_flat_map()? {
                println!("{name}={value}");
            }
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), StratumError> {
    let (config, items) = build(&cli)?;
    match &cli.command {
        Commands::Show { key } => show(&config, &items, key.as_deref()),
        Commands::Watch {
            file,
            interval_ms,
            run_ms,
        } => {
            let port = items.port.clone();
            let workers = items.workers.clone();
            let color = items.color.clone();
            let refresh = config
                .from_files()
                .watch_file(file, Duration::from_millis(*interval_ms))?
                .on_load(move |layer| {
                    let port = layer.get(&port).map(|p| p.to_string());
                    let workers = layer.get(&workers).map(|w| w.to_string());
                    let color = layer.get(&color);
                    println!("refreshed: port={port:?} workers={workers:?} color={color:?}");
                })
                .on_error(|e| eprintln!("refresh failed: {e}"));
            println!("watching {} in layer {}", file.display(), refresh.layer().name());
            let handle = refresh.spawn()?;
            std::thread::sleep(Duration::from_millis(*run_ms));
            handle.stop();
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Failed to load config:\n{e}");
        std::process::exit(1);
    }
}

//! Item declarations for the stratum demo application.
//!
//! Two specs, `server` and `display`, with one lazy item derived from the
//! others.
//!
//! # Env var mapping
//!
//! With the prefix `STRATUM_DEMO`, each `_` after the prefix becomes a `.`
//! and the key is lower-cased:
//!
//! | Env var                       | Item              |
//! |-------------------------------|-------------------|
//! | `STRATUM_DEMO_SERVER_HOST`    | `server.host`     |
//! | `STRATUM_DEMO_SERVER_PORT`    | `server.port`     |
//! | `STRATUM_DEMO_SERVER_WORKERS` | `server.workers`  |
//! | `STRATUM_DEMO_DISPLAY_COLOR`  | `display.color`   |

use std::time::Duration;

use stratum::{Config, Item, Spec, StratumError};

pub struct DemoItems {
    pub host: Item<String>,
    pub port: Item<u16>,
    pub workers: Item<usize>,
    pub timeout: Item<Duration>,
    pub address: Item<String>,
    pub color: Item<String>,
}

/// A root layer with the demo specs registered.
pub fn demo_config() -> Result<(Config, DemoItems), StratumError> {
    let mut server = Spec::new("server");
    let host = server.optional("host", "127.0.0.1".to_string(), "Address to bind.");
    let port = server.optional("port", 3000u16, "Port to bind.");
    let workers = server.optional("workers", 4usize, "Worker threads.");
    let timeout = server.optional("timeout", Duration::from_secs(30), "Request timeout.");
    let (h, p) = (host.clone(), port.clone());
    let address = server.lazy("address", "Derived bind address.", move |c: &Config| {
        Ok(format!("{}:{}", c.get(&h)?, c.get(&p)?))
    });

    let mut display = Spec::new("display");
    let color = display.optional("color", "yellow".to_string(), "Output color.");

    let config = Config::named("defaults");
    config.add_spec(server)?;
    config.add_spec(display)?;

    let items = DemoItems {
        host,
        port,
        workers,
        timeout,
        address,
        color,
    };
    Ok((config, items))
}

//! Portico gateway: command-line entry point.
//!
//! ```text
//! portico <config-file> < request.json > response.json
//! ```
//!
//! Loads the gateway configuration (TOML, YAML or JSON), reads one JSON
//! request from stdin, runs it through the gateway and prints the response
//! JSON on stdout.  Logs go to stderr.
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | `portico_gateway=info` | Log filter directives. |

use anyhow::Context;
use portico_gateway::backend::HttpAdapter;
use portico_gateway::config::load_config;
use portico_gateway::gateway::Gateway;
use portico_gateway::kernel::Request;
use std::io::Read;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("portico_gateway=info".parse()?),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: portico <config-file> < request.json")?;
    let config = load_config(&path).with_context(|| format!("loading {path}"))?;
    info!(gateway_id = %config.id, routes = config.routes.len(), "configuration loaded");

    let gateway = Gateway::builder(config)
        .with_adapter(Arc::new(HttpAdapter::new()?))
        .build()
        .await?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading request from stdin")?;
    let request: Request = serde_json::from_str(&input).context("parsing request JSON")?;

    let response = gateway.handle(request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

//! `netviz` command-line viewer.
//!
//! Loads a topology snapshot file, runs it through the same store a
//! graphical front end would use, applies any requested collapse toggles and
//! prints the positioned view.
//!
//! ```text
//! main()
//!  └─ load ViewerConfig          -- --config or the platform config file
//!  └─ FileBackend::open          -- --snapshot or [backend] snapshot_path
//!  └─ TopologySession::fetch     -- --filter / --site or [viewer] defaults
//!  └─ toggle_collapse per --collapse
//!  └─ print view                 -- table, or JSON with --json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use netviz_client::application::session::TopologySession;
use netviz_client::application::snapshot_store::{MutationOutcome, TopologyStore};
use netviz_client::infrastructure::backend::FileBackend;
use netviz_client::infrastructure::storage::config::{load_config, load_config_from, ViewerConfig};
use netviz_core::protocol::{TopologyFilter, TopologyQuery};
use netviz_core::TopologyView;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Hierarchical network topology viewer.
#[derive(Debug, Parser)]
#[command(name = "netviz", about = "Lay out and print a network topology snapshot", version)]
struct Cli {
    /// JSON topology snapshot to load.
    #[arg(long, env = "NETVIZ_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Config file to use instead of the platform default.
    #[arg(long, env = "NETVIZ_CONFIG")]
    config: Option<PathBuf>,

    /// Node filter: all, online, offline or infrastructure.
    #[arg(long)]
    filter: Option<TopologyFilter>,

    /// Site to request from the backend.
    #[arg(long)]
    site: Option<String>,

    /// Toggle the collapse state of a node (repeatable).
    #[arg(long = "collapse", value_name = "ID")]
    collapse: Vec<String>,

    /// Write accepted changes back to the snapshot file.
    #[arg(long)]
    persist: bool,

    /// Print the view as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn query(&self, config: &ViewerConfig) -> TopologyQuery {
        TopologyQuery {
            filter: self.filter.unwrap_or(config.viewer.default_filter),
            site: self.site.clone().or_else(|| config.viewer.site.clone()),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, default_config_error) = match &cli.config {
        Some(path) => (
            load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None,
        ),
        None => match load_config() {
            Ok(config) => (config, None),
            Err(e) => (ViewerConfig::default(), Some(e)),
        },
    };

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.viewer.log_level)),
        )
        .init();
    if let Some(e) = default_config_error {
        warn!(error = %e, "could not load config, using defaults");
    }

    let snapshot_path = cli
        .snapshot
        .clone()
        .or_else(|| config.backend.snapshot_path.clone())
        .context("no snapshot file given (use --snapshot or [backend] snapshot_path)")?;

    let backend = FileBackend::open(&snapshot_path, cli.persist)
        .await
        .with_context(|| format!("failed to open snapshot {}", snapshot_path.display()))?;
    let store = Arc::new(TopologyStore::new(
        Arc::new(backend),
        config.layout.to_params(),
    ));
    let mut session = TopologySession::new(store);

    let query = cli.query(&config);
    info!(filter = %query.filter, site = ?query.site, "fetching topology");
    session.fetch(query).await.context("initial fetch failed")?;

    for id in &cli.collapse {
        match session.toggle_collapse(id).await {
            Ok(MutationOutcome::Applied) => info!(node_id = %id, "collapse toggled"),
            Ok(MutationOutcome::Reverted(reason)) => {
                warn!(node_id = %id, %reason, "collapse toggle reverted")
            }
            Err(e) => warn!(node_id = %id, error = %e, "collapse toggle rejected"),
        }
    }

    let view = session.view().await;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", render_table(&view));
    }

    session.dispose().await;
    Ok(())
}

/// Formats the view as an indented table in pre-order.
fn render_table(view: &TopologyView) -> String {
    let mut out = format!(
        "{:<40} {:<13} {:>8} {:>8}  {}\n",
        "NODE", "TYPE", "X", "Y", "FLAGS"
    );
    for node in view.nodes() {
        let name = format!("{}{}", "  ".repeat(node.depth), node.label);
        let mut flags = Vec::new();
        if node.is_collapsed {
            flags.push(format!("collapsed(+{})", node.collapsed_child_count));
        }
        if node.is_orphan {
            flags.push("orphan".to_string());
        }
        if let Some(status) = &node.status {
            flags.push(status.clone());
        }
        out.push_str(&format!(
            "{:<40} {:<13} {:>8.1} {:>8.1}  {}\n",
            name,
            node.node_type.as_str(),
            node.x,
            node.y,
            flags.join(",")
        ));
    }
    out.push_str(&format!(
        "{} visible, {} hidden, {} edges\n",
        view.nodes().len(),
        view.hidden_count,
        view.edges.len()
    ));
    for link in &view.broken_links {
        out.push_str(&format!(
            "cycle: dropped link {} -> {}\n",
            link.child, link.parent
        ));
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

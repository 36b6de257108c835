//! Show discovered peers and their identities.

use anyhow::{Context, Result};
use mesh_controller::{Config, PeerIdentity, Reconciler};

/// Discover and resolve; print one line per peer. Nothing is written.
pub async fn run(config: Config) -> Result<()> {
    let reconciler = Reconciler::from_config(&config).context("Failed to set up clients")?;
    let identities = reconciler
        .survey()
        .await
        .context("Failed to resolve peers")?;

    print!("{}", render(&config.discovery.group, &identities));
    Ok(())
}

fn render(group: &str, identities: &[PeerIdentity]) -> String {
    if identities.is_empty() {
        return format!("No running peers in {}\n", group);
    }

    let width = identities
        .iter()
        .map(|p| p.peer.to_string().len())
        .max()
        .unwrap_or(0)
        .max("ADDRESS".len());

    let mut out = format!("{:<width$}  DEVICE\n", "ADDRESS", width = width);
    for p in identities {
        out.push_str(&format!(
            "{:<width$}  {}\n",
            p.peer.to_string(),
            p.device,
            width = width
        ));
    }
    out
}

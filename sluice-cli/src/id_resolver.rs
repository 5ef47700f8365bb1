//! ID resolver module
//!
//! Resolves run id prefixes to full UUIDs by listing recent runs, so users
//! can type `sluice run get 3f2a` instead of the whole id.

use anyhow::{Context, Result, anyhow};
use sluice_client::OrchestratorClient;
use uuid::Uuid;

use crate::types::IdOrPrefix;

/// Resolve a run ID or prefix to a full UUID
///
/// A full UUID is returned as is without contacting the orchestrator.
///
/// # Errors
/// Returns an error if no run or more than one run matches the prefix, or
/// if the runs cannot be listed.
pub async fn resolve_run_id(client: &OrchestratorClient, id_or_prefix: &IdOrPrefix) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let runs = client
        .list_runs()
        .await
        .context("Failed to fetch runs for ID resolution")?;

    pick_unique(runs.iter().map(|r| r.run_id), id_or_prefix)
}

/// The single id in `ids` matching `id_or_prefix`
fn pick_unique(ids: impl Iterator<Item = Uuid>, id_or_prefix: &IdOrPrefix) -> Result<Uuid> {
    let matches: Vec<Uuid> = ids.filter(|id| id_or_prefix.matches(id)).collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No run found with ID starting with '{}'", id_or_prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple runs: {}",
                id_or_prefix,
                ids.join(", ")
            ))
        }
    }
}

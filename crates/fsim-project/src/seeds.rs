//! Tear-stream seeds stored next to a project as JSON.
//!
//! The file holds the calculation sequence with its initial tear streams,
//! so a later run of the same project starts from the converged values of
//! the previous one.

use std::path::Path;

use fsim_core::store::MemoryStore;
use fsim_sim::Flowsheet;
use tracing::debug;

use crate::ProjectResult;

pub fn save_seeds(path: &Path, flowsheet: &Flowsheet) -> ProjectResult<()> {
    let mut store = MemoryStore::new();
    flowsheet.sequence().save(&mut store);
    std::fs::write(path, serde_json::to_string_pretty(&store)?)?;
    debug!(path = %path.display(), "saved tear-stream seeds");
    Ok(())
}

/// Replace the flowsheet's sequence with the stored one.
///
/// The sequence is kept on the next initialization as long as it still
/// matches the flowsheet; otherwise a fresh one is determined and the
/// seeds are dropped.
pub fn load_seeds(path: &Path, flowsheet: &mut Flowsheet) -> ProjectResult<()> {
    let content = std::fs::read_to_string(path)?;
    let store: MemoryStore = serde_json::from_str(&content)?;
    flowsheet.sequence_mut().load(&store)?;
    flowsheet.set_topology_modified(false);
    debug!(path = %path.display(), "loaded tear-stream seeds");
    Ok(())
}

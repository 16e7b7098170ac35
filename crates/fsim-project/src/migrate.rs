//! Schema migration framework.

use std::collections::BTreeSet;

use crate::ProjectError;
use crate::schema::{Project, StreamDef};

pub const LATEST_VERSION: u32 = 2;

pub fn migrate_to_latest(mut project: Project) -> Result<Project, ProjectError> {
    while project.version < LATEST_VERSION {
        project = migrate_one_version(project)?;
    }
    Ok(project)
}

fn migrate_one_version(project: Project) -> Result<Project, ProjectError> {
    match project.version {
        0 => migrate_v0_to_v1(project),
        1 => migrate_v1_to_v2(project),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

fn migrate_v0_to_v1(mut project: Project) -> Result<Project, ProjectError> {
    project.version = 1;
    Ok(project)
}

/// Version 1 declared streams implicitly through unit ports; version 2
/// lists every stream explicitly.
fn migrate_v1_to_v2(mut project: Project) -> Result<Project, ProjectError> {
    let declared: BTreeSet<String> = project.streams.iter().map(|s| s.id.clone()).collect();
    let mut implicit = BTreeSet::new();
    for unit in &project.units {
        for stream in unit.ports.values() {
            if !declared.contains(stream) {
                implicit.insert(stream.clone());
            }
        }
    }
    project.streams.extend(implicit.into_iter().map(|id| StreamDef {
        name: id.clone(),
        id,
    }));

    project.version = 2;
    Ok(project)
}

//! Project validation logic.
//!
//! Checks what the file format itself guarantees: unique ids, resolvable
//! references and sane parameter values. Wiring rules (every port
//! connected, one producer and one consumer per stream) and material
//! uniqueness are checked by the flowsheet before a run.

use std::collections::HashSet;

use crate::schema::{FeedPointDef, MaterialsDef, Project, UnitDef, UnitKind};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

/// Port names a unit kind exposes, inlets first.
pub fn port_names(kind: &UnitKind) -> &'static [&'static str] {
    match kind {
        UnitKind::Feed { .. } => &["Out"],
        UnitKind::Mixer => &["In1", "In2", "Out"],
        UnitKind::Splitter { .. } => &["In", "Out1", "Out2"],
        UnitKind::Product => &["In"],
        UnitKind::Lag { .. } => &["In", "Out"],
    }
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    project
        .options
        .validate()
        .map_err(|e| ValidationError::InvalidValue {
            field: "options".to_string(),
            value: e.to_string(),
            reason: "run options are inconsistent".to_string(),
        })?;

    if project.materials.classes == 0 {
        return Err(ValidationError::InvalidValue {
            field: "materials classes".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let mut stream_ids = HashSet::new();
    for stream in &project.streams {
        if !stream_ids.insert(&stream.id) {
            return Err(ValidationError::DuplicateId {
                id: stream.id.clone(),
                context: "streams".to_string(),
            });
        }
    }

    let mut unit_ids = HashSet::new();
    for unit in &project.units {
        if !unit_ids.insert(&unit.id) {
            return Err(ValidationError::DuplicateId {
                id: unit.id.clone(),
                context: "units".to_string(),
            });
        }
        validate_unit(unit, &stream_ids, &project.materials)?;
    }

    if let Some(sequence) = &project.sequence {
        for (i, partition) in sequence.partitions.iter().enumerate() {
            for id in &partition.units {
                if !unit_ids.contains(id) {
                    return Err(ValidationError::MissingReference {
                        id: id.clone(),
                        context: format!("sequence partition {i} units"),
                    });
                }
            }
            for id in &partition.tears {
                if !stream_ids.contains(id) {
                    return Err(ValidationError::MissingReference {
                        id: id.clone(),
                        context: format!("sequence partition {i} tears"),
                    });
                }
            }
        }
    }

    Ok(())
}

fn validate_unit(
    unit: &UnitDef,
    stream_ids: &HashSet<&String>,
    materials: &MaterialsDef,
) -> Result<(), ValidationError> {
    let allowed = port_names(&unit.kind);
    for (port, stream) in &unit.ports {
        if !allowed.contains(&port.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: format!("unit '{}' port", unit.name),
                value: port.clone(),
                reason: format!("{} has ports {}", unit.kind.type_name(), allowed.join(", ")),
            });
        }
        if !stream_ids.contains(stream) {
            return Err(ValidationError::MissingReference {
                id: stream.clone(),
                context: format!("unit '{}' port '{}'", unit.name, port),
            });
        }
    }

    match &unit.kind {
        UnitKind::Feed { points } => {
            for point in points {
                validate_feed_point(unit, point, materials)?;
            }
        }
        UnitKind::Splitter { fraction } => {
            if !fraction.is_finite() || !(0.0..=1.0).contains(fraction) {
                return Err(ValidationError::InvalidValue {
                    field: format!("unit '{}' fraction", unit.name),
                    value: fraction.to_string(),
                    reason: "must be within [0, 1]".to_string(),
                });
            }
        }
        UnitKind::Lag { tau_s } => {
            if !tau_s.is_finite() || *tau_s <= 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: format!("unit '{}' tau_s", unit.name),
                    value: tau_s.to_string(),
                    reason: "must be positive and finite".to_string(),
                });
            }
        }
        UnitKind::Mixer | UnitKind::Product => {}
    }
    Ok(())
}

fn validate_feed_point(
    unit: &UnitDef,
    point: &FeedPointDef,
    materials: &MaterialsDef,
) -> Result<(), ValidationError> {
    let field = |name: &str| format!("unit '{}' point at {} s {}", unit.name, point.time_s, name);

    if !point.time_s.is_finite() || point.time_s < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: format!("unit '{}' time_s", unit.name),
            value: point.time_s.to_string(),
            reason: "must be non-negative and finite".to_string(),
        });
    }
    if !point.mass_flow_kg_s.is_finite() || point.mass_flow_kg_s < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field("mass_flow_kg_s"),
            value: point.mass_flow_kg_s.to_string(),
            reason: "must be non-negative and finite".to_string(),
        });
    }
    if !point.temperature_k.is_finite() || point.temperature_k <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field("temperature_k"),
            value: point.temperature_k.to_string(),
            reason: "must be positive and finite".to_string(),
        });
    }
    if !point.pressure_pa.is_finite() || point.pressure_pa <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field("pressure_pa"),
            value: point.pressure_pa.to_string(),
            reason: "must be positive and finite".to_string(),
        });
    }

    for (phase, def) in &point.phases {
        if !materials.phases.contains(phase) {
            return Err(ValidationError::MissingReference {
                id: phase.clone(),
                context: field("phases"),
            });
        }
        if !def.fraction.is_finite() || !(0.0..=1.0).contains(&def.fraction) {
            return Err(ValidationError::InvalidValue {
                field: field(&format!("phase '{phase}' fraction")),
                value: def.fraction.to_string(),
                reason: "must be within [0, 1]".to_string(),
            });
        }
        for (compound, fraction) in &def.compounds {
            if !materials.compounds.contains(compound) {
                return Err(ValidationError::MissingReference {
                    id: compound.clone(),
                    context: field(&format!("phase '{phase}' compounds")),
                });
            }
            if !fraction.is_finite() || *fraction < 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: field(&format!("phase '{phase}' compound '{compound}'")),
                    value: fraction.to_string(),
                    reason: "must be non-negative and finite".to_string(),
                });
            }
        }
    }
    Ok(())
}

//! Build a runnable flowsheet from a project.

use std::collections::BTreeMap;

use fsim_core::{StreamId, UnitId, k, kgps, pa};
use fsim_sim::{Flowsheet, RunOptions};
use fsim_stream::{MaterialStream, StreamStructure};
use fsim_units::{Feed, Lag, Mixer, Product, Splitter, Unit};
use nalgebra::DVector;

use crate::schema::{FeedPointDef, PartitionDef, Project, SequenceDef, UnitDef, UnitKind};
use crate::{ProjectError, ProjectResult};

/// A flowsheet together with the mapping from project ids to engine ids.
#[derive(Debug)]
pub struct CompiledProject {
    pub flowsheet: Flowsheet,
    pub options: RunOptions,
    pub units: BTreeMap<String, UnitId>,
    pub streams: BTreeMap<String, StreamId>,
}

impl CompiledProject {
    pub fn unit_key(&self, id: UnitId) -> Option<&str> {
        self.units
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }

    pub fn stream_key(&self, id: StreamId) -> Option<&str> {
        self.streams
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }

    /// Current calculation sequence of the flowsheet in project ids.
    pub fn sequence_def(&self) -> SequenceDef {
        let partitions = self
            .flowsheet
            .sequence()
            .partitions()
            .iter()
            .map(|p| PartitionDef {
                units: p
                    .units
                    .iter()
                    .filter_map(|id| self.unit_key(*id).map(str::to_string))
                    .collect(),
                tears: p
                    .tears
                    .iter()
                    .filter_map(|t| self.stream_key(t.stream).map(str::to_string))
                    .collect(),
            })
            .collect();
        SequenceDef { partitions }
    }
}

pub fn compile(project: &Project) -> ProjectResult<CompiledProject> {
    let structure = StreamStructure::new(
        project.materials.compounds.iter().cloned(),
        project.materials.phases.iter().cloned(),
        project.materials.classes,
    );
    let mut flowsheet = Flowsheet::new(structure.clone());

    let mut streams = BTreeMap::new();
    for def in &project.streams {
        streams.insert(def.id.clone(), flowsheet.add_stream(def.name.clone()));
    }

    let mut units = BTreeMap::new();
    for def in &project.units {
        let id = flowsheet.add_boxed_unit(build_unit(def, &structure)?);
        for (port, stream) in &def.ports {
            let sid = streams.get(stream).ok_or_else(|| missing(stream, "streams"))?;
            flowsheet.connect(id, port, *sid)?;
        }
        units.insert(def.id.clone(), id);
    }

    if let Some(sequence) = &project.sequence {
        let mut unit_keys = Vec::new();
        let mut tear_keys = Vec::new();
        for partition in &sequence.partitions {
            unit_keys.push(
                partition
                    .units
                    .iter()
                    .map(|u| units.get(u).copied().ok_or_else(|| missing(u, "units")))
                    .collect::<ProjectResult<Vec<_>>>()?,
            );
            tear_keys.push(
                partition
                    .tears
                    .iter()
                    .map(|s| streams.get(s).copied().ok_or_else(|| missing(s, "streams")))
                    .collect::<ProjectResult<Vec<_>>>()?,
            );
        }
        flowsheet.sequence_mut().set_sequence(unit_keys, tear_keys)?;
        flowsheet.set_topology_modified(false);
    }

    Ok(CompiledProject {
        flowsheet,
        options: project.options.clone(),
        units,
        streams,
    })
}

fn missing(id: &str, context: &str) -> ProjectError {
    ProjectError::Validation(crate::ValidationError::MissingReference {
        id: id.to_string(),
        context: context.to_string(),
    })
}

fn build_unit(def: &UnitDef, structure: &StreamStructure) -> ProjectResult<Box<dyn Unit>> {
    let name = def.name.clone();
    Ok(match &def.kind {
        UnitKind::Feed { points } => Box::new(Feed::new(name, feed_source(def, points, structure)?)),
        UnitKind::Mixer => Box::new(Mixer::new(name)),
        UnitKind::Splitter { fraction } => Box::new(Splitter::new(name, *fraction)?),
        UnitKind::Product => Box::new(Product::new(name)),
        UnitKind::Lag { tau_s } => Box::new(Lag::new(name, *tau_s)?),
    })
}

fn feed_source(
    def: &UnitDef,
    points: &[FeedPointDef],
    structure: &StreamStructure,
) -> ProjectResult<MaterialStream> {
    let mut source = MaterialStream::new(def.name.clone(), structure.clone());
    for point in points {
        let t = point.time_s;
        source.set_mass_flow(t, kgps(point.mass_flow_kg_s));
        source.set_temperature(t, k(point.temperature_k));
        source.set_pressure(t, pa(point.pressure_pa));
        for (phase, phase_def) in &point.phases {
            let ip = structure
                .phase_index(phase)
                .ok_or_else(|| missing(phase, "materials phases"))?;
            source.set_phase_fraction(t, ip, phase_def.fraction)?;

            let mut distribution = DVector::zeros(structure.distribution_len());
            for (compound, fraction) in &phase_def.compounds {
                let ic = structure
                    .compound_index(compound)
                    .ok_or_else(|| missing(compound, "materials compounds"))?;
                distribution[ic * structure.classes] = *fraction;
            }
            source.set_distribution(t, ip, distribution)?;
        }
    }
    Ok(source)
}

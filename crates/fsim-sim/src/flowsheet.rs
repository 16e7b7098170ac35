//! Flowsheet: units, streams, their wiring and the calculation sequence.

use std::collections::{BTreeMap, HashMap, HashSet};

use fsim_core::{IdAllocator, StreamId, UnitId};
use fsim_graph::{DirectedGraph, GraphError, IndexMap, TopologyAnalyzer};
use fsim_stream::{MaterialStream, StreamStructure};
use fsim_units::{Port, PortDirection, PortStreams, Unit};
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::sequence::CalculationSequence;

pub type UnitMap = BTreeMap<UnitId, Box<dyn Unit>>;
pub type StreamMap = BTreeMap<StreamId, MaterialStream>;

/// Owning container of a process flowsheet.
///
/// Every stream shares the flowsheet's [`StreamStructure`]. Any change to
/// the wiring marks the topology as modified, which makes the next
/// [`Flowsheet::initialize`] determine a fresh calculation sequence.
pub struct Flowsheet {
    structure: StreamStructure,
    ids: IdAllocator,
    units: UnitMap,
    streams: StreamMap,
    sequence: CalculationSequence,
    topology_modified: bool,
}

impl std::fmt::Debug for Flowsheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flowsheet")
            .field("structure", &self.structure)
            .field(
                "units",
                &self.units.values().map(|u| u.name()).collect::<Vec<_>>(),
            )
            .field(
                "streams",
                &self.streams.values().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("sequence", &self.sequence.unit_keys())
            .finish()
    }
}

fn structural(message: impl Into<String>) -> SimError {
    SimError::Structural {
        message: message.into(),
    }
}

pub(crate) fn stream_ids(ports: &[Port], direction: PortDirection) -> impl Iterator<Item = StreamId> + '_ {
    ports
        .iter()
        .filter(move |p| p.direction == direction)
        .filter_map(|p| p.stream)
}

impl Flowsheet {
    pub fn new(structure: StreamStructure) -> Self {
        Self {
            structure,
            ids: IdAllocator::new(),
            units: UnitMap::new(),
            streams: StreamMap::new(),
            sequence: CalculationSequence::new(),
            topology_modified: true,
        }
    }

    pub fn structure(&self) -> &StreamStructure {
        &self.structure
    }

    /// Change compounds, phases or classes of every stream. Data is dropped.
    pub fn set_structure(&mut self, structure: StreamStructure) {
        for stream in self.streams.values_mut() {
            stream.set_structure(structure.clone());
        }
        self.structure = structure;
        self.sequence.sync_seeds(&self.streams);
    }

    // ---------------------------------------------------------------
    // units and streams
    // ---------------------------------------------------------------

    pub fn add_unit<U: Unit + 'static>(&mut self, unit: U) -> UnitId {
        self.add_boxed_unit(Box::new(unit))
    }

    pub fn add_boxed_unit(&mut self, unit: Box<dyn Unit>) -> UnitId {
        let id = self.ids.allocate();
        self.units.insert(id, unit);
        self.topology_modified = true;
        id
    }

    pub fn add_stream(&mut self, name: impl Into<String>) -> StreamId {
        let id = self.ids.allocate();
        self.streams
            .insert(id, MaterialStream::new(name, self.structure.clone()));
        self.topology_modified = true;
        id
    }

    pub fn remove_unit(&mut self, id: UnitId) -> Option<Box<dyn Unit>> {
        let unit = self.units.remove(&id)?;
        self.sequence.delete_unit(id);
        self.topology_modified = true;
        Some(unit)
    }

    pub fn remove_stream(&mut self, id: StreamId) -> Option<MaterialStream> {
        let stream = self.streams.remove(&id)?;
        for port in self.units.values_mut().flat_map(|u| u.ports_mut().iter_mut()) {
            if port.stream == Some(id) {
                port.stream = None;
            }
        }
        self.sequence.delete_stream(id);
        self.topology_modified = true;
        Some(stream)
    }

    /// Attach `stream` to the port named `port` of `unit`.
    pub fn connect(&mut self, unit: UnitId, port: &str, stream: StreamId) -> SimResult<()> {
        if !self.streams.contains_key(&stream) {
            return Err(SimError::NotFound {
                what: format!("stream {stream}"),
            });
        }
        let target = self
            .units
            .get_mut(&unit)
            .ok_or_else(|| SimError::NotFound {
                what: format!("unit {unit}"),
            })?;
        let name = target.name().to_string();
        let slot = target
            .ports_mut()
            .iter_mut()
            .find(|p| p.name == port)
            .ok_or_else(|| SimError::NotFound {
                what: format!("port '{port}' of unit '{name}'"),
            })?;
        slot.stream = Some(stream);
        self.topology_modified = true;
        Ok(())
    }

    pub fn unit(&self, id: UnitId) -> Option<&dyn Unit> {
        self.units.get(&id).map(|u| &**u)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut (dyn Unit + 'static)> {
        self.units.get_mut(&id).map(|u| &mut **u)
    }

    pub fn unit_id(&self, name: &str) -> Option<UnitId> {
        self.units
            .iter()
            .find(|(_, u)| u.name() == name)
            .map(|(&id, _)| id)
    }

    pub fn units(&self) -> impl Iterator<Item = (UnitId, &dyn Unit)> + '_ {
        self.units.iter().map(|(&id, u)| (id, &**u))
    }

    pub fn stream(&self, id: StreamId) -> Option<&MaterialStream> {
        self.streams.get(&id)
    }

    pub fn stream_mut(&mut self, id: StreamId) -> Option<&mut MaterialStream> {
        self.streams.get_mut(&id)
    }

    pub fn stream_id(&self, name: &str) -> Option<StreamId> {
        self.streams
            .iter()
            .find(|(_, s)| s.name() == name)
            .map(|(&id, _)| id)
    }

    pub fn streams(&self) -> impl Iterator<Item = (StreamId, &MaterialStream)> + '_ {
        self.streams.iter().map(|(&id, s)| (id, s))
    }

    // ---------------------------------------------------------------
    // sequence
    // ---------------------------------------------------------------

    pub fn sequence(&self) -> &CalculationSequence {
        &self.sequence
    }

    /// Edit the sequence directly; it is kept as long as it passes
    /// [`CalculationSequence::check`] and the wiring does not change.
    pub fn sequence_mut(&mut self) -> &mut CalculationSequence {
        &mut self.sequence
    }

    pub fn topology_modified(&self) -> bool {
        self.topology_modified
    }

    pub fn set_topology_modified(&mut self, modified: bool) {
        self.topology_modified = modified;
    }

    /// Unit graph: one vertex per unit, an edge wherever an outlet stream
    /// feeds another unit's inlet.
    pub fn build_graph(&self) -> SimResult<(DirectedGraph, IndexMap)> {
        let index = IndexMap::new("UnitId", self.units.keys().copied());
        let mut producer: HashMap<StreamId, usize> = HashMap::new();
        for (i, unit) in self.units.values().enumerate() {
            for stream in stream_ids(unit.ports(), PortDirection::Outlet) {
                producer.insert(stream, i);
            }
        }
        let mut graph = DirectedGraph::new(index.len());
        for (dst, unit) in self.units.values().enumerate() {
            for stream in stream_ids(unit.ports(), PortDirection::Inlet) {
                if let Some(&src) = producer.get(&stream) {
                    graph.add_edge(src, dst)?;
                }
            }
        }
        Ok((graph, index))
    }

    /// First outlet stream of `src` that enters `dst`.
    pub fn connecting_stream(&self, src: UnitId, dst: UnitId) -> Option<StreamId> {
        let (src, dst) = (self.units.get(&src)?, self.units.get(&dst)?);
        let inlets: HashSet<StreamId> = stream_ids(dst.ports(), PortDirection::Inlet).collect();
        stream_ids(src.ports(), PortDirection::Outlet).find(|s| inlets.contains(s))
    }

    /// Replace the sequence by the result of topology analysis.
    pub fn determine_sequence(&mut self) -> SimResult<()> {
        let (graph, index) = self.build_graph()?;
        let analysis = TopologyAnalyzer::new(&graph)
            .analyze()
            .map_err(|e| match e {
                GraphError::UnresolvableCycle { vertices } => {
                    self.unresolvable_cycle(&index, &vertices)
                }
                other => other.into(),
            })?;

        let mut units = Vec::with_capacity(analysis.partitions.len());
        let mut tears = Vec::with_capacity(analysis.partitions.len());
        for partition in &analysis.partitions {
            units.push(
                partition
                    .vertices
                    .iter()
                    .filter_map(|&v| index.id(v))
                    .collect::<Vec<_>>(),
            );
            let mut streams = Vec::with_capacity(partition.tears.len());
            for &(src, dst) in &partition.tears {
                let stream = index
                    .id(src)
                    .zip(index.id(dst))
                    .and_then(|(s, d)| self.connecting_stream(s, d))
                    .ok_or_else(|| structural("Tear edge without a connecting stream."))?;
                streams.push(stream);
            }
            tears.push(streams);
        }
        debug!(
            partitions = units.len(),
            tears = analysis.tear_count(),
            "calculation sequence determined"
        );
        self.sequence.set_sequence(units, tears)?;
        self.sequence.sync_seeds(&self.streams);
        Ok(())
    }

    /// Structural error naming the units of a loop that could not be opened.
    fn unresolvable_cycle(&self, index: &IndexMap, vertices: &[usize]) -> SimError {
        let names: Vec<String> = vertices
            .iter()
            .map(|&v| match index.id(v).and_then(|id| self.units.get(&id)) {
                Some(unit) => format!("'{}'", unit.name()),
                None => format!("#{v}"),
            })
            .collect();
        structural(format!(
            "Cannot break the recycle loop through units {}.",
            names.join(", ")
        ))
    }

    // ---------------------------------------------------------------
    // validation
    // ---------------------------------------------------------------

    /// Every port wired to an existing stream, every stream between exactly
    /// one outlet and one inlet (or unused), no unit feeding itself.
    pub fn check_connections(&self) -> Result<(), String> {
        for unit in self.units.values() {
            for port in unit.ports() {
                match port.stream {
                    None => {
                        return Err(format!(
                            "Port '{}' in unit '{}' is unconnected.",
                            port.name,
                            unit.name()
                        ));
                    }
                    Some(id) if !self.streams.contains_key(&id) => {
                        return Err(format!(
                            "Port '{}' in unit '{}' refers to a missing stream.",
                            port.name,
                            unit.name()
                        ));
                    }
                    Some(_) => {}
                }
            }
        }

        let mut inlets: HashMap<StreamId, usize> = HashMap::new();
        let mut outlets: HashMap<StreamId, usize> = HashMap::new();
        for unit in self.units.values() {
            for s in stream_ids(unit.ports(), PortDirection::Inlet) {
                *inlets.entry(s).or_default() += 1;
            }
            for s in stream_ids(unit.ports(), PortDirection::Outlet) {
                *outlets.entry(s).or_default() += 1;
            }
        }
        for (id, stream) in &self.streams {
            let n_in = inlets.get(id).copied().unwrap_or(0);
            let n_out = outlets.get(id).copied().unwrap_or(0);
            if n_in != n_out || n_in > 1 {
                return Err(format!(
                    "Stream '{}' is not correctly connected. Each stream must be connected to one input and to one output port.",
                    stream.name()
                ));
            }
        }

        for unit in self.units.values() {
            let outs: HashSet<StreamId> = stream_ids(unit.ports(), PortDirection::Outlet).collect();
            if stream_ids(unit.ports(), PortDirection::Inlet).any(|s| outs.contains(&s)) {
                return Err(format!("Unit '{}' is connected to itself.", unit.name()));
            }
        }
        Ok(())
    }

    /// Compounds and phases present and unique.
    pub fn check_materials(&self) -> Result<(), String> {
        if self.structure.compounds.is_empty() {
            return Err("No compounds specified.".to_string());
        }
        if self.structure.phases.is_empty() {
            return Err("No phases specified.".to_string());
        }
        if self.structure.compounds.iter().any(|c| c.is_empty()) {
            return Err("Some compound has an empty name.".to_string());
        }
        if self.structure.phases.iter().any(|p| p.is_empty()) {
            return Err("Some phase has an empty name.".to_string());
        }
        let mut seen = HashSet::new();
        if let Some(c) = self.structure.compounds.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(format!("Compound '{c}' is defined more than once."));
        }
        let mut seen = HashSet::new();
        if let Some(p) = self.structure.phases.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(format!("Phase '{p}' is defined more than once."));
        }
        Ok(())
    }

    /// Pre-run validation.
    ///
    /// Clears previous results, checks the wiring, recomputes the sequence
    /// when it is invalid or the topology changed, checks materials and
    /// unit parameters, and prepares tear-stream seeds.
    pub fn initialize(&mut self) -> SimResult<()> {
        for stream in self.streams.values_mut() {
            stream.remove_all_time_points();
        }

        self.check_connections().map_err(structural)?;

        if self.topology_modified || self.sequence.check(&self.units, &self.streams).is_err() {
            self.determine_sequence()?;
            self.sequence
                .check(&self.units, &self.streams)
                .map_err(structural)?;
        }
        self.topology_modified = false;

        self.check_materials().map_err(structural)?;

        for unit in self.units.values() {
            unit.validate()
                .map_err(|e| structural(format!("Unit '{}': {e}", unit.name())))?;
        }

        self.sequence.sync_seeds(&self.streams);
        Ok(())
    }

    /// Mutable access to all collections at once, for the scheduler.
    pub(crate) fn parts_mut(&mut self) -> (&mut UnitMap, &mut StreamMap, &mut CalculationSequence) {
        (&mut self.units, &mut self.streams, &mut self.sequence)
    }
}

/// Borrow the streams attached to `ports`: inlets shared, outlets exclusive.
pub(crate) fn port_streams<'a>(ports: &[Port], streams: &'a mut StreamMap) -> SimResult<PortStreams<'a>> {
    let inlet_ids: Vec<StreamId> = stream_ids(ports, PortDirection::Inlet).collect();
    let outlet_ids: Vec<StreamId> = stream_ids(ports, PortDirection::Outlet).collect();

    let mut inputs: Vec<Option<&'a MaterialStream>> = vec![None; inlet_ids.len()];
    let mut outputs: Vec<Option<&'a mut MaterialStream>> = outlet_ids.iter().map(|_| None).collect();
    for (id, stream) in streams.iter_mut() {
        if let Some(pos) = outlet_ids.iter().position(|o| o == id) {
            outputs[pos] = Some(stream);
        } else if let Some(pos) = inlet_ids.iter().position(|i| i == id) {
            let shared: &'a MaterialStream = stream;
            inputs[pos] = Some(shared);
        }
    }

    let missing = || structural("Unit port refers to a missing stream.");
    let inputs = inputs.into_iter().collect::<Option<Vec<_>>>().ok_or_else(missing)?;
    let outputs = outputs.into_iter().collect::<Option<Vec<_>>>().ok_or_else(missing)?;
    Ok(PortStreams::new(inputs, outputs))
}

/// Exclusive borrows of the streams `ids`, in that order.
pub(crate) fn select_streams_mut<'a>(
    streams: &'a mut StreamMap,
    ids: &[StreamId],
) -> SimResult<Vec<&'a mut MaterialStream>> {
    let mut selected: Vec<Option<&'a mut MaterialStream>> = ids.iter().map(|_| None).collect();
    for (id, stream) in streams.iter_mut() {
        if let Some(pos) = ids.iter().position(|i| i == id) {
            selected[pos] = Some(stream);
        }
    }
    selected
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| structural("Tear stream does not exist."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsim_core::kgps;
    use fsim_units::{Feed, Mixer, Product, Splitter};

    fn structure() -> StreamStructure {
        StreamStructure::new(["A"], ["liquid"], 1)
    }

    fn feed(name: &str) -> Feed {
        let mut def = MaterialStream::new("def", structure());
        def.set_mass_flow(0.0, kgps(1.0));
        Feed::new(name, def)
    }

    /// Feed -> Mixer -> Splitter -> Product, Splitter -> Mixer.
    fn recycle() -> (Flowsheet, [UnitId; 4], [StreamId; 4]) {
        let mut fs = Flowsheet::new(structure());
        let f = fs.add_unit(feed("F"));
        let m = fs.add_unit(Mixer::new("M"));
        let s = fs.add_unit(Splitter::new("S", 0.5).unwrap());
        let p = fs.add_unit(Product::new("P"));
        let s1 = fs.add_stream("s1");
        let s2 = fs.add_stream("s2");
        let s3 = fs.add_stream("s3");
        let s4 = fs.add_stream("s4");
        fs.connect(f, "Out", s1).unwrap();
        fs.connect(m, "In1", s1).unwrap();
        fs.connect(m, "Out", s2).unwrap();
        fs.connect(s, "In", s2).unwrap();
        fs.connect(s, "Out1", s3).unwrap();
        fs.connect(p, "In", s3).unwrap();
        fs.connect(s, "Out2", s4).unwrap();
        fs.connect(m, "In2", s4).unwrap();
        (fs, [f, m, s, p], [s1, s2, s3, s4])
    }

    #[test]
    fn recycle_gets_one_tear() {
        let (mut fs, [f, m, s, p], [_, s2, _, s4]) = recycle();
        fs.initialize().unwrap();
        let seq = fs.sequence();
        assert_eq!(seq.partitions_count(), 3);
        assert_eq!(seq.unit_keys()[0], vec![f]);
        assert_eq!(seq.unit_keys()[2], vec![p]);
        let cyclic = &seq.partitions()[1];
        assert_eq!(cyclic.units.len(), 2);
        assert!(cyclic.units.contains(&m) && cyclic.units.contains(&s));
        let tear = cyclic.tear_ids()[0];
        assert!(tear == s2 || tear == s4);
        assert!(seq.seed(1, 0).is_some());
        assert!(!fs.topology_modified());
    }

    #[test]
    fn separate_lines_with_one_recycle_initialize() {
        // F1 -> P1 alongside F2 -> M -> S -> P2 with S -> M
        let mut fs = Flowsheet::new(structure());
        let f1 = fs.add_unit(feed("F1"));
        let p1 = fs.add_unit(Product::new("P1"));
        let f2 = fs.add_unit(feed("F2"));
        let m = fs.add_unit(Mixer::new("M"));
        let s = fs.add_unit(Splitter::new("S", 0.5).unwrap());
        let p2 = fs.add_unit(Product::new("P2"));
        let a = fs.add_stream("a");
        fs.connect(f1, "Out", a).unwrap();
        fs.connect(p1, "In", a).unwrap();
        let streams: Vec<StreamId> = ["b1", "b2", "b3", "b4"]
            .iter()
            .map(|&n| fs.add_stream(n))
            .collect();
        fs.connect(f2, "Out", streams[0]).unwrap();
        fs.connect(m, "In1", streams[0]).unwrap();
        fs.connect(m, "Out", streams[1]).unwrap();
        fs.connect(s, "In", streams[1]).unwrap();
        fs.connect(s, "Out1", streams[2]).unwrap();
        fs.connect(p2, "In", streams[2]).unwrap();
        fs.connect(s, "Out2", streams[3]).unwrap();
        fs.connect(m, "In2", streams[3]).unwrap();

        fs.initialize().unwrap();
        let seq = fs.sequence();
        let cyclic: Vec<_> = seq.partitions().iter().filter(|p| !p.tear_ids().is_empty()).collect();
        assert_eq!(cyclic.len(), 1);
        assert_eq!(cyclic[0].tear_ids().len(), 1);
        assert!(cyclic[0].units.contains(&m) && cyclic[0].units.contains(&s));
        assert!(seq.check(&fs.units, &fs.streams).is_ok());
    }

    #[test]
    fn unresolvable_cycle_names_units() {
        let (fs, _, _) = recycle();
        let (_, index) = fs.build_graph().unwrap();
        let err = fs.unresolvable_cycle(&index, &[2, 1]);
        assert_eq!(
            err,
            SimError::Structural {
                message: "Cannot break the recycle loop through units 'S', 'M'.".into()
            }
        );
    }

    #[test]
    fn unconnected_port_is_reported() {
        let mut fs = Flowsheet::new(structure());
        fs.add_unit(Product::new("P"));
        let err = fs.initialize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Port 'In' in unit 'P' is unconnected."
        );
    }

    #[test]
    fn stream_with_two_consumers_is_rejected() {
        let mut fs = Flowsheet::new(structure());
        let f = fs.add_unit(feed("F"));
        let p1 = fs.add_unit(Product::new("P1"));
        let p2 = fs.add_unit(Product::new("P2"));
        let s = fs.add_stream("s");
        fs.connect(f, "Out", s).unwrap();
        fs.connect(p1, "In", s).unwrap();
        fs.connect(p2, "In", s).unwrap();
        let msg = fs.check_connections().unwrap_err();
        assert!(msg.starts_with("Stream 's' is not correctly connected."));
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut fs = Flowsheet::new(structure());
        let sp = fs.add_unit(Splitter::new("S", 0.5).unwrap());
        let p = fs.add_unit(Product::new("P"));
        let a = fs.add_stream("a");
        let b = fs.add_stream("b");
        fs.connect(sp, "In", a).unwrap();
        fs.connect(sp, "Out1", a).unwrap();
        fs.connect(sp, "Out2", b).unwrap();
        fs.connect(p, "In", b).unwrap();
        assert!(matches!(fs.initialize(), Err(SimError::Structural { .. })));
    }

    #[test]
    fn materials_must_be_unique() {
        let fs = Flowsheet::new(StreamStructure::new(["A", "A"], ["liquid"], 1));
        assert_eq!(
            fs.check_materials().unwrap_err(),
            "Compound 'A' is defined more than once."
        );
        let fs = Flowsheet::new(StreamStructure::new(["A"], Vec::<String>::new(), 1));
        assert_eq!(fs.check_materials().unwrap_err(), "No phases specified.");
    }

    #[test]
    fn empty_feed_fails_validation() {
        let mut fs = Flowsheet::new(structure());
        let f = fs.add_unit(Feed::new("F", MaterialStream::new("def", structure())));
        let p = fs.add_unit(Product::new("P"));
        let s = fs.add_stream("s");
        fs.connect(f, "Out", s).unwrap();
        fs.connect(p, "In", s).unwrap();
        let err = fs.initialize().unwrap_err();
        assert!(err.to_string().contains("'F'"));
    }

    #[test]
    fn user_sequence_survives_until_topology_changes() {
        let (mut fs, [f, m, s, p], [_, s2, _, s4]) = recycle();
        fs.initialize().unwrap();
        fs.sequence_mut()
            .set_sequence(
                vec![vec![f], vec![s, m], vec![p]],
                vec![vec![], vec![s2], vec![]],
            )
            .unwrap();
        fs.initialize().unwrap();
        assert_eq!(fs.sequence().tear_keys()[1], vec![s2]);

        fs.remove_stream(s4);
        let s5 = fs.add_stream("s5");
        fs.connect(s, "Out2", s5).unwrap();
        fs.connect(m, "In2", s5).unwrap();
        fs.initialize().unwrap();
        assert_eq!(fs.sequence().partitions_count(), 3);
    }

    #[test]
    fn incomplete_user_sequence_is_replaced() {
        let (mut fs, [f, ..], _) = recycle();
        fs.initialize().unwrap();
        fs.sequence_mut().set_sequence(vec![vec![f]], vec![vec![]]).unwrap();
        assert!(fs.sequence().check(&fs.units, &fs.streams).is_err());
        fs.initialize().unwrap();
        assert_eq!(fs.sequence().partitions_count(), 3);
    }

    #[test]
    fn port_streams_follow_port_order() {
        let (mut fs, [_, m, ..], [s1, _, _, s4]) = recycle();
        fs.stream_mut(s1).unwrap().set_mass_flow(0.0, kgps(1.0));
        fs.stream_mut(s4).unwrap().set_mass_flow(0.0, kgps(4.0));
        let ports = fs.unit(m).unwrap().ports().to_vec();
        let (_, streams, _) = fs.parts_mut();
        let mut io = port_streams(&ports, streams).unwrap();
        assert_eq!(io.input(0).unwrap().mass_flow_raw(0.0), 1.0);
        assert_eq!(io.input(1).unwrap().mass_flow_raw(0.0), 4.0);
        assert_eq!(io.output(0).unwrap().name(), "s2");
    }
}

//! Calculation sequence: ordered partitions with their tear streams.
//!
//! Partitions refer to units and streams by id only. Ids are resolved
//! against the flowsheet's collections when needed; an id whose object no
//! longer exists resolves to `None` and makes [`CalculationSequence::check`]
//! fail. Each tear stream owns one persisted seed, created lazily from the
//! live stream by [`CalculationSequence::sync_seeds`].

use std::collections::HashSet;

use fsim_core::{Id, StreamId, StructuredStore, UnitId};
use fsim_stream::{MaterialStream, StreamStructure};
use fsim_units::Unit;

use crate::error::{SimError, SimResult};
use crate::flowsheet::{StreamMap, UnitMap};

const SAVE_VERSION: i64 = 1;

/// Tear stream of a cyclic partition together with its seed.
#[derive(Debug, Clone, PartialEq)]
pub struct TearStream {
    pub stream: StreamId,
    seed: Option<MaterialStream>,
}

impl TearStream {
    pub fn new(stream: StreamId) -> Self {
        Self { stream, seed: None }
    }

    pub fn seed(&self) -> Option<&MaterialStream> {
        self.seed.as_ref()
    }
}

/// Units evaluated together, in order, plus the streams that open their loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequencePartition {
    pub units: Vec<UnitId>,
    pub tears: Vec<TearStream>,
}

impl SequencePartition {
    pub fn new(units: Vec<UnitId>, tears: Vec<StreamId>) -> Self {
        Self {
            units,
            tears: tears.into_iter().map(TearStream::new).collect(),
        }
    }

    pub fn is_cyclic(&self) -> bool {
        !self.tears.is_empty()
    }

    pub fn tear_ids(&self) -> Vec<StreamId> {
        self.tears.iter().map(|t| t.stream).collect()
    }
}

/// Ordered list of partitions following the dependency order of the flowsheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculationSequence {
    partitions: Vec<SequencePartition>,
}

fn swap_up<T>(items: &mut [T], i: usize) {
    if i > 0 && i < items.len() {
        items.swap(i, i - 1);
    }
}

fn swap_down<T>(items: &mut [T], i: usize) {
    if i + 1 < items.len() {
        items.swap(i, i + 1);
    }
}

impl CalculationSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.partitions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn partitions(&self) -> &[SequencePartition] {
        &self.partitions
    }

    pub fn partition(&self, i: usize) -> Option<&SequencePartition> {
        self.partitions.get(i)
    }

    pub fn partitions_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn units_count(&self, partition: usize) -> usize {
        self.partitions.get(partition).map_or(0, |p| p.units.len())
    }

    pub fn tears_count(&self, partition: usize) -> usize {
        self.partitions.get(partition).map_or(0, |p| p.tears.len())
    }

    pub fn unit_keys(&self) -> Vec<Vec<UnitId>> {
        self.partitions.iter().map(|p| p.units.clone()).collect()
    }

    pub fn tear_keys(&self) -> Vec<Vec<StreamId>> {
        self.partitions.iter().map(|p| p.tear_ids()).collect()
    }

    /// Replace the whole sequence. Seeds of the old sequence are dropped.
    pub fn set_sequence(&mut self, units: Vec<Vec<UnitId>>, tears: Vec<Vec<StreamId>>) -> SimResult<()> {
        if units.len() != tears.len() {
            return Err(SimError::InvalidArg {
                what: "unit and tear lists must have one entry per partition",
            });
        }
        self.partitions = units
            .into_iter()
            .zip(tears)
            .map(|(u, t)| SequencePartition::new(u, t))
            .collect();
        Ok(())
    }

    pub fn set_unit(&mut self, partition: usize, index: usize, unit: UnitId) {
        if let Some(slot) = self
            .partitions
            .get_mut(partition)
            .and_then(|p| p.units.get_mut(index))
        {
            *slot = unit;
        }
    }

    pub fn set_stream(&mut self, partition: usize, index: usize, stream: StreamId) {
        if let Some(slot) = self
            .partitions
            .get_mut(partition)
            .and_then(|p| p.tears.get_mut(index))
        {
            *slot = TearStream::new(stream);
        }
    }

    pub fn add_partition(&mut self, units: Vec<UnitId>, tears: Vec<StreamId>) {
        self.partitions.push(SequencePartition::new(units, tears));
    }

    pub fn add_unit(&mut self, partition: usize, unit: UnitId) {
        if let Some(p) = self.partitions.get_mut(partition) {
            p.units.push(unit);
        }
    }

    pub fn add_stream(&mut self, partition: usize, stream: StreamId) {
        if let Some(p) = self.partitions.get_mut(partition) {
            p.tears.push(TearStream::new(stream));
        }
    }

    pub fn delete_partition(&mut self, partition: usize) {
        if partition < self.partitions.len() {
            self.partitions.remove(partition);
        }
    }

    /// Remove `unit` everywhere; partitions left without units are dropped.
    pub fn delete_unit(&mut self, unit: UnitId) {
        for p in &mut self.partitions {
            p.units.retain(|&u| u != unit);
        }
        self.partitions.retain(|p| !p.units.is_empty());
    }

    pub fn delete_unit_at(&mut self, partition: usize, index: usize) {
        if let Some(p) = self.partitions.get_mut(partition) {
            if index < p.units.len() {
                p.units.remove(index);
            }
        }
    }

    pub fn delete_stream(&mut self, stream: StreamId) {
        for p in &mut self.partitions {
            p.tears.retain(|t| t.stream != stream);
        }
    }

    pub fn delete_stream_at(&mut self, partition: usize, index: usize) {
        if let Some(p) = self.partitions.get_mut(partition) {
            if index < p.tears.len() {
                p.tears.remove(index);
            }
        }
    }

    pub fn shift_partition_up(&mut self, partition: usize) {
        swap_up(&mut self.partitions, partition);
    }

    pub fn shift_partition_down(&mut self, partition: usize) {
        swap_down(&mut self.partitions, partition);
    }

    pub fn shift_unit_up(&mut self, partition: usize, index: usize) {
        if let Some(p) = self.partitions.get_mut(partition) {
            swap_up(&mut p.units, index);
        }
    }

    pub fn shift_unit_down(&mut self, partition: usize, index: usize) {
        if let Some(p) = self.partitions.get_mut(partition) {
            swap_down(&mut p.units, index);
        }
    }

    pub fn shift_stream_up(&mut self, partition: usize, index: usize) {
        if let Some(p) = self.partitions.get_mut(partition) {
            swap_up(&mut p.tears, index);
        }
    }

    pub fn shift_stream_down(&mut self, partition: usize, index: usize) {
        if let Some(p) = self.partitions.get_mut(partition) {
            swap_down(&mut p.tears, index);
        }
    }

    pub fn contains_unit(&self, unit: UnitId) -> bool {
        self.partitions.iter().any(|p| p.units.contains(&unit))
    }

    /// Units of a partition, `None` where an id no longer resolves.
    pub fn resolve_units<'a>(&self, partition: usize, units: &'a UnitMap) -> Vec<Option<&'a dyn Unit>> {
        self.partitions.get(partition).map_or_else(Vec::new, |p| {
            p.units
                .iter()
                .map(|id| units.get(id).map(|u| &**u))
                .collect()
        })
    }

    /// Tear streams of a partition, `None` where an id no longer resolves.
    pub fn resolve_tears<'a>(
        &self,
        partition: usize,
        streams: &'a StreamMap,
    ) -> Vec<Option<&'a MaterialStream>> {
        self.partitions.get(partition).map_or_else(Vec::new, |p| {
            p.tears.iter().map(|t| streams.get(&t.stream)).collect()
        })
    }

    /// First structural problem of the sequence, if any.
    pub fn check(&self, units: &UnitMap, streams: &StreamMap) -> Result<(), String> {
        if self.partitions.is_empty() {
            return Err("Calculation sequence is empty.".to_string());
        }
        let mut seen: HashSet<UnitId> = HashSet::new();
        for (i, p) in self.partitions.iter().enumerate() {
            if p.units.is_empty() {
                return Err(format!("Partition {i} of calculation sequence is empty."));
            }
            if let Some(id) = p.units.iter().find(|&&id| !seen.insert(id)) {
                return Err(format!(
                    "Unit {id} appears more than once in calculation sequence."
                ));
            }
            if let Some(id) = p.units.iter().find(|id| !units.contains_key(id)) {
                return Err(format!(
                    "Calculation sequence refers to unknown unit {id}."
                ));
            }
            if let Some(t) = p.tears.iter().find(|t| !streams.contains_key(&t.stream)) {
                return Err(format!(
                    "Calculation sequence refers to unknown tear stream {}.",
                    t.stream
                ));
            }
        }
        if let Some(unit) = units
            .iter()
            .find(|(id, _)| !self.contains_unit(**id))
            .map(|(_, u)| u)
        {
            return Err(format!(
                "Unit '{}' is not in calculation sequence.",
                unit.name()
            ));
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // seeds
    // ---------------------------------------------------------------

    /// Create missing seeds and re-shape seeds whose structure differs
    /// from their live tear stream.
    pub fn sync_seeds(&mut self, streams: &StreamMap) {
        for tear in self.partitions.iter_mut().flat_map(|p| p.tears.iter_mut()) {
            let Some(live) = streams.get(&tear.stream) else {
                continue;
            };
            match &mut tear.seed {
                Some(seed) if !seed.same_structure(live) => seed.setup_structure(live),
                Some(_) => {}
                None => {
                    tear.seed = Some(MaterialStream::new(live.name(), live.structure().clone()));
                }
            }
        }
    }

    pub fn seed(&self, partition: usize, index: usize) -> Option<&MaterialStream> {
        self.partitions
            .get(partition)
            .and_then(|p| p.tears.get(index))
            .and_then(|t| t.seed.as_ref())
    }

    pub fn seed_mut(&mut self, partition: usize, index: usize) -> Option<&mut MaterialStream> {
        self.partitions
            .get_mut(partition)
            .and_then(|p| p.tears.get_mut(index))
            .and_then(|t| t.seed.as_mut())
    }

    pub fn clear_seed_data(&mut self) {
        for seed in self
            .partitions
            .iter_mut()
            .flat_map(|p| p.tears.iter_mut())
            .filter_map(|t| t.seed.as_mut())
        {
            seed.remove_all_time_points();
        }
    }

    /// Load seeds over `[0, window]` into the live tear streams.
    ///
    /// Every tear stream ends up with at least a point at time 0.
    pub fn copy_init_to_tear(&self, streams: &mut StreamMap, window: f64) -> SimResult<()> {
        for tear in self.partitions.iter().flat_map(|p| p.tears.iter()) {
            let Some(live) = streams.get_mut(&tear.stream) else {
                continue;
            };
            match &tear.seed {
                Some(seed) => live.copy_from(seed, 0.0, window)?,
                None => live.remove_all_time_points(),
            }
            if live.is_empty() {
                live.add_time_point(0.0);
            }
        }
        Ok(())
    }

    /// Store the live tear values over `[0, window]` as new seeds.
    pub fn copy_tear_to_init(&mut self, streams: &StreamMap, window: f64) -> SimResult<()> {
        self.sync_seeds(streams);
        for tear in self.partitions.iter_mut().flat_map(|p| p.tears.iter_mut()) {
            if let (Some(live), Some(seed)) = (streams.get(&tear.stream), tear.seed.as_mut()) {
                seed.copy_from(live, 0.0, window)?;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // persistence
    // ---------------------------------------------------------------

    pub fn save(&self, store: &mut dyn StructuredStore) {
        store.write_attribute("SaveVersion", SAVE_VERSION);
        store.write_attribute("PartitionsNumber", self.partitions.len() as i64);
        for (i, p) in self.partitions.iter().enumerate() {
            let group = store.group_mut(&format!("Partition{i}"));
            group.write_strings("ModelsKeys", &keys(p.units.iter().copied()));
            group.write_strings("TearStreamsKeys", &keys(p.tears.iter().map(|t| t.stream)));
            if p.tears.is_empty() {
                continue;
            }
            let seeds = group.group_mut("InitialTearStreams");
            for (j, tear) in p.tears.iter().enumerate() {
                if let Some(seed) = &tear.seed {
                    seed.save(seeds.group_mut(&format!("Stream{j}")));
                }
            }
        }
    }

    /// Replace the sequence with the content of `store`.
    pub fn load(&mut self, store: &dyn StructuredStore) -> SimResult<()> {
        self.clear();
        let version = store.require_attribute("SaveVersion")?;
        if version > SAVE_VERSION {
            return Err(SimError::Backend {
                message: format!("unsupported sequence save version {version}"),
            });
        }
        let count = store.require_attribute("PartitionsNumber")?.max(0) as usize;
        let mut partitions = Vec::with_capacity(count);
        for i in 0..count {
            let group = store.require_group(&format!("Partition{i}"))?;
            let units = parse_keys(group.read_strings("ModelsKeys").unwrap_or_default())?;
            let tears = parse_keys(group.read_strings("TearStreamsKeys").unwrap_or_default())?;
            let mut partition = SequencePartition::new(units, tears);
            if let Some(seeds) = group.group("InitialTearStreams") {
                for (j, tear) in partition.tears.iter_mut().enumerate() {
                    if let Some(saved) = seeds.group(&format!("Stream{j}")) {
                        let mut seed = MaterialStream::new("", StreamStructure::default());
                        seed.load(saved)?;
                        tear.seed = Some(seed);
                    }
                }
            }
            partitions.push(partition);
        }
        self.partitions = partitions;
        Ok(())
    }
}

fn keys(ids: impl Iterator<Item = Id>) -> Vec<String> {
    ids.map(|id| id.index().to_string()).collect()
}

fn parse_keys(values: Vec<String>) -> SimResult<Vec<Id>> {
    values
        .iter()
        .map(|v| {
            v.parse::<u32>().map(Id::from_index).map_err(|_| SimError::Backend {
                message: format!("invalid key '{v}' in stored sequence"),
            })
        })
        .collect()
}

//! Project schema definitions.

use std::collections::BTreeMap;

use fsim_sim::RunOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    pub materials: MaterialsDef,
    #[serde(default)]
    pub units: Vec<UnitDef>,
    #[serde(default)]
    pub streams: Vec<StreamDef>,
    /// User-defined calculation sequence; determined automatically if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<SequenceDef>,
    #[serde(default)]
    pub options: RunOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialsDef {
    pub compounds: Vec<String>,
    pub phases: Vec<String>,
    #[serde(default = "default_classes")]
    pub classes: usize,
}

fn default_classes() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitDef {
    pub id: String,
    pub name: String,
    pub kind: UnitKind,
    /// Port name to stream id.
    #[serde(default)]
    pub ports: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum UnitKind {
    Feed {
        #[serde(default)]
        points: Vec<FeedPointDef>,
    },
    Mixer,
    Splitter {
        fraction: f64,
    },
    Product,
    Lag {
        tau_s: f64,
    },
}

impl UnitKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            UnitKind::Feed { .. } => "Feed",
            UnitKind::Mixer => "Mixer",
            UnitKind::Splitter { .. } => "Splitter",
            UnitKind::Product => "Product",
            UnitKind::Lag { .. } => "Lag",
        }
    }
}

/// State of a feed at one time point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedPointDef {
    pub time_s: f64,
    pub mass_flow_kg_s: f64,
    #[serde(default = "default_temperature_k")]
    pub temperature_k: f64,
    #[serde(default = "default_pressure_pa")]
    pub pressure_pa: f64,
    /// Phase name to its mass fraction and composition.
    #[serde(default)]
    pub phases: BTreeMap<String, PhaseDef>,
}

fn default_temperature_k() -> f64 {
    298.15
}

fn default_pressure_pa() -> f64 {
    101_325.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseDef {
    pub fraction: f64,
    /// Compound name to mass fraction within the phase.
    #[serde(default)]
    pub compounds: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamDef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SequenceDef {
    #[serde(default)]
    pub partitions: Vec<PartitionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PartitionDef {
    pub units: Vec<String>,
    #[serde(default)]
    pub tears: Vec<String>,
}

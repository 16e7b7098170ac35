//! Compounds, phases and distribution grid shared by all points of a stream.

use serde::{Deserialize, Serialize};

/// Layout of a stream's data.
///
/// Each phase carries a distribution array of `compounds * classes` values,
/// compound-major.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamStructure {
    pub compounds: Vec<String>,
    pub phases: Vec<String>,
    #[serde(default = "default_classes")]
    pub classes: usize,
}

fn default_classes() -> usize {
    1
}

impl StreamStructure {
    pub fn new<C, P>(compounds: C, phases: P, classes: usize) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            compounds: compounds.into_iter().map(Into::into).collect(),
            phases: phases.into_iter().map(Into::into).collect(),
            classes: classes.max(1),
        }
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    pub fn distribution_len(&self) -> usize {
        self.compounds.len() * self.classes.max(1)
    }

    pub fn phase_index(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p == name)
    }

    pub fn compound_index(&self, name: &str) -> Option<usize> {
        self.compounds.iter().position(|c| c == name)
    }
}

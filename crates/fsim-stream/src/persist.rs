use fsim_core::StructuredStore;
use nalgebra::DVector;

use crate::error::{StreamError, StreamResult};
use crate::point::StreamPoint;
use crate::stream::MaterialStream;
use crate::structure::StreamStructure;

const SAVE_VERSION: i64 = 1;

impl MaterialStream {
    /// Write structure and all time points into `store`.
    pub fn save(&self, store: &mut dyn StructuredStore) {
        let s = self.structure();
        store.write_attribute("SaveVersion", SAVE_VERSION);
        store.write_strings("Name", &[self.name().to_string()]);
        store.write_strings("Compounds", &s.compounds);
        store.write_strings("Phases", &s.phases);
        store.write_attribute("Classes", s.classes as i64);

        let mut times = Vec::with_capacity(self.len());
        let mut overall = Vec::with_capacity(self.len() * 3);
        let mut fractions = Vec::with_capacity(self.len() * s.phase_count());
        let mut distributions = vec![Vec::new(); s.phase_count()];
        for (t, p) in self.points() {
            times.push(t);
            overall.extend([p.mass_flow, p.temperature, p.pressure]);
            fractions.extend_from_slice(&p.phase_fractions);
            for (out, d) in distributions.iter_mut().zip(&p.distributions) {
                out.extend(d.iter().copied());
            }
        }
        store.write_reals("TimePoints", &times);
        store.write_reals("Overall", &overall);
        store.write_reals("PhaseFractions", &fractions);
        for (i, values) in distributions.iter().enumerate() {
            store
                .group_mut(&format!("Phase{i}"))
                .write_reals("Distribution", values);
        }
    }

    /// Replace this stream's structure and data with the content of `store`.
    pub fn load(&mut self, store: &dyn StructuredStore) -> StreamResult<()> {
        store.require_attribute("SaveVersion")?;
        let compounds = read_strings(store, "Compounds")?;
        let phases = read_strings(store, "Phases")?;
        let classes = store.require_attribute("Classes")?.max(1) as usize;
        let structure = StreamStructure {
            compounds,
            phases,
            classes,
        };
        if let Some(name) = store.read_strings("Name").and_then(|n| n.into_iter().next()) {
            self.set_name(name);
        }

        let times = read_reals(store, "TimePoints")?;
        let overall = read_reals(store, "Overall")?;
        let fractions = read_reals(store, "PhaseFractions")?;
        let n = times.len();
        let np = structure.phase_count();
        let nd = structure.distribution_len();
        if overall.len() != 3 * n || fractions.len() != np * n {
            return Err(StreamError::Corrupt {
                what: format!("stream '{}' has inconsistent array lengths", self.name()),
            });
        }
        let mut distributions = Vec::with_capacity(np);
        for i in 0..np {
            let values = read_reals(store.require_group(&format!("Phase{i}"))?, "Distribution")?;
            if values.len() != nd * n {
                return Err(StreamError::Corrupt {
                    what: format!("phase {i} distribution of stream '{}'", self.name()),
                });
            }
            distributions.push(values);
        }

        self.set_structure(structure);
        for (j, &t) in times.iter().enumerate() {
            let point = StreamPoint {
                mass_flow: overall[3 * j],
                temperature: overall[3 * j + 1],
                pressure: overall[3 * j + 2],
                phase_fractions: fractions[np * j..np * (j + 1)].to_vec(),
                distributions: distributions
                    .iter()
                    .map(|d| DVector::from_column_slice(&d[nd * j..nd * (j + 1)]))
                    .collect(),
            };
            self.set_point(t, point)?;
        }
        Ok(())
    }
}

fn read_strings(store: &dyn StructuredStore, key: &str) -> StreamResult<Vec<String>> {
    store.read_strings(key).ok_or_else(|| StreamError::Corrupt {
        what: format!("missing '{key}'"),
    })
}

fn read_reals(store: &dyn StructuredStore, key: &str) -> StreamResult<Vec<f64>> {
    store.read_reals(key).ok_or_else(|| StreamError::Corrupt {
        what: format!("missing '{key}'"),
    })
}

#[cfg(test)]
mod tests {
    use crate::{MaterialStream, StreamStructure};
    use fsim_core::store::MemoryStore;
    use fsim_core::{kgps, pa};
    use nalgebra::DVector;

    #[test]
    fn save_then_load_restores_points() {
        let mut s = MaterialStream::new("Seed", StreamStructure::new(["A", "B"], ["solid", "liquid"], 2));
        s.set_mass_flow(0.0, kgps(1.5));
        s.set_pressure(2.0, pa(2e5));
        s.set_distribution(2.0, 1, DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();

        let mut store = MemoryStore::new();
        s.save(&mut store);

        let mut back = MaterialStream::new("", StreamStructure::default());
        back.load(&store).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn load_rejects_truncated_arrays() {
        let mut s = MaterialStream::new("S", StreamStructure::new(["A"], ["liquid"], 1));
        s.set_mass_flow(0.0, kgps(1.0));
        let mut store = MemoryStore::new();
        s.save(&mut store);
        fsim_core::StructuredStore::write_reals(&mut store, "Overall", &[1.0]);

        let mut back = MaterialStream::new("S", StreamStructure::default());
        assert!(back.load(&store).is_err());
    }
}

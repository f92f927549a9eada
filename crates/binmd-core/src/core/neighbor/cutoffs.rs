/// Symmetric per-type-pair distance table, 1-based on both axes.
///
/// Equality is exact (bitwise-equal `f64` values); it is used to decide whether a
/// cached stencil still applies, which must never depend on a numerical tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoffTable {
    ntypes: usize,
    values: Vec<f64>,
}

impl CutoffTable {
    pub fn uniform(ntypes: usize, cutoff: f64) -> Self {
        Self {
            ntypes,
            values: vec![cutoff; ntypes * ntypes],
        }
    }

    pub fn from_fn(ntypes: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut table = Self::uniform(ntypes, 0.0);
        for i in 1..=ntypes {
            for j in i..=ntypes {
                table.set(i, j, f(i, j));
            }
        }
        table
    }

    #[inline]
    pub fn ntypes(&self) -> usize {
        self.ntypes
    }

    pub fn set(&mut self, itype: usize, jtype: usize, value: f64) {
        let n = self.ntypes;
        self.values[(itype - 1) * n + (jtype - 1)] = value;
        self.values[(jtype - 1) * n + (itype - 1)] = value;
    }

    #[inline]
    pub fn get(&self, itype: usize, jtype: usize) -> f64 {
        self.values[(itype - 1) * self.ntypes + (jtype - 1)]
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Squared neighbor cutoffs `(cut + skin)^2`. Pairs with a non-positive
    /// interaction cutoff never interact and are never listed.
    pub fn neighbor_squared(&self, skin: f64) -> CutoffTable {
        Self {
            ntypes: self.ntypes,
            values: self
                .values
                .iter()
                .map(|&cut| {
                    if cut > 0.0 {
                        (cut + skin) * (cut + skin)
                    } else {
                        0.0
                    }
                })
                .collect(),
        }
    }

    /// Element-wise squares.
    pub fn squared(&self) -> CutoffTable {
        Self {
            ntypes: self.ntypes,
            values: self.values.iter().map(|c| c * c).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_keeps_table_symmetric() {
        let mut table = CutoffTable::uniform(3, 1.0);
        table.set(1, 3, 2.5);
        assert_eq!(table.get(3, 1), 2.5);
        assert_eq!(table.get(1, 3), 2.5);
        assert_eq!(table.max(), 2.5);
    }

    #[test]
    fn neighbor_squared_adds_skin_and_skips_disabled_pairs() {
        let table = CutoffTable::from_fn(2, |i, j| if i == j { 2.0 } else { 0.0 });
        let nsq = table.neighbor_squared(0.5);
        assert_eq!(nsq.get(1, 1), 6.25);
        assert_eq!(nsq.get(1, 2), 0.0);
    }

    #[test]
    fn equality_is_exact() {
        let a = CutoffTable::uniform(1, 2.0);
        let b = CutoffTable::uniform(1, 2.0 + 1e-15);
        assert_ne!(a, b);
        assert_eq!(a, CutoffTable::uniform(1, 2.0));
    }
}

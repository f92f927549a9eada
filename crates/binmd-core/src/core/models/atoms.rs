use super::ids::AtomTag;
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AtomError {
    #[error("Atom {tag} has type {itype}, but only types 1..={ntypes} exist")]
    InvalidType {
        tag: AtomTag,
        itype: usize,
        ntypes: usize,
    },
    #[error("Atom tag {0} is already owned by another local atom")]
    DuplicateTag(AtomTag),
    #[error("Type table needs {expected} masses, got {found}")]
    MassTable { expected: usize, found: usize },
    #[error("Mass of type {itype} must be positive, got {mass}")]
    NonPositiveMass { itype: usize, mass: f64 },
}

/// Local atoms followed by ghost replicas, stored as parallel arrays.
///
/// Indices `0..nlocal` are owned by this process. Indices `nlocal..len` are read-only
/// copies produced by the ghost exchange; they are discarded and regenerated at every
/// neighbor-list rebuild, so any state that must persist is keyed by [`AtomTag`].
/// Types are 1-based (`1..=ntypes`).
#[derive(Debug, Clone, PartialEq)]
pub struct AtomSet {
    positions: Vec<Point3<f64>>,
    velocities: Vec<Vector3<f64>>,
    types: Vec<usize>,
    tags: Vec<AtomTag>,
    nlocal: usize,
    masses: Vec<f64>,
    local_by_tag: HashMap<AtomTag, usize>,
}

impl AtomSet {
    /// `masses[t - 1]` is the mass of type `t`.
    pub fn new(masses: Vec<f64>) -> Result<Self, AtomError> {
        if masses.is_empty() {
            return Err(AtomError::MassTable {
                expected: 1,
                found: 0,
            });
        }
        if let Some((idx, &mass)) = masses
            .iter()
            .enumerate()
            .find(|(_, m)| !(m.is_finite() && **m > 0.0))
        {
            return Err(AtomError::NonPositiveMass {
                itype: idx + 1,
                mass,
            });
        }
        Ok(Self {
            positions: Vec::new(),
            velocities: Vec::new(),
            types: Vec::new(),
            tags: Vec::new(),
            nlocal: 0,
            masses,
            local_by_tag: HashMap::new(),
        })
    }

    /// Appends an owned atom. Existing ghosts are dropped, since their owner
    /// indices would otherwise be shifted.
    pub fn push_local(
        &mut self,
        tag: AtomTag,
        itype: usize,
        position: Point3<f64>,
        velocity: Vector3<f64>,
    ) -> Result<usize, AtomError> {
        self.check_type(tag, itype)?;
        if self.local_by_tag.contains_key(&tag) {
            return Err(AtomError::DuplicateTag(tag));
        }
        self.clear_ghosts();
        let index = self.nlocal;
        self.positions.push(position);
        self.velocities.push(velocity);
        self.types.push(itype);
        self.tags.push(tag);
        self.local_by_tag.insert(tag, index);
        self.nlocal += 1;
        Ok(index)
    }

    /// Appends a ghost replica and returns its index.
    pub fn push_ghost(
        &mut self,
        tag: AtomTag,
        itype: usize,
        position: Point3<f64>,
        velocity: Vector3<f64>,
    ) -> Result<usize, AtomError> {
        self.check_type(tag, itype)?;
        let index = self.positions.len();
        self.positions.push(position);
        self.velocities.push(velocity);
        self.types.push(itype);
        self.tags.push(tag);
        Ok(index)
    }

    pub fn clear_ghosts(&mut self) {
        self.positions.truncate(self.nlocal);
        self.velocities.truncate(self.nlocal);
        self.types.truncate(self.nlocal);
        self.tags.truncate(self.nlocal);
    }

    fn check_type(&self, tag: AtomTag, itype: usize) -> Result<(), AtomError> {
        if itype == 0 || itype > self.ntypes() {
            return Err(AtomError::InvalidType {
                tag,
                itype,
                ntypes: self.ntypes(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn nlocal(&self) -> usize {
        self.nlocal
    }

    #[inline]
    pub fn nghost(&self) -> usize {
        self.positions.len() - self.nlocal
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn is_local(&self, index: usize) -> bool {
        index < self.nlocal
    }

    #[inline]
    pub fn ntypes(&self) -> usize {
        self.masses.len()
    }

    #[inline]
    pub fn mass(&self, itype: usize) -> f64 {
        self.masses[itype - 1]
    }

    #[inline]
    pub fn itype(&self, index: usize) -> usize {
        self.types[index]
    }

    #[inline]
    pub fn tag(&self, index: usize) -> AtomTag {
        self.tags[index]
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.positions
    }

    pub fn local_positions(&self) -> &[Point3<f64>] {
        &self.positions[..self.nlocal]
    }

    pub fn local_positions_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.positions[..self.nlocal]
    }

    pub fn velocities(&self) -> &[Vector3<f64>] {
        &self.velocities
    }

    pub fn local_velocities_mut(&mut self) -> &mut [Vector3<f64>] {
        &mut self.velocities[..self.nlocal]
    }

    /// Positions and velocities of all atoms, for ghost refreshes.
    pub fn kinematics_mut(&mut self) -> (&mut [Point3<f64>], &mut [Vector3<f64>]) {
        (&mut self.positions, &mut self.velocities)
    }

    pub fn types(&self) -> &[usize] {
        &self.types
    }

    pub fn tags(&self) -> &[AtomTag] {
        &self.tags
    }

    /// Local index owning `tag`, if any.
    pub fn local_index(&self, tag: AtomTag) -> Option<usize> {
        self.local_by_tag.get(&tag).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Point3<f64> {
        Point3::origin()
    }

    #[test]
    fn new_rejects_non_positive_masses() {
        assert_eq!(
            AtomSet::new(vec![1.0, 0.0]),
            Err(AtomError::NonPositiveMass {
                itype: 2,
                mass: 0.0
            })
        );
    }

    #[test]
    fn push_local_rejects_out_of_range_type() {
        let mut atoms = AtomSet::new(vec![1.0]).unwrap();
        let result = atoms.push_local(AtomTag(1), 2, origin(), Vector3::zeros());
        assert!(matches!(result, Err(AtomError::InvalidType { itype: 2, .. })));
        let result = atoms.push_local(AtomTag(1), 0, origin(), Vector3::zeros());
        assert!(matches!(result, Err(AtomError::InvalidType { itype: 0, .. })));
    }

    #[test]
    fn push_local_rejects_duplicate_tags() {
        let mut atoms = AtomSet::new(vec![1.0]).unwrap();
        atoms
            .push_local(AtomTag(7), 1, origin(), Vector3::zeros())
            .unwrap();
        let result = atoms.push_local(AtomTag(7), 1, origin(), Vector3::zeros());
        assert_eq!(result, Err(AtomError::DuplicateTag(AtomTag(7))));
    }

    #[test]
    fn ghosts_follow_locals_and_are_dropped_when_a_local_is_added() {
        let mut atoms = AtomSet::new(vec![1.0]).unwrap();
        atoms
            .push_local(AtomTag(1), 1, origin(), Vector3::zeros())
            .unwrap();
        let ghost = atoms
            .push_ghost(AtomTag(1), 1, Point3::new(10.0, 0.0, 0.0), Vector3::zeros())
            .unwrap();
        assert_eq!(ghost, 1);
        assert_eq!(atoms.nlocal(), 1);
        assert_eq!(atoms.nghost(), 1);
        assert!(!atoms.is_local(ghost));

        atoms
            .push_local(AtomTag(2), 1, origin(), Vector3::zeros())
            .unwrap();
        assert_eq!(atoms.nghost(), 0);
        assert_eq!(atoms.len(), 2);
        assert_eq!(atoms.local_index(AtomTag(2)), Some(1));
    }

    #[test]
    fn clear_ghosts_keeps_locals_intact() {
        let mut atoms = AtomSet::new(vec![2.0]).unwrap();
        atoms
            .push_local(AtomTag(3), 1, Point3::new(1.0, 2.0, 3.0), Vector3::zeros())
            .unwrap();
        atoms
            .push_ghost(AtomTag(3), 1, Point3::new(11.0, 2.0, 3.0), Vector3::zeros())
            .unwrap();
        atoms.clear_ghosts();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms.positions()[0], Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atoms.mass(1), 2.0);
    }
}

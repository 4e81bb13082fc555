use crate::prelude::*;
use std::iter::zip;
use thiserror::Error;

/// Errors from composing two structures
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("inconsistent number of frames: {0} and {1}")]
    FrameCountMismatch(usize, usize),

    #[error("nothing to combine")]
    NoOperands,
}

/// Non-mutating merge of two structures.
///
/// The result holds `a`'s atoms followed by `b`'s atoms; every frame
/// is the concatenation of the operands' frames in that order, so both
/// operands must have the same number of frames. The index array is
/// reset to the contiguous 1-based sequence while residue ids are
/// concatenated without renumbering. Derived values are reinitialized
/// and the unique-value collections rebuilt. `a` serves as the base:
/// its classification map and id carry over.
///
/// Atom order depends only on operand order, never on grouping, so
/// folding a sequence of structures is associative in effect.
pub fn combine(a: &Structure, b: &Structure) -> Result<Structure, ComposeError> {
    if a.number_of_frames() != b.number_of_frames() {
        return Err(ComposeError::FrameCountMismatch(
            a.number_of_frames(),
            b.number_of_frames(),
        ));
    }

    let mut atoms = a.atoms.clone();
    atoms.extend(b.atoms.iter().cloned());

    let frames: Vec<Vec<Pos>> = zip(&a.frames, &b.frames)
        .map(|(fa, fb)| {
            let mut f = fa.clone();
            f.extend(fb.iter().cloned());
            f
        })
        .collect();

    let mut c = Structure {
        atoms,
        frames,
        moltype_map: a.moltype_map.clone(),
        id: a.id,
        ..Default::default()
    };
    c.reindex();
    c.original_index = c.index.clone();
    c.original_resid = c.atoms.iter().map(|at| at.resid).collect();
    c.rederive();
    Ok(c)
}

/// Left fold of [combine] over a sequence of structures.
pub fn combine_all<'a>(
    structures: impl IntoIterator<Item = &'a Structure>,
) -> Result<Structure, ComposeError> {
    let mut it = structures.into_iter();
    let first = it.next().ok_or(ComposeError::NoOperands)?;
    let mut acc = first.clone();
    for s in it {
        acc = combine(&acc, s)?;
    }
    Ok(acc)
}

impl Structure {
    /// Appends `other`'s atoms and per-frame coordinates onto this
    /// structure.
    ///
    /// Frame counts must match, exactly as in [combine]. Afterwards
    /// the atom count is defined by the extended atom array, the index
    /// is reset to the contiguous 1-based sequence, the original
    /// index/resid snapshots are extended with `other`'s, derived
    /// values are reinitialized and the unique-value collections
    /// rebuilt.
    pub fn extend(&mut self, other: &Structure) -> Result<(), ComposeError> {
        if self.number_of_frames() != other.number_of_frames() {
            return Err(ComposeError::FrameCountMismatch(
                self.number_of_frames(),
                other.number_of_frames(),
            ));
        }

        self.atoms.extend(other.atoms.iter().cloned());
        for (f, fo) in zip(&mut self.frames, &other.frames) {
            f.extend(fo.iter().cloned());
        }
        self.original_index.extend_from_slice(&other.original_index);
        self.original_resid.extend_from_slice(&other.original_resid);

        self.reindex();
        self.reset_derived();
        self.rederive();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mol(names: &[&str], resid0: i32, x0: f64) -> Structure {
        let n = names.len();
        Structure::create(n)
            .names(names.iter().map(|s| s.to_string()).collect())
            .resids((resid0..resid0 + n as i32).collect())
            .coords(vec![(0..n)
                .map(|i| Pos::new(x0 + i as f64, 0.0, 0.0))
                .collect()])
            .build()
    }

    #[test]
    fn combine_concatenates_and_reindexes() {
        let a = mol(&["A1", "A2"], 10, 0.0);
        let b = mol(&["B1", "B2", "B3"], 1, 5.0);
        let c = combine(&a, &b).unwrap();

        assert_eq!(c.natoms(), a.natoms() + b.natoms());
        assert_eq!(c.index(), &[1, 2, 3, 4, 5]);
        // Residue ids are concatenated without renumbering
        let resids: Vec<i32> = c.iter_atoms().map(|at| at.resid).collect();
        assert_eq!(resids, vec![10, 11, 1, 2, 3]);
        // A's atoms first, then B's
        assert_eq!(c.atoms()[0].name, "A1");
        assert_eq!(c.atoms()[2].name, "B1");
        // Frames are stacked atom-wise
        assert_eq!(c.frame(0).unwrap()[2], Pos::new(5.0, 0.0, 0.0));
        assert_eq!(c.uniques().names.len(), 5);
    }

    #[test]
    fn combine_rejects_mismatched_frame_counts() {
        let a = mol(&["A1"], 1, 0.0);
        let mut b = mol(&["B1"], 1, 0.0);
        b.set_coords(vec![vec![Pos::origin()]; 3]).unwrap();
        assert!(matches!(
            combine(&a, &b),
            Err(ComposeError::FrameCountMismatch(1, 3))
        ));
    }

    #[test]
    fn combine_reinitializes_derived_values() {
        let mut a = mol(&["A1"], 1, 0.0);
        a.calculate_mass();
        assert!(a.total_mass() > 0.0);
        let c = combine(&a, &a.clone()).unwrap();
        assert_eq!(c.total_mass(), 0.0);
        assert!(c.mass().is_empty());
        assert_eq!(c.original_index(), &[1, 2]);
    }

    #[test]
    fn combine_is_associative_in_atom_order() {
        let a = mol(&["A1"], 1, 0.0);
        let b = mol(&["B1"], 1, 1.0);
        let c = mol(&["C1"], 1, 2.0);

        let left = combine(&combine(&a, &b).unwrap(), &c).unwrap();
        let right = combine(&a, &combine(&b, &c).unwrap()).unwrap();

        let order = |s: &Structure| s.iter_atoms().map(|at| at.name.clone()).collect::<Vec<_>>();
        assert_eq!(order(&left), order(&right));
        assert_eq!(left.frame(0).unwrap(), right.frame(0).unwrap());

        let folded = combine_all([&a, &b, &c]).unwrap();
        assert_eq!(order(&folded), order(&left));
    }

    #[test]
    fn combine_all_of_nothing_fails() {
        assert!(matches!(
            combine_all(std::iter::empty()),
            Err(ComposeError::NoOperands)
        ));
    }

    #[test]
    fn extend_round_trips_for_the_original_prefix() {
        let a = mol(&["A1", "A2"], 7, 0.0);
        let b = mol(&["B1"], 3, 9.0);
        let mut ext = a.clone();
        ext.extend(&b).unwrap();

        assert_eq!(ext.natoms(), 3);
        assert_eq!(ext.index(), &[1, 2, 3]);
        // Truncating back to a.natoms() reproduces a's arrays in order
        assert_eq!(&ext.atoms()[..a.natoms()], a.atoms());
        assert_eq!(&ext.frame(0).unwrap()[..a.natoms()], a.frame(0).unwrap());
        assert_eq!(&ext.original_resid()[..a.natoms()], a.original_resid());
        // Uniques track the extended arrays
        assert_eq!(ext.uniques().names.len(), 3);
    }

    #[test]
    fn extend_rejects_mismatched_frame_counts() {
        let mut a = mol(&["A1"], 1, 0.0);
        let mut b = mol(&["B1"], 1, 0.0);
        b.set_coords(vec![vec![Pos::origin()]; 2]).unwrap();
        assert!(matches!(
            a.extend(&b),
            Err(ComposeError::FrameCountMismatch(1, 2))
        ));
        // Failed extension leaves the receiver untouched
        assert_eq!(a.natoms(), 1);
    }
}

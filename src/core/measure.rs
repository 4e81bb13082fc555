use crate::io::{FrameSource, FrameSourceError};
use crate::prelude::*;
use log::warn;
use nalgebra::SymmetricEigen;
use num_traits::Bounded;
use rustc_hash::FxHashMap;
use std::iter::zip;
use thiserror::Error;

//==============================================================
// Traits for measuring (immutable access)
//==============================================================

/// Errors that can occur during measurements
#[derive(Error, Debug)]
pub enum MeasureError {
    /// Total mass of the structure is zero
    #[error("zero mass")]
    ZeroMass,

    /// Operation is undefined for a structure without atoms
    #[error("no atoms")]
    Empty,

    /// Atoms of one residue must form a single contiguous run
    #[error("residue id {0} reappears after a different residue")]
    NonContiguousResid(i32),

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Source(#[from] FrameSourceError),
}

/// Trait for analysis requiring only positions
pub trait MeasurePos: PosProvider + LenProvider {
    /// Returns the minimum and maximum coordinates across all dimensions
    fn min_max(&self) -> Result<(Pos, Pos), MeasureError> {
        if self.is_empty() {
            return Err(MeasureError::Empty);
        }
        let mut lower = Pos::max_value();
        let mut upper = Pos::min_value();
        for p in self.iter_pos() {
            for d in 0..3 {
                if p[d] < lower[d] {
                    lower[d] = p[d]
                }
                if p[d] > upper[d] {
                    upper[d] = p[d]
                }
            }
        }
        Ok((lower, upper))
    }

    /// Calculates the geometric center (centroid) of all positions
    fn center_of_geometry(&self) -> Result<Pos, MeasureError> {
        if self.is_empty() {
            return Err(MeasureError::Empty);
        }
        let mut cog = Vector3d::zeros();
        for c in self.iter_pos() {
            cog += c.coords;
        }
        Ok(Pos::from(cog / self.len() as f64))
    }
}

impl MeasurePos for [Pos] {}

/// Trait for analysis requiring positions and masses
pub trait MeasureMasses: PosProvider + MassesProvider + LenProvider {
    /// Calculates the mass-weighted center of the positions
    fn center_of_mass(&self) -> Result<Pos, MeasureError> {
        let mut cm = Vector3d::zeros();
        let mut mass = 0.0;
        for (c, m) in zip(self.iter_pos(), self.iter_masses()) {
            cm += c.coords * m;
            mass += m;
        }

        if mass == 0.0 {
            Err(MeasureError::ZeroMass)
        } else {
            Ok(Pos::from(cm / mass))
        }
    }

    /// Radius of gyration: the unweighted root-mean-square distance of
    /// the positions from their mass-weighted center.
    fn gyration(&self) -> Result<f64, MeasureError> {
        let c = self.center_of_mass()?;
        let sd: f64 = self.iter_pos().map(|p| (p - c).norm_squared()).sum();
        // len > 0 is guaranteed since center_of_mass() found mass
        Ok((sd / self.len() as f64).sqrt())
    }
}

/// Principal moments of inertia of one frame. Moments and axes come
/// straight from the eigen-decomposition and are not sorted by
/// magnitude; callers must not assume an ordering.
#[derive(Debug, Clone)]
pub struct Inertia {
    /// Eigenvalues of the inertia tensor.
    pub moments: Vector3d,
    /// Eigenvectors, one per column, matching `moments` by position.
    pub axes: Matrix3d,
    /// The accumulated inertia tensor itself.
    pub tensor: Matrix3d,
}

/// Outcome of the mass calculation. Element symbols absent from the
/// standard atomic weight table contribute nothing; they are listed
/// here (and logged) instead of failing the calculation.
#[derive(Debug, Clone)]
pub struct MassReport {
    pub total_mass: f64,
    /// Distinct unknown element symbols in first-seen order.
    pub unknown_elements: Vec<String>,
}

/// Inertia tensor accumulated over already-centered positions
fn do_inertia_tensor(coords: &[Pos], masses: &[f64]) -> Matrix3d {
    let mut tens = Matrix3d::zeros();
    for (d, m) in zip(coords, masses) {
        tens[(0, 0)] += m * (d.y * d.y + d.z * d.z);
        tens[(1, 1)] += m * (d.x * d.x + d.z * d.z);
        tens[(2, 2)] += m * (d.x * d.x + d.y * d.y);
        tens[(0, 1)] -= m * d.x * d.y;
        tens[(0, 2)] -= m * d.x * d.z;
        tens[(1, 2)] -= m * d.y * d.z;
    }
    tens[(1, 0)] = tens[(0, 1)];
    tens[(2, 0)] = tens[(0, 2)];
    tens[(2, 1)] = tens[(1, 2)];
    tens
}

/// Numerical rank of a 3x3 tensor from its singular values with
/// tolerance s_max * 3 * eps.
fn rank3(m: &Matrix3d) -> usize {
    let sv = m.singular_values();
    let tol = sv.max() * 3.0 * f64::EPSILON;
    sv.iter().filter(|&&s| s > tol).count()
}

fn fold_min_max(lower: &mut Pos, upper: &mut Pos, lo: &Pos, hi: &Pos) {
    for d in 0..3 {
        if lo[d] < lower[d] {
            lower[d] = lo[d];
        }
        if hi[d] > upper[d] {
            upper[d] = hi[d];
        }
    }
}

//==============================================================
// Property calculations over a whole Structure. These write their
// results back into the structure's cached fields.
//==============================================================
impl Structure {
    /// Fills the per-atom mass array from the standard atomic weight
    /// table and sums the total mass. Unknown element symbols keep a
    /// mass of 0.0 and contribute nothing to the total. Deterministic
    /// and frame-independent.
    pub fn calculate_mass(&mut self) -> MassReport {
        self.total_mass = 0.0;
        self.mass = vec![0.0; self.atoms.len()];
        let mut unknown: Vec<String> = Vec::new();

        for (i, at) in self.atoms.iter().enumerate() {
            match standard_atomic_weight(&at.element) {
                Some(w) => {
                    self.mass[i] = w;
                    self.total_mass += w;
                }
                None => {
                    if !unknown.contains(&at.element) {
                        unknown.push(at.element.clone());
                    }
                }
            }
        }
        for element in &unknown {
            warn!("element {element} not found");
        }

        MassReport {
            total_mass: self.total_mass,
            unknown_elements: unknown,
        }
    }

    /// Center of mass of the given frame. Computes masses first if the
    /// total mass is not yet known.
    pub fn calculate_center_of_mass(&mut self, frame: usize) -> Result<Pos, MeasureError> {
        if self.total_mass <= 0.0 {
            self.calculate_mass();
        }
        let com = self.frame_view(frame)?.center_of_mass()?;
        self.com = Some(com);
        Ok(com)
    }

    /// Radius of gyration of the given frame. The center of mass is
    /// recomputed for the frame; deviations from it are unweighted.
    pub fn calculate_radius_of_gyration(&mut self, frame: usize) -> Result<f64, MeasureError> {
        self.calculate_center_of_mass(frame)?;
        let rg = self.frame_view(frame)?.gyration()?;
        self.rg = Some(rg);
        Ok(rg)
    }

    /// Principal moments of inertia of the given frame.
    ///
    /// The frame is translated so its center of mass sits at the
    /// origin, the symmetric tensor is accumulated, and the original
    /// coordinates are restored. A singular tensor (rank < 3, the
    /// linear/degenerate case) has no defined eigen-decomposition and
    /// yields `Ok(None)`.
    pub fn calculate_principal_moments_of_inertia(
        &mut self,
        frame: usize,
    ) -> Result<Option<Inertia>, MeasureError> {
        let com = self.calculate_center_of_mass(frame)?;

        let saved = self.frame(frame)?.to_vec();
        self.frame_view_mut(frame)?.translate(&(-com.coords));
        let tensor = do_inertia_tensor(self.frame(frame)?, &self.mass);
        self.frames[frame] = saved;

        if rank3(&tensor) < 3 {
            warn!("singular inertia tensor, eigen-decomposition is not defined");
            return Ok(None);
        }

        let eig = SymmetricEigen::new(tensor);
        Ok(Some(Inertia {
            moments: eig.eigenvalues,
            axes: eig.eigenvectors,
            tensor,
        }))
    }

    /// Root-mean-square deviation from another structure: one scalar
    /// over every frame and atom of the pair, divided by the number of
    /// atoms.
    ///
    /// Undefined when the atom counts differ, either structure is
    /// empty, or the frame counts differ; reported as `None` with a
    /// logged diagnostic so batch comparisons can continue.
    pub fn calculate_root_mean_square_deviation(&self, other: &Structure) -> Option<f64> {
        if self.natoms() != other.natoms() {
            warn!(
                "rmsd not calculated: number of atoms {} != {}",
                self.natoms(),
                other.natoms()
            );
            return None;
        }
        if self.natoms() == 0 {
            warn!("rmsd not calculated: no atoms");
            return None;
        }
        if self.number_of_frames() != other.number_of_frames() {
            warn!(
                "rmsd not calculated: number of frames {} != {}",
                self.number_of_frames(),
                other.number_of_frames()
            );
            return None;
        }

        let mut sd = 0.0;
        for (fa, fb) in zip(&self.frames, &other.frames) {
            for (p1, p2) in zip(fa, fb) {
                sd += (p2 - p1).norm_squared();
            }
        }
        Some((sd / self.natoms() as f64).sqrt())
    }

    /// Bounding box of one frame.
    pub fn calculate_minimum_and_maximum_one_frame(
        &mut self,
        frame: usize,
    ) -> Result<(Pos, Pos), MeasureError> {
        let (lo, hi) = self.frame_view(frame)?.min_max()?;
        self.minimum = Some(lo);
        self.maximum = Some(hi);
        Ok((lo, hi))
    }

    /// Bounding box over every atom of every frame held in memory.
    pub fn calculate_minimum_and_maximum(&mut self) -> Result<(Pos, Pos), MeasureError> {
        if self.natoms() == 0 {
            return Err(MeasureError::Empty);
        }
        let mut lower = Pos::max_value();
        let mut upper = Pos::min_value();
        for f in &self.frames {
            let (lo, hi) = f.as_slice().min_max()?;
            fold_min_max(&mut lower, &mut upper, &lo, &hi);
        }
        self.minimum = Some(lower);
        self.maximum = Some(upper);
        Ok((lower, upper))
    }

    /// Bounding box over an external trajectory source, one frame at a
    /// time, without holding the trajectory in memory. Each frame is
    /// read into frame 0 of this structure, its box is taken and the
    /// boxes are reduced componentwise; the source is closed at the
    /// end.
    pub fn calculate_minimum_and_maximum_all_frames(
        &mut self,
        source: &mut impl FrameSource,
    ) -> Result<(Pos, Pos), MeasureError> {
        if self.natoms() == 0 {
            return Err(MeasureError::Empty);
        }
        let mut lower = Pos::max_value();
        let mut upper = Pos::min_value();

        for i in 0..source.n_frames() {
            let coords = source.read_next_frame()?;
            if coords.len() != self.natoms() {
                return Err(FrameSourceError::AtomCount(i, coords.len(), self.natoms()).into());
            }
            self.frames[0] = coords;
            let (lo, hi) = self.frame_view(0)?.min_max()?;
            fold_min_max(&mut lower, &mut upper, &lo, &hi);
        }
        source.close()?;

        self.minimum = Some(lower);
        self.maximum = Some(upper);
        Ok((lower, upper))
    }

    /// Sums the per-atom charges over each contiguous run of equal
    /// residue id and broadcasts the sum back onto every atom of the
    /// run. A residue id that reappears after a different one violates
    /// the contiguity precondition.
    pub fn calculate_residue_charge(&mut self) -> Result<&[f64], MeasureError> {
        let mut runs: Vec<(i32, f64, usize)> = Vec::new();
        for at in &self.atoms {
            match runs.last_mut() {
                Some((resid, sum, count)) if *resid == at.resid => {
                    *sum += at.charge;
                    *count += 1;
                }
                _ => {
                    if runs.iter().any(|&(resid, _, _)| resid == at.resid) {
                        return Err(MeasureError::NonContiguousResid(at.resid));
                    }
                    runs.push((at.resid, at.charge, 1));
                }
            }
        }

        let mut rc = Vec::with_capacity(self.atoms.len());
        for (_, sum, count) in runs {
            rc.extend(std::iter::repeat(sum).take(count));
        }
        self.residue_charge = rc;
        Ok(&self.residue_charge)
    }

    /// Tallies the per-atom element array into element counts.
    pub fn calculate_molecular_formula(&mut self) -> &FxHashMap<String, usize> {
        let mut formula = FxHashMap::default();
        for at in &self.atoms {
            *formula.entry(at.element.clone()).or_insert(0) += 1;
        }
        self.formula = formula;
        &self.formula
    }

    /// Geometric center of the given frame.
    pub fn center_of_geometry(&self, frame: usize) -> Result<Pos, MeasureError> {
        self.frame_view(frame)?.center_of_geometry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_carbons() -> Structure {
        Structure::create(2)
            .element("C")
            .coords(vec![vec![Pos::origin(), Pos::new(2.0, 0.0, 0.0)]])
            .build()
    }

    #[test]
    fn mass_is_idempotent() {
        let mut s = two_carbons();
        let first = s.calculate_mass();
        let second = s.calculate_mass();
        assert_eq!(first.total_mass.to_bits(), second.total_mass.to_bits());
        assert!(first.unknown_elements.is_empty());
        assert_eq!(s.mass().len(), 2);
    }

    #[test]
    fn unknown_elements_contribute_nothing_and_are_reported() {
        let mut s = Structure::create(3)
            .elements(vec!["C".into(), "Xx".into(), "Xx".into()])
            .build();
        let report = s.calculate_mass();
        assert_eq!(report.unknown_elements, vec!["Xx".to_string()]);
        assert_eq!(report.total_mass, standard_atomic_weight("C").unwrap());
        assert_eq!(s.mass()[1], 0.0);
        assert_eq!(s.mass()[2], 0.0);
    }

    #[test]
    fn com_and_gyration_of_two_equal_masses() {
        let mut s = two_carbons();
        let com = s.calculate_center_of_mass(0).unwrap();
        assert_eq!(com, Pos::new(1.0, 0.0, 0.0));
        let rg = s.calculate_radius_of_gyration(0).unwrap();
        assert_eq!(rg, 1.0);
        assert_eq!(s.com(), Some(com));
        assert_eq!(s.rg(), Some(1.0));
    }

    #[test]
    fn min_max_of_single_atom_is_the_atom() {
        let p = Pos::new(73.944, 41.799, 41.652);
        let mut s = Structure::create(1).coords(vec![vec![p]]).build();
        let (lo, hi) = s.calculate_minimum_and_maximum_one_frame(0).unwrap();
        assert_eq!(lo, p);
        assert_eq!(hi, p);
        assert_eq!(s.minimum(), Some(p));
        assert_eq!(s.maximum(), Some(p));
    }

    #[test]
    fn min_max_over_all_frames_in_memory() {
        let mut s = Structure::create(1)
            .coords(vec![
                vec![Pos::new(1.0, -5.0, 2.0)],
                vec![Pos::new(-3.0, 4.0, 0.5)],
            ])
            .build();
        let (lo, hi) = s.calculate_minimum_and_maximum().unwrap();
        assert_eq!(lo, Pos::new(-3.0, -5.0, 0.5));
        assert_eq!(hi, Pos::new(1.0, 4.0, 2.0));
    }

    #[test]
    fn linear_system_has_singular_inertia_tensor() {
        let mut s = Structure::create(3)
            .element("C")
            .coords(vec![vec![
                Pos::origin(),
                Pos::new(1.0, 0.0, 0.0),
                Pos::new(2.0, 0.0, 0.0),
            ]])
            .build();
        let pmi = s.calculate_principal_moments_of_inertia(0).unwrap();
        assert!(pmi.is_none());
    }

    #[test]
    fn nonlinear_system_has_full_rank_tensor() {
        let mut s = Structure::create(3)
            .element("O")
            .coords(vec![vec![
                Pos::origin(),
                Pos::new(1.0, 0.0, 0.0),
                Pos::new(0.0, 1.0, 1.0),
            ]])
            .build();
        let pmi = s.calculate_principal_moments_of_inertia(0).unwrap().unwrap();
        assert!(pmi.moments.iter().all(|&m| m > 0.0));
        // The tensor is the one the moments were derived from
        assert_eq!(pmi.tensor, pmi.tensor.transpose());
    }

    #[test]
    fn inertia_restores_the_frame() {
        let coords = vec![
            Pos::new(0.3, -1.0, 2.5),
            Pos::new(1.1, 0.0, -0.5),
            Pos::new(-2.0, 1.0, 0.25),
        ];
        let mut s = Structure::create(3)
            .element("N")
            .coords(vec![coords.clone()])
            .build();
        s.calculate_principal_moments_of_inertia(0).unwrap();
        assert_eq!(s.frame(0).unwrap(), coords.as_slice());
    }

    #[test]
    fn rmsd_with_itself_is_zero() {
        let s = Structure::create(2)
            .coords(vec![vec![Pos::new(1.0, 2.0, 3.0), Pos::new(-1.0, 0.5, 2.0)]])
            .build();
        assert_eq!(s.calculate_root_mean_square_deviation(&s), Some(0.0));
    }

    #[test]
    fn rmsd_of_incompatible_structures_is_none() {
        let a = Structure::create(2).build();
        let b = Structure::create(3).build();
        assert_eq!(a.calculate_root_mean_square_deviation(&b), None);

        let empty = Structure::create(0).build();
        assert_eq!(empty.calculate_root_mean_square_deviation(&empty), None);

        let mut c = Structure::create(2).build();
        c.set_coords(vec![vec![Pos::origin(); 2]; 2]).unwrap();
        assert_eq!(a.calculate_root_mean_square_deviation(&c), None);
    }

    #[test]
    fn rmsd_sums_over_frames_but_divides_by_natoms() {
        let a = Structure::create(1)
            .coords(vec![vec![Pos::origin()], vec![Pos::origin()]])
            .build();
        let b = Structure::create(1)
            .coords(vec![vec![Pos::new(1.0, 0.0, 0.0)], vec![Pos::new(1.0, 0.0, 0.0)]])
            .build();
        // Two frames of unit displacement for one atom: sqrt(2/1)
        assert_eq!(
            a.calculate_root_mean_square_deviation(&b),
            Some(2.0f64.sqrt())
        );
    }

    #[test]
    fn molecular_formula_tallies_elements() {
        let mut s = Structure::create(3)
            .elements(vec!["H".into(), "H".into(), "O".into()])
            .build();
        let formula = s.calculate_molecular_formula();
        assert_eq!(formula.get("H"), Some(&2));
        assert_eq!(formula.get("O"), Some(&1));
        assert_eq!(formula.len(), 2);
    }

    #[test]
    fn residue_charge_sums_contiguous_runs() {
        let mut s = Structure::create(5)
            .resids(vec![1, 1, 2, 2, 2])
            .charges(vec![0.5, -0.25, 1.0, 1.0, -0.5])
            .build();
        let rc = s.calculate_residue_charge().unwrap();
        assert_eq!(rc, &[0.25, 0.25, 1.5, 1.5, 1.5]);
    }

    #[test]
    fn residue_charge_rejects_non_contiguous_resid() {
        let mut s = Structure::create(3).resids(vec![1, 2, 1]).build();
        assert!(matches!(
            s.calculate_residue_charge(),
            Err(MeasureError::NonContiguousResid(1))
        ));
    }

    #[test]
    fn empty_structure_reports_well_defined_results() {
        let mut s = Structure::new();
        let report = s.calculate_mass();
        assert_eq!(report.total_mass, 0.0);
        assert!(matches!(
            s.calculate_center_of_mass(0),
            Err(MeasureError::ZeroMass)
        ));
        assert!(matches!(
            s.calculate_radius_of_gyration(0),
            Err(MeasureError::ZeroMass)
        ));
        assert!(matches!(
            s.calculate_minimum_and_maximum_one_frame(0),
            Err(MeasureError::Empty)
        ));
        assert!(matches!(
            s.calculate_minimum_and_maximum(),
            Err(MeasureError::Empty)
        ));
        assert_eq!(s.calculate_residue_charge().unwrap(), &[] as &[f64]);
    }
}

use crate::prelude::*;
use log::warn;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Errors related to structure creation and field assignment
#[derive(Error, Debug)]
pub enum StructureError {
    #[error("per-atom array of length {0} does not match {1} atoms")]
    BadLength(usize, usize),

    #[error("frame {0} has {1} positions, expected {2}")]
    BadFrameShape(usize, usize, usize),

    #[error("coordinate trajectory must contain at least one frame")]
    NoFrames,

    #[error("frame index {0} out of allowed range 0:{1}")]
    FrameIndex(usize, usize),
}

/// Externally supplied classification of residue names into
/// [molecule types](MolType). Residue names absent from the map
/// classify as [MolType::Other].
#[derive(Debug, Default, Clone)]
pub struct MolTypeMap(FxHashMap<String, MolType>);

impl MolTypeMap {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, resname: impl Into<String>, moltype: MolType) {
        self.0.insert(resname.into(), moltype);
    }

    pub fn get(&self, resname: &str) -> MolType {
        self.0.get(resname).copied().unwrap_or_default()
    }
}

impl<S: Into<String>> FromIterator<(S, MolType)> for MolTypeMap {
    fn from_iter<I: IntoIterator<Item = (S, MolType)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Distinct values of the per-atom arrays, sorted and deduplicated.
/// Rebuilt whenever the per-atom arrays change: creation, composition,
/// field assignment. Cardinalities are the lengths of the vectors.
#[derive(Debug, Default, Clone)]
pub struct UniqueValues {
    pub names: Vec<String>,
    pub resnames: Vec<String>,
    pub resids: Vec<i32>,
    pub chains: Vec<char>,
    pub segnames: Vec<String>,
    pub elements: Vec<String>,
    pub moltypes: Vec<MolType>,
    pub occupancies: Vec<f64>,
    pub betas: Vec<f64>,
}

fn distinct<T: Ord + Clone>(it: impl Iterator<Item = T>) -> Vec<T> {
    let mut v: Vec<T> = it.collect();
    v.sort();
    v.dedup();
    v
}

fn distinct_f64(it: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = it.collect();
    v.sort_by(f64::total_cmp);
    v.dedup();
    v
}

impl UniqueValues {
    fn rebuild(atoms: &[Atom]) -> Self {
        Self {
            names: distinct(atoms.iter().map(|at| at.name.clone())),
            resnames: distinct(atoms.iter().map(|at| at.resname.clone())),
            resids: distinct(atoms.iter().map(|at| at.resid)),
            chains: distinct(atoms.iter().map(|at| at.chain)),
            segnames: distinct(atoms.iter().map(|at| at.segname.clone())),
            elements: distinct(atoms.iter().map(|at| at.element.clone())),
            moltypes: distinct(atoms.iter().map(|at| at.moltype)),
            occupancies: distinct_f64(atoms.iter().map(|at| at.occupancy)),
            betas: distinct_f64(atoms.iter().map(|at| at.beta)),
        }
    }
}

/// The molecular attribute store: per-atom records, the coordinate
/// trajectory and the derived values cached by the property
/// calculations.
///
/// Invariants maintained across creation, composition and field
/// assignment:
/// - every per-atom array has length `natoms`;
/// - every trajectory frame holds exactly `natoms` positions;
/// - the unique-value collections reflect the current per-atom arrays.
///
/// A [Structure] is typically populated by an external loader or built
/// with a [StructureBuilder]; calculations from the measure module
/// borrow it and write their cached results back into it.
#[derive(Debug, Clone)]
pub struct Structure {
    pub(crate) atoms: Vec<Atom>,
    pub(crate) index: Vec<i32>,
    pub(crate) original_index: Vec<i32>,
    pub(crate) original_resid: Vec<i32>,
    /// Trajectory: one `Vec<Pos>` of length `natoms` per frame.
    pub(crate) frames: Vec<Vec<Pos>>,

    // Derived values, owned by the structure once computed
    pub(crate) mass: Vec<f64>,
    pub(crate) total_mass: f64,
    pub(crate) com: Option<Pos>,
    pub(crate) rg: Option<f64>,
    pub(crate) minimum: Option<Pos>,
    pub(crate) maximum: Option<Pos>,
    pub(crate) residue_charge: Vec<f64>,
    pub(crate) formula: FxHashMap<String, usize>,
    pub(crate) uniques: UniqueValues,

    pub(crate) moltype_map: MolTypeMap,
    pub(crate) extra: FxHashMap<String, Vec<f64>>,
    pub(crate) id: i32,
}

impl Default for Structure {
    fn default() -> Self {
        Self {
            atoms: Vec::new(),
            index: Vec::new(),
            original_index: Vec::new(),
            original_resid: Vec::new(),
            frames: vec![Vec::new()],
            mass: Vec::new(),
            total_mass: 0.0,
            com: None,
            rg: None,
            minimum: None,
            maximum: None,
            residue_charge: Vec::new(),
            formula: FxHashMap::default(),
            uniques: UniqueValues::default(),
            moltype_map: MolTypeMap::default(),
            extra: FxHashMap::default(),
            id: 0,
        }
    }
}

impl Structure {
    /// Empty structure: no atoms, a single empty frame.
    pub fn new() -> Self {
        Default::default()
    }

    /// Starts building a structure of `natoms` atoms.
    pub fn create(natoms: usize) -> StructureBuilder {
        StructureBuilder::new(natoms)
    }

    pub fn natoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn number_of_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn iter_atoms(&self) -> impl AtomIterator<'_> {
        self.atoms.iter()
    }

    pub fn index(&self) -> &[i32] {
        &self.index
    }

    /// Pristine copy of the index array taken at creation.
    pub fn original_index(&self) -> &[i32] {
        &self.original_index
    }

    /// Pristine copy of the residue-id array taken at creation.
    pub fn original_resid(&self) -> &[i32] {
        &self.original_resid
    }

    pub fn frame(&self, frame: usize) -> Result<&[Pos], StructureError> {
        self.frames
            .get(frame)
            .map(|f| f.as_slice())
            .ok_or(StructureError::FrameIndex(frame, self.frames.len()))
    }

    pub(crate) fn frame_mut(&mut self, frame: usize) -> Result<&mut [Pos], StructureError> {
        let nframes = self.frames.len();
        self.frames
            .get_mut(frame)
            .map(|f| f.as_mut_slice())
            .ok_or(StructureError::FrameIndex(frame, nframes))
    }

    pub fn coords(&self) -> &[Vec<Pos>] {
        &self.frames
    }

    /// Per-atom masses. Empty until computed by the mass calculation
    /// or assigned by the loader.
    pub fn mass(&self) -> &[f64] {
        &self.mass
    }

    pub fn total_mass(&self) -> f64 {
        self.total_mass
    }

    /// Center of mass of the last frame it was calculated for.
    pub fn com(&self) -> Option<Pos> {
        self.com
    }

    /// Radius of gyration of the last frame it was calculated for.
    pub fn rg(&self) -> Option<f64> {
        self.rg
    }

    pub fn minimum(&self) -> Option<Pos> {
        self.minimum
    }

    pub fn maximum(&self) -> Option<Pos> {
        self.maximum
    }

    pub fn residue_charge(&self) -> &[f64] {
        &self.residue_charge
    }

    pub fn formula(&self) -> &FxHashMap<String, usize> {
        &self.formula
    }

    pub fn uniques(&self) -> &UniqueValues {
        &self.uniques
    }

    pub fn moltype_map(&self) -> &MolTypeMap {
        &self.moltype_map
    }

    /// Replaces the residue-name classification map and reclassifies
    /// every atom.
    pub fn set_moltype_map(&mut self, map: MolTypeMap) {
        self.moltype_map = map;
        self.rederive();
    }

    /// Optional named per-atom scalar array. Length is validated
    /// against `natoms` on insertion.
    pub fn set_extra(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<(), StructureError> {
        self.check_len(values.len())?;
        self.extra.insert(name.into(), values);
        Ok(())
    }

    pub fn extra(&self, name: &str) -> Option<&[f64]> {
        self.extra.get(name).map(|v| v.as_slice())
    }

    //---------------------------------------------------------
    // Field assignment. Each setter validates the length/shape
    // invariant and re-derives classification and unique values.
    //---------------------------------------------------------

    fn check_len(&self, len: usize) -> Result<(), StructureError> {
        if len == self.natoms() {
            Ok(())
        } else {
            Err(StructureError::BadLength(len, self.natoms()))
        }
    }

    pub fn set_names(&mut self, names: Vec<String>) -> Result<(), StructureError> {
        self.check_len(names.len())?;
        for (at, v) in self.atoms.iter_mut().zip(names) {
            at.name = v;
        }
        self.rederive();
        Ok(())
    }

    pub fn set_resnames(&mut self, resnames: Vec<String>) -> Result<(), StructureError> {
        self.check_len(resnames.len())?;
        for (at, v) in self.atoms.iter_mut().zip(resnames) {
            at.resname = v;
        }
        self.rederive();
        Ok(())
    }

    pub fn set_resids(&mut self, resids: Vec<i32>) -> Result<(), StructureError> {
        self.check_len(resids.len())?;
        for (at, v) in self.atoms.iter_mut().zip(resids) {
            at.resid = v;
        }
        self.rederive();
        Ok(())
    }

    pub fn set_chains(&mut self, chains: Vec<char>) -> Result<(), StructureError> {
        self.check_len(chains.len())?;
        for (at, v) in self.atoms.iter_mut().zip(chains) {
            at.chain = v;
        }
        self.rederive();
        Ok(())
    }

    pub fn set_segnames(&mut self, segnames: Vec<String>) -> Result<(), StructureError> {
        self.check_len(segnames.len())?;
        for (at, v) in self.atoms.iter_mut().zip(segnames) {
            at.segname = v;
        }
        self.rederive();
        Ok(())
    }

    pub fn set_elements(&mut self, elements: Vec<String>) -> Result<(), StructureError> {
        self.check_len(elements.len())?;
        for (at, v) in self.atoms.iter_mut().zip(elements) {
            at.element = v;
        }
        self.rederive();
        Ok(())
    }

    pub fn set_charges(&mut self, charges: Vec<f64>) -> Result<(), StructureError> {
        self.check_len(charges.len())?;
        for (at, v) in self.atoms.iter_mut().zip(charges) {
            at.charge = v;
        }
        self.rederive();
        Ok(())
    }

    pub fn set_occupancies(&mut self, occupancies: Vec<f64>) -> Result<(), StructureError> {
        self.check_len(occupancies.len())?;
        for (at, v) in self.atoms.iter_mut().zip(occupancies) {
            at.occupancy = v;
        }
        self.rederive();
        Ok(())
    }

    pub fn set_betas(&mut self, betas: Vec<f64>) -> Result<(), StructureError> {
        self.check_len(betas.len())?;
        for (at, v) in self.atoms.iter_mut().zip(betas) {
            at.beta = v;
        }
        self.rederive();
        Ok(())
    }

    pub fn set_index(&mut self, index: Vec<i32>) -> Result<(), StructureError> {
        self.check_len(index.len())?;
        self.index = index;
        Ok(())
    }

    /// Replaces the whole coordinate trajectory. Every frame must hold
    /// exactly `natoms` positions.
    pub fn set_coords(&mut self, frames: Vec<Vec<Pos>>) -> Result<(), StructureError> {
        if frames.is_empty() {
            return Err(StructureError::NoFrames);
        }
        for (i, f) in frames.iter().enumerate() {
            if f.len() != self.natoms() {
                return Err(StructureError::BadFrameShape(i, f.len(), self.natoms()));
            }
        }
        self.frames = frames;
        Ok(())
    }

    /// Assigns per-atom masses directly (loader-supplied masses).
    pub fn set_masses(&mut self, masses: Vec<f64>) -> Result<(), StructureError> {
        self.check_len(masses.len())?;
        self.mass = masses;
        Ok(())
    }

    pub fn set_total_mass(&mut self, total_mass: f64) {
        self.total_mass = total_mass;
    }

    //---------------------------------------------------------
    // Derived-state maintenance
    //---------------------------------------------------------

    /// Reclassifies moltypes and rebuilds the unique-value collections.
    pub(crate) fn rederive(&mut self) {
        for at in &mut self.atoms {
            at.moltype = self.moltype_map.get(&at.resname);
        }
        self.uniques = UniqueValues::rebuild(&self.atoms);
    }

    /// Clears every value cached by the property calculations.
    pub(crate) fn reset_derived(&mut self) {
        self.mass.clear();
        self.total_mass = 0.0;
        self.com = None;
        self.rg = None;
        self.minimum = None;
        self.maximum = None;
        self.residue_charge.clear();
        self.formula.clear();
    }

    /// Resets the index array to the contiguous 1-based sequence.
    pub(crate) fn reindex(&mut self) {
        self.index = (1..=self.natoms() as i32).collect();
    }

    /// Read-only view of one frame, carrying the arrays the measure
    /// traits need.
    pub fn frame_view(&self, frame: usize) -> Result<FrameView<'_>, StructureError> {
        Ok(FrameView {
            coords: self.frame(frame)?,
            masses: &self.mass,
        })
    }

    pub(crate) fn frame_view_mut(&mut self, frame: usize) -> Result<FrameViewMut<'_>, StructureError> {
        let nframes = self.frames.len();
        let coords = self
            .frames
            .get_mut(frame)
            .map(|f| f.as_mut_slice())
            .ok_or(StructureError::FrameIndex(frame, nframes))?;
        Ok(FrameViewMut { coords })
    }
}

//---------------------------------------------------------
// Frame views
//---------------------------------------------------------

/// One trajectory frame of a [Structure] for read-only analysis.
pub struct FrameView<'a> {
    coords: &'a [Pos],
    masses: &'a [f64],
}

impl LenProvider for FrameView<'_> {
    fn len(&self) -> usize {
        self.coords.len()
    }
}

impl PosProvider for FrameView<'_> {
    fn iter_pos(&self) -> impl PosIterator<'_> {
        self.coords.iter()
    }
}

impl MassesProvider for FrameView<'_> {
    fn iter_masses(&self) -> impl ExactSizeIterator<Item = f64> {
        self.masses.iter().cloned()
    }
}

impl MeasurePos for FrameView<'_> {}
impl MeasureMasses for FrameView<'_> {}

/// One trajectory frame of a [Structure] for in-place modification.
pub struct FrameViewMut<'a> {
    coords: &'a mut [Pos],
}

impl LenProvider for FrameViewMut<'_> {
    fn len(&self) -> usize {
        self.coords.len()
    }
}

impl PosProvider for FrameViewMut<'_> {
    fn iter_pos(&self) -> impl PosIterator<'_> {
        self.coords.iter()
    }
}

impl PosMutProvider for FrameViewMut<'_> {
    fn iter_pos_mut(&mut self) -> impl PosMutIterator<'_> {
        self.coords.iter_mut()
    }
}

impl ModifyPos for FrameViewMut<'_> {}

//---------------------------------------------------------
// Builder
//---------------------------------------------------------

enum Fill<T> {
    Default,
    One(T),
    Seq(Vec<T>),
}

impl<T: Clone> Fill<T> {
    /// Resolves to a per-atom array: a sequence of matching length is
    /// used verbatim, anything else broadcasts. A sequence of the
    /// wrong length falls back to the broadcast default.
    fn resolve(self, natoms: usize, field: &str, default: T) -> Vec<T> {
        match self {
            Fill::Default => vec![default; natoms],
            Fill::One(v) => vec![v; natoms],
            Fill::Seq(s) if s.len() == natoms => s,
            Fill::Seq(s) => {
                warn!(
                    "{field}: sequence of length {} does not match {natoms} atoms, using default",
                    s.len()
                );
                vec![default; natoms]
            }
        }
    }
}

/// Builds a [Structure] of a fixed number of atoms. Every per-atom
/// field takes either a single value replicated for all atoms or a
/// per-atom sequence used verbatim when its length equals `natoms`;
/// unset fields get their defaults. Index and residue-id arrays
/// default to the contiguous 1-based sequence; coordinates default to
/// one all-zero frame. A supplied trajectory that violates the shape
/// invariant is replaced by the zero default with a logged warning.
pub struct StructureBuilder {
    natoms: usize,
    id: i32,
    name: Fill<String>,
    resname: Fill<String>,
    chain: Fill<char>,
    segname: Fill<String>,
    element: Fill<String>,
    charge: Fill<f64>,
    occupancy: Fill<f64>,
    beta: Fill<f64>,
    index: Option<Vec<i32>>,
    resid: Option<Vec<i32>>,
    coords: Option<Vec<Vec<Pos>>>,
    moltype_map: MolTypeMap,
}

impl StructureBuilder {
    pub fn new(natoms: usize) -> Self {
        Self {
            natoms,
            id: 0,
            name: Fill::Default,
            resname: Fill::Default,
            chain: Fill::Default,
            segname: Fill::Default,
            element: Fill::Default,
            charge: Fill::Default,
            occupancy: Fill::Default,
            beta: Fill::Default,
            index: None,
            resid: None,
            coords: None,
            moltype_map: MolTypeMap::default(),
        }
    }

    pub fn id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Fill::One(name.into());
        self
    }

    pub fn names(mut self, names: Vec<String>) -> Self {
        self.name = Fill::Seq(names);
        self
    }

    pub fn resname(mut self, resname: impl Into<String>) -> Self {
        self.resname = Fill::One(resname.into());
        self
    }

    pub fn resnames(mut self, resnames: Vec<String>) -> Self {
        self.resname = Fill::Seq(resnames);
        self
    }

    pub fn chain(mut self, chain: char) -> Self {
        self.chain = Fill::One(chain);
        self
    }

    pub fn chains(mut self, chains: Vec<char>) -> Self {
        self.chain = Fill::Seq(chains);
        self
    }

    pub fn segname(mut self, segname: impl Into<String>) -> Self {
        self.segname = Fill::One(segname.into());
        self
    }

    pub fn segnames(mut self, segnames: Vec<String>) -> Self {
        self.segname = Fill::Seq(segnames);
        self
    }

    pub fn element(mut self, element: impl Into<String>) -> Self {
        self.element = Fill::One(element.into());
        self
    }

    pub fn elements(mut self, elements: Vec<String>) -> Self {
        self.element = Fill::Seq(elements);
        self
    }

    pub fn charge(mut self, charge: f64) -> Self {
        self.charge = Fill::One(charge);
        self
    }

    pub fn charges(mut self, charges: Vec<f64>) -> Self {
        self.charge = Fill::Seq(charges);
        self
    }

    pub fn occupancy(mut self, occupancy: f64) -> Self {
        self.occupancy = Fill::One(occupancy);
        self
    }

    pub fn occupancies(mut self, occupancies: Vec<f64>) -> Self {
        self.occupancy = Fill::Seq(occupancies);
        self
    }

    pub fn beta(mut self, beta: f64) -> Self {
        self.beta = Fill::One(beta);
        self
    }

    pub fn betas(mut self, betas: Vec<f64>) -> Self {
        self.beta = Fill::Seq(betas);
        self
    }

    pub fn index(mut self, index: Vec<i32>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn resids(mut self, resids: Vec<i32>) -> Self {
        self.resid = Some(resids);
        self
    }

    pub fn coords(mut self, frames: Vec<Vec<Pos>>) -> Self {
        self.coords = Some(frames);
        self
    }

    pub fn moltype_map(mut self, map: MolTypeMap) -> Self {
        self.moltype_map = map;
        self
    }

    pub fn build(self) -> Structure {
        let n = self.natoms;
        let contiguous = || (1..=n as i32).collect::<Vec<_>>();

        let index = match self.index {
            Some(seq) if seq.len() == n => seq,
            Some(seq) => {
                warn!(
                    "index: sequence of length {} does not match {n} atoms, using 1..={n}",
                    seq.len()
                );
                contiguous()
            }
            None => contiguous(),
        };
        let resid = match self.resid {
            Some(seq) if seq.len() == n => seq,
            Some(seq) => {
                warn!(
                    "resid: sequence of length {} does not match {n} atoms, using 1..={n}",
                    seq.len()
                );
                contiguous()
            }
            None => contiguous(),
        };

        // Coordinates failing the shape invariant fall back to the
        // all-zero single-frame default.
        let frames = match self.coords {
            Some(frames)
                if !frames.is_empty() && frames.iter().all(|f| f.len() == n) =>
            {
                frames
            }
            Some(frames) => {
                warn!(
                    "coordinates of {} frames violate the ({n}, 3) frame shape, using zero default",
                    frames.len()
                );
                vec![vec![Pos::origin(); n]]
            }
            None => vec![vec![Pos::origin(); n]],
        };

        let names = self.name.resolve(n, "name", "C".into());
        let resnames = self.resname.resolve(n, "resname", "DUM".into());
        let chains = self.chain.resolve(n, "chain", 'A');
        let segnames = self.segname.resolve(n, "segname", "DUM".into());
        let elements = self.element.resolve(n, "element", "C".into());
        let charges = self.charge.resolve(n, "charge", 0.0);
        let occupancies = self.occupancy.resolve(n, "occupancy", 0.0);
        let betas = self.beta.resolve(n, "beta", 0.0);

        let atoms = itertools::izip!(names, resnames, chains, segnames, elements, charges, occupancies, betas)
            .zip(&resid)
            .map(
                |((name, resname, chain, segname, element, charge, occupancy, beta), &resid)| Atom {
                    name,
                    resname,
                    resid,
                    chain,
                    segname,
                    element,
                    charge,
                    occupancy,
                    beta,
                    moltype: MolType::Other,
                },
            )
            .collect();

        let mut s = Structure {
            atoms,
            original_index: index.clone(),
            original_resid: resid,
            index,
            frames,
            moltype_map: self.moltype_map,
            id: self.id,
            ..Default::default()
        };
        s.rederive();
        s
    }
}

use std::fmt;

/// Molecule-type classification of a residue. Assigned from an
/// externally supplied residue-name mapping; unmapped residue names
/// classify as [MolType::Other].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MolType {
    Protein,
    Rna,
    Dna,
    Water,
    #[default]
    Other,
}

impl fmt::Display for MolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MolType::Protein => "protein",
            MolType::Rna => "rna",
            MolType::Dna => "dna",
            MolType::Water => "water",
            MolType::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Information about the atom except its coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Atom name.
    pub name: String,
    /// Residue name.
    pub resname: String,
    /// Residue id (aka residue number). This could be negative!
    pub resid: i32,
    /// Chain identifier.
    pub chain: char,
    /// Segment identifier.
    pub segname: String,
    /// Element symbol. Case-sensitive; isotope labels such as "D"
    /// and "1H" are distinct symbols.
    pub element: String,
    /// Charge in electron charges.
    pub charge: f64,
    /// Occupancy. Order-significant metadata, not used in calculations.
    pub occupancy: f64,
    /// B-factor. Order-significant metadata, not used in calculations.
    pub beta: f64,
    /// Molecule-type classification of the atom's residue.
    pub moltype: MolType,
}

impl Default for Atom {
    fn default() -> Self {
        Self {
            name: "C".into(),
            resname: "DUM".into(),
            resid: 1,
            chain: 'A',
            segname: "DUM".into(),
            element: "C".into(),
            charge: 0.0,
            occupancy: 0.0,
            beta: 0.0,
            moltype: MolType::Other,
        }
    }
}

impl Atom {
    pub fn new() -> Self {
        Default::default()
    }
}

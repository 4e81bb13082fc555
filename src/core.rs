mod atom;
mod structure;
mod compose;
mod providers;
mod measure;
mod modify;
mod periodic_table;

pub use {
    atom::*,
    structure::*,
    compose::*,
    providers::*,
    measure::*,
    modify::*,
    periodic_table::*,
};

// Aliases for vectors and points
pub type Vector3d = nalgebra::Vector3<f64>;
pub type Matrix3d = nalgebra::Matrix3<f64>;
pub type Pos = nalgebra::Point3<f64>; // Atom position

// Define alias traits for iterators to make it less verbose
pub trait PosIterator<'a>: ExactSizeIterator<Item = &'a Pos> {}
impl<'a, T> PosIterator<'a> for T where T: ExactSizeIterator<Item = &'a Pos> {}

pub trait PosMutIterator<'a>: ExactSizeIterator<Item = &'a mut Pos> {}
impl<'a, T> PosMutIterator<'a> for T where T: ExactSizeIterator<Item = &'a mut Pos> {}

pub trait AtomIterator<'a>: ExactSizeIterator<Item = &'a Atom> {}
impl<'a, T> AtomIterator<'a> for T where T: ExactSizeIterator<Item = &'a Atom> {}

pub trait AtomMutIterator<'a>: ExactSizeIterator<Item = &'a mut Atom> {}
impl<'a, T> AtomMutIterator<'a> for T where T: ExactSizeIterator<Item = &'a mut Atom> {}

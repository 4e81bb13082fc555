use crate::prelude::*;

//--------------------------------------------------------------
// Immutable providers
//--------------------------------------------------------------
pub trait LenProvider {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait PosProvider {
    fn iter_pos(&self) -> impl PosIterator<'_>;
}

pub trait MassesProvider {
    fn iter_masses(&self) -> impl ExactSizeIterator<Item = f64>;
}

pub trait AtomsProvider {
    fn iter_atoms(&self) -> impl AtomIterator<'_>;
}

//--------------------------------------------------------------
// Mutable providers
//--------------------------------------------------------------
pub trait PosMutProvider: PosProvider {
    fn iter_pos_mut(&mut self) -> impl PosMutIterator<'_>;
}

//----------------------------------------------------
// Impls for plain containers
//----------------------------------------------------
impl LenProvider for [Pos] {
    fn len(&self) -> usize {
        <[Pos]>::len(self)
    }
}

impl PosProvider for [Pos] {
    fn iter_pos(&self) -> impl PosIterator<'_> {
        self.iter()
    }
}

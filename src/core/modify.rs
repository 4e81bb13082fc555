use super::Vector3d;
use super::providers::*;

//==============================================================
// Traits for modification (mutable access)
//==============================================================

/// Trait for modification requiring only positions
pub trait ModifyPos: PosMutProvider {
    fn translate(&mut self, shift: &Vector3d) {
        for el in self.iter_pos_mut() {
            *el += shift;
        }
    }
}

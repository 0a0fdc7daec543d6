use crate::{Densityf32, Direction};

/// A single fibre-orientation element within one voxel: a unit direction
/// plus a scalar fibre density. Orientations are antipodally symmetric, so
/// all angular comparisons go through the absolute dot product.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fixel {
    pub direction: Direction,
    pub density: Densityf32,
}

impl Fixel {

    pub fn new(direction: Direction, density: Densityf32) -> Self {
        Self { direction: direction.normalize(), density }
    }

    /// Dot product between two fixel orientations, folded onto [0,1]
    pub fn absdot(&self, other: &Fixel) -> f32 {
        self.direction.dot(&other.direction).abs().min(1.0)
    }

    /// This fixel's direction, antipodally flipped if needed so that it lies
    /// in the same hemisphere as `reference`
    pub fn oriented_towards(&self, reference: &Direction) -> Direction {
        if self.direction.dot(reference) < 0.0 { -self.direction } else { self.direction }
    }
}

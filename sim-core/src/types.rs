/// Identifier for a stem in a [`crate::stem::StemField`].
///
/// This is the step counter value at which the stem's current top drop
/// stuck, so identifiers are unique and increase over a simulation's life.
pub type PointId = u64;

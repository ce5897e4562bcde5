/// Script and scene data structures.
pub mod model;
/// Time-to-scene lookup.
pub mod position;

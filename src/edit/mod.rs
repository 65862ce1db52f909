pub mod accumulator;
pub mod engine;
pub mod filters;

pub use accumulator::Accumulator;
pub use engine::{CpuFilterEngine, FilterEngine};
pub use filters::{EffectPreset, EffectSet, FilterChain, FilterKind, FilterOp, FilterParams};

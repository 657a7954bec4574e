//! Drive the frame clock: prefetch, render every frame in order, pace, capture and finalize.

pub(crate) mod orchestrator;
pub(crate) mod plan;
pub(crate) mod state;

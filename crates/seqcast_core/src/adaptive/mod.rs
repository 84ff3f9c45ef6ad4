pub mod reanalysis;
pub mod verification;

pub use reanalysis::{
    DeferredSpawner, InlineSpawner, Job, ReanalysisReport, ReanalysisWorker, SharedModel, Spawner,
    ThreadSpawner,
};
pub use verification::{ControllerState, Transition, VerificationController};

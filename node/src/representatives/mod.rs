mod online_reps;
mod rep_weights;

pub use online_reps::{OnlineReps, PeeredRep, ONLINE_WEIGHT_QUORUM};
pub use rep_weights::RepWeights;

//! Real-time exercise repetition counting and form feedback.
//!
//! Frames of body-joint landmarks go in; coaching feedback, a repetition
//! count and a synchronized remote workout session come out.

pub mod config;
pub mod counter;
pub mod error;
pub mod exercise;
pub mod feedback;
pub mod output;
pub mod pose;
pub mod store;
pub mod sync;
pub mod workout;

// Re-exports for convenience
pub use config::CoachConfig;
pub use counter::{RepCounter, RepPhase, RepState, ThresholdConfig};
pub use error::{CoachError, Result, StoreError};
pub use exercise::{AngleSet, ExerciseKind};
pub use feedback::{classify, Feedback};
pub use pose::{angle, Joint, Landmark, PoseFrame};
pub use store::{Credential, HttpSessionStore, InMemorySessionStore, SessionStore, WorkoutEntry};
pub use sync::{CompletionOutcome, Lifecycle, SessionSync};
pub use workout::{StoppedWorkout, Workout, WorkoutConfig, WorkoutEngine, WorkoutEvent, WorkoutSummary};

//! Exercise definitions
//!
//! An [`ExerciseKind`] decides which landmark triples are measured each
//! frame, which angle drives repetition counting, and the default
//! hysteresis band.

use serde::{Deserialize, Serialize};

use crate::counter::ThresholdConfig;
use crate::error::CoachError;
use crate::pose::{joint_angle, Joint, PoseFrame};

/// Vertical offset of the synthetic point used as the "upright" reference
/// when measuring back lean (normalized image units, y grows downward).
const VERTICAL_REFERENCE_OFFSET: f64 = 0.1;

/// Supported exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Squat,
    Pushup,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 2] = [ExerciseKind::Squat, ExerciseKind::Pushup];

    /// Wire name used by the session store
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseKind::Squat => "squat",
            ExerciseKind::Pushup => "pushup",
        }
    }

    /// Default hysteresis band for the primary angle
    pub fn default_thresholds(self) -> ThresholdConfig {
        match self {
            ExerciseKind::Squat => ThresholdConfig::SQUAT,
            ExerciseKind::Pushup => ThresholdConfig::PUSHUP,
        }
    }

    /// Name of the angle that drives repetition counting
    pub fn primary_label(self) -> &'static str {
        match self {
            ExerciseKind::Squat => "knee",
            ExerciseKind::Pushup => "elbow",
        }
    }

    /// Name of the angle the safety rules inspect
    pub fn alignment_label(self) -> &'static str {
        match self {
            ExerciseKind::Squat => "back",
            ExerciseKind::Pushup => "body",
        }
    }

    /// Coaching prompt shown when a workout begins
    pub fn start_prompt(self) -> &'static str {
        match self {
            ExerciseKind::Squat => "Stand straight to begin",
            ExerciseKind::Pushup => "Turn sideways and start pushups",
        }
    }

    /// Measure this exercise's angles in a frame.
    ///
    /// Returns `None` when any required joint is missing; the caller skips
    /// feedback and counting for that frame.
    pub fn measure(self, frame: &PoseFrame) -> Option<AngleSet> {
        match self {
            ExerciseKind::Squat => {
                let knee = joint_angle(frame, Joint::RightHip, Joint::RightKnee, Joint::RightAnkle)?;
                let hip = joint_angle(frame, Joint::RightShoulder, Joint::RightHip, Joint::RightKnee)?;
                let shoulder = frame.get(Joint::RightShoulder)?;
                let hip_point = frame.get(Joint::RightHip)?;
                let vertical = hip_point.offset(0.0, -VERTICAL_REFERENCE_OFFSET);
                let back = crate::pose::angle(Some(shoulder), Some(hip_point), Some(&vertical));
                Some(AngleSet {
                    primary: knee,
                    alignment: back,
                    auxiliary: Some(hip),
                })
            }
            ExerciseKind::Pushup => {
                let elbow = joint_angle(frame, Joint::RightShoulder, Joint::RightElbow, Joint::RightWrist)?;
                let body = joint_angle(frame, Joint::RightShoulder, Joint::RightHip, Joint::RightAnkle)?;
                Some(AngleSet {
                    primary: elbow,
                    alignment: body,
                    auxiliary: None,
                })
            }
        }
    }
}

impl std::str::FromStr for ExerciseKind {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "squat" | "squats" => Ok(ExerciseKind::Squat),
            "pushup" | "pushups" | "push-up" | "push-ups" => Ok(ExerciseKind::Pushup),
            other => Err(CoachError::UnknownExercise {
                name: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Angles measured in one frame for one exercise, in degrees.
///
/// For squats `primary` is the knee, `alignment` the back lean from
/// vertical and `auxiliary` the hip; for pushups `primary` is the elbow and
/// `alignment` the shoulder-hip-ankle body line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AngleSet {
    pub primary: f64,
    pub alignment: f64,
    pub auxiliary: Option<f64>,
}

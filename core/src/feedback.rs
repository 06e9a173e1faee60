//! Form feedback classification
//!
//! Each exercise owns an ordered rule table. Rules are tried top to bottom
//! and the first match wins, so safety cues listed first always beat the
//! encouragement cues below them.

use serde::Serialize;

use crate::exercise::{AngleSet, ExerciseKind};

/// Coaching message for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    // Squat
    KeepChestUpright,
    StandToBegin,
    GoDeeper,
    GreatForm,
    ControlMovement,
    // Pushup
    KeepBodyStraight,
    LowerBody,
    GoingDown,
    PushUp,
}

impl Feedback {
    pub fn message(self) -> &'static str {
        match self {
            Feedback::KeepChestUpright => "Keep your chest upright",
            Feedback::StandToBegin => "Stand straight and begin squat",
            Feedback::GoDeeper => "Go deeper",
            Feedback::GreatForm => "Great form",
            Feedback::ControlMovement => "Control your movement",
            Feedback::KeepBodyStraight => "Keep your body straight",
            Feedback::LowerBody => "Lower your body",
            Feedback::GoingDown => "Going down...",
            Feedback::PushUp => "Push up!",
        }
    }

    /// True for cues that point out a form problem
    pub fn is_corrective(self) -> bool {
        matches!(self, Feedback::KeepChestUpright | Feedback::KeepBodyStraight)
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

type Predicate = fn(&AngleSet) -> bool;

/// One entry of a rule table
struct Rule {
    applies: Predicate,
    feedback: Feedback,
}

const fn rule(applies: Predicate, feedback: Feedback) -> Rule {
    Rule { applies, feedback }
}

// Back lean from vertical, degrees
const SQUAT_MAX_LEAN: f64 = 35.0;
const SQUAT_GOOD_LEAN: f64 = 25.0;
// Knee angle, degrees
const SQUAT_STANDING: f64 = 160.0;
const SQUAT_SHALLOW: f64 = 120.0;
const SQUAT_TARGET_DEPTH: f64 = 110.0;

// Shoulder-hip-ankle line, degrees
const PUSHUP_MIN_BODY_LINE: f64 = 150.0;
// Elbow angle, degrees
const PUSHUP_EXTENDED: f64 = 160.0;
const PUSHUP_BOTTOM: f64 = 90.0;

const SQUAT_RULES: &[Rule] = &[
    rule(|a| a.alignment > SQUAT_MAX_LEAN, Feedback::KeepChestUpright),
    rule(|a| a.primary > SQUAT_STANDING, Feedback::StandToBegin),
    rule(|a| a.primary > SQUAT_SHALLOW, Feedback::GoDeeper),
    rule(
        |a| a.primary <= SQUAT_TARGET_DEPTH && a.alignment <= SQUAT_GOOD_LEAN,
        Feedback::GreatForm,
    ),
];

const PUSHUP_RULES: &[Rule] = &[
    rule(|a| a.alignment < PUSHUP_MIN_BODY_LINE, Feedback::KeepBodyStraight),
    rule(|a| a.primary > PUSHUP_EXTENDED, Feedback::LowerBody),
    rule(|a| a.primary > PUSHUP_BOTTOM, Feedback::GoingDown),
];

impl ExerciseKind {
    fn rules(self) -> (&'static [Rule], Feedback) {
        match self {
            ExerciseKind::Squat => (SQUAT_RULES, Feedback::ControlMovement),
            ExerciseKind::Pushup => (PUSHUP_RULES, Feedback::PushUp),
        }
    }
}

/// Pick the coaching message for one frame's angles
pub fn classify(exercise: ExerciseKind, angles: &AngleSet) -> Feedback {
    let (rules, fallback) = exercise.rules();
    rules
        .iter()
        .find(|rule| (rule.applies)(angles))
        .map(|rule| rule.feedback)
        .unwrap_or(fallback)
}

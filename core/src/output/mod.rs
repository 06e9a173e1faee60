//! Output formatting module
//!
//! Renders workout progress, summaries and the effective configuration
//! for the terminal using colored output.

use console::Style;

use crate::config::CoachConfig;
use crate::exercise::ExerciseKind;
use crate::feedback::Feedback;
use crate::store::WorkoutEntry;
use crate::sync::CompletionOutcome;
use crate::workout::{WorkoutEvent, WorkoutSummary};

/// Output formatter for CLI results
pub struct OutputFormatter {
    // Styles
    blue: Style,
    green: Style,
    yellow: Style,
    red: Style,
    bold: Style,
    /// Only print feedback when it changes; frames arrive many times a second
    last_feedback: Option<Feedback>,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self {
            blue: Style::new().blue(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            bold: Style::new().bold(),
            last_feedback: None,
        }
    }
}

impl OutputFormatter {
    /// Create a new formatter
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format_start(&self, exercise: ExerciseKind) -> String {
        format!(
            "{} {}\n{}",
            self.bold.apply_to("Workout started:"),
            exercise,
            exercise.start_prompt()
        )
    }

    /// Line for an event, or `None` when there is nothing new to show
    pub fn format_event(&mut self, exercise: ExerciseKind, event: &WorkoutEvent) -> Option<String> {
        match event {
            WorkoutEvent::Measured { angles, feedback } => {
                if self.last_feedback == Some(*feedback) {
                    return None;
                }
                self.last_feedback = Some(*feedback);
                let style = if feedback.is_corrective() { &self.red } else { &self.green };
                Some(format!(
                    "{} {:>5.1}°  {} {:>5.1}°  {}",
                    exercise.primary_label(),
                    angles.primary,
                    exercise.alignment_label(),
                    angles.alignment,
                    style.apply_to(feedback)
                ))
            }
            WorkoutEvent::RepCompleted { count } => {
                Some(format!("{} {}", self.bold.apply_to("Reps:"), count))
            }
            WorkoutEvent::Tick { duration_seconds } if duration_seconds % 10 == 0 => Some(format!(
                "{}",
                self.blue.apply_to(format!("Duration: {}s", duration_seconds))
            )),
            WorkoutEvent::SessionStarted { session_id } => Some(format!(
                "{}",
                self.green.apply_to(format!("Session {}", session_id))
            )),
            WorkoutEvent::SessionUnavailable => Some(format!(
                "{}",
                self.yellow.apply_to("Session unavailable; the workout will be saved at the end")
            )),
            WorkoutEvent::Tick { .. } | WorkoutEvent::DetectionGap => None,
        }
    }

    pub fn format_summary(&self, summary: &WorkoutSummary) -> String {
        let mut out = format!(
            "{}\nExercise: {}\nReps: {}\nDuration: {}s",
            self.bold.apply_to("Workout stopped"),
            summary.exercise,
            self.green.apply_to(summary.reps),
            summary.duration_seconds
        );
        if summary.degraded {
            out.push_str(&format!(
                "\n{}",
                self.yellow.apply_to("Session could not be started; results are saved at the end")
            ));
        }
        out
    }

    pub fn format_outcome(&self, outcome: &CompletionOutcome) -> String {
        match outcome {
            CompletionOutcome::Completed { session_id } => {
                format!("{} {}", self.green.apply_to("Session saved:"), session_id)
            }
            CompletionOutcome::FallbackSaved { cause: Some(cause) } => format!(
                "{} ({})",
                self.yellow.apply_to("Workout saved without session"),
                cause.user_message()
            ),
            CompletionOutcome::FallbackSaved { cause: None } => {
                format!("{}", self.yellow.apply_to("Workout saved without session"))
            }
            CompletionOutcome::Lost { error } => format!(
                "{} {}",
                self.red.apply_to("Workout could not be saved:"),
                error.user_message()
            ),
        }
    }

    pub fn format_history(&self, entries: &[WorkoutEntry]) -> String {
        if entries.is_empty() {
            return format!(
                "{}",
                self.yellow
                    .apply_to("No workouts yet. Start a workout to see history here!")
            );
        }

        let mut out = format!(
            "{}",
            self.green.apply_to(format!("Found {} workout(s)", entries.len()))
        );
        for entry in entries {
            out.push_str(&format!(
                "\n- {} {} reps, {}s",
                self.bold.apply_to(entry.exercise.as_deref().unwrap_or("Unknown")),
                entry.reps.unwrap_or(0),
                entry.duration_seconds.unwrap_or(0)
            ));
            if let Some(date) = &entry.date {
                out.push_str(&format!("  {}", date));
            }
            if let Some(status) = &entry.status {
                out.push_str(&format!("  [{}]", self.blue.apply_to(status)));
            }
            if let Some(session_id) = &entry.session_id {
                out.push_str(&format!("  session {}", session_id));
            }
        }
        out
    }

    pub fn format_config(&self, config: &CoachConfig) -> String {
        let token = if config.token.is_some() { "set" } else { "not set (anonymous)" };
        let mut out = format!(
            "{}\n- Store: {}\n- Timeout: {}s\n- Token: {}",
            self.bold.apply_to("Current Configuration:"),
            self.green.apply_to(&config.store.base_url),
            config.store.timeout_secs,
            token
        );
        for exercise in ExerciseKind::ALL {
            let t = config.thresholds_for(exercise);
            out.push_str(&format!(
                "\n- {}: up {}° / down {}°",
                exercise, t.up_threshold, t.down_threshold
            ));
        }
        out
    }

    /// Print a progress event if it has something new to say
    pub fn print_event(&mut self, exercise: ExerciseKind, event: &WorkoutEvent) {
        if let Some(line) = self.format_event(exercise, event) {
            println!("{}", line);
        }
    }

    pub fn print_start(&self, exercise: ExerciseKind) {
        println!("{}", self.format_start(exercise));
    }

    pub fn print_summary(&self, summary: &WorkoutSummary) {
        println!();
        println!("{}", self.format_summary(summary));
    }

    pub fn print_outcome(&self, outcome: &CompletionOutcome) {
        println!("{}", self.format_outcome(outcome));
    }

    pub fn print_history(&self, entries: &[WorkoutEntry]) {
        println!("{}", self.format_history(entries));
    }

    pub fn print_config(&self, config: &CoachConfig) {
        println!();
        println!("{}", self.format_config(config));
    }
}

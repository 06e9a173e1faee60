//! Pose input types
//!
//! The landmark detector is external; these types describe what it hands the
//! engine once per frame. Undetected joints are simply absent from a
//! [`PoseFrame`], and nothing here is owned beyond the current frame.

pub mod geometry;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use geometry::{angle, joint_angle};

/// Number of slots in the detector's indexed landmark array
pub const LANDMARK_SLOTS: usize = 33;

/// A detected 2D body-joint position in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    /// Depth estimate; carried through, never used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Detector confidence; carried through, never used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            visibility: None,
        }
    }

    /// A landmark with a NaN or infinite coordinate is treated as undetected
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Point offset from this one, used for synthetic reference points
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Named joints the engine reads, with their slot in the detector's
/// 33-point BlazePose layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    pub const ALL: [Joint; 13] = [
        Joint::Nose,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    pub const fn index(self) -> usize {
        match self {
            Joint::Nose => 0,
            Joint::LeftShoulder => 11,
            Joint::RightShoulder => 12,
            Joint::LeftElbow => 13,
            Joint::RightElbow => 14,
            Joint::LeftWrist => 15,
            Joint::RightWrist => 16,
            Joint::LeftHip => 23,
            Joint::RightHip => 24,
            Joint::LeftKnee => 25,
            Joint::RightKnee => 26,
            Joint::LeftAnkle => 27,
            Joint::RightAnkle => 28,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.iter().copied().find(|joint| joint.index() == index)
    }
}

/// One frame of detector output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFrame")]
pub struct PoseFrame {
    joints: HashMap<Joint, Landmark>,
}

/// Wire shapes a frame may arrive in: the detector's raw indexed array
/// (with `null` for undetected slots) or an already-named map.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFrame {
    Indexed { landmarks: Vec<Option<Landmark>> },
    Named { joints: HashMap<Joint, Landmark> },
}

impl From<RawFrame> for PoseFrame {
    fn from(raw: RawFrame) -> Self {
        match raw {
            RawFrame::Indexed { landmarks } => Self::from_indexed(&landmarks),
            RawFrame::Named { joints } => joints.into_iter().collect(),
        }
    }
}

impl PoseFrame {
    /// An empty frame (detector saw nobody)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the detector's indexed array. Slots the engine does not
    /// name are dropped; short arrays are fine.
    pub fn from_indexed(landmarks: &[Option<Landmark>]) -> Self {
        landmarks
            .iter()
            .enumerate()
            .filter_map(|(index, landmark)| {
                let joint = Joint::from_index(index)?;
                landmark.map(|lm| (joint, lm))
            })
            .collect()
    }

    pub fn with(mut self, joint: Joint, landmark: Landmark) -> Self {
        self.insert(joint, landmark);
        self
    }

    /// Record a joint; invalid coordinates are stored as absent
    pub fn insert(&mut self, joint: Joint, landmark: Landmark) {
        if landmark.is_valid() {
            self.joints.insert(joint, landmark);
        } else {
            self.joints.remove(&joint);
        }
    }

    pub fn get(&self, joint: Joint) -> Option<&Landmark> {
        self.joints.get(&joint)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

impl FromIterator<(Joint, Landmark)> for PoseFrame {
    fn from_iter<I: IntoIterator<Item = (Joint, Landmark)>>(iter: I) -> Self {
        let mut frame = PoseFrame::new();
        for (joint, landmark) in iter {
            frame.insert(joint, landmark);
        }
        frame
    }
}

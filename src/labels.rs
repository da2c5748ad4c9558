//! Fixed defect-class label table (spec §3).
//!
//! Class IDs are a closed set (0..5); this is intentionally not
//! extensible (spec Non-goals: "arbitrary defect taxonomies").

/// One of the six fixed defect classes the detector can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefectClass {
    Discoloration = 0,
    Hole = 1,
    DeadKnot = 2,
    FlowKnotDead = 3,
    FlowKnotLive = 4,
    LiveKnot = 5,
}

impl DefectClass {
    pub fn from_id(class_id: u8) -> Option<Self> {
        match class_id {
            0 => Some(Self::Discoloration),
            1 => Some(Self::Hole),
            2 => Some(Self::DeadKnot),
            3 => Some(Self::FlowKnotDead),
            4 => Some(Self::FlowKnotLive),
            5 => Some(Self::LiveKnot),
            _ => None,
        }
    }

    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Japanese label, from the fixed defect-class table.
    pub fn label_ja(&self) -> &'static str {
        match self {
            Self::Discoloration => "変色",
            Self::Hole => "穴",
            Self::DeadKnot => "死に節",
            Self::FlowKnotDead => "流れ節_死",
            Self::FlowKnotLive => "流れ節_生",
            Self::LiveKnot => "生き節",
        }
    }

    /// True for any knot variant (class_id in {2,3,4,5}), per spec §4.8.
    pub fn is_knot(&self) -> bool {
        matches!(
            self,
            Self::DeadKnot | Self::FlowKnotDead | Self::FlowKnotLive | Self::LiveKnot
        )
    }
}

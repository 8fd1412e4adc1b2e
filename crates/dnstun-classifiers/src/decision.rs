//! Class index → policy decision

use crate::classifier::ClassIndex;
use dnstun_core::{Error, Result};

/// Class reserved for tunneling traffic in the reference model
pub const DEFAULT_BLOCKED_CLASS: ClassIndex = 0;

/// Policy decision for one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Forward the query to the next handler
    Allow,
    /// Answer the query with a refusal
    Refuse,
}

impl Decision {
    /// Short label, used for logging and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Refuse => "refuse",
        }
    }
}

/// Maps the predicted class to a decision using one blocked class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionPolicy {
    blocked_class: ClassIndex,
}

impl DecisionPolicy {
    /// Create a policy refusing `blocked_class`
    pub fn new(blocked_class: ClassIndex) -> Self {
        Self { blocked_class }
    }

    /// The class that triggers a refusal
    pub fn blocked_class(&self) -> ClassIndex {
        self.blocked_class
    }

    /// Decide for a predicted class
    pub fn decide(&self, class_index: ClassIndex) -> Decision {
        if class_index == self.blocked_class {
            Decision::Refuse
        } else {
            Decision::Allow
        }
    }

    /// Check the blocked class exists in a model with `num_classes` outputs
    pub fn validate(&self, num_classes: usize) -> Result<()> {
        if self.blocked_class >= num_classes {
            return Err(Error::initialization(format!(
                "blocked class {} is out of range for a model with {} classes",
                self.blocked_class, num_classes
            )));
        }
        Ok(())
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_CLASS)
    }
}

//! Binding-time stages.

use serde::{Deserialize, Serialize};

/// When a piece of template code runs.
///
/// `Default` means "either": the node can be evaluated at generation time or
/// survive into the generated program. `Conflict` is only produced by the
/// span partition projector when two marks over one range disagree.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    #[default]
    Default,
    #[serde(rename = "generation-time")]
    GenerationTimeOnly,
    #[serde(rename = "generated")]
    GeneratedOnly,
    Conflict,
}

impl Stage {
    /// Combines the stages of sibling children into the stage of their parent.
    ///
    /// Any `GeneratedOnly` child wins. A parent whose children are all
    /// `GenerationTimeOnly` is `GenerationTimeOnly`. Everything else,
    /// including an empty child list, stays `Default`.
    pub fn combine(stages: impl IntoIterator<Item = Stage>) -> Stage {
        let mut seen_any = false;
        let mut all_generation_time = true;
        for stage in stages {
            seen_any = true;
            match stage {
                Stage::GeneratedOnly => return Stage::GeneratedOnly,
                Stage::GenerationTimeOnly => {}
                Stage::Default | Stage::Conflict => all_generation_time = false,
            }
        }
        if seen_any && all_generation_time {
            Stage::GenerationTimeOnly
        } else {
            Stage::Default
        }
    }

    pub fn is_generation_time(self) -> bool {
        self == Stage::GenerationTimeOnly
    }

    pub fn is_generated(self) -> bool {
        self == Stage::GeneratedOnly
    }

    /// Whether this stage is one of the two decided stages.
    pub fn is_determinate(self) -> bool {
        matches!(self, Stage::GenerationTimeOnly | Stage::GeneratedOnly)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Default => write!(f, "default"),
            Stage::GenerationTimeOnly => write!(f, "generation-time"),
            Stage::GeneratedOnly => write!(f, "generated"),
            Stage::Conflict => write!(f, "conflict"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_child_wins() {
        let stage = Stage::combine([
            Stage::GenerationTimeOnly,
            Stage::Default,
            Stage::GeneratedOnly,
        ]);
        assert_eq!(stage, Stage::GeneratedOnly);
    }

    #[test]
    fn test_all_generation_time() {
        let stage = Stage::combine([Stage::GenerationTimeOnly, Stage::GenerationTimeOnly]);
        assert_eq!(stage, Stage::GenerationTimeOnly);
    }

    #[test]
    fn test_default_child_keeps_default() {
        let stage = Stage::combine([Stage::GenerationTimeOnly, Stage::Default]);
        assert_eq!(stage, Stage::Default);
        assert_eq!(Stage::combine(std::iter::empty()), Stage::Default);
    }
}

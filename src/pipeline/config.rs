//! Run configuration types

use crate::cicd::threshold::Tolerance;
use crate::target::BuildTarget;

/// What a run measures, decided once before any build starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// A single package
    Single(BuildTarget),
    /// Every publishable package of a monorepo, sorted by name
    Multi(Vec<BuildTarget>),
}

impl Invocation {
    /// Targets to measure
    pub fn targets(&self) -> &[BuildTarget] {
        match self {
            Self::Single(target) => std::slice::from_ref(target),
            Self::Multi(targets) => targets,
        }
    }

    /// Whether this is a monorepo run
    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Multi(_))
    }
}

/// Per-run switches for the engine
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Allowed growth of the aggregate script
    pub tolerance: Tolerance,
    /// Write `bundle-master.json` and `bundle-pr.json`
    pub persist: bool,
    /// Write unminified builds for manual diffing
    pub diff: bool,
    /// Post the report as a review comment
    pub comment: bool,
    /// Store the current snapshot as the baseline of later runs
    pub save_baseline: bool,
    /// Packages measured at the same time
    pub workers: usize,
    /// Pull request the comment goes to; `None` means the current branch's
    pub review_target: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            persist: false,
            diff: false,
            comment: false,
            save_baseline: false,
            workers: 1,
            review_target: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_invocation_has_one_target() {
        let target = BuildTarget::new("a", "/repo", "/repo/src/index.js").unwrap();
        let invocation = Invocation::Single(target.clone());
        assert_eq!(invocation.targets(), &[target]);
        assert!(!invocation.is_multi());
    }

    #[test]
    fn test_empty_monorepo_has_no_targets() {
        let invocation = Invocation::Multi(Vec::new());
        assert!(invocation.targets().is_empty());
        assert!(invocation.is_multi());
    }
}

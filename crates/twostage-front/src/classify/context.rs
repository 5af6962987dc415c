use std::rc::Rc;

use twostage_syntax::Stage;

/// What the enclosing code demands of the node being classified.
///
/// Contexts are values: entering a nested position derives a new context
/// and the caller keeps its own.
#[derive(Clone, Debug, Default)]
pub(crate) struct ScopeContext {
    forced: Option<Rc<str>>,
    generated_condition: Option<Rc<str>>,
    loop_stage: Option<Stage>,
    /// Set when a generated condition sits between here and the enclosing
    /// generation-time loop.
    loop_crossed: Option<Rc<str>>,
}

impl ScopeContext {
    /// Requires generation time. An outer reason is kept.
    pub fn force(&self, reason: impl FnOnce() -> String) -> Self {
        let mut cx = self.clone();
        if cx.forced.is_none() {
            cx.forced = Some(reason().into());
        }
        cx
    }

    /// Inside a branch or loop body selected at run time.
    pub fn under_generated_condition(&self, reason: impl FnOnce() -> String) -> Self {
        let mut cx = self.clone();
        let crosses_loop = cx.loop_crossed.is_none()
            && cx.loop_stage.is_some_and(Stage::is_generation_time);
        if cx.generated_condition.is_none() || crosses_loop {
            let reason: Rc<str> = reason().into();
            if crosses_loop {
                cx.loop_crossed = Some(reason.clone());
            }
            cx.generated_condition.get_or_insert(reason);
        }
        cx
    }

    pub fn in_loop(&self, stage: Stage) -> Self {
        Self {
            loop_stage: Some(stage),
            loop_crossed: None,
            ..self.clone()
        }
    }

    /// The generated condition a `break` or `continue` here would have to
    /// jump out of to reach its generation-time loop.
    pub fn loop_crossed(&self) -> Option<&str> {
        self.loop_crossed.as_deref()
    }

    pub fn forced_reason(&self) -> Option<&str> {
        self.forced.as_deref()
    }

    pub fn is_forced(&self) -> bool {
        self.forced.is_some()
    }

    pub fn generated_condition(&self) -> Option<&str> {
        self.generated_condition.as_deref()
    }

    /// Stage of `break` and `continue` here.
    pub fn loop_stage(&self) -> Stage {
        self.loop_stage.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_contexts_leave_parent_untouched() {
        let root = ScopeContext::default();
        let forced = root.force(|| "receiver of `Name`".to_string());
        let nested = forced.force(|| "argument of `Log`".to_string());
        assert!(!root.is_forced());
        assert_eq!(nested.forced_reason(), Some("receiver of `Name`"));

        let looped = root.in_loop(Stage::GenerationTimeOnly);
        assert_eq!(looped.loop_stage(), Stage::GenerationTimeOnly);
        assert_eq!(root.loop_stage(), Stage::Default);
    }

    #[test]
    fn test_generated_condition_inside_generation_time_loop() {
        let root = ScopeContext::default();
        assert_eq!(root.under_generated_condition(|| "c".to_string()).loop_crossed(), None);

        let looped = root.in_loop(Stage::GenerationTimeOnly);
        let branch = looped.under_generated_condition(|| "the condition `c`".to_string());
        assert_eq!(branch.loop_crossed(), Some("the condition `c`"));
        assert_eq!(branch.generated_condition(), Some("the condition `c`"));

        let inner = branch.in_loop(Stage::GenerationTimeOnly);
        assert_eq!(inner.loop_crossed(), None);
        assert_eq!(inner.generated_condition(), Some("the condition `c`"));

        let generated_loop = root.in_loop(Stage::GeneratedOnly);
        let nested = generated_loop.under_generated_condition(|| "d".to_string());
        assert_eq!(nested.loop_crossed(), None);
    }
}

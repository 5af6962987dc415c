use std::collections::{HashMap, HashSet};

use twostage_core::Symbol;
use twostage_syntax::Stage;

/// Stages inferred for template locals during one classification pass.
#[derive(Debug, Default)]
pub(crate) struct LocalVariableBindings {
    stages: HashMap<Symbol, Stage>,
    /// Locals whose declarator is being classified right now.
    pending: HashSet<Symbol>,
}

impl LocalVariableBindings {
    pub fn get(&self, local: &Symbol) -> Option<Stage> {
        self.stages.get(local).copied()
    }

    pub fn is_pending(&self, local: &Symbol) -> bool {
        self.pending.contains(local)
    }

    pub fn record(&mut self, local: Symbol, stage: Stage) {
        self.stages.insert(local, stage);
    }

    /// Starts inferring `local`; false if that is already under way.
    pub fn begin(&mut self, local: &Symbol) -> bool {
        self.pending.insert(local.clone())
    }

    pub fn finish(&mut self, local: &Symbol, stage: Stage) {
        self.pending.remove(local);
        self.record(local.clone(), stage);
    }
}

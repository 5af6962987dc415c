use std::collections::HashMap;

use twostage_core::Symbol;

/// One generated block being built by the generator program.
#[derive(Debug)]
struct Frame {
    accumulator: String,
    locals: HashMap<Symbol, String>,
}

/// Nesting of generated blocks during quoting.
///
/// Every generated block owns a host variable (its accumulator) that
/// collects the statements it will contain, and maps the template locals
/// it declares to the host variables holding their fresh identifiers.
/// Lookups see the locals of enclosing blocks.
#[derive(Debug, Default)]
pub(crate) struct MetaContext {
    frames: Vec<Frame>,
    next_accumulator: u32,
    next_local: u32,
}

impl MetaContext {
    /// Opens a generated block and returns the name of its accumulator.
    pub fn push(&mut self) -> String {
        let accumulator = format!("__s{}", self.next_accumulator);
        self.next_accumulator += 1;
        self.frames.push(Frame {
            accumulator: accumulator.clone(),
            locals: HashMap::new(),
        });
        accumulator
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Accumulator of the innermost generated block.
    pub fn accumulator(&self) -> &str {
        self.frames
            .last()
            .map(|frame| frame.accumulator.as_str())
            .unwrap_or_else(|| panic!("no generated block is open"))
    }

    /// Allocates the host variable for a generated local declared in the
    /// innermost block. Unresolved locals get a variable but no binding.
    pub fn declare(&mut self, name: &str, local: Option<Symbol>) -> String {
        let variable = format!("__{name}_{}", self.next_local);
        self.next_local += 1;
        let frame = self
            .frames
            .last_mut()
            .unwrap_or_else(|| panic!("no generated block is open"));
        if let Some(local) = local {
            frame.locals.insert(local, variable.clone());
        }
        variable
    }

    pub fn lookup(&self, local: &Symbol) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.locals.get(local))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use twostage_core::{SymbolId, SymbolKind};

    use super::*;

    #[test]
    fn test_nested_blocks_see_outer_locals() {
        let outer_local = Symbol::new(SymbolId(1), "x", SymbolKind::Local);
        let inner_local = Symbol::new(SymbolId(2), "y", SymbolKind::Local);

        let mut meta = MetaContext::default();
        assert_eq!(meta.push(), "__s0");
        assert_eq!(meta.declare("x", Some(outer_local.clone())), "__x_0");
        assert_eq!(meta.push(), "__s1");
        assert_eq!(meta.declare("y", Some(inner_local.clone())), "__y_1");
        assert_eq!(meta.accumulator(), "__s1");
        assert_eq!(meta.lookup(&outer_local), Some("__x_0"));

        meta.pop();
        assert_eq!(meta.accumulator(), "__s0");
        assert_eq!(meta.lookup(&inner_local), None);
    }
}

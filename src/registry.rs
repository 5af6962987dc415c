//! Lookup of compiled generators by template name.

use std::collections::HashMap;
use std::rc::Rc;

use derive_more::{Display, Error, From};
use twostage_front::Generator;
use twostage_runtime::{ExpansionContext, ExpansionError};
use twostage_syntax::SyntaxNode;

#[derive(Debug, Display, Error, From)]
pub enum RegistryError {
    #[display("no generator for template `{_0}`")]
    #[from(ignore)]
    Unknown(#[error(not(source))] String),
    Expansion(ExpansionError),
}

/// Generators keyed by the name of the template they were compiled from.
#[derive(Clone, Debug, Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Generator>,
}

impl GeneratorRegistry {
    pub fn from_generators(generators: impl IntoIterator<Item = Generator>) -> Self {
        let mut registry = Self::default();
        for generator in generators {
            registry.register(generator);
        }
        registry
    }

    /// Adds `generator`, replacing any earlier one for the same template.
    pub fn register(&mut self, generator: Generator) -> Option<Generator> {
        self.generators.insert(generator.template.clone(), generator)
    }

    pub fn get(&self, template: &str) -> Option<&Generator> {
        self.generators.get(template)
    }

    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.generators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Expands the generator for `template` in `context`.
    pub fn expand(
        &self,
        template: &str,
        context: Rc<ExpansionContext>,
    ) -> Result<SyntaxNode, RegistryError> {
        let generator = self
            .get(template)
            .ok_or_else(|| RegistryError::Unknown(template.to_owned()))?;
        Ok(twostage_runtime::expand(&generator.program, context)?)
    }
}

#[cfg(test)]
mod tests {
    use twostage_core::TypeRef;
    use twostage_runtime::{InvokeOriginal, TargetMethod};
    use twostage_syntax::printer::compact;

    use super::*;
    use crate::database::{TemplateSource, TwoStageDatabase};
    use crate::pipeline::compile_with_diagnostics;

    fn registry(text: &str) -> GeneratorRegistry {
        let db = TwoStageDatabase::default();
        let source = TemplateSource::from_text(&db, "test.tpl", text);
        let result = compile_with_diagnostics(&db, source);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        GeneratorRegistry::from_generators(result.generators)
    }

    #[test]
    fn test_expand_by_template_name() {
        let registry = registry("template Greet() { Console.WriteLine(\"hi\"); }");
        assert_eq!(registry.templates().collect::<Vec<_>>(), ["Greet"]);

        let target = TargetMethod::new("Run", TypeRef::Void);
        let site = InvokeOriginal::new("Run", Vec::<String>::new());
        let context = Rc::new(ExpansionContext::new(target, site));
        let body = registry.expand("Greet", context).unwrap();
        insta::assert_snapshot!(compact(&body), @r#"{ Console.WriteLine("hi"); }"#);
    }

    #[test]
    fn test_unknown_template() {
        let registry = GeneratorRegistry::default();
        let target = TargetMethod::new("Run", TypeRef::Void);
        let site = InvokeOriginal::new("Run", Vec::<String>::new());
        let error = registry
            .expand("Missing", Rc::new(ExpansionContext::new(target, site)))
            .unwrap_err();
        assert_eq!(error.to_string(), "no generator for template `Missing`");
    }
}

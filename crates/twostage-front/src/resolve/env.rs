//! Environment manifests: the symbols a template can see besides its own
//! parameters and locals.
//!
//! A manifest is JSON:
//!
//! ```json
//! {
//!   "globals": { "Console": { "kind": "type", "type": "Console", "stage": "generated" } },
//!   "types": { "Console": { "WriteLine": { "kind": "method", "type": "void" } } }
//! }
//! ```

use std::collections::BTreeMap;

use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use twostage_core::{DeferredCallForm, Symbol, SymbolKind, SymbolStageClassifier, TypeRef};
use twostage_syntax::Stage;

#[derive(Debug, Display, Error, From)]
pub enum EnvironmentError {
    #[display("invalid environment manifest: {_0}")]
    Json(serde_json::Error),
    #[display("in `{owner}`: {source}")]
    #[from(ignore)]
    Type {
        owner: String,
        source: twostage_core::types::TypeParseError,
    },
}

/// Declaration of one global or member.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberSpec {
    pub kind: SymbolKind,
    /// Type of the value, or the return type of a method.
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferred: Option<DeferredCallForm>,
}

impl MemberSpec {
    pub fn new(kind: SymbolKind, ty: &str) -> Self {
        Self {
            kind,
            ty: ty.to_owned(),
            stage: Stage::Default,
            deferred: None,
        }
    }

    pub fn generation_time(mut self) -> Self {
        self.stage = Stage::GenerationTimeOnly;
        self
    }

    pub fn generated(mut self) -> Self {
        self.stage = Stage::GeneratedOnly;
        self
    }

    pub fn deferred(mut self, form: DeferredCallForm) -> Self {
        self.deferred = Some(form);
        self
    }

    /// The declared type. Manifests are validated on load, so a malformed
    /// type here can only come from a hand-built spec; it reads as the
    /// error type.
    pub fn type_ref(&self) -> TypeRef {
        self.ty.parse().unwrap_or(TypeRef::Error)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub globals: BTreeMap<String, MemberSpec>,
    /// Members keyed by type name, then member name.
    #[serde(default)]
    pub types: BTreeMap<String, BTreeMap<String, MemberSpec>>,
}

impl Environment {
    pub fn from_json(text: &str) -> Result<Self, EnvironmentError> {
        let environment: Environment = serde_json::from_str(text)?;
        environment.check_types()?;
        Ok(environment)
    }

    fn check_types(&self) -> Result<(), EnvironmentError> {
        let members = self.types.iter().flat_map(|(owner, members)| {
            members
                .iter()
                .map(move |(name, spec)| (format!("{owner}.{name}"), spec))
        });
        let globals = self.globals.iter().map(|(name, spec)| (name.clone(), spec));
        for (owner, spec) in globals.chain(members) {
            if let Err(source) = spec.ty.parse::<TypeRef>() {
                return Err(EnvironmentError::Type { owner, source });
            }
        }
        Ok(())
    }

    /// Overlay `other` on `self`; entries in `other` win.
    pub fn merge(mut self, other: Environment) -> Self {
        self.globals.extend(other.globals);
        for (owner, members) in other.types {
            self.types.entry(owner).or_default().extend(members);
        }
        self
    }

    pub fn global(&self, name: &str) -> Option<&MemberSpec> {
        self.globals.get(name)
    }

    /// Looks up `name` on values of type `receiver`.
    pub fn member(&self, receiver: &TypeRef, name: &str) -> Option<(&str, &MemberSpec)> {
        let owner = type_key(receiver)?;
        let (owner, members) = self.types.get_key_value(owner)?;
        Some((owner.as_str(), members.get(name)?))
    }

    /// The built-in environment: the `meta` API, `Console` and `Math`.
    pub fn standard() -> Self {
        use DeferredCallForm::*;
        use SymbolKind::*;

        let mut environment = Environment::default();
        let mut global = |name: &str, spec: MemberSpec| {
            environment.globals.insert(name.to_owned(), spec);
        };
        global("meta", MemberSpec::new(Property, "Meta").generation_time());
        global("Console", MemberSpec::new(Type, "Console").generated());
        global("Math", MemberSpec::new(Type, "Math"));

        let mut types: BTreeMap<String, BTreeMap<String, MemberSpec>> = BTreeMap::new();
        let mut member = |owner: &str, name: &str, spec: MemberSpec| {
            types
                .entry(owner.to_owned())
                .or_default()
                .insert(name.to_owned(), spec);
        };

        member("Meta", "Target", MemberSpec::new(Property, "Target").generation_time());
        member("Meta", "This", MemberSpec::new(Property, "dynamic").generation_time());
        for (name, form) in [
            ("Proceed", Plain),
            ("ProceedAsync", Awaitable),
            ("ProceedEnumerable", Sequence),
            ("ProceedEnumerator", Enumerator),
            ("ProceedAsyncEnumerable", AsyncSequence),
            ("ProceedAsyncEnumerator", AsyncEnumerator),
        ] {
            member(
                "Meta",
                name,
                MemberSpec::new(Method, "dynamic").generated().deferred(form),
            );
        }

        member("Target", "Method", MemberSpec::new(Property, "Method").generation_time());
        member(
            "Target",
            "Parameters",
            MemberSpec::new(Property, "List<Parameter>").generation_time(),
        );
        member("Method", "Name", MemberSpec::new(Property, "string").generation_time());
        member("Method", "ReturnType", MemberSpec::new(Property, "string").generation_time());
        member("Parameter", "Name", MemberSpec::new(Property, "string").generation_time());
        member("Parameter", "Type", MemberSpec::new(Property, "string").generation_time());
        member("Parameter", "Index", MemberSpec::new(Property, "int").generation_time());
        member("Parameter", "Value", MemberSpec::new(Property, "dynamic").generation_time());

        member("List", "Count", MemberSpec::new(Property, "int"));
        member("string", "Length", MemberSpec::new(Property, "int"));
        member("string", "ToUpper", MemberSpec::new(Method, "string"));
        member("string", "ToLower", MemberSpec::new(Method, "string"));

        member("Console", "WriteLine", MemberSpec::new(Method, "void").generated());
        member("Console", "Write", MemberSpec::new(Method, "void").generated());
        member("Console", "ReadLine", MemberSpec::new(Method, "string").generated());

        for name in ["Max", "Min", "Abs"] {
            member("Math", name, MemberSpec::new(Method, "int"));
        }

        environment.types = types;
        environment
    }
}

fn type_key(ty: &TypeRef) -> Option<&str> {
    match ty {
        TypeRef::Named(name) => Some(name),
        TypeRef::String => Some("string"),
        TypeRef::List(_) => Some("List"),
        _ => None,
    }
}

impl SymbolStageClassifier for Environment {
    fn classify_stage(&self, symbol: &Symbol) -> Stage {
        match symbol.kind {
            SymbolKind::Parameter => return Stage::GenerationTimeOnly,
            SymbolKind::Local | SymbolKind::Template => return Stage::Default,
            _ => {}
        }
        let spec = match &symbol.container {
            Some(container) => self
                .types
                .get(&**container)
                .and_then(|members| members.get(&*symbol.name)),
            None => self.globals.get(&*symbol.name),
        };
        spec.map_or(Stage::Default, |spec| spec.stage)
    }
}

#[cfg(test)]
mod tests {
    use twostage_core::SymbolId;

    use super::*;

    #[test]
    fn test_manifest_round_trip() {
        let json = r#"{
            "globals": { "Log": { "kind": "type", "type": "Log", "stage": "generated" } },
            "types": { "Log": { "Info": { "kind": "method", "type": "void" } } }
        }"#;
        let environment = Environment::from_json(json).unwrap();
        assert_eq!(environment.global("Log").unwrap().stage, Stage::GeneratedOnly);
        let (owner, info) = environment
            .member(&TypeRef::Named("Log".into()), "Info")
            .unwrap();
        assert_eq!(owner, "Log");
        assert_eq!(info.stage, Stage::Default);
        assert_eq!(info.type_ref(), TypeRef::Void);

        let text = serde_json::to_string(&environment).unwrap();
        assert_eq!(Environment::from_json(&text).unwrap(), environment);
    }

    #[test]
    fn test_malformed_manifest() {
        let err = Environment::from_json("{ \"globals\": 3 }").unwrap_err();
        assert!(matches!(err, EnvironmentError::Json(_)));

        let json = r#"{ "globals": { "x": { "kind": "field", "type": "Task<" } } }"#;
        let err = Environment::from_json(json).unwrap_err();
        assert_eq!(err.to_string(), "in `x`: malformed type `Task<`");
    }

    #[test]
    fn test_merge_overrides() {
        let overlay = Environment::from_json(
            r#"{ "globals": { "Math": { "kind": "type", "type": "Math", "stage": "generated" } } }"#,
        )
        .unwrap();
        let environment = Environment::standard().merge(overlay);
        assert_eq!(environment.global("Math").unwrap().stage, Stage::GeneratedOnly);
        assert!(environment.global("meta").is_some());
    }

    #[test]
    fn test_standard_classification() {
        let environment = Environment::standard();
        let name = Symbol::new(SymbolId(0), "Name", SymbolKind::Property).with_container("Method");
        assert_eq!(environment.classify_stage(&name), Stage::GenerationTimeOnly);
        let write = Symbol::new(SymbolId(1), "WriteLine", SymbolKind::Method).with_container("Console");
        assert_eq!(environment.classify_stage(&write), Stage::GeneratedOnly);
        let local = Symbol::new(SymbolId(2), "meta", SymbolKind::Local);
        assert_eq!(environment.classify_stage(&local), Stage::Default);
        let parameter = Symbol::new(SymbolId(3), "x", SymbolKind::Parameter);
        assert_eq!(environment.classify_stage(&parameter), Stage::GenerationTimeOnly);
    }
}

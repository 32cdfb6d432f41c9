//! Model assembly.
//!
//! A model collects monomer type declarations, named rate parameters, rules
//! and observables. Everything is validated eagerly: rules are resolved and
//! compiled to directed instances as they are added, so a malformed model is
//! rejected at the declaration that breaks it.

use indexmap::IndexMap;

use crate::error::ModelError;
use crate::monomer::{Monomer, Registry, TypeId};
use crate::pattern::{Pattern, ResolvedComplex};
use crate::rule::{Rule, RuleInstance};

/// A named pattern whose embedding count is reported per network species.
#[derive(Debug, Clone)]
pub(crate) struct Observable {
    pub name: String,
    pub pattern: ResolvedComplex,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub(crate) registry: Registry,
    pub(crate) parameters: IndexMap<String, f64>,
    pub(crate) instances: Vec<RuleInstance>,
    rule_names: Vec<String>,
    pub(crate) observables: Vec<Observable>,
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    /// Declare a monomer type.
    pub fn monomer(&mut self, decl: Monomer) -> Result<TypeId, ModelError> {
        self.registry.declare(decl)
    }

    /// Declare a named rate parameter.
    pub fn parameter(&mut self, name: &str, value: f64) -> Result<(), ModelError> {
        if self.parameters.contains_key(name) {
            return Err(ModelError::DuplicateParameter(name.to_string()));
        }
        self.parameters.insert(name.to_string(), value);
        Ok(())
    }

    /// Add a rule. A reversible rule contributes two directed instances.
    pub fn rule(&mut self, rule: Rule) -> Result<(), ModelError> {
        if self.rule_names.iter().any(|n| n == rule.name()) {
            return Err(ModelError::DuplicateRule(rule.name().to_string()));
        }
        let compiled = rule.compile(&self.registry, &self.parameters)?;
        self.rule_names.push(rule.name().to_string());
        self.instances.extend(compiled);
        Ok(())
    }

    /// Add one rule per variant name, built by `make`. Convenience for rule
    /// families that differ only in which monomer they mention.
    pub fn rules_for_each<'a>(
        &mut self,
        variants: impl IntoIterator<Item = &'a str>,
        mut make: impl FnMut(&str) -> Rule,
    ) -> Result<(), ModelError> {
        for v in variants {
            self.rule(make(v))?;
        }
        Ok(())
    }

    /// Register an observable pattern under `name`.
    pub fn observable(&mut self, name: &str, pattern: impl Into<Pattern>) -> Result<(), ModelError> {
        if self.observables.iter().any(|o| o.name == name) {
            return Err(ModelError::DuplicateObservable(name.to_string()));
        }
        let pattern = pattern.into().resolve(&self.registry, name)?;
        self.observables.push(Observable {
            name: name.to_string(),
            pattern,
        });
        Ok(())
    }

    pub fn parameter_value(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }
}

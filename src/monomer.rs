//! Monomer type declarations and the type registry.
//!
//! A monomer type is a named molecule kind with an ordered set of binding
//! sites; a site may additionally carry a finite alphabet of conformational
//! states with an explicitly declared default. Types are immutable once
//! declared.

use indexmap::IndexMap;

use crate::error::ModelError;

pub(crate) type TypeId = usize;

/// Finite, ordered state alphabet for a stateful site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSpace {
    labels: Vec<String>,
    default: Option<usize>,
}

impl StateSpace {
    pub(crate) fn label(&self, ix: usize) -> &str {
        &self.labels[ix]
    }

    pub(crate) fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub(crate) fn default_index(&self) -> Option<usize> {
        self.default
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|l| l.as_str())
    }
}

/// Declaration of a monomer kind, built up site by site and handed to
/// [`crate::Model::monomer`] for validation and registration.
#[derive(Debug, Clone)]
pub struct Monomer {
    name: String,
    sites: Vec<String>,
    // (site, alphabet, explicit default)
    states: Vec<(String, Vec<String>, Option<String>)>,
}

impl Monomer {
    pub fn new(name: impl Into<String>) -> Self {
        Monomer {
            name: name.into(),
            sites: Vec::new(),
            states: Vec::new(),
        }
    }

    /// Add one binding site.
    pub fn site(mut self, name: &str) -> Self {
        self.sites.push(name.to_string());
        self
    }

    /// Add several binding sites in declaration order.
    pub fn sites<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.sites.extend(names.into_iter().map(str::to_string));
        self
    }

    /// Give `site` a state alphabet with an explicit default state.
    pub fn state<'a>(
        mut self,
        site: &str,
        labels: impl IntoIterator<Item = &'a str>,
        default: &str,
    ) -> Self {
        self.states.push((
            site.to_string(),
            labels.into_iter().map(str::to_string).collect(),
            Some(default.to_string()),
        ));
        self
    }

    /// Give `site` a state alphabet without a default. Seed species cannot be
    /// derived for a monomer declared this way.
    pub fn state_no_default<'a>(
        mut self,
        site: &str,
        labels: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.states.push((
            site.to_string(),
            labels.into_iter().map(str::to_string).collect(),
            None,
        ));
        self
    }
}

/// A declared, validated monomer type.
#[derive(Debug, Clone)]
pub struct MonomerType {
    pub(crate) name: String,
    pub(crate) sites: Vec<String>,
    /// Parallel to `sites`; `None` for stateless sites.
    pub(crate) states: Vec<Option<StateSpace>>,
}

impl MonomerType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    pub(crate) fn site_index(&self, site: &str) -> Option<usize> {
        self.sites.iter().position(|s| s == site)
    }
}

/// Registry of all declared monomer types, in declaration order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Registry {
    types: IndexMap<String, MonomerType>,
}

impl Registry {
    pub fn declare(&mut self, decl: Monomer) -> Result<TypeId, ModelError> {
        if self.types.contains_key(&decl.name) {
            return Err(ModelError::DuplicateType(decl.name));
        }
        let mut states: Vec<Option<StateSpace>> = vec![None; decl.sites.len()];
        for (site, labels, default) in decl.states {
            let ix = decl.sites.iter().position(|s| *s == site).ok_or_else(|| {
                ModelError::InvalidSiteState {
                    monomer: decl.name.clone(),
                    site: site.clone(),
                    reason: "not a declared site".to_string(),
                }
            })?;
            if labels.len() < 2 {
                return Err(ModelError::InvalidSiteState {
                    monomer: decl.name.clone(),
                    site,
                    reason: format!("alphabet has {} label(s), need at least 2", labels.len()),
                });
            }
            let default = match default {
                Some(d) => Some(labels.iter().position(|l| *l == d).ok_or_else(|| {
                    ModelError::InvalidSiteState {
                        monomer: decl.name.clone(),
                        site: site.clone(),
                        reason: format!("default state `{d}` is not in the alphabet"),
                    }
                })?),
                None => None,
            };
            states[ix] = Some(StateSpace { labels, default });
        }
        let id = self.types.len();
        self.types.insert(
            decl.name.clone(),
            MonomerType {
                name: decl.name,
                sites: decl.sites,
                states,
            },
        );
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Result<TypeId, ModelError> {
        self.types
            .get_index_of(name)
            .ok_or_else(|| ModelError::UnknownType(name.to_string()))
    }

    pub fn get(&self, id: TypeId) -> &MonomerType {
        self.types
            .get_index(id)
            .expect("type id out of range")
            .1
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &MonomerType)> {
        self.types.values().enumerate()
    }
}

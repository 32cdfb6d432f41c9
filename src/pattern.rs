//! Molecule and complex patterns.
//!
//! A pattern is a possibly underspecified complex used as a rule's reactant
//! or product template. Sites not mentioned in a pattern are wildcards:
//! bound or free, any state. Mentioned sites constrain the bond (`free`,
//! `bound` to anything, or `link`ed to a numbered partner within the same
//! pattern) and/or the state, which are orthogonal axes.

use std::collections::HashMap;
use std::ops::Rem;

use petgraph::unionfind::UnionFind;

use crate::error::ModelError;
use crate::monomer::{Registry, TypeId};

/// Bond constraint on a mentioned site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondSpec {
    /// No constraint (the site was mentioned only for its state).
    Wild,
    /// The site must be unbound.
    Free,
    /// The site must be bound, partner unconstrained.
    Bound,
    /// The site is bound via the numbered link to its partner site, which
    /// carries the same link id elsewhere in the pattern.
    Link(u32),
}

#[derive(Debug, Clone)]
struct SiteSpec {
    bond: BondSpec,
    state: Option<String>,
}

/// A single-molecule pattern: one monomer with constraints on the sites it
/// mentions. Combine molecules into a [`Pattern`] with the `%` operator.
#[derive(Debug, Clone)]
pub struct Mol {
    monomer: String,
    sites: Vec<(String, SiteSpec)>,
}

impl Mol {
    pub fn new(monomer: impl Into<String>) -> Self {
        Mol {
            monomer: monomer.into(),
            sites: Vec::new(),
        }
    }

    fn entry(&mut self, site: &str) -> &mut SiteSpec {
        if let Some(ix) = self.sites.iter().position(|(s, _)| s == site) {
            &mut self.sites[ix].1
        } else {
            self.sites.push((
                site.to_string(),
                SiteSpec {
                    bond: BondSpec::Wild,
                    state: None,
                },
            ));
            &mut self.sites.last_mut().unwrap().1
        }
    }

    /// Require `site` to be unbound.
    pub fn free(mut self, site: &str) -> Self {
        self.entry(site).bond = BondSpec::Free;
        self
    }

    /// Require `site` to be bound to anything.
    pub fn bound(mut self, site: &str) -> Self {
        self.entry(site).bond = BondSpec::Bound;
        self
    }

    /// Bind `site` via the numbered link `id` to its partner in the pattern.
    pub fn link(mut self, site: &str, id: u32) -> Self {
        self.entry(site).bond = BondSpec::Link(id);
        self
    }

    /// Require `site` to be in state `label`. Leaves the bond constraint
    /// untouched; a site can be linked and state-constrained at once.
    pub fn state(mut self, site: &str, label: &str) -> Self {
        self.entry(site).state = Some(label.to_string());
        self
    }
}

/// A complex pattern: molecule patterns joined by numbered links. Must be
/// connected; independent reactants are separate patterns on the rule.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub(crate) mols: Vec<Mol>,
}

impl From<Mol> for Pattern {
    fn from(m: Mol) -> Self {
        Pattern { mols: vec![m] }
    }
}

impl Rem for Mol {
    type Output = Pattern;

    fn rem(self, rhs: Mol) -> Pattern {
        Pattern {
            mols: vec![self, rhs],
        }
    }
}

impl Rem<Mol> for Pattern {
    type Output = Pattern;

    fn rem(mut self, rhs: Mol) -> Pattern {
        self.mols.push(rhs);
        self
    }
}

/// Index-resolved bond constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BondReq {
    Wild,
    Free,
    Bound,
    Link(u32),
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedSite {
    pub bond: BondReq,
    pub state: Option<usize>,
    pub mentioned: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedMol {
    pub ty: TypeId,
    /// One entry per declared site of the type.
    pub sites: Vec<ResolvedSite>,
}

/// A pattern resolved against the registry: monomer names replaced by type
/// ids, state labels by indices, links collected as endpoint pairs.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedComplex {
    pub mols: Vec<ResolvedMol>,
    /// (link id, endpoint, endpoint) with endpoints as (mol, site).
    pub links: Vec<(u32, (usize, usize), (usize, usize))>,
}

impl ResolvedComplex {
    /// The other endpoint of link `id`, seen from `from`.
    pub fn link_partner(&self, id: u32, from: (usize, usize)) -> (usize, usize) {
        let (_, a, b) = self
            .links
            .iter()
            .find(|(l, _, _)| *l == id)
            .expect("link id present");
        if *a == from {
            *b
        } else {
            *a
        }
    }
}

impl Pattern {
    pub(crate) fn resolve(
        &self,
        reg: &Registry,
        context: &str,
    ) -> Result<ResolvedComplex, ModelError> {
        let malformed = |reason: String| ModelError::MalformedPattern {
            context: context.to_string(),
            reason,
        };
        if self.mols.is_empty() {
            return Err(malformed("empty complex pattern".to_string()));
        }

        let mut mols = Vec::with_capacity(self.mols.len());
        let mut endpoints: HashMap<u32, Vec<(usize, usize)>> = HashMap::new();
        for (mx, mol) in self.mols.iter().enumerate() {
            let ty = reg.lookup(&mol.monomer)?;
            let decl = reg.get(ty);
            let mut sites: Vec<ResolvedSite> = decl
                .sites
                .iter()
                .map(|_| ResolvedSite {
                    bond: BondReq::Wild,
                    state: None,
                    mentioned: false,
                })
                .collect();
            for (site, spec) in &mol.sites {
                let sx = decl.site_index(site).ok_or_else(|| {
                    malformed(format!(
                        "monomer `{}` does not declare site `{site}`",
                        decl.name
                    ))
                })?;
                let state = match &spec.state {
                    Some(label) => {
                        let space = decl.states[sx].as_ref().ok_or_else(|| {
                            malformed(format!(
                                "site `{site}` of `{}` is stateless",
                                decl.name
                            ))
                        })?;
                        Some(space.index_of(label).ok_or_else(|| {
                            malformed(format!(
                                "site `{site}` of `{}` has no state `{label}`",
                                decl.name
                            ))
                        })?)
                    }
                    None => None,
                };
                let bond = match spec.bond {
                    BondSpec::Wild => BondReq::Wild,
                    BondSpec::Free => BondReq::Free,
                    BondSpec::Bound => BondReq::Bound,
                    BondSpec::Link(id) => {
                        endpoints.entry(id).or_default().push((mx, sx));
                        BondReq::Link(id)
                    }
                };
                sites[sx] = ResolvedSite {
                    bond,
                    state,
                    mentioned: true,
                };
            }
            mols.push(ResolvedMol { ty, sites });
        }

        let mut links = Vec::new();
        let mut ids: Vec<u32> = endpoints.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let ends = &endpoints[&id];
            match ends.as_slice() {
                [a, b] => links.push((id, *a, *b)),
                [_] => return Err(malformed(format!("dangling link id {id}"))),
                _ => {
                    return Err(malformed(format!(
                        "link id {id} used on {} sites, expected 2",
                        ends.len()
                    )))
                }
            }
        }

        if mols.len() > 1 {
            let mut uf = UnionFind::<usize>::new(mols.len());
            for (_, (ma, _), (mb, _)) in &links {
                uf.union(*ma, *mb);
            }
            let root = uf.find(0);
            if (1..mols.len()).any(|m| uf.find(m) != root) {
                return Err(malformed(
                    "complex pattern is not connected by links".to_string(),
                ));
            }
        }

        Ok(ResolvedComplex { mols, links })
    }
}

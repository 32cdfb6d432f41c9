//! Transformation rules.
//!
//! A rule pairs a list of reactant patterns with a list of product patterns
//! and a forward (optionally reverse) rate parameter. Rules only rewire
//! bonds and flip states; the per-type instance multiset must be identical
//! on both sides unless the rule is explicitly marked `transmuting`, in
//! which case leftover reactant instances are deleted and leftover product
//! instances created. Reactant and product instances correspond per monomer
//! type, in order of appearance across the flattened pattern lists.

use std::collections::{BTreeMap, VecDeque};

use indexmap::IndexMap;

use crate::error::ModelError;
use crate::monomer::Registry;
use crate::pattern::{BondReq, Pattern, ResolvedComplex, ResolvedMol};

/// A declared transformation rule, built with a fluent API and validated by
/// [`crate::Model::rule`].
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    reactants: Vec<Pattern>,
    products: Vec<Pattern>,
    forward: Option<String>,
    reverse: Option<String>,
    transmuting: bool,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Rule {
            name: name.into(),
            reactants: Vec::new(),
            products: Vec::new(),
            forward: None,
            reverse: None,
            transmuting: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add one reactant complex pattern.
    pub fn reactant(mut self, p: impl Into<Pattern>) -> Self {
        self.reactants.push(p.into());
        self
    }

    /// Add one product complex pattern.
    pub fn product(mut self, p: impl Into<Pattern>) -> Self {
        self.products.push(p.into());
        self
    }

    /// Name the forward rate parameter.
    pub fn rate(mut self, param: &str) -> Self {
        self.forward = Some(param.to_string());
        self
    }

    /// Make the rule reversible under the named reverse rate parameter.
    pub fn reversible(mut self, param: &str) -> Self {
        self.reverse = Some(param.to_string());
        self
    }

    /// Permit instance creation and deletion (cleavage surrogates such as
    /// `Bid() -> tBid()`). Without this flag an unbalanced rule is rejected.
    pub fn transmuting(mut self) -> Self {
        self.transmuting = true;
        self
    }

    /// Expand the rule into concrete, directed instances: one forward, plus
    /// one reverse when a reverse rate parameter was given.
    pub(crate) fn compile(
        &self,
        reg: &Registry,
        params: &IndexMap<String, f64>,
    ) -> Result<Vec<RuleInstance>, ModelError> {
        let forward = self.forward.as_deref().ok_or_else(|| {
            ModelError::MalformedPattern {
                context: self.name.clone(),
                reason: "rule has no forward rate parameter".to_string(),
            }
        })?;
        let rate_of = |p: &str| -> Result<f64, ModelError> {
            params
                .get(p)
                .copied()
                .ok_or_else(|| ModelError::UnknownParameter(p.to_string()))
        };

        let reactants: Vec<ResolvedComplex> = self
            .reactants
            .iter()
            .map(|p| p.resolve(reg, &self.name))
            .collect::<Result<_, _>>()?;
        let products: Vec<ResolvedComplex> = self
            .products
            .iter()
            .map(|p| p.resolve(reg, &self.name))
            .collect::<Result<_, _>>()?;

        let mut out = vec![RuleInstance::build(
            &self.name,
            false,
            forward,
            rate_of(forward)?,
            reactants.clone(),
            products.clone(),
            self.transmuting,
            reg,
        )?];
        if let Some(rev) = self.reverse.as_deref() {
            out.push(RuleInstance::build(
                &self.name,
                true,
                rev,
                rate_of(rev)?,
                products,
                reactants,
                self.transmuting,
                reg,
            )?);
        }
        Ok(out)
    }
}

/// A concrete, directed rule ready for the generator: patterns resolved,
/// instance correspondence computed, balance validated.
#[derive(Debug, Clone)]
pub(crate) struct RuleInstance {
    pub name: String,
    pub reverse: bool,
    pub rate_param: String,
    pub rate: f64,
    pub reactants: Vec<ResolvedComplex>,
    pub products: Vec<ResolvedComplex>,
    /// Flat offset of each reactant complex's first molecule.
    pub r_offsets: Vec<usize>,
    /// Flat offset of each product complex's first molecule.
    pub p_offsets: Vec<usize>,
    /// Product flat index -> paired reactant flat index; `None` = created.
    pub paired: Vec<Option<usize>>,
    /// Reactant flat indices with no product counterpart (deleted).
    pub deleted: Vec<usize>,
    /// Full state vector for each created instance, in product flat order.
    pub created_states: Vec<Vec<Option<usize>>>,
    pub arity: usize,
}

fn offsets(complexes: &[ResolvedComplex]) -> Vec<usize> {
    let mut out = Vec::with_capacity(complexes.len());
    let mut n = 0;
    for c in complexes {
        out.push(n);
        n += c.mols.len();
    }
    out
}

impl RuleInstance {
    #[allow(clippy::too_many_arguments)]
    fn build(
        name: &str,
        reverse: bool,
        rate_param: &str,
        rate: f64,
        reactants: Vec<ResolvedComplex>,
        products: Vec<ResolvedComplex>,
        transmuting: bool,
        reg: &Registry,
    ) -> Result<Self, ModelError> {
        if reactants.is_empty() {
            return Err(ModelError::MalformedPattern {
                context: name.to_string(),
                reason: "rule has no reactant patterns".to_string(),
            });
        }
        let r_offsets = offsets(&reactants);
        let p_offsets = offsets(&products);

        let r_flat: Vec<&ResolvedMol> = flatten(&reactants);
        let p_flat: Vec<&ResolvedMol> = flatten(&products);

        // Correspondence: k-th reactant instance of each type pairs with the
        // k-th product instance of the same type.
        let mut queues: BTreeMap<usize, VecDeque<usize>> = BTreeMap::new();
        for (rf, row) in r_flat.iter().enumerate() {
            queues.entry(row.ty).or_default().push_back(rf);
        }
        let mut paired = Vec::with_capacity(p_flat.len());
        for row in &p_flat {
            paired.push(queues.get_mut(&row.ty).and_then(VecDeque::pop_front));
        }
        let deleted: Vec<usize> = queues.into_values().flatten().collect();
        let created: Vec<usize> = paired
            .iter()
            .enumerate()
            .filter_map(|(pf, r)| r.is_none().then_some(pf))
            .collect();

        if !transmuting && (!deleted.is_empty() || !created.is_empty()) {
            let describe = |flats: &[usize], rows: &[&ResolvedMol]| {
                flats
                    .iter()
                    .map(|&f| reg.get(rows[f].ty).name.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            return Err(ModelError::MassImbalance {
                rule: name.to_string(),
                reason: format!(
                    "unmatched reactant instances [{}], unmatched product instances [{}]",
                    describe(&deleted, &r_flat),
                    describe(&created, &p_flat)
                ),
            });
        }

        // A paired product instance may only touch sites the reactant side
        // examined; a demand for a bound partner additionally needs the
        // reactant side to guarantee one.
        for (pf, r) in paired.iter().enumerate() {
            let Some(rf) = r else { continue };
            for (s, ps) in p_flat[pf].sites.iter().enumerate() {
                if !ps.mentioned {
                    continue;
                }
                let ty = reg.get(p_flat[pf].ty);
                let rs = &r_flat[*rf].sites[s];
                if !rs.mentioned {
                    return Err(ModelError::MalformedPattern {
                        context: name.to_string(),
                        reason: format!(
                            "product changes site `{}` of `{}`, which the reactant side leaves unmentioned",
                            ty.sites[s], ty.name
                        ),
                    });
                }
                if ps.bond == BondReq::Bound
                    && !matches!(rs.bond, BondReq::Bound | BondReq::Link(_))
                {
                    return Err(ModelError::MalformedPattern {
                        context: name.to_string(),
                        reason: format!(
                            "product requires site `{}` of `{}` bound, but the reactant side does not bind it",
                            ty.sites[s], ty.name
                        ),
                    });
                }
            }
        }

        // Created instances start from free sites and default states.
        let mut created_states = Vec::with_capacity(created.len());
        for &pf in &created {
            let ty = reg.get(p_flat[pf].ty);
            let mut states = Vec::with_capacity(ty.sites.len());
            for (s, spec) in p_flat[pf].sites.iter().enumerate() {
                if spec.bond == BondReq::Bound {
                    return Err(ModelError::MalformedPattern {
                        context: name.to_string(),
                        reason: format!(
                            "created instance of `{}` cannot require site `{}` bound to anything",
                            ty.name, ty.sites[s]
                        ),
                    });
                }
                states.push(match &ty.states[s] {
                    None => None,
                    Some(space) => Some(match spec.state {
                        Some(st) => st,
                        None => space.default_index().ok_or_else(|| {
                            ModelError::MissingDefaultState {
                                monomer: ty.name.clone(),
                                site: ty.sites[s].clone(),
                            }
                        })?,
                    }),
                });
            }
            created_states.push(states);
        }

        let arity = reactants.len();
        Ok(RuleInstance {
            name: name.to_string(),
            reverse,
            rate_param: rate_param.to_string(),
            rate,
            reactants,
            products,
            r_offsets,
            p_offsets,
            paired,
            deleted,
            created_states,
            arity,
        })
    }

    /// Site specs of the product instance at flat index `pf`.
    pub fn product_mol(&self, pf: usize) -> &ResolvedMol {
        let c = match self.p_offsets.binary_search(&pf) {
            Ok(c) => c,
            Err(c) => c - 1,
        };
        &self.products[c].mols[pf - self.p_offsets[c]]
    }
}

fn flatten(complexes: &[ResolvedComplex]) -> Vec<&ResolvedMol> {
    complexes.iter().flat_map(|c| c.mols.iter()).collect()
}

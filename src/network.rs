//! Reaction network generation.
//!
//! The generator expands a model from its seed species to the complete set
//! of reachable species and concrete reactions. Expansion is round-based:
//! each round applies every rule instance to every selection of species that
//! includes at least one species discovered in the previous round, so each
//! (rule, selection) pair is processed exactly once across the run. Rule
//! application within a round runs in parallel; species and reactions are
//! committed sequentially in task order, so generation is deterministic.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Bound, GenerationError};
use crate::initial::{seed_species, InitialConditions};
use crate::matching::{apply_rule, embeddings};
use crate::model::Model;
use crate::species::Species;

/// Safety limits on network expansion. The defaults are generous for
/// signaling-scale models; rule sets with unbounded polymerization need a
/// finite `max_complex_size` to terminate.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub max_species: usize,
    pub max_iterations: usize,
    pub max_complex_size: Option<usize>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            max_species: 10_000,
            max_iterations: 1_000,
            max_complex_size: None,
        }
    }
}

/// One concrete reaction between network species.
#[derive(Debug, Clone, Serialize)]
pub struct Reaction {
    /// Species indices consumed, as an unordered multiset.
    pub reactants: Vec<usize>,
    /// Species indices produced.
    pub products: Vec<usize>,
    /// Name of the rule that generated this reaction.
    pub rule: String,
    /// Whether this is the reverse direction of a reversible rule.
    pub reverse: bool,
    pub rate_param: String,
    pub rate: f64,
    /// Number of distinct rewrites of this selection yielding these
    /// products.
    pub multiplicity: u32,
    /// `1/∏ nᵢ!` over repeated reactant species; 0.5 for a self-pair.
    pub symmetry_factor: f64,
}

impl Reaction {
    /// The effective mass-action rate constant: base rate times multiplicity
    /// times the symmetry correction.
    pub fn rate_constant(&self) -> f64 {
        self.rate * f64::from(self.multiplicity) * self.symmetry_factor
    }
}

/// Embedding counts of one observable pattern across the network.
#[derive(Debug, Clone, Serialize)]
pub struct ObservableReport {
    pub name: String,
    /// (species index, distinct match count), species with zero matches
    /// omitted.
    pub matches: Vec<(usize, u32)>,
}

/// The expanded network: every reachable species, every concrete reaction,
/// initial quantities, and observable match tables.
#[derive(Debug, Serialize)]
pub struct ReactionNetwork {
    species: Vec<Species>,
    initial: Vec<f64>,
    reactions: Vec<Reaction>,
    observables: Vec<ObservableReport>,
    closed: bool,
}

impl ReactionNetwork {
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn initial(&self) -> &[f64] {
        &self.initial
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn observables(&self) -> &[ObservableReport] {
        &self.observables
    }

    /// Whether expansion ran to a fixed point (no bound was hit).
    pub fn closed(&self) -> bool {
        self.closed
    }

    /// Index of the species with the given canonical string.
    pub fn species_index(&self, canonical: &str) -> Option<usize> {
        self.species.iter().position(|s| s.canonical() == canonical)
    }
}

/// Expand `model` from `init` to the complete reaction network, or report
/// which bound stopped expansion (the partial network rides along in the
/// error).
pub fn generate(
    model: &Model,
    init: &InitialConditions,
    opts: &GeneratorOptions,
) -> Result<ReactionNetwork, GenerationError> {
    let reg = &model.registry;
    let mut species: Vec<Species> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut initial: Vec<f64> = Vec::new();
    let mut reactions: Vec<Reaction> = Vec::new();

    for &(ty, qty) in &init.seeds {
        let sp = seed_species(reg, ty)?;
        if let Some(&ix) = index.get(sp.canonical()) {
            initial[ix] += qty;
            continue;
        }
        if species.len() == opts.max_species {
            return Err(bound_error(
                Bound::Species(opts.max_species),
                model,
                species,
                initial,
                reactions,
            ));
        }
        index.insert(sp.canonical().to_string(), species.len());
        species.push(sp);
        initial.push(qty);
    }

    let mut prev_len = 0;
    let mut round = 0usize;
    while prev_len < species.len() {
        round += 1;
        if round > opts.max_iterations {
            return Err(bound_error(
                Bound::Iterations(opts.max_iterations),
                model,
                species,
                initial,
                reactions,
            ));
        }
        let cur_len = species.len();

        let mut tasks: Vec<(usize, Vec<usize>)> = Vec::new();
        for (ix, inst) in model.instances.iter().enumerate() {
            for sel in selections(inst.arity, prev_len, cur_len) {
                tasks.push((ix, sel));
            }
        }

        // rewrites of one (rule, selection) are independent of everything
        // else in the round
        let drafts: Vec<(usize, Vec<usize>, Vec<(Vec<Species>, u32)>)> = tasks
            .into_par_iter()
            .map(|(ix, sel)| {
                let inst = &model.instances[ix];
                let picked: Vec<&Species> = sel.iter().map(|&s| &species[s]).collect();
                let mut grouped: BTreeMap<Vec<String>, (Vec<Species>, u32)> = BTreeMap::new();
                for prods in apply_rule(inst, &picked, reg) {
                    let mut key: Vec<String> =
                        prods.iter().map(|p| p.canonical().to_string()).collect();
                    key.sort_unstable();
                    grouped
                        .entry(key)
                        .and_modify(|(_, n)| *n += 1)
                        .or_insert((prods, 1));
                }
                (ix, sel, grouped.into_values().collect())
            })
            .collect();
        prev_len = cur_len;

        for (ix, sel, groups) in drafts {
            let inst = &model.instances[ix];
            let mut reactant_key: Vec<String> = sel
                .iter()
                .map(|&s| species[s].canonical().to_string())
                .collect();
            reactant_key.sort_unstable();
            for (prods, multiplicity) in groups {
                let mut product_key: Vec<&str> =
                    prods.iter().map(Species::canonical).collect();
                product_key.sort_unstable();
                if product_key == reactant_key.iter().map(String::as_str).collect::<Vec<_>>() {
                    debug!("rule `{}`: null rewrite on {:?} skipped", inst.name, sel);
                    continue;
                }
                if let Some(max) = opts.max_complex_size {
                    if prods.iter().any(|p| p.size() > max) {
                        return Err(bound_error(
                            Bound::ComplexSize(max),
                            model,
                            species,
                            initial,
                            reactions,
                        ));
                    }
                }
                let mut products = Vec::with_capacity(prods.len());
                for p in prods {
                    let id = match index.get(p.canonical()) {
                        Some(&id) => id,
                        None => {
                            if species.len() == opts.max_species {
                                return Err(bound_error(
                                    Bound::Species(opts.max_species),
                                    model,
                                    species,
                                    initial,
                                    reactions,
                                ));
                            }
                            let id = species.len();
                            index.insert(p.canonical().to_string(), id);
                            species.push(p);
                            initial.push(0.0);
                            id
                        }
                    };
                    products.push(id);
                }
                reactions.push(Reaction {
                    reactants: sel.clone(),
                    products,
                    rule: inst.name.clone(),
                    reverse: inst.reverse,
                    rate_param: inst.rate_param.clone(),
                    rate: inst.rate,
                    multiplicity,
                    symmetry_factor: symmetry_factor(&sel),
                });
            }
        }
        info!(
            "round {round}: {} species, {} reactions",
            species.len(),
            reactions.len()
        );
    }

    let observables = observe(model, &species);
    Ok(ReactionNetwork {
        species,
        initial,
        reactions,
        observables,
        closed: true,
    })
}

fn bound_error(
    bound: Bound,
    model: &Model,
    species: Vec<Species>,
    initial: Vec<f64>,
    reactions: Vec<Reaction>,
) -> GenerationError {
    let observables = observe(model, &species);
    GenerationError::BoundExceeded {
        bound,
        species: species.len(),
        reactions: reactions.len(),
        partial: Box::new(ReactionNetwork {
            species,
            initial,
            reactions,
            observables,
            closed: false,
        }),
    }
}

/// Non-decreasing selections of `arity` species ids whose largest id falls
/// in `[frontier, total)`. Selections entirely below the frontier were
/// enumerated in an earlier round.
fn selections(arity: usize, frontier: usize, total: usize) -> Vec<Vec<usize>> {
    fn rec(
        arity: usize,
        frontier: usize,
        total: usize,
        min: usize,
        buf: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if buf.len() == arity {
            if buf.last().is_some_and(|&m| m >= frontier) {
                out.push(buf.clone());
            }
            return;
        }
        for id in min..total {
            buf.push(id);
            rec(arity, frontier, total, id, buf, out);
            buf.pop();
        }
    }
    let mut out = Vec::new();
    rec(arity, frontier, total, 0, &mut Vec::with_capacity(arity), &mut out);
    out
}

fn symmetry_factor(sel: &[usize]) -> f64 {
    let mut f = 1.0;
    let mut run = 1u32;
    for i in 1..sel.len() {
        if sel[i] == sel[i - 1] {
            run += 1;
            f /= f64::from(run);
        } else {
            run = 1;
        }
    }
    f
}

fn observe(model: &Model, species: &[Species]) -> Vec<ObservableReport> {
    model
        .observables
        .iter()
        .map(|ob| {
            let matches = species
                .iter()
                .enumerate()
                .filter_map(|(ix, sp)| {
                    // count embedding images, not embeddings: automorphisms
                    // of the pattern must not inflate the count
                    let images: HashSet<BTreeSet<usize>> = embeddings(&ob.pattern, sp)
                        .into_iter()
                        .map(|e| e.into_iter().collect())
                        .collect();
                    let n = u32::try_from(images.len()).unwrap_or(u32::MAX);
                    (n > 0).then_some((ix, n))
                })
                .collect();
            ObservableReport {
                name: ob.name.clone(),
                matches,
            }
        })
        .collect()
}

//! Pattern embedding and rule application.
//!
//! An embedding is an injective, type- and constraint-preserving map from a
//! pattern's molecules into one species copy. Applying a rule to a selection
//! of species first enumerates every combined embedding (one per reactant
//! pattern, over every assignment of patterns to copies), then collapses
//! embeddings that prescribe the same rewrite on the same molecules: the key
//! is the footprint (the set of concrete bond and state edits induced on the
//! labeled soup) together with the set of molecules each pattern matched.
//! Automorphic embeddings share both and are executed once; a context
//! pattern embedded at two different places shares the footprint but not the
//! matched molecules, and counts once per placement.

use std::collections::{BTreeSet, HashSet};

use bit_set::BitSet;

use crate::monomer::{Registry, TypeId};
use crate::pattern::{BondReq, ResolvedComplex};
use crate::rule::RuleInstance;
use crate::species::{split_components, Species, SpeciesMol};

/// All embeddings of `pat` into `sp`, each as pattern mol index -> species
/// mol index.
pub(crate) fn embeddings(pat: &ResolvedComplex, sp: &Species) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut assign = vec![usize::MAX; pat.mols.len()];
    let mut used = BitSet::with_capacity(sp.mols.len());
    extend(pat, sp, 0, &mut assign, &mut used, &mut out);
    out
}

fn extend(
    pat: &ResolvedComplex,
    sp: &Species,
    i: usize,
    assign: &mut Vec<usize>,
    used: &mut BitSet,
    out: &mut Vec<Vec<usize>>,
) {
    if i == pat.mols.len() {
        out.push(assign.clone());
        return;
    }
    for c in 0..sp.mols.len() {
        if used.contains(c) || !compatible(pat, sp, i, c, assign) {
            continue;
        }
        assign[i] = c;
        used.insert(c);
        extend(pat, sp, i + 1, assign, used, out);
        used.remove(c);
        assign[i] = usize::MAX;
    }
}

fn compatible(pat: &ResolvedComplex, sp: &Species, i: usize, c: usize, assign: &[usize]) -> bool {
    let pm = &pat.mols[i];
    let sm = &sp.mols[c];
    if pm.ty != sm.ty {
        return false;
    }
    for (s, spec) in pm.sites.iter().enumerate() {
        if !spec.mentioned {
            continue;
        }
        if let Some(st) = spec.state {
            if sm.states[s] != Some(st) {
                return false;
            }
        }
        match spec.bond {
            BondReq::Wild => {}
            BondReq::Free => {
                if sm.bonds[s].is_some() {
                    return false;
                }
            }
            BondReq::Bound => {
                if sm.bonds[s].is_none() {
                    return false;
                }
            }
            BondReq::Link(id) => {
                let Some((p, ps)) = sm.bonds[s] else {
                    return false;
                };
                let (om, os) = pat.link_partner(id, (i, s));
                if os != ps {
                    return false;
                }
                // check the partner once it is placed; om == i is a bond
                // between two sites of the same molecule
                if om == i {
                    if p != c {
                        return false;
                    }
                } else if om < i && assign[om] != p {
                    return false;
                }
            }
        }
    }
    true
}

/// One concrete edit on the labeled molecule soup. Created molecules occupy
/// slots appended past the soup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Action {
    Create(usize, TypeId, Vec<Option<usize>>),
    Unbind((usize, usize), (usize, usize)),
    Bind((usize, usize), (usize, usize)),
    SetState(usize, usize, usize),
    Delete(usize),
}

fn ends(a: (usize, usize), b: (usize, usize)) -> ((usize, usize), (usize, usize)) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

pub(crate) type Footprint = BTreeSet<Action>;

/// The edits the rule prescribes on `soup` under the combined embedding
/// `emb` (reactant flat index -> soup index). Only edits that change the
/// soup are recorded, so embeddings related by an automorphism of the
/// matched species produce equal footprints.
pub(crate) fn footprint(inst: &RuleInstance, soup: &[SpeciesMol], emb: &[usize]) -> Footprint {
    let mut fp = Footprint::new();

    // product flat index -> soup slot (existing or to-be-created)
    let mut created_k = 0;
    let mut target = Vec::with_capacity(inst.paired.len());
    for (pf, r) in inst.paired.iter().enumerate() {
        match r {
            Some(rf) => target.push(emb[*rf]),
            None => {
                let slot = soup.len() + created_k;
                target.push(slot);
                let ty = inst.product_mol(pf).ty;
                fp.insert(Action::Create(
                    slot,
                    ty,
                    inst.created_states[created_k].clone(),
                ));
                created_k += 1;
            }
        }
    }

    for &rf in &inst.deleted {
        let g = emb[rf];
        for (s, b) in soup[g].bonds.iter().enumerate() {
            if let Some((p, ps)) = b {
                let (a, z) = ends((g, s), (*p, *ps));
                fp.insert(Action::Unbind(a, z));
            }
        }
        fp.insert(Action::Delete(g));
    }

    for (pf, r) in inst.paired.iter().enumerate() {
        if r.is_none() {
            continue;
        }
        let g = target[pf];
        let pm = inst.product_mol(pf);
        for (s, spec) in pm.sites.iter().enumerate() {
            if !spec.mentioned {
                continue;
            }
            if let Some(st) = spec.state {
                if soup[g].states[s] != Some(st) {
                    fp.insert(Action::SetState(g, s, st));
                }
            }
            if spec.bond == BondReq::Free {
                if let Some((p, ps)) = soup[g].bonds[s] {
                    let (a, z) = ends((g, s), (p, ps));
                    fp.insert(Action::Unbind(a, z));
                }
            }
        }
    }

    // links on the product side: no-op if the bond already exists, displace
    // whatever else occupies either endpoint
    for (c, complex) in inst.products.iter().enumerate() {
        for (_, (ma, sa), (mb, sb)) in &complex.links {
            let ga = target[inst.p_offsets[c] + ma];
            let gb = target[inst.p_offsets[c] + mb];
            if ga < soup.len() && soup[ga].bonds[*sa] == Some((gb, *sb)) {
                continue;
            }
            if ga < soup.len() {
                if let Some(old) = soup[ga].bonds[*sa] {
                    let (a, z) = ends((ga, *sa), old);
                    fp.insert(Action::Unbind(a, z));
                }
            }
            if gb < soup.len() {
                if let Some(old) = soup[gb].bonds[*sb] {
                    let (a, z) = ends((gb, *sb), old);
                    fp.insert(Action::Unbind(a, z));
                }
            }
            let (a, z) = ends((ga, *sa), (gb, *sb));
            fp.insert(Action::Bind(a, z));
        }
    }

    fp
}

/// Execute a footprint on the soup. Returns one slot per molecule, `None`
/// where a molecule was deleted; created molecules occupy the appended
/// slots.
pub(crate) fn apply(soup: &[SpeciesMol], fp: &Footprint) -> Vec<Option<SpeciesMol>> {
    let creates: Vec<(usize, TypeId, Vec<Option<usize>>)> = fp
        .iter()
        .filter_map(|a| match a {
            Action::Create(slot, ty, states) => Some((*slot, *ty, states.clone())),
            _ => None,
        })
        .collect();
    let mut out: Vec<Option<SpeciesMol>> = soup.iter().cloned().map(Some).collect();
    out.resize(soup.len() + creates.len(), None);
    for (slot, ty, states) in creates {
        let n = states.len();
        out[slot] = Some(SpeciesMol {
            ty,
            states,
            bonds: vec![None; n],
        });
    }
    let site = |out: &mut Vec<Option<SpeciesMol>>, (m, s): (usize, usize), b| {
        if let Some(mol) = &mut out[m] {
            mol.bonds[s] = b;
        }
    };
    for a in fp {
        if let Action::Unbind(x, y) = a {
            site(&mut out, *x, None);
            site(&mut out, *y, None);
        }
    }
    for a in fp {
        if let Action::SetState(m, s, st) = a {
            if let Some(mol) = &mut out[*m] {
                mol.states[*s] = Some(*st);
            }
        }
    }
    for a in fp {
        if let Action::Bind(x, y) = a {
            site(&mut out, *x, Some(*y));
            site(&mut out, *y, Some(*x));
        }
    }
    for a in fp {
        if let Action::Delete(m) = a {
            out[*m] = None;
        }
    }
    out
}

/// Apply a rule instance to an (unordered) selection of species, one copy
/// each. Returns the product species multiset of every distinct rewrite; the
/// number of entries is the reaction's multiplicity before symmetry
/// correction.
pub(crate) fn apply_rule(
    inst: &RuleInstance,
    selection: &[&Species],
    reg: &Registry,
) -> Vec<Vec<Species>> {
    debug_assert_eq!(selection.len(), inst.arity);

    // one labeled copy of each selected species, concatenated
    let mut offsets = Vec::with_capacity(selection.len());
    let mut soup: Vec<SpeciesMol> = Vec::new();
    for sp in selection {
        let off = soup.len();
        offsets.push(off);
        for m in &sp.mols {
            let mut m = m.clone();
            for b in &mut m.bonds {
                *b = b.map(|(p, ps)| (off + p, ps));
            }
            soup.push(m);
        }
    }

    let mut seen: HashSet<(Footprint, Vec<BTreeSet<usize>>)> = HashSet::new();
    let mut out = Vec::new();
    for perm in permutations(inst.arity) {
        // pattern i matches the copy at perm[i]
        let per_pattern: Vec<Vec<Vec<usize>>> = inst
            .reactants
            .iter()
            .enumerate()
            .map(|(i, pat)| embeddings(pat, selection[perm[i]]))
            .collect();
        if per_pattern.iter().any(Vec::is_empty) {
            continue;
        }

        let mut odometer = vec![0usize; inst.arity];
        loop {
            let r_total: usize = inst.reactants.iter().map(|c| c.mols.len()).sum();
            let mut emb = vec![0usize; r_total];
            for (i, pat) in inst.reactants.iter().enumerate() {
                let local = &per_pattern[i][odometer[i]];
                for (pm, &sm) in local.iter().enumerate() {
                    emb[inst.r_offsets[i] + pm] = offsets[perm[i]] + sm;
                }
            }
            // which molecules each pattern matched, as an unordered multiset
            // so wholesale swaps of identical patterns coincide
            let mut images: Vec<BTreeSet<usize>> = per_pattern
                .iter()
                .zip(&odometer)
                .enumerate()
                .map(|(i, (embs, &o))| {
                    embs[o].iter().map(|&sm| offsets[perm[i]] + sm).collect()
                })
                .collect();
            images.sort();

            let fp = footprint(inst, &soup, &emb);
            if seen.insert((fp.clone(), images)) {
                out.push(split_components(apply(&soup, &fp), reg));
            }

            let mut i = 0;
            loop {
                if i == inst.arity {
                    break;
                }
                odometer[i] += 1;
                if odometer[i] < per_pattern[i].len() {
                    break;
                }
                odometer[i] = 0;
                i += 1;
            }
            if i == inst.arity {
                break;
            }
        }
    }
    out
}

/// All permutations of `0..n`, by Heap's algorithm. Rule arity is tiny.
fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn heap(k: usize, items: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        for i in 0..k {
            heap(k - 1, items, out);
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
        }
    }
    let mut items: Vec<usize> = (0..n).collect();
    let mut out = Vec::new();
    heap(n, &mut items, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monomer::Monomer;
    use crate::pattern::Mol;
    use crate::rule::Rule;
    use indexmap::IndexMap;

    fn registry() -> Registry {
        let mut reg = Registry::default();
        reg.declare(Monomer::new("A").site("b").site("d").state("d", ["U", "C"], "U"))
            .unwrap();
        reg.declare(Monomer::new("B").site("b")).unwrap();
        reg.declare(Monomer::new("E").sites(["s", "ee"])).unwrap();
        reg
    }

    fn params() -> IndexMap<String, f64> {
        let mut p = IndexMap::new();
        p.insert("k".to_string(), 1.0);
        p
    }

    fn mono(reg: &Registry, name: &str) -> Species {
        let ty = reg.lookup(name).unwrap();
        let n = reg.get(ty).sites().len();
        let states = (0..n)
            .map(|s| reg.get(ty).states[s].as_ref().and_then(|sp| sp.default_index()))
            .collect();
        Species::new(
            vec![SpeciesMol {
                ty,
                states,
                bonds: vec![None; n],
            }],
            reg,
        )
    }

    #[test]
    fn embedding_respects_state_and_bond() {
        let reg = registry();
        let a = mono(&reg, "A");
        let pat_u: crate::pattern::Pattern = Mol::new("A").state("d", "U").into();
        let pat_c: crate::pattern::Pattern = Mol::new("A").state("d", "C").into();
        assert_eq!(embeddings(&pat_u.resolve(&reg, "t").unwrap(), &a).len(), 1);
        assert_eq!(embeddings(&pat_c.resolve(&reg, "t").unwrap(), &a).len(), 0);
        let pat_bound: crate::pattern::Pattern = Mol::new("A").bound("b").into();
        assert_eq!(embeddings(&pat_bound.resolve(&reg, "t").unwrap(), &a).len(), 0);
    }

    #[test]
    fn hetero_binding_produces_one_rewrite() {
        let reg = registry();
        let rule = Rule::new("bind")
            .reactant(Mol::new("A").free("b"))
            .reactant(Mol::new("B").free("b"))
            .product(Mol::new("A").link("b", 1) % Mol::new("B").link("b", 1))
            .rate("k");
        let insts = rule.compile(&reg, &params()).unwrap();
        let (a, b) = (mono(&reg, "A"), mono(&reg, "B"));
        let outcomes = apply_rule(&insts[0], &[&a, &b], &reg);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].len(), 1);
        assert_eq!(outcomes[0][0].canonical(), "A(b!1,d~U).B(b!1)");
    }

    #[test]
    fn homodimerization_counts_once() {
        let reg = registry();
        let rule = Rule::new("dim")
            .reactant(Mol::new("E").free("ee"))
            .reactant(Mol::new("E").free("ee"))
            .product(Mol::new("E").link("ee", 1) % Mol::new("E").link("ee", 1))
            .rate("k");
        let insts = rule.compile(&reg, &params()).unwrap();
        let e = mono(&reg, "E");
        // both pattern-to-copy assignments induce the same bond
        let outcomes = apply_rule(&insts[0], &[&e, &e], &reg);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0][0].canonical(), "E(s,ee!1).E(s,ee!1)");
    }

    #[test]
    fn context_pattern_counts_each_placement() {
        // a scaffold carrying two bound catalyst subunits: the substrate
        // edit is identical either way, but each subunit is its own match
        let mut reg = Registry::default();
        reg.declare(Monomer::new("G").site("a")).unwrap();
        reg.declare(Monomer::new("H").sites(["b1", "b2"])).unwrap();
        reg.declare(Monomer::new("S").site("d").state("d", ["U", "P"], "U"))
            .unwrap();
        let rule = Rule::new("cat")
            .reactant(Mol::new("G").bound("a"))
            .reactant(Mol::new("S").state("d", "U"))
            .product(Mol::new("G").bound("a"))
            .product(Mol::new("S").state("d", "P"))
            .rate("k");
        let insts = rule.compile(&reg, &params()).unwrap();
        let loaded = Species::new(
            vec![
                SpeciesMol {
                    ty: 0,
                    states: vec![None],
                    bonds: vec![Some((2, 0))],
                },
                SpeciesMol {
                    ty: 0,
                    states: vec![None],
                    bonds: vec![Some((2, 1))],
                },
                SpeciesMol {
                    ty: 1,
                    states: vec![None, None],
                    bonds: vec![Some((0, 0)), Some((1, 0))],
                },
            ],
            &reg,
        );
        let s = mono(&reg, "S");
        let outcomes = apply_rule(&insts[0], &[&loaded, &s], &reg);
        assert_eq!(outcomes.len(), 2);
        for products in &outcomes {
            assert!(products.iter().any(|sp| sp.canonical() == "S(d~P)"));
        }
    }

    #[test]
    fn state_flip_on_self_pair_counts_twice() {
        let reg = registry();
        // bound A dimer; each copy can flip the other's state
        let rule = Rule::new("cat")
            .reactant(
                Mol::new("A").link("b", 1).state("d", "U")
                    % Mol::new("A").link("b", 1),
            )
            .product(
                Mol::new("A").link("b", 1).state("d", "C")
                    % Mol::new("A").link("b", 1),
            )
            .rate("k");
        let insts = rule.compile(&reg, &params()).unwrap();
        let dimer = Species::new(
            vec![
                SpeciesMol {
                    ty: 0,
                    states: vec![None, Some(0)],
                    bonds: vec![Some((1, 0)), None],
                },
                SpeciesMol {
                    ty: 0,
                    states: vec![None, Some(0)],
                    bonds: vec![Some((0, 0)), None],
                },
            ],
            &reg,
        );
        let outcomes = apply_rule(&insts[0], &[&dimer], &reg);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0][0].canonical(), outcomes[1][0].canonical());
        assert_eq!(outcomes[0][0].canonical(), "A(b!1,d~U).A(b!1,d~C)");
    }

    #[test]
    fn unbinding_splits_the_complex() {
        let reg = registry();
        let rule = Rule::new("unbind")
            .reactant(Mol::new("A").link("b", 1) % Mol::new("B").link("b", 1))
            .product(Mol::new("A").free("b"))
            .product(Mol::new("B").free("b"))
            .rate("k");
        let insts = rule.compile(&reg, &params()).unwrap();
        let ab = Species::new(
            vec![
                SpeciesMol {
                    ty: 0,
                    states: vec![None, Some(0)],
                    bonds: vec![Some((1, 0)), None],
                },
                SpeciesMol {
                    ty: 1,
                    states: vec![None],
                    bonds: vec![Some((0, 0))],
                },
            ],
            &reg,
        );
        let outcomes = apply_rule(&insts[0], &[&ab], &reg);
        assert_eq!(outcomes.len(), 1);
        let keys: Vec<&str> = outcomes[0].iter().map(Species::canonical).collect();
        assert!(keys.contains(&"A(b,d~U)"));
        assert!(keys.contains(&"B(b)"));
    }

    #[test]
    fn transmutation_deletes_and_creates() {
        let reg = registry();
        let rule = Rule::new("convert")
            .reactant(Mol::new("B"))
            .product(Mol::new("E"))
            .rate("k")
            .transmuting();
        let insts = rule.compile(&reg, &params()).unwrap();
        let b = mono(&reg, "B");
        let outcomes = apply_rule(&insts[0], &[&b], &reg);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].len(), 1);
        assert_eq!(outcomes[0][0].canonical(), "E(s,ee)");
    }
}

//! Canonical labeling of species bond graphs.
//!
//! Partition refinement colors molecule instances by (type, site states,
//! bound sites), then repeatedly appends each instance's sorted multiset of
//! (own site, partner site, partner color) until the partition stabilizes.
//! Cells that refinement cannot split are broken by individualization:
//! each member of the first ambiguous cell is distinguished in turn and the
//! lexicographically least rendered string wins. Exact for the small
//! complexes rule-based models produce; isomorphic graphs always render to
//! the same string, and canonization is idempotent.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::monomer::Registry;
use crate::species::SpeciesMol;

/// Canonical string and the instance order realizing it (canonical position
/// -> original index).
pub(crate) fn canonical_form(mols: &[SpeciesMol], reg: &Registry) -> (String, Vec<usize>) {
    let colors: Vec<String> = mols
        .iter()
        .map(|m| {
            let sites: Vec<String> = m
                .states
                .iter()
                .zip(&m.bonds)
                .enumerate()
                .map(|(s, (st, b))| {
                    format!(
                        "{s}{}{}",
                        st.map_or("-".to_string(), |ix| format!("~{ix}")),
                        if b.is_some() { "!" } else { "" }
                    )
                })
                .collect();
            format!("{}|{}", reg.get(m.ty).name, sites.join(","))
        })
        .collect();
    search(mols, reg, colors)
}

fn refine(mols: &[SpeciesMol], colors: &mut Vec<String>) {
    let mut classes = distinct_count(colors);
    loop {
        let next: Vec<String> = mols
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let mut nbrs: Vec<String> = m
                    .bonds
                    .iter()
                    .enumerate()
                    .filter_map(|(s, b)| b.map(|(p, ps)| format!("{s}.{ps}.{}", colors[p])))
                    .collect();
                nbrs.sort();
                format!("{}|{}", colors[i], nbrs.join(";"))
            })
            .collect();
        // rank-compress so color strings stay short across iterations
        let distinct: Vec<&String> = BTreeSet::from_iter(next.iter()).into_iter().collect();
        *colors = next
            .iter()
            .map(|c| format!("{:05}", distinct.binary_search(&c).unwrap()))
            .collect();
        if distinct.len() == classes {
            return;
        }
        classes = distinct.len();
    }
}

fn distinct_count(colors: &[String]) -> usize {
    BTreeSet::from_iter(colors.iter()).len()
}

fn search(mols: &[SpeciesMol], reg: &Registry, mut colors: Vec<String>) -> (String, Vec<usize>) {
    refine(mols, &mut colors);

    let mut cells: BTreeMap<&String, Vec<usize>> = BTreeMap::new();
    for (i, c) in colors.iter().enumerate() {
        cells.entry(c).or_default().push(i);
    }
    let ambiguous: Option<Vec<usize>> = cells.into_values().find(|cell| cell.len() > 1);

    match ambiguous {
        None => {
            let mut order: Vec<usize> = (0..mols.len()).collect();
            order.sort_by(|&a, &b| colors[a].cmp(&colors[b]));
            (render(mols, reg, &order), order)
        }
        Some(cell) => {
            let mut best: Option<(String, Vec<usize>)> = None;
            for m in cell {
                let mut branched = colors.clone();
                branched[m].push('*');
                let cand = search(mols, reg, branched);
                if best.as_ref().map_or(true, |b| cand.0 < b.0) {
                    best = Some(cand);
                }
            }
            best.expect("ambiguous cell is non-empty")
        }
    }
}

/// Render the complex in the given instance order, numbering bonds in order
/// of first appearance.
fn render(mols: &[SpeciesMol], reg: &Registry, order: &[usize]) -> String {
    let mut pos = vec![0usize; mols.len()];
    for (ci, &oi) in order.iter().enumerate() {
        pos[oi] = ci;
    }
    let mut bond_num: HashMap<((usize, usize), (usize, usize)), u32> = HashMap::new();
    let mut next = 1u32;
    for &oi in order {
        for (s, b) in mols[oi].bonds.iter().enumerate() {
            if let Some((p, ps)) = b {
                let a = (pos[oi], s);
                let z = (pos[*p], *ps);
                let key = if a < z { (a, z) } else { (z, a) };
                bond_num.entry(key).or_insert_with(|| {
                    let n = next;
                    next += 1;
                    n
                });
            }
        }
    }

    let parts: Vec<String> = order
        .iter()
        .map(|&oi| {
            let m = &mols[oi];
            let ty = reg.get(m.ty);
            let sites: Vec<String> = (0..ty.sites.len())
                .map(|s| {
                    let mut out = ty.sites[s].clone();
                    if let Some(st) = m.states[s] {
                        out.push('~');
                        out.push_str(ty.states[s].as_ref().expect("stateful site").label(st));
                    }
                    if let Some((p, ps)) = m.bonds[s] {
                        let a = (pos[oi], s);
                        let z = (pos[p], ps);
                        let key = if a < z { (a, z) } else { (z, a) };
                        out.push('!');
                        out.push_str(&bond_num[&key].to_string());
                    }
                    out
                })
                .collect();
            format!("{}({})", ty.name, sites.join(","))
        })
        .collect();
    parts.join(".")
}

//! Concrete molecular complexes.
//!
//! A species is a connected complex in which every site's bond and state is
//! resolved. Species identity is graph isomorphism of the typed, state
//! labeled bond graph, realized by storing every species in canonical order
//! under its canonical string (see [`crate::canonize`]).

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use petgraph::unionfind::UnionFind;
use serde::{Serialize, Serializer};

use crate::canonize;
use crate::monomer::{Registry, TypeId};

/// One concrete molecule instance inside a species.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SpeciesMol {
    pub ty: TypeId,
    /// Per declared site; `None` for stateless sites.
    pub states: Vec<Option<usize>>,
    /// Per declared site; the partner as (molecule index, site index).
    pub bonds: Vec<Option<(usize, usize)>>,
}

/// A connected, fully concrete complex, stored in canonical order.
#[derive(Debug, Clone)]
pub struct Species {
    pub(crate) mols: Vec<SpeciesMol>,
    canonical: String,
}

impl Species {
    pub(crate) fn new(mols: Vec<SpeciesMol>, reg: &Registry) -> Self {
        let (canonical, order) = canonize::canonical_form(&mols, reg);
        let mut pos = vec![0usize; mols.len()];
        for (ci, &oi) in order.iter().enumerate() {
            pos[oi] = ci;
        }
        let mut reordered: Vec<SpeciesMol> = order
            .iter()
            .map(|&oi| mols[oi].clone())
            .collect();
        for m in &mut reordered {
            for b in &mut m.bonds {
                *b = b.map(|(p, ps)| (pos[p], ps));
            }
        }
        Species {
            mols: reordered,
            canonical,
        }
    }

    /// The canonical, isomorphism-invariant description of this complex.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Number of molecule instances in the complex.
    pub fn size(&self) -> usize {
        self.mols.len()
    }

    /// Multiset of monomer type ids making up this complex.
    pub fn composition(&self) -> BTreeMap<usize, usize> {
        let mut out = BTreeMap::new();
        for m in &self.mols {
            *out.entry(m.ty).or_insert(0) += 1;
        }
        out
    }
}

impl PartialEq for Species {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Species {}

impl std::hash::Hash for Species {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl Serialize for Species {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

/// Split a rewritten molecule soup into its connected components, each a
/// canonicalized species. `None` entries are deleted molecules.
pub(crate) fn split_components(soup: Vec<Option<SpeciesMol>>, reg: &Registry) -> Vec<Species> {
    let n = soup.len();
    let mut uf = UnionFind::<usize>::new(n);
    for (i, m) in soup.iter().enumerate() {
        if let Some(m) = m {
            for b in m.bonds.iter().flatten() {
                uf.union(i, b.0);
            }
        }
    }
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, m) in soup.iter().enumerate() {
        if m.is_some() {
            groups.entry(uf.find(i)).or_default().push(i);
        }
    }
    groups
        .into_values()
        .map(|idxs| {
            let remap: HashMap<usize, usize> =
                idxs.iter().enumerate().map(|(l, &g)| (g, l)).collect();
            let mols = idxs
                .iter()
                .map(|&g| {
                    let mut m = soup[g].clone().expect("surviving molecule");
                    for b in &mut m.bonds {
                        *b = b.map(|(p, ps)| (remap[&p], ps));
                    }
                    m
                })
                .collect();
            Species::new(mols, reg)
        })
        .collect()
}

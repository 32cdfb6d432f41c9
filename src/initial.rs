//! Initial conditions.
//!
//! Every monomer type starts either as its seed species (the lone instance
//! with all sites free and every stateful site in its default state) at a
//! declared quantity, or is explicitly listed as unseeded and starts absent.
//! Quantities come from the `<Monomer>_0` parameter naming convention or are
//! given explicitly.

use log::warn;

use crate::error::ModelError;
use crate::model::Model;
use crate::monomer::{Registry, TypeId};
use crate::species::{Species, SpeciesMol};

/// Seed quantity per monomer type.
#[derive(Debug, Clone)]
pub struct InitialConditions {
    pub(crate) seeds: Vec<(TypeId, f64)>,
}

impl InitialConditions {
    /// Derive quantities from the `<Monomer>_0` parameter convention. Every
    /// monomer must either have a `<Monomer>_0` parameter or be named in
    /// `unseeded`; a `*_0` parameter that names no declared monomer is
    /// rejected as a likely typo.
    pub fn from_convention(model: &Model, unseeded: &[&str]) -> Result<Self, ModelError> {
        for name in unseeded {
            model.registry.lookup(name)?;
        }
        for param in model.parameters.keys() {
            if let Some(stem) = param.strip_suffix("_0") {
                if model.registry.lookup(stem).is_err() {
                    return Err(ModelError::UnknownType(stem.to_string()));
                }
            }
        }
        let mut seeds = Vec::new();
        for (ty, decl) in model.registry.iter() {
            match model.parameter_value(&format!("{}_0", decl.name())) {
                Some(qty) => seeds.push((ty, qty)),
                None if unseeded.contains(&decl.name()) => {
                    warn!("monomer `{}` starts absent", decl.name());
                }
                None => return Err(ModelError::MissingQuantity(decl.name().to_string())),
            }
        }
        Ok(InitialConditions { seeds })
    }

    /// Give every quantity explicitly. Monomers absent from `quantities`
    /// start unseeded.
    pub fn explicit<'a>(
        model: &Model,
        quantities: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<Self, ModelError> {
        let mut seeds = Vec::new();
        for (name, qty) in quantities {
            seeds.push((model.registry.lookup(name)?, qty));
        }
        seeds.sort_by_key(|&(ty, _)| ty);
        Ok(InitialConditions { seeds })
    }
}

/// The seed species of a monomer type: one instance, all sites free, every
/// stateful site in its default state.
pub(crate) fn seed_species(reg: &Registry, ty: TypeId) -> Result<Species, ModelError> {
    let decl = reg.get(ty);
    let mut states = Vec::with_capacity(decl.sites().len());
    for (s, space) in decl.states.iter().enumerate() {
        states.push(match space {
            None => None,
            Some(space) => Some(space.default_index().ok_or_else(|| {
                ModelError::MissingDefaultState {
                    monomer: decl.name().to_string(),
                    site: decl.sites()[s].clone(),
                }
            })?),
        });
    }
    let n = states.len();
    Ok(Species::new(
        vec![SpeciesMol {
            ty,
            states,
            bonds: vec![None; n],
        }],
        reg,
    ))
}

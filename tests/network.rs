//! End-to-end expansion of small rule sets through the public API.

use std::collections::BTreeMap;

use rulenet::{
    generate, Bound, GenerationError, GeneratorOptions, InitialConditions, Model, ModelError,
    Mol, Monomer, Rule,
};

fn expand(model: &Model, unseeded: &[&str]) -> rulenet::ReactionNetwork {
    let init = InitialConditions::from_convention(model, unseeded).unwrap();
    generate(model, &init, &GeneratorOptions::default()).unwrap()
}

#[test]
fn binding_with_state_flip() {
    let mut m = Model::new();
    m.monomer(Monomer::new("A").sites(["b", "d"]).state("d", ["U", "C"], "U"))
        .unwrap();
    m.monomer(Monomer::new("B").site("b")).unwrap();
    m.parameter("A_0", 100.0).unwrap();
    m.parameter("B_0", 100.0).unwrap();
    m.parameter("kf", 1.0).unwrap();
    m.parameter("kr", 0.1).unwrap();
    m.parameter("kc", 0.5).unwrap();
    m.rule(
        Rule::new("bind")
            .reactant(Mol::new("A").free("b"))
            .reactant(Mol::new("B").free("b"))
            .product(Mol::new("A").link("b", 1) % Mol::new("B").link("b", 1))
            .rate("kf")
            .reversible("kr"),
    )
    .unwrap();
    m.rule(
        Rule::new("flip")
            .reactant(Mol::new("A").link("b", 1).state("d", "U") % Mol::new("B").link("b", 1))
            .product(Mol::new("A").link("b", 1).state("d", "C") % Mol::new("B").link("b", 1))
            .rate("kc"),
    )
    .unwrap();

    let net = expand(&m, &[]);
    assert!(net.closed());
    // A~U, B, A~U:B, A~C:B, A~C
    assert_eq!(net.species().len(), 5);
    assert_eq!(net.reactions().len(), 5);
    assert!(net.species_index("A(b!1,d~U).B(b!1)").is_some());
    assert!(net.species_index("A(b!1,d~C).B(b!1)").is_some());
    assert!(net.species_index("A(b,d~C)").is_some());

    // the flipped dimer only dissociates; it never flips back
    let flipped = net.species_index("A(b!1,d~C).B(b!1)").unwrap();
    let from_flipped: Vec<&str> = net
        .reactions()
        .iter()
        .filter(|r| r.reactants == vec![flipped])
        .map(|r| r.rule.as_str())
        .collect();
    assert_eq!(from_flipped, vec!["bind"]);
    assert!(net.reactions().iter().all(|r| !r.reverse || r.rule == "bind"));
}

#[test]
fn partner_specific_flips_stay_distinct() {
    // structurally identical dimers whose partners flip independently must
    // stay separate species
    let mut m = Model::new();
    m.monomer(Monomer::new("A").sites(["b", "d"]).state("d", ["U", "C"], "U"))
        .unwrap();
    m.monomer(Monomer::new("B").sites(["b", "d"]).state("d", ["U", "C"], "U"))
        .unwrap();
    m.parameter("A_0", 1.0).unwrap();
    m.parameter("B_0", 1.0).unwrap();
    m.parameter("kf", 1.0).unwrap();
    m.parameter("ka", 1.0).unwrap();
    m.parameter("kb", 1.0).unwrap();
    m.rule(
        Rule::new("bind")
            .reactant(Mol::new("A").free("b"))
            .reactant(Mol::new("B").free("b"))
            .product(Mol::new("A").link("b", 1) % Mol::new("B").link("b", 1))
            .rate("kf"),
    )
    .unwrap();
    m.rule(
        Rule::new("flip_A")
            .reactant(Mol::new("A").link("b", 1).state("d", "U") % Mol::new("B").link("b", 1))
            .product(Mol::new("A").link("b", 1).state("d", "C") % Mol::new("B").link("b", 1))
            .rate("ka"),
    )
    .unwrap();
    m.rule(
        Rule::new("flip_B")
            .reactant(Mol::new("A").link("b", 1) % Mol::new("B").link("b", 1).state("d", "U"))
            .product(Mol::new("A").link("b", 1) % Mol::new("B").link("b", 1).state("d", "C"))
            .rate("kb"),
    )
    .unwrap();

    let net = expand(&m, &[]);
    assert_eq!(net.species().len(), 6);
    assert_eq!(net.reactions().len(), 5);
    let ca = net.species_index("A(b!1,d~C).B(b!1,d~U)");
    let cb = net.species_index("A(b!1,d~U).B(b!1,d~C)");
    assert!(ca.is_some() && cb.is_some());
    assert_ne!(ca, cb);
    assert!(net.species_index("A(b!1,d~C).B(b!1,d~C)").is_some());
}

#[test]
fn doubly_loaded_scaffold_doubles_the_catalysis_rate() {
    // H can carry a G on each arm; a bound G converts S. With both arms
    // occupied the conversion channel exists twice.
    let mut m = Model::new();
    m.monomer(Monomer::new("G").site("a")).unwrap();
    m.monomer(Monomer::new("H").sites(["b1", "b2"])).unwrap();
    m.monomer(Monomer::new("S").site("d").state("d", ["U", "P"], "U"))
        .unwrap();
    m.parameter("G_0", 10.0).unwrap();
    m.parameter("H_0", 10.0).unwrap();
    m.parameter("S_0", 10.0).unwrap();
    m.parameter("kb", 1.0).unwrap();
    m.parameter("kc", 3.0).unwrap();
    for (name, arm) in [("load1", "b1"), ("load2", "b2")] {
        m.rule(
            Rule::new(name)
                .reactant(Mol::new("H").free(arm))
                .reactant(Mol::new("G").free("a"))
                .product(Mol::new("H").link(arm, 1) % Mol::new("G").link("a", 1))
                .rate("kb"),
        )
        .unwrap();
    }
    m.rule(
        Rule::new("cat")
            .reactant(Mol::new("G").bound("a"))
            .reactant(Mol::new("S").state("d", "U"))
            .product(Mol::new("G").bound("a"))
            .product(Mol::new("S").state("d", "P"))
            .rate("kc"),
    )
    .unwrap();

    let net = expand(&m, &[]);
    let full = net.species_index("G(a!1).G(a!2).H(b1!1,b2!2)").unwrap();
    let substrate = net.species_index("S(d~U)").unwrap();
    let via_full: Vec<_> = net
        .reactions()
        .iter()
        .filter(|r| r.rule == "cat" && r.reactants.contains(&full))
        .collect();
    assert_eq!(via_full.len(), 1);
    assert_eq!(via_full[0].reactants, vec![substrate, full]);
    assert_eq!(via_full[0].multiplicity, 2);
    assert_eq!(via_full[0].symmetry_factor, 1.0);
    assert_eq!(via_full[0].rate_constant(), 6.0);
    // a single bound G catalyzes at the base rate
    let single = net.species_index("G(a!1).H(b1!1,b2)").unwrap();
    let via_single = net
        .reactions()
        .iter()
        .find(|r| r.rule == "cat" && r.reactants.contains(&single))
        .unwrap();
    assert_eq!(via_single.multiplicity, 1);
}

#[test]
fn transmutation_requires_the_flag() {
    let mut m = Model::new();
    m.monomer(Monomer::new("Bid")).unwrap();
    m.monomer(Monomer::new("tBid")).unwrap();
    m.parameter("kc", 1.0).unwrap();
    let err = m
        .rule(
            Rule::new("cleave")
                .reactant(Mol::new("Bid"))
                .product(Mol::new("tBid"))
                .rate("kc"),
        )
        .unwrap_err();
    assert!(matches!(err, ModelError::MassImbalance { .. }));

    m.rule(
        Rule::new("cleave")
            .reactant(Mol::new("Bid"))
            .product(Mol::new("tBid"))
            .rate("kc")
            .transmuting(),
    )
    .unwrap();
    m.parameter("Bid_0", 40.0).unwrap();
    let net = expand(&m, &["tBid"]);
    assert_eq!(net.species().len(), 2);
    assert_eq!(net.reactions().len(), 1);
    assert_eq!(net.species_index("tBid()"), Some(1));
    assert_eq!(net.initial(), &[40.0, 0.0]);
}

#[test]
fn polymerization_hits_the_complex_size_bound() {
    let mut m = Model::new();
    m.monomer(Monomer::new("P").sites(["l", "r"])).unwrap();
    m.parameter("P_0", 10.0).unwrap();
    m.parameter("kf", 1.0).unwrap();
    m.rule(
        Rule::new("chain")
            .reactant(Mol::new("P").free("r"))
            .reactant(Mol::new("P").free("l"))
            .product(Mol::new("P").link("r", 1) % Mol::new("P").link("l", 1))
            .rate("kf"),
    )
    .unwrap();
    let init = InitialConditions::from_convention(&m, &[]).unwrap();
    let opts = GeneratorOptions {
        max_complex_size: Some(4),
        ..GeneratorOptions::default()
    };
    match generate(&m, &init, &opts) {
        Err(GenerationError::BoundExceeded { bound, partial, .. }) => {
            assert_eq!(bound, Bound::ComplexSize(4));
            assert!(!partial.closed());
            assert!(partial.species().iter().all(|s| s.size() <= 4));
        }
        other => panic!("expected BoundExceeded, got {other:?}"),
    }
}

#[test]
fn generation_is_deterministic() {
    let mut m = Model::new();
    m.monomer(Monomer::new("A").site("b")).unwrap();
    m.monomer(Monomer::new("B").sites(["a", "c"])).unwrap();
    m.monomer(Monomer::new("C").site("b")).unwrap();
    m.parameter("A_0", 1.0).unwrap();
    m.parameter("B_0", 1.0).unwrap();
    m.parameter("C_0", 1.0).unwrap();
    m.parameter("k1", 1.0).unwrap();
    m.parameter("k2", 2.0).unwrap();
    m.rule(
        Rule::new("ab")
            .reactant(Mol::new("A").free("b"))
            .reactant(Mol::new("B").free("a"))
            .product(Mol::new("A").link("b", 1) % Mol::new("B").link("a", 1))
            .rate("k1"),
    )
    .unwrap();
    m.rule(
        Rule::new("bc")
            .reactant(Mol::new("B").free("c"))
            .reactant(Mol::new("C").free("b"))
            .product(Mol::new("B").link("c", 1) % Mol::new("C").link("b", 1))
            .rate("k2"),
    )
    .unwrap();

    let a = serde_json::to_string(&expand(&m, &[])).unwrap();
    let b = serde_json::to_string(&expand(&m, &[])).unwrap();
    assert_eq!(a, b);
}

#[test]
fn reactions_conserve_composition() {
    let mut m = Model::new();
    m.monomer(Monomer::new("A").site("b")).unwrap();
    m.monomer(Monomer::new("B").sites(["a", "c"])).unwrap();
    m.parameter("A_0", 1.0).unwrap();
    m.parameter("B_0", 1.0).unwrap();
    m.parameter("kf", 1.0).unwrap();
    m.parameter("kr", 1.0).unwrap();
    m.rule(
        Rule::new("ab")
            .reactant(Mol::new("A").free("b"))
            .reactant(Mol::new("B").free("a"))
            .product(Mol::new("A").link("b", 1) % Mol::new("B").link("a", 1))
            .rate("kf")
            .reversible("kr"),
    )
    .unwrap();

    let net = expand(&m, &[]);
    for r in net.reactions() {
        let total = |ids: &[usize]| {
            let mut acc: BTreeMap<usize, usize> = BTreeMap::new();
            for &id in ids {
                for (ty, n) in net.species()[id].composition() {
                    *acc.entry(ty).or_insert(0) += n;
                }
            }
            acc
        };
        assert_eq!(total(&r.reactants), total(&r.products), "rule {}", r.rule);
    }
}

#[test]
fn network_serializes_to_json() {
    let mut m = Model::new();
    m.monomer(Monomer::new("A").site("b")).unwrap();
    m.monomer(Monomer::new("B").site("b")).unwrap();
    m.parameter("A_0", 2.0).unwrap();
    m.parameter("B_0", 3.0).unwrap();
    m.parameter("kf", 1.5).unwrap();
    m.rule(
        Rule::new("bind")
            .reactant(Mol::new("A").free("b"))
            .reactant(Mol::new("B").free("b"))
            .product(Mol::new("A").link("b", 1) % Mol::new("B").link("b", 1))
            .rate("kf"),
    )
    .unwrap();
    m.observable("bound_A", Mol::new("A").bound("b")).unwrap();

    let net = expand(&m, &[]);
    let v: serde_json::Value = serde_json::to_value(&net).unwrap();
    assert_eq!(v["species"][0], "A(b)");
    assert_eq!(v["species"][2], "A(b!1).B(b!1)");
    assert_eq!(v["initial"][1], 3.0);
    assert_eq!(v["reactions"][0]["rule"], "bind");
    assert_eq!(v["reactions"][0]["rate"], 1.5);
    assert_eq!(v["observables"][0]["name"], "bound_A");
    assert_eq!(v["observables"][0]["matches"][0][0], 2);
    assert_eq!(v["closed"], true);
}

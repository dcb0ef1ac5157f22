use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use bstr::BStr;
use hex_literal::hex;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::derivation::{
    downstream_placeholder, hash_derivation_modulo, is_derivation, output_path_name,
    static_output_hashes, want_output, BasicDerivation, Derivation, DerivationOutput,
    DerivationType, DrvHashError, DrvHashKind, DrvHashModulo, DrvHashes,
};
use crate::nixhash::{FileIngestionMethod, FixedOutputHash, HashAlgo, NixHash};
use crate::store::MemoryStore;
use crate::store_path::{make_output_path, StorePath};

const BAR_CONTENT_DIGEST: [u8; 32] =
    hex!("08813cbee9903c62be4c5027726a418a300da4500b2d369d3af9286f4815ceba");

/// The expected modulo hash of [bar_drv]: a pure function of the promised
/// content hash and the resulting output path.
const BAR_DRV_HASH: [u8; 32] =
    hex!("724f3e3634fce4cbbbd3483287b8798588e80280660b9a63fd13a1bc90485b33");

const BAR_OUTPUT_PATH: &str = "/nix/store/4q0pg5zpfmznxscq3avycvf9xdvx50n3-bar";
const BAR_DRV_PATH: &str = "/nix/store/0hm2f1psjpcwg8fijsmr4wwxrx59s092-bar.drv";
const FOO_DRV_PATH: &str = "/nix/store/4wvvbi4jwn0prsdxb7vs673qa5h9gr7x-foo.drv";

/// A fixed-output derivation, as `builtins.derivation { name = "bar";
/// builder = ":"; system = ":"; outputHash = …; }` would produce it.
fn bar_drv() -> Derivation {
    let mut drv = Derivation {
        basic: BasicDerivation {
            name: "bar".to_string(),
            builder: ":".to_string(),
            system: ":".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };

    drv.outputs.insert(
        "out".to_string(),
        DerivationOutput::CAFixed(FixedOutputHash {
            method: FileIngestionMethod::Recursive,
            hash: NixHash::Sha256(BAR_CONTENT_DIGEST),
        }),
    );

    let env = &mut drv.basic.environment;
    env.insert("builder".to_string(), ":".into());
    env.insert("name".to_string(), "bar".into());
    env.insert("out".to_string(), BAR_OUTPUT_PATH.into());
    env.insert(
        "outputHash".to_string(),
        "08813cbee9903c62be4c5027726a418a300da4500b2d369d3af9286f4815ceba".into(),
    );
    env.insert("outputHashAlgo".to_string(), "sha256".into());
    env.insert("outputHashMode".to_string(), "recursive".into());
    env.insert("system".to_string(), ":".into());

    drv
}

/// A derivation depending on [bar_drv], with its output path not assigned
/// yet.
fn foo_drv_unassigned(bar_drv_path: &StorePath) -> Derivation {
    let mut drv = Derivation {
        basic: BasicDerivation {
            name: "foo".to_string(),
            builder: ":".to_string(),
            system: ":".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };

    drv.outputs.insert("out".to_string(), DerivationOutput::Deferred);

    let env = &mut drv.basic.environment;
    env.insert("bar".to_string(), BAR_OUTPUT_PATH.into());
    env.insert("builder".to_string(), ":".into());
    env.insert("name".to_string(), "foo".into());
    env.insert("out".to_string(), "".into());
    env.insert("system".to_string(), ":".into());

    drv.input_derivations
        .insert(bar_drv_path.clone(), BTreeSet::from(["out".to_string()]));

    drv
}

#[test]
fn fixed_output_path() {
    let bar = bar_drv();
    let outputs = bar.outputs_and_opt_paths().expect("must succeed");
    let (_, opt_path) = outputs.get("out").expect("must exist");

    assert_eq!(
        BAR_OUTPUT_PATH,
        opt_path.as_ref().expect("must be known").to_absolute_path()
    );
}

#[test]
fn bar_aterm_bytes() {
    let expected = format!(
        "Derive([(\"out\",\"{0}\",\"r:sha256\",\"{1}\")],[],[],\":\",\":\",[],[(\"builder\",\":\"),(\"name\",\"bar\"),(\"out\",\"{0}\"),(\"outputHash\",\"{1}\"),(\"outputHashAlgo\",\"sha256\"),(\"outputHashMode\",\"recursive\"),(\"system\",\":\")])",
        BAR_OUTPUT_PATH,
        "08813cbee9903c62be4c5027726a418a300da4500b2d369d3af9286f4815ceba",
    );

    assert_eq!(
        BStr::new(&expected),
        BStr::new(&bar_drv().to_aterm_bytes().expect("must serialize"))
    );
}

#[test]
fn bar_derivation_path() {
    assert_eq!(
        BAR_DRV_PATH,
        bar_drv()
            .calculate_derivation_path()
            .expect("must succeed")
            .to_absolute_path()
    );
}

/// Input derivations are serialized in basename order, the order their
/// nixbase32-encoded digests sort in, not the order of the digest bytes.
#[test]
fn input_derivations_sorted_by_basename() {
    use bstr::ByteSlice;

    // byte order and encoded order disagree for this digest pair.
    let later = StorePath::from_name_and_digest(
        "a.drv",
        &hex!("0000000000000000000000000000000000000001"),
    )
    .unwrap();
    let earlier = StorePath::from_name_and_digest(
        "b.drv",
        &hex!("0100000000000000000000000000000000000000"),
    )
    .unwrap();
    assert!(later.digest < earlier.digest);

    let mut drv = Derivation {
        basic: BasicDerivation {
            name: "sorted".to_string(),
            builder: ":".to_string(),
            system: ":".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    drv.basic
        .outputs
        .insert("out".to_string(), DerivationOutput::Deferred);
    drv.input_derivations
        .insert(later.clone(), BTreeSet::from(["out".to_string()]));
    drv.input_derivations
        .insert(earlier.clone(), BTreeSet::from(["out".to_string()]));

    let aterm = drv.to_aterm_bytes().expect("must serialize");
    let pos_earlier = aterm
        .find(earlier.to_absolute_path().as_bytes())
        .expect("must be present");
    let pos_later = aterm
        .find(later.to_absolute_path().as_bytes())
        .expect("must be present");

    assert!(pos_earlier < pos_later);
}

#[test]
fn aterm_roundtrip() {
    let bar = bar_drv();
    let aterm = bar.to_aterm_bytes().expect("must serialize");

    let parsed = Derivation::from_aterm_bytes("bar", &aterm).expect("must parse");
    assert_eq!(bar, parsed);
}

#[test]
fn json_roundtrip() {
    let store = MemoryStore::new();
    let bar = bar_drv();
    let bar_drv_path = bar.calculate_derivation_path().expect("must succeed");
    store.add_derivation(bar_drv_path.clone(), bar);

    let foo = foo_drv_unassigned(&bar_drv_path);

    let s = serde_json::to_string(&foo).expect("must serialize");
    let foo2: Derivation = serde_json::from_str(&s).expect("must deserialize");

    assert_eq!(foo, foo2);
}

/// All outputs of one addressing category classify as that category, any
/// mixture is rejected.
#[rstest]
#[case::input_addressed(
    vec![("out", DerivationOutput::InputAddressed(
        StorePath::from_str("00bgd045z0d4icpbc2yyz4gx48ak44la-foo").unwrap()))],
    Some(DerivationType::InputAddressed)
)]
#[case::deferred(
    vec![("out", DerivationOutput::Deferred), ("lib", DerivationOutput::Deferred)],
    Some(DerivationType::DeferredInputAddressed)
)]
#[case::fixed(
    vec![("out", DerivationOutput::CAFixed(FixedOutputHash {
        method: FileIngestionMethod::Flat,
        hash: NixHash::Sha256([0; 32]),
    }))],
    Some(DerivationType::CAFixed)
)]
#[case::floating(
    vec![("out", DerivationOutput::CAFloating {
        method: FileIngestionMethod::Recursive,
        hash_algo: HashAlgo::Sha256,
    })],
    Some(DerivationType::CAFloating)
)]
#[case::mixed(
    vec![
        ("out", DerivationOutput::InputAddressed(
            StorePath::from_str("00bgd045z0d4icpbc2yyz4gx48ak44la-foo").unwrap())),
        ("lib", DerivationOutput::Deferred),
    ],
    None
)]
#[case::empty(vec![], None)]
fn classification(
    #[case] outputs: Vec<(&str, DerivationOutput)>,
    #[case] expected: Option<DerivationType>,
) {
    let drv = BasicDerivation {
        name: "foo".to_string(),
        outputs: outputs
            .into_iter()
            .map(|(name, output)| (name.to_string(), output))
            .collect(),
        ..Default::default()
    };

    match expected {
        Some(ty) => assert_eq!(ty, drv.derivation_type().expect("must classify")),
        None => {
            drv.derivation_type().expect_err("must fail");
        }
    }
}

#[test]
fn classification_predicates() {
    assert!(DerivationType::CAFixed.is_ca());
    assert!(DerivationType::CAFloating.is_ca());
    assert!(!DerivationType::InputAddressed.is_ca());

    assert!(DerivationType::CAFixed.is_fixed());
    assert!(!DerivationType::CAFloating.is_fixed());

    assert!(DerivationType::CAFloating.is_impure());
    assert!(!DerivationType::CAFixed.is_impure());

    assert!(DerivationType::InputAddressed.has_known_output_paths());
    assert!(DerivationType::CAFixed.has_known_output_paths());
    assert!(!DerivationType::DeferredInputAddressed.has_known_output_paths());
    assert!(!DerivationType::CAFloating.has_known_output_paths());
}

/// Fixed-output derivations dissolve into per-output hashes derived from
/// the promised content hash only; the builder is irrelevant.
#[test]
fn fixed_output_shortcut() {
    let store = MemoryStore::new();
    let hashes = DrvHashes::new();

    let bar = bar_drv();
    let expected = DrvHashModulo::CaOutputHashes(BTreeMap::from([(
        "out".to_string(),
        BAR_DRV_HASH,
    )]));

    assert_eq!(
        expected,
        hash_derivation_modulo(&store, &hashes, &bar, true).expect("must hash")
    );

    // a different builder command doesn't change anything.
    let mut noisy_bar = bar;
    noisy_bar.basic.builder = "/bin/sh".to_string();
    noisy_bar.basic.arguments = vec!["-c".to_string(), "curl | tar xz".to_string()];

    assert_eq!(
        expected,
        hash_derivation_modulo(&store, &hashes, &noisy_bar, true).expect("must hash")
    );
}

/// Walks the same construction a `builtins.derivation` implementation
/// would: assemble bar, then assemble foo on top of it, assigning foo's
/// output path from the modulo hash. The resulting store paths must match
/// what C++ Nix calculates for the same expressions.
#[test]
fn output_path_construction() {
    let store = MemoryStore::new();
    let hashes = DrvHashes::new();

    let bar = bar_drv();
    let bar_drv_path = bar.calculate_derivation_path().expect("must succeed");
    assert_eq!(BAR_DRV_PATH, bar_drv_path.to_absolute_path());
    store.add_derivation(bar_drv_path.clone(), bar);

    let mut foo = foo_drv_unassigned(&bar_drv_path);

    let foo_drv_hash = match hash_derivation_modulo(&store, &hashes, &foo, true).expect("must hash")
    {
        DrvHashModulo::DrvHash {
            hash,
            kind: DrvHashKind::Regular,
        } => hash,
        other => panic!("unexpected hash modulo: {:?}", other),
    };

    let foo_out_path = make_output_path(
        &NixHash::Sha256(foo_drv_hash),
        "out",
        &output_path_name("foo", "out"),
    )
    .expect("must succeed");

    foo.basic
        .environment
        .insert("out".to_string(), foo_out_path.to_absolute_path().into());
    foo.basic.outputs.insert(
        "out".to_string(),
        DerivationOutput::InputAddressed(foo_out_path),
    );

    assert_eq!(
        FOO_DRV_PATH,
        foo.calculate_derivation_path()
            .expect("must succeed")
            .to_absolute_path()
    );
}

/// Two graphs differing only in the builder command of a fixed-output leaf
/// produce identical modulo hashes for the ancestor.
#[test]
fn unrelated_fixed_input_change_is_ignored() {
    let store = MemoryStore::new();

    let bar1 = bar_drv();

    let mut bar2 = bar_drv();
    bar2.basic.builder = "/bin/fetchurl".to_string();

    let bar1_drv_path = bar1.calculate_derivation_path().expect("must succeed");
    let bar2_drv_path = bar2.calculate_derivation_path().expect("must succeed");
    assert_ne!(bar1_drv_path, bar2_drv_path);

    store.add_derivation(bar1_drv_path.clone(), bar1);
    store.add_derivation(bar2_drv_path.clone(), bar2);

    let foo1 = foo_drv_unassigned(&bar1_drv_path);
    let foo2 = foo_drv_unassigned(&bar2_drv_path);

    let h1 = hash_derivation_modulo(&store, &DrvHashes::new(), &foo1, true).expect("must hash");
    let h2 = hash_derivation_modulo(&store, &DrvHashes::new(), &foo2, true).expect("must hash");

    assert_eq!(h1, h2);
}

/// Repeated hashing is byte-identical, with a cold cache, a warm cache,
/// and across separate caches.
#[test]
fn hash_determinism() {
    let store = MemoryStore::new();

    let bar = bar_drv();
    let bar_drv_path = bar.calculate_derivation_path().expect("must succeed");
    store.add_derivation(bar_drv_path.clone(), bar);

    let foo = foo_drv_unassigned(&bar_drv_path);

    let hashes = DrvHashes::new();
    let cold = hash_derivation_modulo(&store, &hashes, &foo, true).expect("must hash");
    let warm = hash_derivation_modulo(&store, &hashes, &foo, true).expect("must hash");
    let fresh =
        hash_derivation_modulo(&store, &DrvHashes::new(), &foo, true).expect("must hash");

    assert_eq!(cold, warm);
    assert_eq!(cold, fresh);
}

/// A floating derivation anywhere in the transitive input set makes the
/// dependent's identity deferred, even with input-addressed outputs.
#[test]
fn deferred_propagation() {
    let store = MemoryStore::new();
    let hashes = DrvHashes::new();

    let mut floating = Derivation {
        basic: BasicDerivation {
            name: "floating".to_string(),
            builder: ":".to_string(),
            system: ":".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    floating.basic.outputs.insert(
        "out".to_string(),
        DerivationOutput::CAFloating {
            method: FileIngestionMethod::Recursive,
            hash_algo: HashAlgo::Sha256,
        },
    );
    let floating_drv_path = floating.calculate_derivation_path().expect("must succeed");
    store.add_derivation(floating_drv_path.clone(), floating);

    let mut dependent = Derivation {
        basic: BasicDerivation {
            name: "dependent".to_string(),
            builder: ":".to_string(),
            system: ":".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    dependent.basic.outputs.insert(
        "out".to_string(),
        DerivationOutput::InputAddressed(
            StorePath::from_str("00bgd045z0d4icpbc2yyz4gx48ak44la-dependent").unwrap(),
        ),
    );
    dependent
        .input_derivations
        .insert(floating_drv_path, BTreeSet::from(["out".to_string()]));

    match hash_derivation_modulo(&store, &hashes, &dependent, true).expect("must hash") {
        DrvHashModulo::DrvHash { kind, .. } => assert_eq!(DrvHashKind::Deferred, kind),
        other => panic!("unexpected hash modulo: {:?}", other),
    }

    // a static hash can't be produced while deferred.
    assert!(matches!(
        static_output_hashes(&store, &hashes, &dependent).expect_err("must fail"),
        DrvHashError::DeferredDrvHash(_)
    ));
}

#[test]
fn static_hashes() {
    let store = MemoryStore::new();
    let hashes = DrvHashes::new();

    // fixed-output: per-output hashes come straight from the shortcut.
    assert_eq!(
        BTreeMap::from([("out".to_string(), BAR_DRV_HASH)]),
        static_output_hashes(&store, &hashes, &bar_drv()).expect("must succeed")
    );
}

/// A reference cycle can't come out of regular instantiation, but corrupt
/// input must fail fast instead of recursing forever.
#[test]
fn cyclic_input_derivation() {
    let store = MemoryStore::new();
    let hashes = DrvHashes::new();

    let a_drv_path = StorePath::from_str("0hm2f1psjpcwg8fijsmr4wwxrx59s092-a.drv").unwrap();
    let b_drv_path = StorePath::from_str("4q0pg5zpfmznxscq3avycvf9xdvx50n3-b.drv").unwrap();

    let mut a = Derivation {
        basic: BasicDerivation {
            name: "a".to_string(),
            builder: ":".to_string(),
            system: ":".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    a.basic
        .outputs
        .insert("out".to_string(), DerivationOutput::Deferred);

    let mut b = a.clone();
    b.basic.name = "b".to_string();

    a.input_derivations
        .insert(b_drv_path.clone(), BTreeSet::from(["out".to_string()]));
    b.input_derivations
        .insert(a_drv_path.clone(), BTreeSet::from(["out".to_string()]));

    store.add_derivation(a_drv_path, a.clone());
    store.add_derivation(b_drv_path.clone(), b);

    assert!(matches!(
        hash_derivation_modulo(&store, &hashes, &a, true).expect_err("must fail"),
        DrvHashError::CyclicInputDerivation(p) if p == b_drv_path
    ));
}

/// Consuming an output name a fixed input doesn't have is a hard error.
#[test]
fn missing_input_derivation_output() {
    let store = MemoryStore::new();
    let hashes = DrvHashes::new();

    let bar = bar_drv();
    let bar_drv_path = bar.calculate_derivation_path().expect("must succeed");
    store.add_derivation(bar_drv_path.clone(), bar);

    let mut foo = foo_drv_unassigned(&bar_drv_path);
    foo.input_derivations
        .insert(bar_drv_path.clone(), BTreeSet::from(["doc".to_string()]));

    assert!(matches!(
        hash_derivation_modulo(&store, &hashes, &foo, true).expect_err("must fail"),
        DrvHashError::MissingInputDerivationOutput(p, name)
            if p == bar_drv_path && name == "doc"
    ));
}

#[test]
fn dangling_input_derivation() {
    let store = MemoryStore::new();
    let hashes = DrvHashes::new();

    let dangling_path =
        StorePath::from_str("00bgd045z0d4icpbc2yyz4gx48ak44la-missing.drv").unwrap();

    let mut drv = Derivation {
        basic: BasicDerivation {
            name: "broken".to_string(),
            builder: ":".to_string(),
            system: ":".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    drv.basic
        .outputs
        .insert("out".to_string(), DerivationOutput::Deferred);
    drv.input_derivations
        .insert(dangling_path.clone(), BTreeSet::from(["out".to_string()]));

    assert!(matches!(
        hash_derivation_modulo(&store, &hashes, &drv, true).expect_err("must fail"),
        DrvHashError::DanglingInputDerivation(p) if p == dangling_path
    ));
}

/// Resolution with all inputs realized: placeholders are substituted,
/// realized paths move into the input sources, and the deferred output
/// gets its path assigned.
#[test]
fn resolve_complete() {
    let store = MemoryStore::new();
    let hashes = DrvHashes::new();

    let bar = bar_drv();
    let bar_drv_path = bar.calculate_derivation_path().expect("must succeed");
    let bar_out_path = StorePath::from_absolute_path(BAR_OUTPUT_PATH.as_bytes()).unwrap();
    store.add_derivation(bar_drv_path.clone(), bar);

    let placeholder = downstream_placeholder(&bar_drv_path, "out");

    let mut foo = foo_drv_unassigned(&bar_drv_path);
    foo.basic.arguments = vec!["-c".to_string(), format!("cp {}/data $out", placeholder)];
    foo.basic
        .environment
        .insert("barPath".to_string(), placeholder.clone().into());

    // not built yet: not an error, but no result either.
    assert!(foo
        .try_resolve(&store, &hashes)
        .expect("must not fail")
        .is_none());

    store.add_realisation(bar_drv_path.clone(), "out", bar_out_path.clone());

    let resolved = foo
        .try_resolve(&store, &hashes)
        .expect("must not fail")
        .expect("must resolve");

    assert!(resolved.input_sources.contains(&bar_out_path));
    assert_eq!(
        format!("cp {}/data $out", BAR_OUTPUT_PATH),
        resolved.arguments[1]
    );
    assert_eq!(
        BAR_OUTPUT_PATH.as_bytes(),
        resolved
            .environment
            .get("barPath")
            .expect("must exist")
            .as_slice()
    );

    // the formerly deferred output now has a concrete path, mirrored into
    // the environment.
    match resolved.outputs.get("out").expect("must exist") {
        DerivationOutput::InputAddressed(path) => {
            assert_eq!(
                path.to_absolute_path().as_bytes(),
                resolved
                    .environment
                    .get("out")
                    .expect("must exist")
                    .as_slice()
            );
        }
        other => panic!("unexpected output: {:?}", other),
    }
}

/// Resolution fails softly when only some of multiple wanted outputs are
/// realized.
#[test]
fn resolve_partial_realisation() {
    let store = MemoryStore::new();
    let hashes = DrvHashes::new();

    let bar = bar_drv();
    let bar_drv_path = bar.calculate_derivation_path().expect("must succeed");
    store.add_derivation(bar_drv_path.clone(), bar);

    let mut foo = foo_drv_unassigned(&bar_drv_path);
    // also want a "dev" output that will never be realized.
    foo.input_derivations
        .get_mut(&bar_drv_path)
        .unwrap()
        .insert("dev".to_string());

    store.add_realisation(
        bar_drv_path.clone(),
        "out",
        StorePath::from_absolute_path(BAR_OUTPUT_PATH.as_bytes()).unwrap(),
    );

    assert!(foo
        .try_resolve(&store, &hashes)
        .expect("must not fail")
        .is_none());
}

#[rstest]
#[case::empty_wants_all("out", vec![], true)]
#[case::empty_wants_all_other("doc", vec![], true)]
#[case::listed("out", vec!["out"], true)]
#[case::not_listed("doc", vec!["out", "lib"], false)]
fn want_output_convention(
    #[case] output_name: &str,
    #[case] wanted: Vec<&str>,
    #[case] expected: bool,
) {
    let wanted: BTreeSet<String> = wanted.into_iter().map(str::to_string).collect();
    assert_eq!(expected, want_output(output_name, &wanted));
}

#[rstest]
#[case::drv("/nix/store/0hm2f1psjpcwg8fijsmr4wwxrx59s092-bar.drv", true)]
#[case::not_drv("/nix/store/4q0pg5zpfmznxscq3avycvf9xdvx50n3-bar", false)]
#[case::empty("", false)]
fn is_derivation_convention(#[case] file_name: &str, #[case] expected: bool) {
    assert_eq!(expected, is_derivation(file_name));
}

#[rstest]
#[case::out("foo", "out", "foo")]
#[case::lib("foo", "lib", "foo-lib")]
fn output_path_names(#[case] drv_name: &str, #[case] output_name: &str, #[case] expected: &str) {
    assert_eq!(expected, output_path_name(drv_name, output_name));
}

#[test]
fn downstream_placeholder_shape() {
    let drv_path = StorePath::from_str("0hm2f1psjpcwg8fijsmr4wwxrx59s092-bar.drv").unwrap();
    let placeholder = downstream_placeholder(&drv_path, "out");

    // a leading slash followed by a 52 character nixbase32 sha256 digest,
    // never a valid store path.
    assert_eq!(53, placeholder.len());
    assert!(placeholder.starts_with('/'));
    assert!(StorePath::from_absolute_path(placeholder.as_bytes()).is_err());
}

mod placeholder_distinctness {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Distinct (drv path, output name) pairs produce distinct
        /// placeholder tokens.
        #[test]
        fn distinct_pairs_distinct_tokens(
            digest1 in prop::array::uniform20(any::<u8>()),
            digest2 in prop::array::uniform20(any::<u8>()),
            name1 in "[a-z][a-z0-9-]{0,12}",
            name2 in "[a-z][a-z0-9-]{0,12}",
            output1 in "[a-z]{1,8}",
            output2 in "[a-z]{1,8}",
        ) {
            let drv_path1 = StorePath::from_name_and_digest(&format!("{}.drv", name1), &digest1).unwrap();
            let drv_path2 = StorePath::from_name_and_digest(&format!("{}.drv", name2), &digest2).unwrap();

            prop_assume!((&drv_path1, &output1) != (&drv_path2, &output2));

            prop_assert_ne!(
                downstream_placeholder(&drv_path1, &output1),
                downstream_placeholder(&drv_path2, &output2)
            );
        }
    }
}

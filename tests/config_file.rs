//! Loading run configurations from disk.

use dcr_discovery::config::DiscoveryConfig;
use dcr_discovery::metric::path::Step;
use dcr_discovery::metric::{Expectation, Outcome, Treatment};
use dcr_discovery::pairs::PairingMode;
use dcr_discovery::similarity::PropertyPolicy;

#[test]
fn loads_a_full_run_configuration() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("run.toml");
    std::fs::write(
        &path,
        r#"
        [similarity]
        max_depth = 3
        max_pairings = 120
        properties = "present"
        end_node_types = ["http://example.org/Drug"]
        [similarity.functionality]
        "http://example.org/treats" = 2
        "http://example.org/diet" = 1

        [calibration]
        sample_size = 500
        degree = 3
        target_similarity = 0.7
        seed = 5

        [pairing]
        mode = "cross_group"

        [metric]
        z = 2.58
        [metric.treatment]
        kind = "group"
        members = ["ex:a", "ex:b"]
        expect = "increase"
        [metric.outcome]
        kind = "min_over_chain"
        via = { forward = "ex:takes" }
        then = [{ forward = "ex:grade" }]
        baseline = [{ inverse = "ex:hasStudent" }, { forward = "ex:ranking" }]
        "#,
    )
    .unwrap();

    let cfg = DiscoveryConfig::from_file(&path).unwrap();
    assert_eq!(cfg.similarity.max_depth, 3);
    assert_eq!(cfg.similarity.max_pairings, 120);
    assert_eq!(cfg.similarity.properties, PropertyPolicy::Present);
    assert_eq!(cfg.similarity.functionality.len(), 2);
    assert_eq!(cfg.similarity.end_node_types.len(), 1);
    assert_eq!(cfg.calibration.sample_size, 500);
    assert_eq!(cfg.calibration.degree, 3);
    assert_eq!(cfg.calibration.seed, Some(5));
    // Unset fields keep their defaults.
    assert_eq!(cfg.calibration.intervals, 20);
    assert_eq!(cfg.pairing.mode, PairingMode::CrossGroup);
    assert_eq!(cfg.pairing.threshold, None);
    assert_eq!(cfg.metric.z, 2.58);

    match cfg.metric.treatment {
        Some(Treatment::Group { members, expect }) => {
            assert_eq!(members.len(), 2);
            assert_eq!(expect, Expectation::Increase);
        }
        other => panic!("unexpected treatment {other:?}"),
    }
    match cfg.metric.outcome {
        Some(Outcome::MinOverChain { via, baseline, .. }) => {
            assert_eq!(via, Step::forward("ex:takes"));
            assert_eq!(baseline[0], Step::inverse("ex:hasStudent"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = DiscoveryConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
    assert!(err.to_string().contains("nope.toml"));
}

#[test]
fn invalid_rule_is_rejected_on_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(
        &path,
        r#"
        [metric.treatment]
        kind = "categorical"
        path = [{ forward = "treats" }]
        t0 = "d0"
        t1 = "d0"
        "#,
    )
    .unwrap();
    let err = DiscoveryConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("d0"));
}

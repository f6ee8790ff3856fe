//! Stream Factory Tests
//!
//! Critical invariants tested:
//! - A node's stream does not depend on which rank creates it
//! - Distinct ranks and distinct runs get distinct streams
//! - Restarting from checkpoints continues every stream where it stopped
//! - Incoherent configurations are rejected before any stream exists

use stochastic_core_rs::{
    deserialize_stream, serialize_stream, FactorySnapshot, GeneratorKind, RandomStream, RngError,
    RngFactory, RngFactoryConfig, RngPolicy,
};

const NODE_CONFIG: &str = r#"{
    "Random_Number_Generator_Type": "USE_PSEUDO_DES",
    "Random_Number_Generator_Policy": "ONE_PER_NODE",
    "Run_Number": 21,
    "Simulation_Type": "GENERIC_SIMULATION"
}"#;

fn first_words(stream: &mut RandomStream, count: usize) -> Vec<u32> {
    (0..count).map(|_| stream.next_word()).collect()
}

// ============================================================================
// Per-Node Seeding
// ============================================================================

#[test]
fn test_node_stream_independent_of_owning_rank() {
    let all_nodes = [3u32, 5, 8, 13, 21];

    // Rank A owns the even positions, rank B the odd ones.
    let mut rank_a = RngFactory::from_json(NODE_CONFIG).unwrap();
    let mut rank_b = RngFactory::from_json(NODE_CONFIG).unwrap();
    rank_a.set_node_ids(&all_nodes);
    rank_b.set_node_ids(&all_nodes);

    // A single process that owns everything.
    let mut single = RngFactory::from_json(NODE_CONFIG).unwrap();
    single.set_node_ids(&all_nodes);

    for (position, &node) in all_nodes.iter().enumerate() {
        let owner = if position % 2 == 0 { &mut rank_a } else { &mut rank_b };
        let mut distributed = owner.create_node_stream(node).unwrap().unwrap();
        let mut reference = single.create_node_stream(node).unwrap().unwrap();

        assert_eq!(
            first_words(&mut distributed, 16),
            first_words(&mut reference, 16),
            "node {}",
            node
        );
    }
}

#[test]
fn test_node_streams_are_distinct() {
    let mut factory = RngFactory::from_json(NODE_CONFIG).unwrap();
    factory.set_node_ids(&[1, 2, 3]);

    let firsts: Vec<Vec<u32>> = [1, 2, 3]
        .iter()
        .map(|&node| first_words(&mut factory.create_node_stream(node).unwrap().unwrap(), 4))
        .collect();

    assert_ne!(firsts[0], firsts[1]);
    assert_ne!(firsts[1], firsts[2]);
    assert_ne!(firsts[0], firsts[2]);
}

#[test]
fn test_out_of_order_request_is_rejected() {
    let mut factory = RngFactory::from_json(NODE_CONFIG).unwrap();
    factory.set_node_ids(&[1, 2, 3]);

    factory.create_node_stream(3).unwrap();
    assert_eq!(factory.create_node_stream(2).unwrap_err(), RngError::UnknownNode(2));
}

#[test]
fn test_unregistered_node_is_rejected() {
    let mut factory = RngFactory::from_json(NODE_CONFIG).unwrap();
    assert_eq!(factory.create_node_stream(4).unwrap_err(), RngError::UnknownNode(4));
}

// ============================================================================
// Per-Core Seeding
// ============================================================================

#[test]
fn test_core_streams_differ_by_rank_and_run() {
    let json = |run: u16| {
        format!(
            r#"{{"Random_Number_Generator_Type": "USE_AES_COUNTER", "Run_Number": {}}}"#,
            run
        )
    };

    let mut run1 = RngFactory::from_json(&json(1)).unwrap();
    let mut run2 = RngFactory::from_json(&json(2)).unwrap();
    assert_eq!(run1.policy(), RngPolicy::OnePerCore);

    let rank0 = first_words(&mut run1.create_core_stream(0).unwrap(), 8);
    let rank1 = first_words(&mut run1.create_core_stream(1).unwrap(), 8);
    let other_run = first_words(&mut run2.create_core_stream(0).unwrap(), 8);

    assert_ne!(rank0, rank1);
    assert_ne!(rank0, other_run);

    // Same run and rank: same stream.
    let again = first_words(&mut run1.create_core_stream(0).unwrap(), 8);
    assert_eq!(rank0, again);
}

#[test]
fn test_every_generator_name_accepted() {
    for (name, kind) in [
        ("USE_LINEAR_CONGRUENTIAL", GeneratorKind::LinearCongruential),
        ("USE_PSEUDO_DES", GeneratorKind::PseudoDes),
        ("USE_AES_COUNTER", GeneratorKind::AesCounter),
    ] {
        let json = format!(r#"{{"Random_Number_Generator_Type": "{}"}}"#, name);
        let mut factory = RngFactory::from_json(&json).unwrap();
        assert_eq!(factory.config().generator, kind);
        assert_eq!(factory.create_core_stream(0).unwrap().kind(), kind);
    }
}

#[test]
fn test_incoherent_json_rejected() {
    let result = RngFactory::from_json(
        r#"{
            "Random_Number_Generator_Type": "USE_LINEAR_CONGRUENTIAL",
            "Random_Number_Generator_Policy": "ONE_PER_NODE"
        }"#,
    );
    match result {
        Err(RngError::IncoherentConfig(message)) => {
            assert!(message.contains("ONE_PER_CORE"), "message: {}", message);
        }
        other => panic!("expected incoherent config, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_unknown_policy_rejected() {
    let result = RngFactory::from_json(r#"{"Random_Number_Generator_Policy": "ONE_PER_THREAD"}"#);
    assert!(matches!(result, Err(RngError::InvalidConfig(_))));
}

// ============================================================================
// Restart From Checkpoints
// ============================================================================

#[test]
fn test_restart_continues_every_stream() {
    let config = RngFactoryConfig::from_json(NODE_CONFIG).unwrap();
    let mut factory = RngFactory::new(config.clone()).unwrap();
    factory.set_node_ids(&[1, 2]);

    let mut node1 = factory.create_node_stream(1).unwrap().unwrap();
    let mut node2 = factory.create_node_stream(2).unwrap().unwrap();
    node1.gaussian();
    for _ in 0..1000 {
        node2.next_unit();
    }

    // Persist the factory and its streams as a simulation checkpoint would.
    let factory_json = serde_json::to_string(&factory.snapshot()).unwrap();
    let node1_bytes = serialize_stream(&node1);
    let node2_bytes = serialize_stream(&node2);

    let snapshot: FactorySnapshot = serde_json::from_str(&factory_json).unwrap();
    let mut restarted = RngFactory::restore(config, snapshot).unwrap();
    assert!(restarted.is_restored());
    assert!(restarted.create_node_stream(1).unwrap().is_none());

    let mut restored1 = deserialize_stream(&node1_bytes).unwrap();
    let mut restored2 = deserialize_stream(&node2_bytes).unwrap();
    assert_eq!(restored1.gaussian(), node1.gaussian());
    assert_eq!(first_words(&mut restored2, 64), first_words(&mut node2, 64));
}

#[test]
fn test_restore_under_changed_run_number_fails() {
    let config = RngFactoryConfig::from_json(NODE_CONFIG).unwrap();
    let factory = RngFactory::new(config.clone()).unwrap();
    let snapshot = factory.snapshot();

    let mut changed = config;
    changed.run_number += 1;
    match RngFactory::restore(changed, snapshot) {
        Err(RngError::ConfigMismatch { expected, found }) => assert_ne!(expected, found),
        other => panic!("expected config mismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_config_hash_tracks_configuration() {
    let a = RngFactory::from_json(NODE_CONFIG).unwrap();
    let b = RngFactory::from_json(NODE_CONFIG).unwrap();
    let c = RngFactory::from_json(r#"{"Run_Number": 21}"#).unwrap();

    assert_eq!(a.config_hash(), b.config_hash());
    assert_ne!(a.config_hash(), c.config_hash());
    assert_eq!(a.config_hash().len(), 64);
}

// ============================================================================
// Reporting
// ============================================================================

#[test]
fn test_report_stream_leaves_simulation_streams_untouched() {
    let json = r#"{"Random_Number_Generator_Type": "USE_PSEUDO_DES", "Run_Number": 4}"#;
    let mut with_reporting = RngFactory::from_json(json).unwrap();
    let mut without_reporting = RngFactory::from_json(json).unwrap();

    let mut report = RngFactory::report_stream(4, 0);
    for _ in 0..100 {
        report.next_unit();
    }

    let mut a = with_reporting.create_core_stream(0).unwrap();
    let mut b = without_reporting.create_core_stream(0).unwrap();
    assert_eq!(first_words(&mut a, 32), first_words(&mut b, 32));
}

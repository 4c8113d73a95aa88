use flockmem::*;
use tempfile::tempdir;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_create_roles() {
    let config = PartitionConfig::build(1000, 1, names(&["A", "B", "C", "D"])).unwrap();
    let roles = create_roles(&config).unwrap();

    assert_eq!(roles.len(), 4);
    assert_eq!(roles[0].name, "A");
    assert!(roles[0].primary);
    assert_eq!(roles[0].replica_nodes, names(&["B"]));
    assert_eq!((roles[0].start_address, roles[0].end_address), (0, 499));

    assert_eq!(roles[1].name, "B");
    assert!(!roles[1].primary);
    assert_eq!(roles[1].replica_nodes, names(&["A"]));

    assert_eq!(roles[3].name, "D");
    assert_eq!((roles[3].start_address, roles[3].end_address), (500, 999));
}

#[test]
fn test_create_roles_three_member_group() {
    let config = PartitionConfig::build(30, 2, names(&["A", "B", "C"])).unwrap();
    let roles = create_roles(&config).unwrap();
    assert_eq!(roles[1].replica_nodes, names(&["A", "C"]));
    assert_eq!(roles[2].replica_nodes, names(&["A", "B"]));
}

#[test]
fn test_document_json_shape() {
    let doc = ClusterDocument::generate(10, 1, names(&["A", "B"])).unwrap();
    let json: serde_json::Value = serde_json::from_str(&doc.to_json_pretty().unwrap()).unwrap();

    let first = &json[0];
    assert_eq!(first["name"], "A");
    assert_eq!(first["startAddress"], 0);
    assert_eq!(first["endAddress"], 9);
    assert_eq!(first["primary"], true);
    assert_eq!(first["replicaNodes"][0], "B");
}

#[test]
fn test_derive_config_reproduces_inputs() {
    let doc = ClusterDocument::generate(1000, 1, names(&["A", "B", "C", "D"])).unwrap();
    let parsed = ClusterDocument::from_json(&doc.to_json_pretty().unwrap()).unwrap();
    let config = parsed.derive_config().unwrap();

    assert_eq!(config, PartitionConfig::build(1000, 1, names(&["A", "B", "C", "D"])).unwrap());
    assert_eq!(config.total_addresses(), 1000);
    assert_eq!(config.replication_factor(), 1);
}

#[test]
fn test_derive_config_rejects_reordered_document() {
    let doc = ClusterDocument::generate(1000, 1, names(&["A", "B", "C", "D"])).unwrap();
    let mut roles = doc.roles().to_vec();
    roles.swap(0, 2);
    let reordered = ClusterDocument::from_roles(roles);

    assert!(matches!(reordered.derive_config(), Err(DsmError::Configuration(_))));
}

#[test]
fn test_derive_config_rejects_empty_document() {
    let doc = ClusterDocument::from_roles(vec![]);
    assert!(matches!(doc.derive_config(), Err(DsmError::Configuration(_))));
}

#[test]
fn test_role_for() {
    let doc = ClusterDocument::generate(10, 0, names(&["A", "B"])).unwrap();
    assert_eq!(doc.role_for("B").unwrap().start_address, 5);
    assert!(doc.role_for("Z").is_err());
}

#[test]
fn test_document_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dsm_config.json");

    let doc = ClusterDocument::generate(100, 1, names(&["A", "B"])).unwrap();
    doc.save(&path).unwrap();

    let loaded = ClusterDocument::load(&path).unwrap();
    assert_eq!(loaded, doc);
}

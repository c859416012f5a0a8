use std::collections::BTreeMap;

use provisioner::engine::{self, Options, ProvisionRequest};
use provisioner::error::{ErrorKind, ProvisionError};
use provisioner::params::{plan_parameters, MetaData, MetadataTable, Parameter, Phase, ValueKind};

fn opts(pairs: &[(&str, &str)]) -> Options {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn value(params: &[Parameter], key: &str) -> Option<String> {
    params
        .iter()
        .find(|p| p.key() == key)
        .and_then(Parameter::get_value_opt)
}

#[test]
fn plan_covers_every_table_key() {
    let table = MetadataTable::from([
        ("Engine", MetaData::string().required()),
        ("Port", MetaData::int().default_value("6379")),
        ("SubnetIds", MetaData::list()),
    ]);
    let params = plan_parameters(&table, &opts(&[("Engine", "redis")])).unwrap();

    let keys: Vec<_> = params.iter().map(Parameter::key).collect();
    assert_eq!(keys, vec!["Engine", "Port", "SubnetIds"]);
    assert_eq!(value(&params, "Port").as_deref(), Some("6379"));
    assert!(value(&params, "SubnetIds").is_none());
}

#[test]
fn plan_rejects_unknown_before_missing() {
    let table = MetadataTable::from([("Engine", MetaData::string().required())]);
    let err = plan_parameters(&table, &opts(&[("Bogus", "1")])).unwrap_err();
    assert!(matches!(err, ProvisionError::UnsupportedParameter { ref key } if key == "Bogus"));
}

#[test]
fn plan_reports_unparseable_values() {
    let table = MetadataTable::from([("Port", MetaData::int())]);
    let err = plan_parameters(&table, &opts(&[("Port", "six")])).unwrap_err();
    assert!(matches!(err, ProvisionError::ParseError { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn plan_reports_bad_defaults() {
    let table = MetadataTable::from([("Port", MetaData::int().default_value("x"))]);
    let err = plan_parameters(&table, &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, ProvisionError::ParseError { .. } | ProvisionError::InvalidDefault { .. }));
}

#[test]
fn engine_plan_dispatches_by_kind() {
    let rds = engine::plan_install(
        "rds",
        "app-db",
        &opts(&[
            ("Engine", "mysql"),
            ("EngineVersion", "8.0"),
            ("DBInstanceClass", "db.t3.micro"),
        ]),
        16,
    )
    .unwrap();
    assert_eq!(value(&rds, "Port").as_deref(), Some("3306"));
    assert_eq!(value(&rds, "MasterUserPassword").unwrap().len(), 16);

    let redis = engine::plan_install(
        "redis",
        "sessions",
        &opts(&[("EngineVersion", "7.0"), ("CacheNodeType", "cache.t3.micro")]),
        16,
    )
    .unwrap();
    assert_eq!(value(&redis, "Engine").as_deref(), Some("redis"));
    assert_eq!(value(&redis, "Port").as_deref(), Some("6379"));
    assert!(value(&redis, "ReplicationGroupId")
        .unwrap()
        .starts_with("sessions"));

    let memcached = engine::plan_install(
        "memcached",
        "memo",
        &opts(&[("EngineVersion", "1.6"), ("CacheNodeType", "cache.t3.micro")]),
        16,
    )
    .unwrap();
    assert_eq!(value(&memcached, "NumCacheNodes").as_deref(), Some("1"));
    assert!(value(&memcached, "CacheClusterId").is_some());
}

#[test]
fn caller_port_wins_over_default() {
    let params = engine::plan_install(
        "redis",
        "sessions",
        &opts(&[
            ("EngineVersion", "7.0"),
            ("CacheNodeType", "cache.t3.micro"),
            ("Port", "6380"),
        ]),
        16,
    )
    .unwrap();
    assert_eq!(value(&params, "Port").as_deref(), Some("6380"));
}

#[test]
fn metadata_tables_per_phase() {
    let install = engine::metadata_table("rds", Phase::Install).unwrap();
    assert!(install["Engine"].required);
    assert!(install["Engine"].immutable);
    assert_eq!(install["AllocatedStorage"].kind, ValueKind::Int);

    let update = engine::metadata_table("rds", Phase::Update).unwrap();
    assert!(!update["Engine"].required);
    assert_eq!(update["ApplyImmediately"].default.as_deref(), Some("true"));

    let replica = engine::metadata_table("rds", Phase::ReadReplica).unwrap();
    assert!(replica["SourceDBInstanceIdentifier"].required);

    let redis = engine::metadata_table("redis", Phase::Install).unwrap();
    assert!(redis.contains_key("NumCacheClusters"));
    assert!(!redis.contains_key("NumCacheNodes"));

    let err = engine::metadata_table("redis", Phase::ReadReplica).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = engine::metadata_table("cassandra", Phase::Install).unwrap_err();
    assert!(matches!(err, ProvisionError::UnsupportedEngine(_)));
}

#[test]
fn phase_names_parse_loosely() {
    assert_eq!(Phase::parse("Install"), Some(Phase::Install));
    assert_eq!(Phase::parse("read-replica"), Some(Phase::ReadReplica));
    assert_eq!(Phase::parse("restore_from_snapshot"), Some(Phase::RestoreFromSnapshot));
    assert_eq!(Phase::parse("destroy"), None);
    assert_eq!(Phase::ReadReplica.to_string(), "read-replica");
}

#[test]
fn empty_import_value_means_provision() {
    let req = ProvisionRequest::from_options(opts(&[("IMPORT", "  "), ("Engine", "redis")]));
    assert_eq!(
        req,
        ProvisionRequest::Provision {
            options: opts(&[("Engine", "redis")])
        }
    );
}

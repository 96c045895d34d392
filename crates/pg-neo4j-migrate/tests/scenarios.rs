//! Scenario tests over the public API: classification, matrix shape and
//! name synthesis for the two canonical schemas, plus the type-mapping
//! round-trip property. These exercise everything that decides what a
//! migration *would* do, without needing live stores.

use std::collections::BTreeMap;

use pg_neo4j_migrate::matrix::{self, Cardinality, RelationEdge};
use pg_neo4j_migrate::schema::ident::{
    association_rel_type, association_table_name, relationship_type,
};
use pg_neo4j_migrate::{classify, CanonicalType, ClassifyOverrides, Column, ForeignKey, Table, TableClass};

fn column(name: &str, ty: CanonicalType, pk: i32, nullable: bool) -> Column {
    Column {
        name: name.into(),
        ty,
        is_nullable: nullable,
        pk_ordinal: pk,
        default: None,
    }
}

fn foreign_key(col: &str, target: &str) -> ForeignKey {
    ForeignKey {
        name: format!("{}_fkey", col),
        columns: vec![col.into()],
        ref_table: target.into(),
        ref_columns: vec!["id".into()],
        on_delete: "NO_ACTION".into(),
        on_update: "NO_ACTION".into(),
    }
}

/// `person(id, name)`, `car(id, model, owner_id -> person.id)`.
fn person_car_schema() -> Vec<Table> {
    let mut person = Table::new("person");
    person.columns = vec![
        column("id", CanonicalType::Int64, 1, false),
        column("name", CanonicalType::Varchar(40), 0, true),
    ];

    let mut car = Table::new("car");
    car.columns = vec![
        column("id", CanonicalType::Int64, 1, false),
        column("model", CanonicalType::Varchar(40), 0, true),
        column("owner_id", CanonicalType::Int64, 0, true),
    ];
    car.foreign_keys = vec![foreign_key("owner_id", "person")];

    vec![person, car]
}

/// `employe`, `service`, `employe_service_association(employe_id, service_id)`.
fn employe_service_schema() -> Vec<Table> {
    let mut employe = Table::new("employe");
    employe.columns = vec![
        column("id", CanonicalType::Int64, 1, false),
        column("nom", CanonicalType::Varchar(60), 0, true),
    ];

    let mut service = Table::new("service");
    service.columns = vec![
        column("id", CanonicalType::Int64, 1, false),
        column("intitule", CanonicalType::Varchar(60), 0, true),
    ];

    let mut association = Table::new("employe_service_association");
    association.columns = vec![
        column("employe_id", CanonicalType::Int64, 1, false),
        column("service_id", CanonicalType::Int64, 2, false),
    ];
    association.foreign_keys = vec![
        foreign_key("employe_id", "employe"),
        foreign_key("service_id", "service"),
    ];

    vec![employe, service, association]
}

fn classify_all(tables: &[Table]) -> BTreeMap<String, TableClass> {
    let overrides = ClassifyOverrides::default();
    tables
        .iter()
        .map(|t| (t.name.clone(), classify(t, &overrides)))
        .collect()
}

#[test]
fn person_car_yields_one_direct_edge() {
    let tables = person_car_schema();
    let classes = classify_all(&tables);

    assert_eq!(classes["person"], TableClass::Entity);
    assert_eq!(classes["car"], TableClass::Entity);

    let outcome = matrix::build(&tables, &classes);
    assert!(outcome.skipped.is_empty());
    assert_eq!(outcome.matrix.len(), 1);
    assert_eq!(
        outcome.matrix.get("car", "person"),
        Some(&RelationEdge::Direct {
            column: "owner_id".into(),
            ref_column: "id".into(),
        })
    );

    // One foreign key to person: no disambiguation suffix.
    assert_eq!(
        relationship_type("person", "owner_id", false),
        "RELATES_TO_PERSON"
    );

    let summaries = outcome.matrix.summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].cardinality, Cardinality::OneToMany);
}

#[test]
fn employe_service_association_is_never_a_node_source() {
    let tables = employe_service_schema();
    let classes = classify_all(&tables);

    // The association table maps to relationships, never nodes.
    assert_eq!(
        classes["employe_service_association"],
        TableClass::Association
    );
    assert_eq!(classes["employe"], TableClass::Entity);
    assert_eq!(classes["service"], TableClass::Entity);

    let outcome = matrix::build(&tables, &classes);
    assert!(outcome.skipped.is_empty());

    // Mediated edges exist in both directions and reference the same
    // association table with the correct role columns.
    assert_eq!(
        outcome.matrix.get("employe", "service"),
        Some(&RelationEdge::Mediated {
            table: "employe_service_association".into(),
            source_column: "employe_id".into(),
            target_column: "service_id".into(),
        })
    );
    assert_eq!(
        outcome.matrix.get("service", "employe"),
        Some(&RelationEdge::Mediated {
            table: "employe_service_association".into(),
            source_column: "service_id".into(),
            target_column: "employe_id".into(),
        })
    );

    // Export processes each association table once.
    assert_eq!(outcome.matrix.mediated_tables().len(), 1);
}

#[test]
fn association_round_trips_its_table_name() {
    // Export derives the symmetric relationship type from the label pair;
    // import derives the reconstructed table name from the same pair. The
    // original association table name comes back unchanged.
    let rel_type = association_rel_type("employe", "service");
    assert_eq!(rel_type, "ASSOCIATED_EMPLOYE_SERVICE");
    assert_eq!(
        association_table_name("employe", "service"),
        "employe_service_association"
    );
    assert_eq!(
        association_table_name("service", "employe"),
        "employe_service_association"
    );
}

#[test]
fn multiple_fks_to_one_target_stay_distinguishable() {
    // Two foreign keys to the same target must produce distinct
    // relationship types, otherwise import cannot tell the keys apart.
    let owner = relationship_type("person", "owner_id", true);
    let driver = relationship_type("person", "driver_id", true);
    assert_ne!(owner, driver);
    assert!(owner.starts_with("RELATES_TO_PERSON_VIA_"));
}

#[test]
fn matrix_build_is_idempotent_across_scenarios() {
    for tables in [person_car_schema(), employe_service_schema()] {
        let classes = classify_all(&tables);
        assert_eq!(
            matrix::build(&tables, &classes),
            matrix::build(&tables, &classes)
        );
    }
}

#[test]
fn canonical_types_survive_pg_rendering() {
    // For every canonical type the importer can synthesize, rendering to
    // PostgreSQL DDL and re-resolving through the rule table is lossless.
    let types = vec![
        CanonicalType::Boolean,
        CanonicalType::Int16,
        CanonicalType::Int32,
        CanonicalType::Int64,
        CanonicalType::Float32,
        CanonicalType::Float64,
        CanonicalType::Decimal { precision: 18, scale: 2 },
        CanonicalType::Varchar(255),
        CanonicalType::Text,
        CanonicalType::Date,
        CanonicalType::Time,
        CanonicalType::DateTime,
        CanonicalType::DateTimeTz,
        CanonicalType::Blob,
        CanonicalType::Uuid,
        CanonicalType::Json,
    ];
    for ty in types {
        let rendered = ty.pg_type();
        // Strip length/precision arguments the way introspection reports
        // them separately from the base name.
        let (base, args) = match rendered.find('(') {
            Some(open) => (&rendered[..open], &rendered[open + 1..rendered.len() - 1]),
            None => (rendered.as_str(), ""),
        };
        let mut parts = args.split(',').map(|p| p.trim().parse::<i32>().unwrap_or(0));
        let first = parts.next().unwrap_or(0);
        let second = parts.next().unwrap_or(0);
        let (len, precision, scale) = if matches!(ty, CanonicalType::Decimal { .. }) {
            (0, first, second)
        } else {
            (first, 0, 0)
        };
        assert_eq!(CanonicalType::from_sql(base, len, precision, scale), ty);
    }
}

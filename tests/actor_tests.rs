/// Actor pipeline tests against a recording in-memory transport.
/// Run with: cargo test --test actor_tests
mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use common::{APP, RecordingTransport, TOKEN, VENDOR, config, connect, connect_with, entity};
use keystone::prelude::*;
use keystone::mapper::{FieldTag, FieldValue, prefixed};
use keystone::proto::{
    self, MutateFlag, MutateResponse, Operator, ResponseStatus, TransportCode, VendorApp,
};
use keystone::schema::{EntityDefinition, PropertyDefinition};

#[derive(Debug, Default, Entity)]
struct RetrieveTestEntity {
    #[keystone(embed)]
    base: BaseEntity,
    name: String,
    email: String,
}

#[derive(Debug, Default, Clone, PartialEq, Properties)]
struct Address {
    line1: String,
    #[keystone(tag = "zip_code, omitempty")]
    zip: Option<i64>,
}

#[derive(Debug, Default, Entity)]
#[keystone(type = "customer-account", plural = "Customer Accounts")]
struct Customer {
    #[keystone(embed)]
    base: BaseEntity,
    #[keystone(embed)]
    labels: EntityLabels,
    #[keystone(embed)]
    children: EntityChildren,
    #[keystone(unique)]
    email: String,
    #[keystone(name = "display_name", searchable)]
    name: String,
    balance: Amount,
    tags: StringSet,
    address: Option<Address>,
    #[keystone(tag = "_version")]
    version: i64,
    #[keystone(skip)]
    scratch: String,
}

#[derive(Debug, Default, Entity)]
#[keystone(require_comments)]
struct AuditedNote {
    body: String,
}

#[tokio::test]
async fn test_get_by_id_request_shape() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut record = RetrieveTestEntity::default();
    actor
        .get_by_id(
            "retrieve-test-entity-123",
            &mut record,
            &[retrieve::with_properties(["name", "email"])],
        )
        .await
        .unwrap();

    let requests = transport.retrieves();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.entity_id, "retrieve-test-entity-123");
    assert_eq!(request.view.properties.len(), 1);
    assert_eq!(request.view.properties[0].properties, vec!["name", "email"]);
    assert!(!request.view.properties[0].decrypt);

    let schema = request.schema.as_ref().unwrap();
    assert_eq!(schema.key, "retrieve-test-entity");
    assert_eq!(schema.source, VendorApp::new(VENDOR, APP));

    assert_eq!(request.authorization.workspace_id, "ws1");
    assert_eq!(request.authorization.token, TOKEN);
    assert_eq!(request.authorization.trace_id, actor.trace_id());
}

#[tokio::test]
async fn test_get_hydrates_fields_and_base() {
    let transport = RecordingTransport::new();
    transport.set_entity(entity(
        "cus-1",
        vec![
            ("email", Value::text("ada@example.com")),
            ("display_name", Value::text("Ada")),
            ("address.line1", Value::text("1 Loop")),
            ("address.zip_code", Value::int(9000)),
            ("_version", Value::int(7)),
        ],
    ));
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut customer = Customer::default();
    actor.get_by_id("cus-1", &mut customer, &[]).await.unwrap();

    assert_eq!(customer.base.entity_id(), "cus-1");
    assert_eq!(customer.base.state(), EntityState::Active);
    assert_eq!(customer.email, "ada@example.com");
    assert_eq!(customer.name, "Ada");
    assert_eq!(customer.version, 7);
    assert_eq!(
        customer.address,
        Some(Address {
            line1: "1 Loop".to_string(),
            zip: Some(9000),
        })
    );
    assert!(customer.base.watcher().is_some());
}

#[tokio::test]
async fn test_schema_derived_from_attributes() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut customer = Customer::default();
    actor.get_by_id("cus-1", &mut customer, &[]).await.unwrap();

    let defines = transport.defines();
    assert_eq!(defines.len(), 1);
    let schema = &defines[0].schema;
    assert_eq!(schema.type_name, "customer-account");
    assert_eq!(schema.plural, "Customer Accounts");

    let names: Vec<String> = schema
        .properties
        .iter()
        .map(|definition| definition.property.full_name())
        .collect();
    assert_eq!(
        names,
        vec![
            "email",
            "display_name",
            "balance",
            "tags",
            "address.line1",
            "address.zip_code",
        ]
    );
    assert!(schema.properties[0].has_option(keystone::schema::PropertyOption::Unique));
    assert!(schema.properties[1].has_option(keystone::schema::PropertyOption::Searchable));

    let registered = connection.registry().get::<Customer>().unwrap();
    assert!(registered.is_registered());
    assert_eq!(registered.definition().id, "sch-customer-account");
}

#[tokio::test]
async fn test_compound_filter_find() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    actor
        .find(
            "User",
            &[],
            [filter::or([
                filter::and([filter::eq("status", "active"), filter::gt("score", 80)]),
                filter::and([filter::eq("status", "vip"), filter::gt("score", 50)]),
            ])],
        )
        .await
        .unwrap();

    let finds = transport.finds();
    assert_eq!(finds.len(), 1);
    let request = &finds[0];
    assert_eq!(request.schema.as_ref().unwrap().key, "user");
    assert_eq!(request.filters.len(), 1);

    let top = &request.filters[0];
    assert!(top.or);
    assert_eq!(top.nested.len(), 2);
    for group in &top.nested {
        assert!(!group.or);
        assert_eq!(group.nested.len(), 2);
        assert_eq!(group.nested[0].operator, Operator::Equal);
        assert_eq!(group.nested[1].operator, Operator::GreaterThan);
    }
    assert_eq!(top.nested[1].nested[0].values, vec![Value::text("vip")]);
}

#[tokio::test]
async fn test_find_as_hydrates_each_record() {
    let transport = RecordingTransport::new();
    transport.set_found(vec![
        entity("e-1", vec![("name", Value::text("one"))]),
        entity("e-2", vec![("name", Value::text("two"))]),
    ]);
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let records: Vec<RetrieveTestEntity> = actor
        .find_as(&[], [filter::with_state(EntityState::Active).unwrap()])
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].base.entity_id(), "e-1");
    assert_eq!(records[1].name, "two");

    let request = &transport.finds()[0];
    assert_eq!(request.schema.as_ref().unwrap().key, "retrieve-test-entity");
    assert_eq!(request.filters[0].property, filter::STATE_PROPERTY);
}

#[tokio::test]
async fn test_mutate_with_pii_token_and_flags() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut record = RetrieveTestEntity {
        name: "Ada".to_string(),
        ..RetrieveTestEntity::default()
    };
    actor
        .mutate(
            &mut record,
            &[
                mutate::with_pii_token("pii-abc"),
                mutate::background_index(),
                mutate::on_conflict_ignore(),
            ],
        )
        .await
        .unwrap();

    let requests = transport.mutates();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.mutation.pii_token, "pii-abc");
    assert!(request.flags.contains(&MutateFlag::BackgroundIndex));
    assert!(request.flags.contains(&MutateFlag::OnConflictIgnore));
    assert_eq!(request.flags.len(), 2);
    assert_eq!(request.schema.as_ref().unwrap().key, "retrieve-test-entity");

    // Entity id backfilled from the response.
    assert_eq!(record.base.entity_id(), "ent-1");
}

#[tokio::test]
async fn test_second_mutate_sends_only_changes() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut record = RetrieveTestEntity {
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        ..RetrieveTestEntity::default()
    };
    actor.mutate(&mut record, &[]).await.unwrap();

    record.email = "ada@lovelace.dev".to_string();
    actor.mutate(&mut record, &[]).await.unwrap();

    let requests = transport.mutates();
    assert_eq!(requests.len(), 2);

    let first: Vec<&str> = requests[0]
        .mutation
        .properties
        .iter()
        .map(|property| property.property.as_str())
        .collect();
    assert!(first.contains(&"name"));
    assert!(first.contains(&"email"));

    let second = &requests[1];
    assert_eq!(second.entity_id, "ent-1");
    assert_eq!(second.mutation.properties.len(), 1);
    assert_eq!(second.mutation.properties[0].property, "email");
    assert_eq!(second.mutation.properties[0].value.text, "ada@lovelace.dev");
}

#[tokio::test]
async fn test_set_round_trip_through_mutation() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut customer = Customer::default();
    customer.tags = StringSet::new(["a", "b"]);
    customer.tags.add("c");
    customer.tags.remove("a");
    assert_eq!(
        customer.tags.values().into_iter().collect::<Vec<_>>(),
        vec!["b", "c"]
    );

    actor.mutate(&mut customer, &[]).await.unwrap();

    let request = &transport.mutates()[0];
    let tags = request
        .mutation
        .properties
        .iter()
        .find(|property| property.property == "tags")
        .unwrap();
    assert_eq!(tags.value.array.as_ref().unwrap().strings, vec!["a", "b"]);
    assert_eq!(tags.value.array_append.as_ref().unwrap().strings, vec!["c"]);
    assert_eq!(tags.value.array_reduce.as_ref().unwrap().strings, vec!["a"]);

    assert!(!customer.tags.has_pending());
    assert_eq!(
        customer.tags.baseline().iter().cloned().collect::<Vec<_>>(),
        vec!["b", "c"]
    );
}

#[tokio::test]
async fn test_mix_ins_collected_and_children_backfilled() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut customer = Customer {
        email: "ada@example.com".to_string(),
        balance: Amount::new("USD", 1500),
        ..Customer::default()
    };
    customer.labels.add_label("tier", "gold");
    let write_ref = customer.children.add_child("note", b"hello".to_vec());

    transport.set_mutate_response(MutateResponse {
        entity_id: "cus-9".to_string(),
        success: true,
        created: true,
        child_ids: BTreeMap::from([(write_ref.clone(), "child-1".to_string())]),
        ..MutateResponse::default()
    });
    let response = actor.mutate(&mut customer, &[]).await.unwrap();
    assert!(response.created);

    let request = &transport.mutates()[0];
    assert_eq!(request.mutation.labels, vec![proto::Label::new("tier", "gold")]);
    assert_eq!(request.mutation.children.len(), 1);
    assert_eq!(request.mutation.children[0].write_ref, write_ref);
    let names: Vec<&str> = request
        .mutation
        .properties
        .iter()
        .map(|property| property.property.as_str())
        .collect();
    assert!(names.contains(&"balance"));
    assert!(!names.contains(&"_version"));
    assert!(!names.contains(&"scratch"));

    assert_eq!(customer.base.entity_id(), "cus-9");
    assert_eq!(customer.children.child_id(&write_ref), Some("child-1"));
    assert!(!customer.children.has_pending());
    assert_eq!(customer.labels.label("tier"), Some("gold"));
    assert!(!customer.labels.has_pending());
}

#[tokio::test]
async fn test_comment_required_by_schema() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut note = AuditedNote {
        body: "hi".to_string(),
    };
    let err = actor.mutate(&mut note, &[]).await.unwrap_err();
    assert!(matches!(err, KeystoneError::CommentRequired(_)));
    assert!(transport.mutates().is_empty());

    actor
        .mutate(&mut note, &[mutate::with_comment("initial import")])
        .await
        .unwrap();
    assert_eq!(transport.mutates()[0].mutation.comment, "initial import");
}

#[tokio::test]
async fn test_remote_error_status_surfaces() {
    let transport = RecordingTransport::new();
    transport.set_mutate_response(MutateResponse {
        status: ResponseStatus::error(409, "duplicate email"),
        ..MutateResponse::default()
    });
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut record = RetrieveTestEntity {
        name: "Ada".to_string(),
        ..RetrieveTestEntity::default()
    };
    let err = actor.mutate(&mut record, &[]).await.unwrap_err();
    assert_eq!(err.remote().map(|remote| remote.code), Some(409));
    assert_eq!(record.base.entity_id(), "");
}

#[tokio::test]
async fn test_set_state_refuses_removed() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut record = RetrieveTestEntity::default();
    let err = actor
        .set_state(&mut record, EntityState::Removed)
        .await
        .unwrap_err();
    assert!(matches!(err, KeystoneError::InvalidState(_)));

    actor
        .set_state(&mut record, EntityState::Archived)
        .await
        .unwrap();
    assert_eq!(transport.mutates()[0].mutation.state, EntityState::Archived);
    assert_eq!(record.base.state(), EntityState::Archived);
}

#[tokio::test]
async fn test_concurrent_get_defines_schema_once() {
    let transport = RecordingTransport::with_define_delay(Duration::from_millis(50));
    let connection = connect(&transport);
    let first = connection.actor("ws1", None);
    let second = connection.actor("ws2", None);

    let mut left = RetrieveTestEntity::default();
    let mut right = RetrieveTestEntity::default();
    let (a, b) = tokio::join!(
        first.get_by_id("e-1", &mut left, &[]),
        second.get_by_id("e-2", &mut right, &[]),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(transport.defines().len(), 1);
    assert_eq!(
        transport.calls(),
        vec!["define", "define done", "retrieve", "retrieve"]
    );
}

#[tokio::test]
async fn test_shared_get_skips_registration() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut record = RetrieveTestEntity::default();
    actor
        .get_shared_by_id("shared-1", &mut record, &[])
        .await
        .unwrap();

    assert!(transport.defines().is_empty());
    let request = &transport.retrieves()[0];
    assert!(request.shared);
    assert!(request.schema.is_none());
}

#[tokio::test]
async fn test_get_by_hash_id_rejects_separator() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut record = RetrieveTestEntity::default();
    let err = actor
        .get_by_hash_id("bad#key", &mut record, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, KeystoneError::InvalidHashId(_)));
    assert!(transport.retrieves().is_empty());
}

#[tokio::test]
async fn test_detached_actor_is_nil() {
    let actor = Actor::default();
    let mut record = RetrieveTestEntity::default();
    let err = actor.get_by_id("e-1", &mut record, &[]).await.unwrap_err();
    assert_eq!(err.to_string(), "actor or connection is nil");
}

#[tokio::test]
async fn test_remove_and_group_count() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let removed = actor.remove("e-1", "duplicate").await.unwrap();
    assert!(removed.success);
    assert_eq!(transport.destroys()[0].reason, "duplicate");

    actor
        .group_count("Order", ["status"], [filter::eq("region", "eu")])
        .await
        .unwrap();
    let request = &transport.group_counts()[0];
    assert_eq!(request.properties, vec!["status"]);
    assert_eq!(request.schema.as_ref().unwrap().key, "order");
    assert_eq!(request.filters.len(), 1);
}

#[derive(Debug, Default)]
struct StateShadow {
    state: i64,
}

impl Properties for StateShadow {
    fn marshal_properties(&self, prefix: &str, out: &mut PropertyMap) -> keystone::Result<()> {
        self.state
            .encode_field(prefixed(prefix, "_state"), &FieldTag::default(), out)
    }

    fn unmarshal_properties(&mut self, prefix: &str, input: &PropertyMap) -> keystone::Result<()> {
        self.state.decode_field(&prefixed(prefix, "_state"), input)
    }

    fn describe_properties(prefix: &str, out: &mut Vec<PropertyDefinition>) {
        i64::describe_field(prefixed(prefix, "_state"), &FieldTag::default(), out);
    }
}

impl Entity for StateShadow {
    fn definition() -> EntityDefinition {
        EntityDefinition::new("StateShadow").with_properties(keystone::mapper::describe::<Self>())
    }
}

#[tokio::test]
async fn test_reserved_state_property_rejected() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut record = StateShadow::default();
    let err = actor.get_by_id("e-1", &mut record, &[]).await.unwrap_err();
    assert!(matches!(err, KeystoneError::ReservedProperty(_)));
    assert!(transport.calls().is_empty());
}

fn property_names(request: &proto::MutateRequest) -> Vec<&str> {
    request
        .mutation
        .properties
        .iter()
        .map(|property| property.property.as_str())
        .collect()
}

#[tokio::test]
async fn test_partial_get_leaves_unfetched_fields_alone() {
    let transport = RecordingTransport::new();
    transport.set_entity(entity("e-1", vec![("name", Value::text("Ada"))]));
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut record = RetrieveTestEntity::default();
    actor
        .get_by_id("e-1", &mut record, &[retrieve::with_properties(["name"])])
        .await
        .unwrap();
    assert_eq!(record.name, "Ada");

    record.name = "Ada L".to_string();
    actor.mutate(&mut record, &[]).await.unwrap();

    let request = &transport.mutates()[0];
    assert_eq!(request.entity_id, "e-1");
    assert_eq!(property_names(request), vec!["name"]);
    assert_eq!(request.mutation.properties[0].value.text, "Ada L");
}

#[tokio::test]
async fn test_failed_define_is_retried() {
    let transport = RecordingTransport::new();
    transport.fail_next_defines(1);
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut first = RetrieveTestEntity::default();
    actor.get_by_id("e-1", &mut first, &[]).await.unwrap();
    let registered = connection.registry().get::<RetrieveTestEntity>().unwrap();
    assert!(!registered.is_registered());

    let mut second = RetrieveTestEntity::default();
    actor.get_by_id("e-2", &mut second, &[]).await.unwrap();

    assert_eq!(
        transport.calls(),
        vec![
            "define",
            "define failed",
            "retrieve",
            "define",
            "define done",
            "retrieve",
        ]
    );
    assert_eq!(transport.defines().len(), 1);
    assert!(registered.is_registered());
    assert_eq!(registered.definition().id, "sch-retrieve-test-entity");
}

#[tokio::test]
async fn test_request_timeout_bounds_calls() {
    let transport = RecordingTransport::new();
    transport.set_retrieve_delay(Duration::from_secs(5));
    let connection = connect_with(
        &transport,
        config().request_timeout(Duration::from_millis(20)),
    );
    let actor = connection.actor("ws1", None);

    let mut record = RetrieveTestEntity::default();
    let err = actor.get_by_id("e-1", &mut record, &[]).await.unwrap_err();
    match err {
        KeystoneError::Transport(err) => assert_eq!(err.code, TransportCode::DeadlineExceeded),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(record.base.entity_id(), "");
}

#[tokio::test]
async fn test_find_rejects_get_only_options() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let err = actor
        .find(
            "User",
            &[retrieve::with_lock(Duration::from_secs(30), "editing")],
            Vec::<FindOption>::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, KeystoneError::InvalidValue { .. }));

    let verify = retrieve::verify_property("pin", "1234");
    let err = actor
        .find_as::<RetrieveTestEntity, _, _>(&[verify.boxed()], Vec::<FindOption>::new())
        .await
        .unwrap_err();
    assert!(matches!(err, KeystoneError::InvalidValue { .. }));
    assert!(transport.finds().is_empty());
}

#[tokio::test]
async fn test_failed_mutate_keeps_watcher() {
    let transport = RecordingTransport::new();
    let connection = connect(&transport);
    let actor = connection.actor("ws1", None);

    let mut record = RetrieveTestEntity {
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        ..RetrieveTestEntity::default()
    };
    actor.mutate(&mut record, &[]).await.unwrap();
    let committed = record.base.watcher().cloned().unwrap();

    record.email = "ada@lovelace.dev".to_string();
    transport.set_mutate_response(MutateResponse {
        status: ResponseStatus::error(503, "busy"),
        ..MutateResponse::default()
    });
    actor
        .mutate(&mut record, &[mutate::full_mutation()])
        .await
        .unwrap_err();
    assert_eq!(record.base.watcher(), Some(&committed));

    transport.set_mutate_response(MutateResponse {
        entity_id: "ent-1".to_string(),
        success: true,
        ..MutateResponse::default()
    });
    actor.mutate(&mut record, &[]).await.unwrap();

    let requests = transport.mutates();
    assert_eq!(requests.len(), 3);
    assert_eq!(property_names(&requests[1]).len(), 2);
    assert_eq!(property_names(&requests[2]), vec!["email"]);
}

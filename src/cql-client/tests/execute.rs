// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Session-level tests for execution, option layering, retries, and
//! transparent re-preparation.

use std::sync::Arc;
use std::time::Duration;

use mz_cql_repr::CqlValue;

use mz_cql_client::mock::{set_keyspace_response, MockConnector, MockTransport};
use mz_cql_client::transport::{BatchEntry, Request, TransportError};
use mz_cql_client::{
    Batch, BatchKind, ClientError, Consistency, ExecutionOptions, Session, SessionConfig,
    Statement, Values,
};

const SELECT: &str = "SELECT id, name FROM users WHERE id = ?";
const INSERT: &str = "INSERT INTO users (id, name) VALUES (?, ?)";

async fn connect(transport: &Arc<MockTransport>) -> Session {
    connect_with(transport, SessionConfig::default()).await
}

async fn connect_with(transport: &Arc<MockTransport>, config: SessionConfig) -> Session {
    let connector = MockConnector::new(Arc::clone(transport));
    Session::connect(config, &connector).await.unwrap()
}

#[tokio::test]
async fn test_options_resolve_in_three_layers() {
    let transport = MockTransport::new();
    let config = SessionConfig {
        defaults: ExecutionOptions::default()
            .with_consistency(Consistency::One)
            .with_page_size(100),
        ..Default::default()
    };
    let session = connect_with(&transport, config).await;

    let statement = Statement::new(SELECT).with_options(
        ExecutionOptions::default()
            .with_consistency(Consistency::Quorum)
            .with_timestamp(42),
    );
    session
        .query_with_options(
            statement,
            Values::empty(),
            ExecutionOptions::default()
                .with_consistency(Consistency::All)
                .with_tracing(true),
        )
        .await
        .unwrap();

    match &transport.sent()[0] {
        Request::Query { text, params, .. } => {
            assert_eq!(text, SELECT);
            // Call site wins, then the statement, then the session.
            assert_eq!(params.consistency, Consistency::All);
            assert_eq!(params.timestamp, Some(42));
            assert_eq!(params.page_size, Some(100));
            assert!(params.tracing);
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[tokio::test]
async fn test_execute_ships_id_not_text() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    let statement = session.prepare(SELECT).await.unwrap();
    session.execute(&statement, Values::empty()).await.unwrap();

    match &transport.sent()[0] {
        Request::Execute { id, .. } => assert_eq!(id, statement.id()),
        other => panic!("unexpected request: {other:?}"),
    }
}

#[tokio::test]
async fn test_prepare_once_execute_many() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    let statement = session.prepare(SELECT).await.unwrap();
    session.execute(&statement, Values::empty()).await.unwrap();
    session.execute(&statement, Values::empty()).await.unwrap();
    assert_eq!(transport.prepare_count(), 1);
    assert_eq!(transport.send_count(), 2);
}

#[tokio::test]
async fn test_transient_error_not_retried_without_idempotency() {
    let transport = MockTransport::new();
    transport.enqueue_send(Err(TransportError::ServerTimeout("read".into())));
    let session = connect(&transport).await;

    let err = session
        .query(INSERT, [CqlValue::from(1i64), CqlValue::from("ada")])
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Timeout("read".into()));
    assert_eq!(transport.send_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_idempotent_transient_errors_retried_to_success() {
    let transport = MockTransport::new();
    transport.enqueue_send(Err(TransportError::Overloaded("shed".into())));
    transport.enqueue_send(Err(TransportError::Unreachable("n1".into())));
    let session = connect(&transport).await;

    session
        .query_with_options(
            SELECT,
            Values::empty(),
            ExecutionOptions::default().with_idempotent(true),
        )
        .await
        .unwrap();
    assert_eq!(transport.send_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_stops_at_attempt_ceiling() {
    let transport = MockTransport::new();
    for _ in 0..3 {
        transport.enqueue_send(Err(TransportError::Overloaded("shed".into())));
    }
    let session = connect(&transport).await;

    let err = session
        .query_with_options(
            SELECT,
            Values::empty(),
            ExecutionOptions::default().with_idempotent(true),
        )
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Overloaded("shed".into()));
    // Default policy: three attempts total, counting the first.
    assert_eq!(transport.send_count(), 3);
}

#[tokio::test]
async fn test_terminal_error_fails_fast_even_when_idempotent() {
    let transport = MockTransport::new();
    transport.enqueue_send(Err(TransportError::Syntax("near SELEC".into())));
    let session = connect(&transport).await;

    let err = session
        .query_with_options(
            SELECT,
            Values::empty(),
            ExecutionOptions::default().with_idempotent(true),
        )
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Syntax("near SELEC".into()));
    assert_eq!(transport.send_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_leaves_no_room_to_retry() {
    let transport = MockTransport::new();
    transport.enqueue_send(Err(TransportError::Overloaded("shed".into())));
    let session = connect(&transport).await;

    // The first backoff is 100ms; a 50ms deadline cannot absorb it.
    let err = session
        .query_with_options(
            SELECT,
            Values::empty(),
            ExecutionOptions::default()
                .with_idempotent(true)
                .with_timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)), "{err}");
    assert_eq!(transport.send_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_bounds_the_round_trip_itself() {
    let transport = MockTransport::new();
    transport.set_send_delay(Duration::from_millis(200));
    let session = connect(&transport).await;

    let err = session
        .query_with_options(
            SELECT,
            Values::empty(),
            ExecutionOptions::default().with_timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)), "{err}");
}

#[tokio::test]
async fn test_unprepared_statement_is_repreparated_transparently() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    let statement = session.prepare(SELECT).await.unwrap();
    transport.enqueue_send(Err(TransportError::Unprepared {
        id: statement.id().clone(),
    }));

    // The call succeeds; the extra round trips are the only observable.
    let result = session.execute(&statement, Values::empty()).await.unwrap();
    assert!(result.is_empty());
    assert_eq!(transport.send_count(), 2);
    assert_eq!(transport.prepare_count(), 2);

    // The caller's handle keeps working afterwards.
    session.execute(&statement, Values::empty()).await.unwrap();
    assert_eq!(transport.send_count(), 3);
}

#[tokio::test]
async fn test_repeated_invalidation_surfaces_schema_mismatch() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    let statement = session.prepare(SELECT).await.unwrap();
    for _ in 0..2 {
        transport.enqueue_send(Err(TransportError::Unprepared {
            id: statement.id().clone(),
        }));
    }

    let err = session
        .execute(&statement, Values::empty())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::SchemaMismatch(_)), "{err}");
    assert_eq!(transport.send_count(), 2);
}

#[tokio::test]
async fn test_batch_value_set_count_must_match() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    let mut batch = Batch::new(BatchKind::Logged);
    batch.append(INSERT);
    let err = session
        .batch(&batch, vec![Values::empty(), Values::empty()])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Config(_)), "{err}");
    // Detected before anything reaches the wire.
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test]
async fn test_counter_batch_restriction_checked_before_send() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    let mut batch = Batch::new(BatchKind::Counter);
    batch.append(INSERT);
    let err = session.batch(&batch, vec![Values::empty()]).await.unwrap_err();
    assert!(matches!(err, ClientError::Config(_)), "{err}");
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test]
async fn test_batch_with_invalid_member_fails_terminally() {
    let transport = MockTransport::new();
    transport.enqueue_send(Err(TransportError::Syntax("near INSRT".into())));
    let session = connect(&transport).await;

    let mut batch = Batch::new(BatchKind::Logged);
    batch.append("INSRT INTO t (id) VALUES (?)");
    let err = session.batch(&batch, vec![Values::empty()]).await.unwrap_err();
    assert_eq!(err, ClientError::Syntax("near INSRT".into()));
    // Terminal: the batch is sent once and never resubmitted.
    assert_eq!(transport.send_count(), 1);
}

#[tokio::test]
async fn test_batch_mixes_raw_and_prepared_members() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    let prepared = session.prepare("UPDATE users SET name = ? WHERE id = ?").await.unwrap();
    let mut batch = Batch::new(BatchKind::Unlogged);
    batch.append(prepared.clone());
    batch.append(INSERT);

    session
        .batch(
            &batch,
            vec![
                Values::empty(),
                Values::from(vec![CqlValue::from(1i64), CqlValue::from("ada")]),
            ],
        )
        .await
        .unwrap();

    match &transport.sent()[0] {
        Request::Batch { kind, entries, .. } => {
            assert_eq!(*kind, BatchKind::Unlogged);
            assert_eq!(entries.len(), 2);
            assert!(matches!(&entries[0], BatchEntry::Prepared { id, .. } if id == prepared.id()));
            assert!(matches!(&entries[1], BatchEntry::Query { text, .. } if text == INSERT));
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[tokio::test]
async fn test_named_values_rejected_for_raw_text() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    let err = session
        .query(SELECT, Values::named([("id", 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Config(_)), "{err}");
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test]
async fn test_page_size_must_be_positive() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    let err = session
        .query_with_options(
            SELECT,
            Values::empty(),
            ExecutionOptions::default().with_page_size(0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Config(_)), "{err}");
    assert_eq!(transport.send_count(), 0);
}

#[tokio::test]
async fn test_connect_selects_configured_keyspace() {
    let transport = MockTransport::new();
    transport.enqueue_send(Ok(set_keyspace_response("app")));
    let config = SessionConfig {
        keyspace: Some("app".into()),
        ..Default::default()
    };
    let session = connect_with(&transport, config).await;

    assert_eq!(session.keyspace().await, Some("app".into()));
    assert_eq!(
        transport.sent()[0],
        Request::UseKeyspace {
            keyspace: "app".into()
        }
    );
}

#[tokio::test]
async fn test_use_keyspace_rejects_wrong_response_kind() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    // The mock answers USE with a void response unless scripted.
    let err = session.use_keyspace("app").await.unwrap_err();
    assert!(matches!(err, ClientError::Protocol(_)), "{err}");
    assert_eq!(session.keyspace().await, None);
}

// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Session-level tests for statement preparation and the statement cache.

use std::sync::Arc;
use std::time::Duration;

use mz_cql_client::mock::{MockConnector, MockTransport};
use mz_cql_client::transport::TransportError;
use mz_cql_client::{ClientError, Session, SessionConfig};

const SELECT: &str = "SELECT id, name FROM users WHERE id = ?";

async fn connect(transport: &Arc<MockTransport>) -> Session {
    let connector = MockConnector::new(Arc::clone(transport));
    Session::connect(SessionConfig::default(), &connector)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_repeated_prepare_issues_one_round_trip() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    let first = session.prepare(SELECT).await.unwrap();
    let second = session.prepare(SELECT).await.unwrap();
    assert_eq!(first.id(), second.id());
    assert_eq!(transport.prepare_count(), 1);
    assert_eq!(transport.prepared(), vec![SELECT.to_owned()]);
}

#[tokio::test]
async fn test_distinct_texts_prepare_separately() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;

    session.prepare(SELECT).await.unwrap();
    // No normalization: a whitespace difference is a different text.
    session.prepare("SELECT id, name  FROM users WHERE id = ?")
        .await
        .unwrap();
    assert_eq!(transport.prepare_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_prepares_coalesce() {
    let transport = MockTransport::new();
    transport.set_prepare_delay(Duration::from_millis(50));
    let session = connect(&transport).await;

    let (a, b, c) = futures::join!(
        session.prepare(SELECT),
        session.prepare(SELECT),
        session.prepare(SELECT),
    );
    let a = a.unwrap();
    assert_eq!(a.id(), b.unwrap().id());
    assert_eq!(a.id(), c.unwrap().id());
    assert_eq!(transport.prepare_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_preparation_reaches_every_waiter() {
    let transport = MockTransport::new();
    transport.set_prepare_delay(Duration::from_millis(50));
    transport.enqueue_prepare(Err(TransportError::Syntax("near SELEC".into())));
    let session = connect(&transport).await;

    let (a, b) = futures::join!(session.prepare(SELECT), session.prepare(SELECT));
    assert_eq!(a.unwrap_err(), ClientError::Syntax("near SELEC".into()));
    assert_eq!(b.unwrap_err(), ClientError::Syntax("near SELEC".into()));
    assert_eq!(transport.prepare_count(), 1);

    // The failure was not cached.
    session.prepare(SELECT).await.unwrap();
    assert_eq!(transport.prepare_count(), 2);
}

#[tokio::test]
async fn test_prepare_shared_across_clones() {
    let transport = MockTransport::new();
    let session = connect(&transport).await;
    let clone = session.clone();

    session.prepare(SELECT).await.unwrap();
    clone.prepare(SELECT).await.unwrap();
    assert_eq!(transport.prepare_count(), 1);
}

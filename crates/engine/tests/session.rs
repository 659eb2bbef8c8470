mod common;

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use common::{FakeConnector, FakeService};
use engine::{ConfigStore, ConnectionConfig, EngineError, ExpenseService, Session};

fn session_with(dir: &tempfile::TempDir, reachable: &[&str]) -> (Session, Arc<FakeConnector>) {
    let connector = Arc::new(FakeConnector::new(Arc::new(FakeService::default()), reachable));
    let session = Session::builder()
        .store(ConfigStore::new(dir.path().join("connection.json")))
        .connector(connector.clone())
        .build()
        .unwrap();
    (session, connector)
}

#[tokio::test]
async fn init_without_host_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let (session, connector) = session_with(&dir, &["nas.local"]);

    assert!(!session.init().await.unwrap());
    assert!(!session.is_ready().await);
    assert_eq!(connector.attempts(), 0);
    assert_eq!(
        session.service().await.err(),
        Some(EngineError::NotConnected)
    );
}

#[tokio::test]
async fn init_with_unreachable_host_is_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let (session, _) = session_with(&dir, &["nas.local"]);
    session
        .store()
        .save(&ConnectionConfig::with_host("10.0.0.99").to_entries())
        .await
        .unwrap();

    let err = session.init().await.unwrap_err();
    assert!(matches!(err, EngineError::Connection(_)));
    assert!(!session.is_ready().await);
}

#[tokio::test]
async fn init_with_reachable_host_connects() {
    let dir = tempfile::tempdir().unwrap();
    let (session, connector) = session_with(&dir, &["nas.local"]);
    session
        .store()
        .save(&BTreeMap::from([("host".to_string(), "nas.local".to_string())]))
        .await
        .unwrap();

    assert!(session.init().await.unwrap());
    assert!(session.is_ready().await);
    assert!(session.service().await.is_ok());
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test]
async fn reconfigure_drops_the_previous_handle() {
    let dir = tempfile::tempdir().unwrap();
    let (session, connector) = session_with(&dir, &["nas.local"]);

    assert!(
        session
            .reconfigure(&ConnectionConfig::with_host("nas.local"))
            .await
            .unwrap()
    );
    assert!(session.is_ready().await);

    let err = session
        .reconfigure(&ConnectionConfig::with_host("offline.local"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Connection(_)));
    assert!(!session.is_ready().await);
    assert_eq!(connector.attempts(), 2);

    let stored = session.store().connection().await.unwrap().unwrap();
    assert_eq!(stored.host, "offline.local");
}

#[tokio::test]
async fn reconfigure_reflects_the_fresh_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let (session, connector) = session_with(&dir, &["nas.local", "backup.local"]);

    session
        .reconfigure(&ConnectionConfig::with_host("nas.local"))
        .await
        .unwrap();
    let mut config = ConnectionConfig::with_host("backup.local");
    config.port = 8443;
    assert!(session.reconfigure(&config).await.unwrap());
    assert!(session.is_ready().await);
    assert_eq!(connector.attempts(), 2);
    assert_eq!(session.store().connection().await.unwrap(), Some(config));
}

#[test]
fn builder_requires_store_and_connector() {
    assert!(matches!(
        Session::builder().build(),
        Err(EngineError::Validation(_))
    ));
}

async fn wait_for_attempts(connector: &FakeConnector, attempts: usize) {
    while connector.attempts() < attempts {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn is_ready_answers_while_a_connect_is_pending() {
    let dir = tempfile::tempdir().unwrap();
    let (session, connector) = session_with(&dir, &["nas.local"]);
    let session = Arc::new(session);
    session
        .store()
        .save(&ConnectionConfig::with_host("nas.local").to_entries())
        .await
        .unwrap();
    connector.gated.lock().unwrap().insert("nas.local".to_string());

    let gate = connector.gate.lock().await;
    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.init().await }
    });
    wait_for_attempts(&connector, 1).await;

    let ready = tokio::time::timeout(Duration::from_secs(1), session.is_ready())
        .await
        .expect("is_ready waited for the connector");
    assert!(!ready);
    assert!(!pending.is_finished());

    drop(gate);
    assert!(pending.await.unwrap().unwrap());
    assert!(session.is_ready().await);
}

#[tokio::test]
async fn attempt_overtaken_by_reconfigure_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let (session, connector) = session_with(&dir, &["nas.local", "backup.local"]);
    let session = Arc::new(session);
    let stale = Arc::new(FakeService::default());
    stale.persons.lock().unwrap().push(common::person("Stale"));
    connector
        .services
        .lock()
        .unwrap()
        .insert("nas.local".to_string(), stale);
    connector.gated.lock().unwrap().insert("nas.local".to_string());
    session
        .store()
        .save(&ConnectionConfig::with_host("nas.local").to_entries())
        .await
        .unwrap();

    let gate = connector.gate.lock().await;
    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.init().await }
    });
    wait_for_attempts(&connector, 1).await;

    assert!(
        session
            .reconfigure(&ConnectionConfig::with_host("backup.local"))
            .await
            .unwrap()
    );
    drop(gate);
    assert!(pending.await.unwrap().unwrap());

    let live = session.service().await.unwrap();
    assert!(live.find_persons().await.unwrap().is_empty());
}

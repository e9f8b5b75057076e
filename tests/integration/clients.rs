use super::*;
use whatsapp_manager::models::internal::DEFAULT_CLIENT_STATUS;
use whatsapp_manager::sync::SyncError;
use whatsapp_manager::NewClient;

fn new_client() -> NewClient {
    NewClient {
        phone: Some("611222333".to_string()),
        municipality: Some("Sevilla".to_string()),
        ..NewClient::new("2001", "Zoe Nueva")
    }
}

#[tokio::test]
async fn test_added_client_appears_first_on_unfiltered_registry() {
    let gateway = Arc::new(MemoryGateway::new());
    seed_clients(&gateway, 25);
    let model = model_with(gateway.clone());

    model.set_search_term("client 1").await.unwrap();
    model.load_more_clients().await.unwrap();
    assert_eq!(model.snapshot().await.clients_page, 2);

    let added = model.add_client(new_client()).await.unwrap();
    assert_eq!(added.full_name, "Zoe Nueva");
    assert_eq!(added.status.as_deref(), Some(DEFAULT_CLIENT_STATUS));
    assert_eq!(added.message_status.as_deref(), Some("PENDIENTE"));
    assert_eq!(added.municipality.as_deref(), Some("Sevilla"));

    let snapshot = model.snapshot().await;
    assert_eq!(snapshot.search_term, "");
    assert_eq!(snapshot.clients_page, 1);
    assert_eq!(snapshot.total_clients, 26);
    assert_eq!(snapshot.clients.len(), 10);
    assert_eq!(snapshot.clients[0].full_name, "Zoe Nueva");
    assert_eq!(snapshot.stats.total_clients, 26);
}

#[tokio::test]
async fn test_incomplete_client_is_rejected_locally() {
    let gateway = Arc::new(MemoryGateway::new());
    seed_clients(&gateway, 3);
    let model = model_with(gateway.clone());
    model.set_search_term("").await.unwrap();
    let before = gateway.total_queries();

    let err = model
        .add_client(NewClient::new("", "   "))
        .await
        .unwrap_err();
    match err {
        SyncError::Validation(message) => {
            assert_eq!(message, "missing required field(s): full_name, order_number")
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(gateway.total_queries(), before);
    model.set_search_term("").await.unwrap();
    assert_eq!(model.snapshot().await.total_clients, 3);
}

#[tokio::test]
async fn test_failed_insert_keeps_registry_state() {
    let gateway = Arc::new(MemoryGateway::new());
    seed_clients(&gateway, 3);
    let model = model_with(gateway.clone());
    model.set_search_term("client").await.unwrap();

    gateway.set_failing(true);
    let err = model.add_client(new_client()).await.unwrap_err();
    assert!(matches!(err, SyncError::Gateway(_)));

    let snapshot = model.snapshot().await;
    assert_eq!(snapshot.search_term, "client");
    assert_eq!(snapshot.total_clients, 3);
    assert!(snapshot.last_error.is_some());
}

#[tokio::test]
async fn test_add_client_requires_a_session() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.sign_out();
    let model = model_with(gateway.clone());

    let err = model.add_client(new_client()).await.unwrap_err();
    assert!(matches!(err, SyncError::NotAuthenticated));
    assert_eq!(gateway.total_queries(), 0);
}

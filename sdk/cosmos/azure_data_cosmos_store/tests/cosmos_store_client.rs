// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

mod mock_store;

use std::{error::Error, sync::Arc, time::Duration};

use azure_data_cosmos_store::{
    connection::Connector, Confirmation, CosmosStoreClient, CosmosStoreClientMethods,
    CosmosStoreClientOptions, CostAccountant, ErrorKind, PartitionKey, RequestOptions,
    RetryOptions,
};
use mock_store::{
    client_in_region, config, new_client, ready_client, Article, MockConnector, MockStore,
    CONTAINER_ID, DATABASE_ID, POINT_CHARGE, WRITE_CHARGE, WRITE_REGION_ENDPOINT,
};
use stop_token::StopSource;

#[tokio::test]
async fn operations_before_init_fail_fast() -> Result<(), Box<dyn Error>> {
    let (client, store, _) = new_client();

    let err = client.create_database(None).await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotInitialized));
    let err = client
        .read_item::<Article>(CONTAINER_ID, "alice", "a", None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotInitialized));
    assert!(client
        .query_iterator::<Article>(CONTAINER_ID, "SELECT * FROM c", None, None)
        .is_err());
    assert_eq!(store.round_trips(), 0);

    let report = client.diagnostics();
    assert_eq!(report.service_endpoint, None);
    assert!(report.preferred_regions.is_empty());

    client.init(None).await?;
    assert!(client.is_initialized());
    assert!(client.create_database(None).await?);
    Ok(())
}

#[tokio::test]
async fn concurrent_init_connects_once() -> Result<(), Box<dyn Error>> {
    let store = MockStore::new();
    let connector = MockConnector::new(store);
    let client = Arc::new(client_in_region(&connector, config(), "local"));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.init(None).await })
        })
        .collect();
    for task in tasks {
        task.await??;
    }
    client.init(None).await?;

    assert_eq!(connector.read_account_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_init_can_be_retried() -> Result<(), Box<dyn Error>> {
    let (client, _, connector) = new_client();
    connector.fail_account_reads(1);

    let err = client.init(None).await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ServiceUnavailable));
    assert!(!client.is_initialized());

    client.init(None).await?;
    assert!(client.is_initialized());
    assert_eq!(connector.read_account_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn reads_from_current_region_when_readable() -> Result<(), Box<dyn Error>> {
    let connector = MockConnector::new(MockStore::new());
    let client = client_in_region(&connector, config(), "East US");
    client.init(None).await?;

    assert_eq!(connector.connected_regions(), vec!["East US".to_string()]);
    let report = client.diagnostics();
    assert_eq!(report.current_region, "East US");
    assert_eq!(report.preferred_regions, vec!["East US".to_string()]);
    assert_eq!(report.service_endpoint.as_deref(), Some(WRITE_REGION_ENDPOINT));
    Ok(())
}

#[tokio::test]
async fn falls_back_to_first_readable_region() -> Result<(), Box<dyn Error>> {
    let connector = MockConnector::new(MockStore::new());
    let client = client_in_region(&connector, config(), "Australia East");
    client.init(None).await?;

    assert_eq!(connector.connected_regions(), vec!["West Europe".to_string()]);
    Ok(())
}

#[tokio::test]
async fn database_and_container_creation_is_idempotent() -> Result<(), Box<dyn Error>> {
    let (client, store, _) = new_client();
    client.init(None).await?;

    assert!(client.create_database(None).await?);
    assert!(!client.create_database(None).await?);
    assert!(client.create_container(CONTAINER_ID, "/author", None).await?);
    assert!(!client.create_container(CONTAINER_ID, "author", None).await?);
    assert_eq!(store.container_throughput(CONTAINER_ID), Some(400));

    let err = client
        .create_container(CONTAINER_ID, "/title", None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Conflict));
    Ok(())
}

#[tokio::test]
async fn created_items_read_back() -> Result<(), Box<dyn Error>> {
    let (client, _) = ready_client().await;
    let article = Article::new("hello-world", "alice");

    client.create_item(CONTAINER_ID, &article, None).await?;
    let read: Article = client
        .read_item(CONTAINER_ID, "alice", "hello-world", None)
        .await?;
    assert_eq!(read, article);

    let anywhere: Article = client
        .read_item_cross_partition(CONTAINER_ID, "hello-world", None)
        .await?;
    assert_eq!(anywhere, article);
    Ok(())
}

#[tokio::test]
async fn create_conflicts_but_upsert_replaces() -> Result<(), Box<dyn Error>> {
    let (client, store) = ready_client().await;
    let mut article = Article::new("hello-world", "alice");
    client.create_item(CONTAINER_ID, &article, None).await?;

    let err = client
        .create_item(CONTAINER_ID, &article, None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Conflict));
    let context = err.context().expect("conflicts carry context");
    assert_eq!(context.operation, "create_item");
    assert_eq!(context.item_id.as_deref(), Some("hello-world"));
    assert_eq!(context.partition_key, Some(PartitionKey::from("alice")));

    article.title = "Hello again".into();
    client
        .upsert_item(CONTAINER_ID, "alice", &article, None)
        .await?;
    let read: Article = client
        .read_item(CONTAINER_ID, "alice", "hello-world", None)
        .await?;
    assert_eq!(read.title, "Hello again");
    assert_eq!(store.item_count(CONTAINER_ID), 1);
    Ok(())
}

#[tokio::test]
async fn same_id_in_different_partitions_is_not_a_conflict() -> Result<(), Box<dyn Error>> {
    let (client, store) = ready_client().await;
    client
        .create_item(CONTAINER_ID, &Article::new("intro", "alice"), None)
        .await?;
    client
        .create_item(CONTAINER_ID, &Article::new("intro", "bob"), None)
        .await?;
    assert_eq!(store.item_count(CONTAINER_ID), 2);
    Ok(())
}

#[tokio::test]
async fn missing_items_are_not_found() -> Result<(), Box<dyn Error>> {
    let (client, _) = ready_client().await;
    client
        .create_item(CONTAINER_ID, &Article::new("hello-world", "alice"), None)
        .await?;

    let err = client
        .read_item::<Article>(CONTAINER_ID, "bob", "hello-world", None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound));
    assert_eq!(err.context().map(|c| c.operation), Some("read_item"));

    let err = client
        .read_item_cross_partition::<Article>(CONTAINER_ID, "missing", None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound));

    let err = client
        .delete_item(CONTAINER_ID, "alice", "missing", None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound));
    let err = client
        .read_item::<Article>(CONTAINER_ID, "alice", "missing", None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound));
    Ok(())
}

#[tokio::test]
async fn cross_partition_read_failures_name_the_read() -> Result<(), Box<dyn Error>> {
    let (client, _) = ready_client().await;
    client
        .create_item(CONTAINER_ID, &Article::new("hello-world", "alice"), None)
        .await?;

    let err = client
        .read_item_cross_partition::<u64>(CONTAINER_ID, "hello-world", None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::DataConversion));
    let context = err.context().expect("conversion failures carry context");
    assert_eq!(context.operation, "read_item_cross_partition");
    assert_eq!(context.item_id.as_deref(), Some("hello-world"));
    Ok(())
}

#[tokio::test]
async fn items_without_ids_are_rejected_locally() -> Result<(), Box<dyn Error>> {
    let (client, store) = ready_client().await;
    let before = store.round_trips();

    let err = client
        .create_item(CONTAINER_ID, &serde_json::json!({ "author": "alice" }), None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::DataConversion));

    let err = client
        .create_item(CONTAINER_ID, &serde_json::json!({ "id": "x" }), None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::DataConversion));
    assert_eq!(store.round_trips(), before);
    Ok(())
}

#[tokio::test]
async fn charges_are_accumulated() -> Result<(), Box<dyn Error>> {
    let (client, _) = ready_client().await;
    client.cost_accountant().reset();

    client
        .create_item(CONTAINER_ID, &Article::new("a", "alice"), None)
        .await?;
    let _: Article = client.read_item(CONTAINER_ID, "alice", "a", None).await?;
    client.delete_item(CONTAINER_ID, "alice", "a", None).await?;

    assert_eq!(
        client.cost_accountant().total(),
        WRITE_CHARGE + POINT_CHARGE + WRITE_CHARGE
    );
    assert_eq!(client.diagnostics().request_charge, client.cost_accountant().total());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_charges_are_not_lost() -> Result<(), Box<dyn Error>> {
    let (client, _) = ready_client().await;
    client
        .create_item(CONTAINER_ID, &Article::new("a", "alice"), None)
        .await?;
    client.cost_accountant().reset();

    let client = Arc::new(client);
    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .read_item::<Article>(CONTAINER_ID, "alice", "a", None)
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await??;
    }

    assert_eq!(client.cost_accountant().total(), 64.0 * POINT_CHARGE);
    Ok(())
}

#[tokio::test]
async fn accountant_can_be_shared_between_clients() -> Result<(), Box<dyn Error>> {
    let accountant = Arc::new(CostAccountant::new());
    let connector: Arc<dyn Connector> = MockConnector::new(MockStore::new());
    let options = CosmosStoreClientOptions {
        connector: Some(connector),
        cost_accountant: Some(Arc::clone(&accountant)),
        ..Default::default()
    };
    let first = CosmosStoreClient::new(config(), Some(options.clone()));
    let second = CosmosStoreClient::new(config(), Some(options));
    first.init(None).await?;
    second.init(None).await?;

    first.create_database(None).await?;
    second.create_database(None).await?;
    assert_eq!(accountant.total(), WRITE_CHARGE + WRITE_CHARGE);
    Ok(())
}

#[tokio::test]
async fn throttled_requests_are_retried() -> Result<(), Box<dyn Error>> {
    let (client, store) = ready_client().await;
    client
        .create_item(CONTAINER_ID, &Article::new("a", "alice"), None)
        .await?;
    client.cost_accountant().reset();
    let before = store.round_trips();

    store.throttle_next(3);
    let _: Article = client.read_item(CONTAINER_ID, "alice", "a", None).await?;

    assert_eq!(store.round_trips() - before, 4);
    assert_eq!(client.cost_accountant().total(), POINT_CHARGE);
    Ok(())
}

#[tokio::test]
async fn exhausted_retries_surface_rate_limiting() -> Result<(), Box<dyn Error>> {
    let store = MockStore::new();
    let connector = MockConnector::new(store.clone());
    let mut config = config();
    config.retry = RetryOptions {
        max_attempts: 2,
        max_wait: Duration::from_secs(1),
    };
    let client = client_in_region(&connector, config, "local");
    client.init(None).await?;

    store.throttle_next(10);
    let err = client.create_database(None).await.unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(store.round_trips(), 3);
    assert_eq!(client.cost_accountant().total(), 0.0);
    Ok(())
}

#[tokio::test]
async fn dropping_the_stop_source_cancels() -> Result<(), Box<dyn Error>> {
    let (client, store) = ready_client().await;
    store.set_latency(Duration::from_secs(5));

    let source = StopSource::new();
    let options = RequestOptions::builder()
        .with_stop_token(source.token())
        .build();
    let cancel = async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(source);
    };
    let (result, ()) = tokio::join!(
        client.read_item::<Article>(CONTAINER_ID, "alice", "a", Some(options)),
        cancel
    );

    let err = result.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Cancelled));
    assert_eq!(err.context().map(|c| c.operation), Some("read_item"));
    Ok(())
}

#[tokio::test]
async fn slow_operations_time_out() -> Result<(), Box<dyn Error>> {
    let (client, store) = ready_client().await;
    store.set_latency(Duration::from_secs(5));

    let options = RequestOptions::builder()
        .with_timeout(Duration::from_millis(50))
        .build();
    let err = client
        .create_item(CONTAINER_ID, &Article::new("a", "alice"), Some(options))
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Timeout));
    Ok(())
}

#[tokio::test]
async fn delete_database_requires_confirmation() -> Result<(), Box<dyn Error>> {
    let (client, store) = ready_client().await;

    let err = client
        .delete_database(&Confirmation::new("production"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::ConfirmationRequired { expected } if expected == DATABASE_ID
    ));
    assert!(store.database_exists());

    client
        .delete_database(&Confirmation::new(DATABASE_ID), None)
        .await?;
    assert!(!store.database_exists());
    Ok(())
}

#[tokio::test]
async fn delete_all_items_empties_the_container() -> Result<(), Box<dyn Error>> {
    let (client, store) = ready_client().await;
    store.set_page_size(3);
    for i in 0..10 {
        let author = if i % 2 == 0 { "alice" } else { "bob" };
        client
            .create_item(CONTAINER_ID, &Article::new(format!("a{i}"), author), None)
            .await?;
    }

    let err = client
        .delete_all_items(CONTAINER_ID, &Confirmation::new("comments"), None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ConfirmationRequired { .. }));
    assert_eq!(store.item_count(CONTAINER_ID), 10);

    let summary = client
        .delete_all_items(CONTAINER_ID, &Confirmation::new(CONTAINER_ID), None)
        .await?;
    assert_eq!(summary.attempted, 10);
    assert_eq!(summary.deleted, 10);
    assert_eq!(summary.already_deleted, 0);
    assert_eq!(store.item_count(CONTAINER_ID), 0);

    let summary = client
        .delete_all_items(CONTAINER_ID, &Confirmation::new(CONTAINER_ID), None)
        .await?;
    assert_eq!(summary.attempted, 0);
    Ok(())
}

#[tokio::test]
async fn delete_all_items_reaches_the_undefined_partition() -> Result<(), Box<dyn Error>> {
    let (client, store) = ready_client().await;
    client
        .create_item(CONTAINER_ID, &Article::new("a0", "alice"), None)
        .await?;
    client
        .upsert_item(
            CONTAINER_ID,
            PartitionKey::undefined(),
            &serde_json::json!({ "id": "orphan", "title": "No author" }),
            None,
        )
        .await?;
    client
        .upsert_item(
            CONTAINER_ID,
            PartitionKey::NULL,
            &serde_json::json!({ "id": "anonymous", "author": null }),
            None,
        )
        .await?;

    let summary = client
        .delete_all_items(CONTAINER_ID, &Confirmation::new(CONTAINER_ID), None)
        .await?;
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.deleted, 3);
    assert_eq!(summary.already_deleted, 0);
    assert_eq!(store.item_count(CONTAINER_ID), 0);
    Ok(())
}

#[tokio::test]
async fn delete_all_items_counts_items_deleted_meanwhile() -> Result<(), Box<dyn Error>> {
    let (client, store) = ready_client().await;
    for i in 0..4 {
        client
            .create_item(CONTAINER_ID, &Article::new(format!("a{i}"), "alice"), None)
            .await?;
    }
    store.delete_concurrently("a2");

    let summary = client
        .delete_all_items(CONTAINER_ID, &Confirmation::new(CONTAINER_ID), None)
        .await?;
    assert_eq!(summary.attempted, 4);
    assert_eq!(summary.deleted, 3);
    assert_eq!(summary.already_deleted, 1);
    assert_eq!(store.item_count(CONTAINER_ID), 0);
    Ok(())
}

#[tokio::test]
async fn delete_all_items_reports_every_failure() -> Result<(), Box<dyn Error>> {
    let (client, store) = ready_client().await;
    for i in 0..10 {
        client
            .create_item(CONTAINER_ID, &Article::new(format!("a{i}"), "alice"), None)
            .await?;
    }
    store.fail_deletes_of("a3");
    store.fail_deletes_of("a7");

    let err = client
        .delete_all_items(CONTAINER_ID, &Confirmation::new(CONTAINER_ID), None)
        .await
        .unwrap_err();
    let ErrorKind::PartialFailure {
        attempted,
        failures,
    } = err.kind()
    else {
        panic!("expected a partial failure, got {err}");
    };
    assert_eq!(*attempted, 10);
    let mut failed: Vec<&str> = failures.iter().map(|f| f.id.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["a3", "a7"]);
    assert!(failures
        .iter()
        .all(|f| f.partition_key == PartitionKey::from("alice")));
    assert_eq!(store.item_count(CONTAINER_ID), 2);
    Ok(())
}

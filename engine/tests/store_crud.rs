use serde_json::Value;
use tracker_engine::{
    Combat, MemoryBackend, MemorySink, Npc, Phase, Record, RecordStore, StoreError,
};

fn memory_store() -> (RecordStore, MemoryBackend) {
    let backend = MemoryBackend::new();
    let store = RecordStore::builder("trackerDB")
        .backend(backend.clone())
        .exporter(MemorySink::new())
        .build();
    (store, backend)
}

#[tokio::test]
async fn add_update_delete_scenario() {
    let (store, backend) = memory_store();
    store.init().await;

    let goblin = Record::new().with("name", "Goblin").with("fp", "1");
    let id = store.add("npcs", goblin).await.unwrap();
    assert!(!id.is_empty());

    let stored = store.get("npcs", &id).await.unwrap().unwrap();
    assert_eq!(stored.get("name"), Some(&Value::from("Goblin")));
    assert_eq!(stored.id(), Some(id.as_str()));

    let renamed = stored.clone().with("name", "Goblin King");
    store.update("npcs", renamed).await.unwrap();
    let all = store.get_all("npcs").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].get("name"), Some(&Value::from("Goblin King")));
    assert_eq!(all[0].get("fp"), Some(&Value::from("1")));

    store.delete("npcs", &id).await.unwrap();
    assert!(store.get_all("npcs").await.unwrap().is_empty());
    assert!(store.get("npcs", &id).await.unwrap().is_none());

    // One save for the created database, then one per mutation.
    assert_eq!(backend.saves().await, 4);
}

#[tokio::test]
async fn caller_supplied_ids_are_kept_and_must_be_unique() {
    let (store, _) = memory_store();
    store.init().await;

    let id = store
        .add("combats", Record::new().with("id", "c1").with("scene", "Bridge"))
        .await
        .unwrap();
    assert_eq!(id, "c1");

    let err = store
        .add("combats", Record::new().with("id", "c1"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId(id) if id == "c1"));
    assert_eq!(store.get_all("combats").await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_keeps_position_in_the_collection() {
    let (store, _) = memory_store();
    store.init().await;
    for name in ["a", "b", "c"] {
        store
            .add("npcs", Record::new().with("id", name).with("name", name))
            .await
            .unwrap();
    }
    store
        .update("npcs", Record::new().with("id", "b").with("name", "B"))
        .await
        .unwrap();

    let names: Vec<_> = store
        .get_all("npcs")
        .await
        .unwrap()
        .iter()
        .map(|r| r.get("name").cloned().unwrap())
        .collect();
    assert_eq!(names, vec![Value::from("a"), Value::from("B"), Value::from("c")]);
}

#[tokio::test]
async fn missing_records_are_reported() {
    let (store, _) = memory_store();
    store.init().await;

    let err = store
        .update("npcs", Record::new().with("id", "ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == "ghost"));

    let err = store.update("npcs", Record::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingId));

    let err = store.delete("combats", "ghost").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn non_string_ids_are_rejected() {
    let (store, backend) = memory_store();
    store.init().await;
    let saves = backend.saves().await;

    let err = store
        .add("npcs", Record::new().with("id", 12).with("name", "Goblin"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidFormat(_)));
    assert!(store.get_all("npcs").await.unwrap().is_empty());

    store.add("npcs", Record::new().with("id", "12")).await.unwrap();
    let err = store
        .update("npcs", Record::new().with("id", 12).with("name", "Orc"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidFormat(_)));
    assert_eq!(store.get("npcs", "12").await.unwrap().unwrap().get("name"), None);

    // Only the successful add was written.
    assert_eq!(backend.saves().await, saves + 1);
}

#[tokio::test]
async fn returned_records_are_copies() {
    let (store, _) = memory_store();
    store.init().await;
    let id = store.add("npcs", Record::new().with("name", "Orc")).await.unwrap();

    let mut all = store.get_all("npcs").await.unwrap();
    all[0].insert("name", "Changed");
    all.clear();

    let stored = store.get("npcs", &id).await.unwrap().unwrap();
    assert_eq!(stored.get("name"), Some(&Value::from("Orc")));
}

#[tokio::test]
async fn operations_before_init_fail() {
    let (store, backend) = memory_store();
    assert_eq!(store.phase().await, Phase::Uninitialized);

    assert!(matches!(
        store.add("npcs", Record::new()).await,
        Err(StoreError::NotInitialized)
    ));
    assert!(matches!(store.get_all("npcs").await, Err(StoreError::NotInitialized)));
    assert!(matches!(store.get("npcs", "x").await, Err(StoreError::NotInitialized)));
    assert!(matches!(
        store.delete("npcs", "x").await,
        Err(StoreError::NotInitialized)
    ));
    assert!(matches!(store.export_snapshot().await, Err(StoreError::NotInitialized)));
    assert_eq!(backend.saves().await, 0);
}

#[tokio::test]
async fn unknown_collections_are_rejected() {
    let (store, _) = memory_store();
    store.init().await;
    assert!(matches!(
        store.add("spells", Record::new()).await,
        Err(StoreError::UnknownCollection(name)) if name == "spells"
    ));
    assert!(matches!(
        store.get_all("spells").await,
        Err(StoreError::UnknownCollection(_))
    ));
}

#[tokio::test]
async fn typed_records_get_timestamps() {
    let (store, _) = memory_store();
    store.init().await;

    let id = store
        .insert(Npc {
            name: Some("Goblin".into()),
            ..Npc::default()
        })
        .await
        .unwrap();
    let mut npc: Npc = store.fetch(&id).await.unwrap().unwrap();
    let created = npc.created_at.unwrap();
    assert_eq!(npc.updated_at, Some(created));
    assert_eq!(npc.id.as_deref(), Some(id.as_str()));

    npc.name = Some("Goblin boss".into());
    store.replace(npc).await.unwrap();
    let npc: Npc = store.fetch(&id).await.unwrap().unwrap();
    assert_eq!(npc.created_at, Some(created));
    assert!(npc.updated_at.unwrap() >= created);
    assert_eq!(npc.name.as_deref(), Some("Goblin boss"));
}

#[tokio::test]
async fn recent_lists_newest_five() {
    let (store, _) = memory_store();
    store.init().await;
    for i in 0..7 {
        store
            .add(
                "combats",
                Record::new()
                    .with("scenario", format!("s{i}"))
                    .with("createdAt", 1_000 + i),
            )
            .await
            .unwrap();
    }
    store
        .add("combats", Record::new().with("scenario", "undated"))
        .await
        .unwrap();

    let recent: Vec<Combat> = store.recent(5).await.unwrap();
    let scenarios: Vec<_> = recent.iter().filter_map(|c| c.scenario.as_deref()).collect();
    assert_eq!(scenarios, vec!["s6", "s5", "s4", "s3", "s2"]);
}

#[tokio::test]
async fn concurrent_adds_all_land() {
    let (store, _) = memory_store();
    let store = std::sync::Arc::new(store);
    store.init().await;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .add("npcs", Record::new().with("id", format!("n{i}")))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(store.get_all("npcs").await.unwrap().len(), 16);
}

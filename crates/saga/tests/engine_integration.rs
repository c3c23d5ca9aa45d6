//! Integration tests for the wash recipe persistence engine.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::{ChemicalId, OrderId, ProcessDefinitionId, StepDefinitionId, WashRecipeId};
use domain::{
    DosageItem, ErrorKind, ProcessItem, RecipeDraft, RecipeError, RecipeHeader, ReferenceKind,
    StepItem, WorkspaceItem,
};
use projections::RecipeItem;
use recipe_store::{
    InMemoryOrderLinks, InMemoryRecipeStore, InMemoryReferenceCatalog, RecipeStore,
};
use saga::{EngineConfig, WashRecipeEngine};

type TestEngine = WashRecipeEngine<InMemoryRecipeStore, InMemoryReferenceCatalog, InMemoryOrderLinks>;

struct TestHarness {
    engine: TestEngine,
    store: InMemoryRecipeStore,
    orders: InMemoryOrderLinks,
    desize: StepDefinitionId,
    rinse: StepDefinitionId,
    enzyme: ChemicalId,
    softener: ChemicalId,
    whiskers: ProcessDefinitionId,
    laser: ProcessDefinitionId,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    async fn with_config(config: EngineConfig) -> Self {
        let store = InMemoryRecipeStore::new();
        let catalog = InMemoryReferenceCatalog::new();
        let orders = InMemoryOrderLinks::new();

        let desize = catalog.add_step_definition("Desize").await;
        let rinse = catalog.add_step_definition("Rinse").await;
        let enzyme = catalog.add_chemical("Cellulase", "g/L").await;
        let softener = catalog.add_chemical("Softener", "%").await;
        let whiskers = catalog.add_process_definition("Whiskers", Some("dry")).await;
        let laser = catalog.add_process_definition("Laser", Some("dry")).await;

        let engine = WashRecipeEngine::new(store.clone(), catalog, orders.clone(), config);

        Self {
            engine,
            store,
            orders,
            desize,
            rinse,
            enzyme,
            softener,
            whiskers,
            laser,
        }
    }

    async fn create(&self, header: RecipeHeader, items: Vec<WorkspaceItem>) -> WashRecipeId {
        let draft = RecipeDraft::new(header, Some(items)).unwrap();
        self.engine.create_recipe(draft).await.unwrap().id
    }
}

fn header(wash_code: Option<&str>) -> RecipeHeader {
    RecipeHeader {
        order_id: None,
        date: None,
        wash_code: wash_code.map(str::to_string),
        wash_type: "Stone wash".to_string(),
    }
}

fn dosage(chemical: impl ToString, quantity: f64) -> DosageItem {
    DosageItem {
        chemical_id: chemical.to_string(),
        quantity,
        unit: "g/L".to_string(),
    }
}

fn step(definition: StepDefinitionId, sequence: u32, chemicals: Vec<DosageItem>) -> StepItem {
    StepItem {
        id: None,
        step_definition_id: definition.to_string(),
        time: Some(15.0),
        temperature: Some(45.0),
        liters: Some(600.0),
        sequence,
        chemicals,
    }
}

fn existing_step(
    id: impl ToString,
    definition: StepDefinitionId,
    sequence: u32,
    chemicals: Vec<DosageItem>,
) -> WorkspaceItem {
    WorkspaceItem::Step(StepItem {
        id: Some(id.to_string()),
        ..step(definition, sequence, chemicals)
    })
}

fn new_step(definition: StepDefinitionId, sequence: u32, chemicals: Vec<DosageItem>) -> WorkspaceItem {
    WorkspaceItem::Step(step(definition, sequence, chemicals))
}

fn process(definition: ProcessDefinitionId, sequence: u32, remark: &str) -> WorkspaceItem {
    WorkspaceItem::Process(ProcessItem {
        id: None,
        process_definition_id: definition.to_string(),
        process_type: Some("manual".to_string()),
        remark: Some(remark.to_string()),
        sequence,
    })
}

fn draft(header: RecipeHeader, items: Vec<WorkspaceItem>) -> RecipeDraft {
    RecipeDraft::new(header, Some(items)).unwrap()
}

#[tokio::test]
async fn test_duplicate_wash_code_is_rejected() {
    let h = TestHarness::new().await;
    h.create(header(Some("WC-100")), vec![]).await;

    let err = h
        .engine
        .create_recipe(draft(header(Some("WC-100")), vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, RecipeError::DuplicateKey { ref wash_code } if wash_code == "WC-100"));
    assert_eq!(err.kind(), ErrorKind::DuplicateKey);
    assert_eq!(h.store.recipe_count().await, 1);
}

#[tokio::test]
async fn test_absent_and_empty_wash_codes_never_collide() {
    let h = TestHarness::new().await;
    h.create(header(None), vec![]).await;
    h.create(header(None), vec![]).await;
    let id = h.create(header(Some("")), vec![]).await;

    let recipe = h.store.get_recipe(id).await.unwrap().unwrap();
    assert_eq!(recipe.wash_code, None);
    assert_eq!(h.store.recipe_count().await, 3);
}

#[tokio::test]
async fn test_create_links_children_and_order_once() {
    let h = TestHarness::new().await;
    let order_id = h.orders.create_order().await;

    let id = h
        .create(
            RecipeHeader {
                order_id: Some(order_id),
                ..header(Some("WC-200"))
            },
            vec![
                new_step(h.desize, 1, vec![dosage(h.enzyme, 1.0), dosage(h.softener, 0.5)]),
                process(h.whiskers, 2, "front panels"),
                new_step(h.rinse, 3, vec![]),
            ],
        )
        .await;

    let recipe = h.engine.get_recipe(id).await.unwrap();
    assert_eq!(recipe.steps.len(), 2);
    assert_eq!(recipe.processes.len(), 1);
    assert_eq!(recipe.steps[0].dosages.len(), 2);
    assert_eq!(
        recipe.steps[0]
            .step_definition
            .as_ref()
            .map(|d| d.name.as_str()),
        Some("Desize")
    );

    assert_eq!(h.orders.recipes_of(order_id).await.unwrap(), vec![id]);
    assert_eq!(h.store.step_entry_count().await, 2);
    assert_eq!(h.store.dosage_count().await, 2);
    assert_eq!(h.store.process_entry_count().await, 1);
}

#[tokio::test]
async fn test_create_with_unknown_order_still_succeeds() {
    let h = TestHarness::new().await;

    let id = h
        .create(
            RecipeHeader {
                order_id: Some(OrderId::new()),
                ..header(None)
            },
            vec![new_step(h.desize, 1, vec![])],
        )
        .await;

    assert!(h.store.get_recipe(id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_missing_date_defaults_to_now() {
    let h = TestHarness::new().await;
    let before = Utc::now();
    let id = h.create(header(None), vec![]).await;

    let recipe = h.store.get_recipe(id).await.unwrap().unwrap();
    assert!(recipe.date >= before);
}

#[tokio::test]
async fn test_repeated_chemical_in_step_is_stored_once() {
    let h = TestHarness::new().await;
    let id = h
        .create(
            header(None),
            vec![new_step(
                h.desize,
                1,
                vec![dosage(h.enzyme, 1.0), dosage(h.softener, 0.3), dosage(h.enzyme, 2.0)],
            )],
        )
        .await;

    let created = h.engine.get_recipe(id).await.unwrap();
    let rows: Vec<_> = created.steps[0]
        .dosages
        .iter()
        .map(|d| (d.chemical_id, d.quantity))
        .collect();
    assert_eq!(rows, vec![(h.enzyme, 2.0), (h.softener, 0.3)]);
    assert_eq!(h.store.dosage_count().await, 2);

    // Resubmitting the same payload leaves the rows untouched
    h.engine
        .update_recipe(
            id,
            draft(
                header(None),
                vec![existing_step(
                    created.steps[0].id,
                    h.desize,
                    1,
                    vec![dosage(h.enzyme, 1.0), dosage(h.softener, 0.3), dosage(h.enzyme, 2.0)],
                )],
            ),
        )
        .await
        .unwrap();

    let updated = h.engine.get_recipe(id).await.unwrap();
    let ids = |r: &projections::PopulatedRecipe| {
        r.steps[0].dosages.iter().map(|d| d.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&updated), ids(&created));
    assert_eq!(updated.steps[0].dosages[0].quantity, 2.0);
    assert_eq!(h.store.dosage_count().await, 2);
}

#[tokio::test]
async fn test_unknown_reference_before_malformed_one_is_reported_first() {
    let h = TestHarness::new().await;

    let err = h
        .engine
        .create_recipe(draft(
            header(None),
            vec![
                new_step(StepDefinitionId::new(), 1, vec![]),
                WorkspaceItem::Step(StepItem {
                    step_definition_id: "bad".to_string(),
                    ..step(h.desize, 2, vec![])
                }),
            ],
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RecipeError::InvalidReference { kind: ReferenceKind::StepDefinition, sequence: 1, .. }
    ));

    // An unknown chemical on an earlier step wins over a malformed
    // definition on a later one
    let err = h
        .engine
        .create_recipe(draft(
            header(None),
            vec![
                new_step(h.desize, 3, vec![dosage(ChemicalId::new(), 1.0)]),
                WorkspaceItem::Step(StepItem {
                    step_definition_id: "bad".to_string(),
                    ..step(h.rinse, 4, vec![])
                }),
            ],
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RecipeError::InvalidReference { kind: ReferenceKind::Chemical, sequence: 3, .. }
    ));

    let err = h
        .engine
        .create_recipe(draft(
            header(None),
            vec![
                process(ProcessDefinitionId::new(), 5, "unknown"),
                WorkspaceItem::Process(ProcessItem {
                    id: None,
                    process_definition_id: "bad".to_string(),
                    process_type: None,
                    remark: None,
                    sequence: 6,
                }),
            ],
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RecipeError::InvalidReference { kind: ReferenceKind::ProcessDefinition, sequence: 5, .. }
    ));

    assert_eq!(h.store.recipe_count().await, 0);
    assert_eq!(h.store.step_entry_count().await, 0);
}

#[tokio::test]
async fn test_step_insert_failure_leaves_no_residue() {
    let h = TestHarness::new().await;
    let order_id = h.orders.create_order().await;
    h.store.fail_step_insert_after(2).await;

    let result = h
        .engine
        .create_recipe(draft(
            RecipeHeader {
                order_id: Some(order_id),
                ..header(Some("WC-300"))
            },
            vec![
                new_step(h.desize, 1, vec![dosage(h.enzyme, 1.0)]),
                new_step(h.rinse, 2, vec![dosage(h.softener, 2.0)]),
                new_step(h.rinse, 3, vec![dosage(h.enzyme, 3.0)]),
                process(h.laser, 4, "knees"),
            ],
        ))
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    assert_eq!(h.store.recipe_count().await, 0);
    assert_eq!(h.store.step_entry_count().await, 0);
    assert_eq!(h.store.dosage_count().await, 0);
    assert_eq!(h.store.process_entry_count().await, 0);
    assert!(h.orders.recipes_of(order_id).await.unwrap().is_empty());

    // The wash code is free again
    h.store.clear_faults().await;
    h.create(header(Some("WC-300")), vec![]).await;
}

#[tokio::test]
async fn test_process_insert_failure_compensates() {
    let h = TestHarness::new().await;
    h.store.set_fail_process_insert(true).await;

    let err = h
        .engine
        .create_recipe(draft(
            header(None),
            vec![
                new_step(h.desize, 1, vec![dosage(h.enzyme, 1.0)]),
                process(h.whiskers, 2, "thighs"),
            ],
        ))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    assert_eq!(h.store.recipe_count().await, 0);
    assert_eq!(h.store.step_entry_count().await, 0);
    assert_eq!(h.store.dosage_count().await, 0);
}

#[tokio::test]
async fn test_deadline_expiry_compensates() {
    let h = TestHarness::with_config(EngineConfig::with_deadline(Duration::from_millis(50))).await;
    h.store
        .set_step_insert_delay(Some(Duration::from_millis(500)))
        .await;

    let err = h
        .engine
        .create_recipe(draft(
            header(Some("WC-SLOW")),
            vec![new_step(h.desize, 1, vec![dosage(h.enzyme, 1.0)])],
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, RecipeError::DeadlineExceeded(_)));
    assert_eq!(h.store.recipe_count().await, 0);
    assert_eq!(h.store.step_entry_count().await, 0);
}

#[tokio::test]
async fn test_order_link_failure_keeps_recipe() {
    let h = TestHarness::new().await;
    let order_id = h.orders.create_order().await;
    h.orders.set_fail_on_add(true).await;

    let err = h
        .engine
        .create_recipe(draft(
            RecipeHeader {
                order_id: Some(order_id),
                ..header(None)
            },
            vec![new_step(h.desize, 1, vec![])],
        ))
        .await
        .unwrap_err();

    let recipe_id = match err {
        RecipeError::OrderLink { recipe_id, .. } => recipe_id,
        other => panic!("expected OrderLink, got {other:?}"),
    };
    assert!(h.store.get_recipe(recipe_id).await.unwrap().is_some());
    assert_eq!(h.store.step_entry_count().await, 1);
}

#[tokio::test]
async fn test_delete_twice_then_not_found() {
    let h = TestHarness::new().await;
    let order_id = h.orders.create_order().await;
    let id = h
        .create(
            RecipeHeader {
                order_id: Some(order_id),
                ..header(Some("WC-400"))
            },
            vec![
                new_step(h.desize, 1, vec![dosage(h.enzyme, 1.0)]),
                process(h.whiskers, 2, "back pockets"),
            ],
        )
        .await;

    h.engine.delete_recipe(id).await.unwrap();
    assert_eq!(h.store.recipe_count().await, 0);
    assert_eq!(h.store.step_entry_count().await, 0);
    assert_eq!(h.store.dosage_count().await, 0);
    assert_eq!(h.store.process_entry_count().await, 0);
    assert!(h.orders.recipes_of(order_id).await.unwrap().is_empty());

    let err = h.engine.delete_recipe(id).await.unwrap_err();
    assert!(matches!(err, RecipeError::NotFound(missing) if missing == id));
}

#[tokio::test]
async fn test_update_reconciles_by_set_difference() {
    let h = TestHarness::new().await;
    // [A(X qty 1), B]
    let id = h
        .create(
            header(None),
            vec![
                new_step(h.desize, 1, vec![dosage(h.enzyme, 1.0)]),
                new_step(h.rinse, 2, vec![]),
            ],
        )
        .await;
    let before = h.engine.get_recipe(id).await.unwrap();
    let a = before.steps[0].id;
    let b = before.steps[1].id;
    let x_dosage = before.steps[0].dosages[0].id;

    // [A(X qty 2, Y qty 1), C]
    let updated = h
        .engine
        .update_recipe(
            id,
            draft(
                header(None),
                vec![
                    existing_step(a, h.desize, 1, vec![dosage(h.enzyme, 2.0), dosage(h.softener, 1.0)]),
                    new_step(h.rinse, 3, vec![]),
                ],
            ),
        )
        .await
        .unwrap();

    assert_eq!(updated.steps.len(), 2);
    assert_eq!(updated.steps[0], a);
    assert!(!updated.steps.contains(&b));
    assert_eq!(h.store.step_entry_count().await, 2);

    let after = h.engine.get_recipe(id).await.unwrap();
    let a_after = &after.steps[0];
    assert_eq!(a_after.dosages.len(), 2);
    assert_eq!(a_after.dosages[0].id, x_dosage);
    assert_eq!(a_after.dosages[0].quantity, 2.0);
    assert_eq!(a_after.dosages[1].chemical_id, h.softener);
    assert_eq!(after.steps[1].sequence, 3);
    assert_eq!(h.store.dosage_count().await, 2);
}

#[tokio::test]
async fn test_update_removes_dosages_of_deleted_steps_and_chemicals() {
    let h = TestHarness::new().await;
    let id = h
        .create(
            header(None),
            vec![
                new_step(h.desize, 1, vec![dosage(h.enzyme, 1.0), dosage(h.softener, 1.0)]),
                new_step(h.rinse, 2, vec![dosage(h.enzyme, 4.0)]),
            ],
        )
        .await;
    let before = h.engine.get_recipe(id).await.unwrap();

    h.engine
        .update_recipe(
            id,
            draft(
                header(None),
                vec![existing_step(before.steps[0].id, h.desize, 1, vec![dosage(h.softener, 1.5)])],
            ),
        )
        .await
        .unwrap();

    assert_eq!(h.store.step_entry_count().await, 1);
    assert_eq!(h.store.dosage_count().await, 1);
    let after = h.engine.get_recipe(id).await.unwrap();
    assert_eq!(after.steps[0].dosages[0].chemical_id, h.softener);
}

#[tokio::test]
async fn test_unchanged_update_keeps_child_identities() {
    let h = TestHarness::new().await;
    let id = h
        .create(
            header(Some("WC-500")),
            vec![
                new_step(h.desize, 1, vec![dosage(h.enzyme, 1.0), dosage(h.softener, 0.2)]),
                process(h.whiskers, 2, "front"),
                new_step(h.rinse, 3, vec![dosage(h.softener, 0.5)]),
            ],
        )
        .await;
    let before = h.engine.get_recipe(id).await.unwrap();

    let items = vec![
        existing_step(
            before.steps[0].id,
            h.desize,
            1,
            vec![dosage(h.enzyme, 1.0), dosage(h.softener, 0.2)],
        ),
        process(h.whiskers, 2, "front"),
        existing_step(before.steps[1].id, h.rinse, 3, vec![dosage(h.softener, 0.5)]),
    ];
    h.engine
        .update_recipe(id, draft(header(Some("WC-500")), items))
        .await
        .unwrap();

    let after = h.engine.get_recipe(id).await.unwrap();
    let ids = |r: &projections::PopulatedRecipe| {
        r.steps
            .iter()
            .map(|s| (s.id, s.dosages.iter().map(|d| d.id).collect::<Vec<_>>()))
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&after), ids(&before));
    assert_eq!(h.store.dosage_count().await, 3);
    // Process entries are always replaced
    assert_ne!(after.processes[0].id, before.processes[0].id);
    assert_eq!(h.store.process_entry_count().await, 1);
}

#[tokio::test]
async fn test_update_renumbers_processes() {
    let h = TestHarness::new().await;
    let id = h.create(header(None), vec![process(h.whiskers, 4, "a")]).await;

    h.engine
        .update_recipe(
            id,
            draft(
                header(None),
                vec![process(h.laser, 9, "b"), process(h.whiskers, 5, "c")],
            ),
        )
        .await
        .unwrap();

    let recipe = h.engine.get_recipe(id).await.unwrap();
    let numbered: Vec<_> = recipe
        .processes
        .iter()
        .map(|p| (p.remark.clone().unwrap(), p.sequence))
        .collect();
    assert_eq!(
        numbered,
        vec![("b".to_string(), 1), ("c".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_update_skips_invalid_chemicals() {
    let h = TestHarness::new().await;
    let id = h
        .create(header(None), vec![new_step(h.desize, 1, vec![])])
        .await;
    let before = h.engine.get_recipe(id).await.unwrap();

    h.engine
        .update_recipe(
            id,
            draft(
                header(None),
                vec![existing_step(
                    before.steps[0].id,
                    h.desize,
                    1,
                    vec![
                        dosage("not-a-chemical", 1.0),
                        dosage(ChemicalId::new(), 2.0),
                        dosage(h.enzyme, 3.0),
                    ],
                )],
            ),
        )
        .await
        .unwrap();

    let after = h.engine.get_recipe(id).await.unwrap();
    assert_eq!(after.steps[0].dosages.len(), 1);
    assert_eq!(after.steps[0].dosages[0].chemical_id, h.enzyme);
}

#[tokio::test]
async fn test_update_rejects_unknown_step_definition() {
    let h = TestHarness::new().await;
    let id = h.create(header(None), vec![]).await;

    let err = h
        .engine
        .update_recipe(
            id,
            draft(header(None), vec![new_step(StepDefinitionId::new(), 6, vec![])]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RecipeError::InvalidReference { sequence: 6, .. }));
}

#[tokio::test]
async fn test_update_wash_code_uniqueness_excludes_self() {
    let h = TestHarness::new().await;
    let first = h.create(header(Some("WC-600")), vec![]).await;
    let second = h.create(header(Some("WC-601")), vec![]).await;

    h.engine
        .update_recipe(first, draft(header(Some("WC-600")), vec![]))
        .await
        .unwrap();

    let err = h
        .engine
        .update_recipe(second, draft(header(Some("WC-600")), vec![]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateKey);
}

#[tokio::test]
async fn test_update_moves_order_reference() {
    let h = TestHarness::new().await;
    let old_order = h.orders.create_order().await;
    let new_order = h.orders.create_order().await;
    let id = h
        .create(
            RecipeHeader {
                order_id: Some(old_order),
                ..header(None)
            },
            vec![],
        )
        .await;

    let updated = h
        .engine
        .update_recipe(
            id,
            draft(
                RecipeHeader {
                    order_id: Some(new_order),
                    ..header(None)
                },
                vec![],
            ),
        )
        .await
        .unwrap();

    assert_eq!(updated.order_id, Some(new_order));
    assert!(h.orders.recipes_of(old_order).await.unwrap().is_empty());
    assert_eq!(h.orders.recipes_of(new_order).await.unwrap(), vec![id]);
}

#[tokio::test]
async fn test_update_missing_recipe_is_not_found() {
    let h = TestHarness::new().await;
    let err = h
        .engine
        .update_recipe(WashRecipeId::new(), draft(header(None), vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, RecipeError::NotFound(_)));
}

#[tokio::test]
async fn test_merged_view_orders_process_before_later_step() {
    let h = TestHarness::new().await;
    let id = h
        .create(
            header(None),
            vec![
                new_step(h.desize, 2, vec![dosage(h.enzyme, 1.0)]),
                process(h.whiskers, 1, "front"),
            ],
        )
        .await;

    let merged = h.engine.get_merged_recipe(id).await.unwrap();
    assert!(matches!(merged.items[0], RecipeItem::Process(_)));
    let RecipeItem::Step(step) = &merged.items[1] else {
        panic!("expected a step second");
    };
    assert_eq!(step.step_name.as_deref(), Some("Desize"));
    assert_eq!(merged.dosages_of(step.entry.id).len(), 1);
}

#[tokio::test]
async fn test_list_recipes_newest_first() {
    let h = TestHarness::new().await;
    assert!(matches!(
        h.engine.list_recipes().await,
        Err(RecipeError::NoRecipes)
    ));

    let older = h
        .create(
            RecipeHeader {
                date: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()),
                ..header(None)
            },
            vec![],
        )
        .await;
    let newer = h
        .create(
            RecipeHeader {
                date: Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()),
                ..header(None)
            },
            vec![],
        )
        .await;

    let listed: Vec<_> = h
        .engine
        .list_recipes()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(listed, vec![newer, older]);
}

//! Orchestrator behaviour against in-memory collaborators.

use chrono::NaiveDateTime;
use patternpress::pipeline::{FailureStage, QueueRequest, QueueRun, RUN_FOLDER_FORMAT, RunRequest};
use patternpress::store::ProductStore;
use patternpress::{FinishedProduct, PipelineError};

use crate::helpers::{
    FakeFulfillment, FakeGenerator, FakeImageHost, Harness, http_error, pattern,
};

fn request(patterns: u32, publish: bool) -> RunRequest {
    RunRequest {
        idea: "software testing".to_owned(),
        patterns,
        publish,
    }
}

fn two_patterns() -> FakeGenerator {
    FakeGenerator::returning(vec![
        pattern("Bug Tee", "\"Bug-Free Zone\""),
        pattern("Ship Tee", "Ship It"),
    ])
}

fn image_exists(h: &Harness, run_folder: &str, product: &FinishedProduct, hex: &str) -> bool {
    h.output
        .path()
        .join(run_folder)
        .join(format!("{}{hex}.png", product.pattern_id))
        .is_file()
}

#[tokio::test]
async fn run_turns_every_pattern_into_a_product() {
    let h = Harness::new(two_patterns(), FakeImageHost::default(), FakeFulfillment::default());

    let report = h.orchestrator.run(request(2, false)).await.unwrap();

    assert!(report.is_complete(), "failures: {:?}", report.failures);
    assert_eq!(report.products.len(), 2);
    assert!(NaiveDateTime::parse_from_str(&report.run_folder, RUN_FOLDER_FORMAT).is_ok());
    assert_eq!(h.generator.calls(), vec![("software testing".to_owned(), 2)]);

    let first = &report.products[0];
    assert_eq!(first.tshirt_text, "Bug-Free Zone");
    assert_eq!(first.product_id, "prod-1");
    assert_eq!(first.image_ids, vec!["img-1", "img-2"]);

    for product in &report.products {
        assert!(image_exists(&h, &report.run_folder, product, "000000"));
        assert!(image_exists(&h, &report.run_folder, product, "FFFFFF"));
        assert_eq!(h.store.get_product(&product.product_id).unwrap().as_ref(), Some(product));
    }
    assert_eq!(h.images.uploaded.lock().unwrap().len(), 4);
    assert_eq!(*h.fulfillment.stock_checked.lock().unwrap(), vec!["prod-1", "prod-2"]);
    assert_eq!(*h.fulfillment.pruned.lock().unwrap(), vec!["prod-1", "prod-2"]);
    assert!(h.fulfillment.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn product_draft_maps_text_colors_to_opposite_garments() {
    let h = Harness::new(
        FakeGenerator::returning(vec![pattern("Bug Tee", "Bug-Free Zone")]),
        FakeImageHost::default(),
        FakeFulfillment::default(),
    );

    let report = h.orchestrator.run(request(1, false)).await.unwrap();
    let product = &report.products[0];

    let urls = h.fulfillment.image_urls.lock().unwrap().clone();
    assert_eq!(
        urls,
        vec![
            format!("https://images.test/{}/{}000000.png", report.run_folder, product.pattern_id),
            format!("https://images.test/{}/{}FFFFFF.png", report.run_folder, product.pattern_id),
        ]
    );

    let drafts = h.fulfillment.drafts.lock().unwrap();
    let draft = &drafts[0];
    assert_eq!(draft.title, "Bug Tee");
    assert_eq!(draft.blueprint_id, 6);
    assert_eq!(draft.print_provider_id, 99);
    assert_eq!(draft.tags, vec!["funny", "tee"]);
    // Ash is not a supported color.
    assert_eq!(draft.variants.len(), 5);
    assert_eq!(draft.variants.iter().filter(|v| v.is_default).count(), 1);

    assert_eq!(draft.print_areas.len(), 2);
    assert_eq!(draft.print_areas[0].image_id, "img-1");
    assert_eq!(draft.print_areas[0].variant_ids, vec![103, 104]);
    assert_eq!(draft.print_areas[1].image_id, "img-2");
    assert_eq!(draft.print_areas[1].variant_ids, vec![101, 102, 105]);
}

#[tokio::test]
async fn unrenderable_text_fails_only_that_pattern() {
    let h = Harness::new(
        FakeGenerator::returning(vec![
            pattern("Long Tee", &"x".repeat(1300)),
            pattern("Ship Tee", "Ship It"),
        ]),
        FakeImageHost::default(),
        FakeFulfillment::default(),
    );

    let report = h.orchestrator.run(request(2, false)).await.unwrap();

    assert_eq!(report.products.len(), 1);
    assert_eq!(report.products[0].product_name, "Ship Tee");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].product_name, "Long Tee");
    assert_eq!(report.failures[0].stage, FailureStage::Render);
    assert!(report.failures[0].product_id.is_none());

    let pngs = std::fs::read_dir(h.output.path().join(&report.run_folder))
        .unwrap()
        .count();
    assert_eq!(pngs, 2);
}

#[tokio::test]
async fn failed_file_upload_fails_its_pattern() {
    let h = Harness::new(
        two_patterns(),
        FakeImageHost {
            fail_first: 1,
            ..FakeImageHost::default()
        },
        FakeFulfillment::default(),
    );

    let report = h.orchestrator.run(request(2, false)).await.unwrap();

    assert_eq!(report.products.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, FailureStage::Upload);
    assert_eq!(report.failures[0].error, "simulated upload failure");
}

#[tokio::test]
async fn host_outage_fails_every_pattern_at_upload() {
    let h = Harness::new(
        two_patterns(),
        FakeImageHost {
            fail_all: true,
            ..FakeImageHost::default()
        },
        FakeFulfillment::default(),
    );

    let report = h.orchestrator.run(request(2, false)).await.unwrap();

    assert!(report.products.is_empty());
    assert!(report.failures.iter().all(|f| f.stage == FailureStage::Upload));
    assert_eq!(report.failures.len(), 2);
    assert!(h.fulfillment.image_urls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn catalog_failure_fails_patterns_not_the_run() {
    let h = Harness::new(
        two_patterns(),
        FakeImageHost::default(),
        FakeFulfillment {
            catalog: Err(http_error("printify", 502)),
            ..FakeFulfillment::default()
        },
    );

    let report = h.orchestrator.run(request(2, false)).await.unwrap();

    assert!(report.products.is_empty());
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.stage == FailureStage::Fulfillment));
}

#[tokio::test]
async fn product_creation_failure_keeps_other_products() {
    let h = Harness::new(
        two_patterns(),
        FakeImageHost::default(),
        FakeFulfillment {
            fail_create_title: Some("Bug Tee".to_owned()),
            ..FakeFulfillment::default()
        },
    );

    let report = h.orchestrator.run(request(2, false)).await.unwrap();

    assert_eq!(report.products.len(), 1);
    assert_eq!(report.products[0].product_name, "Ship Tee");
    assert_eq!(report.failures[0].stage, FailureStage::Fulfillment);
    assert!(report.failures[0].product_id.is_none());
    assert_eq!(h.store.count_products().unwrap(), 1);
}

#[tokio::test]
async fn publish_is_called_when_requested() {
    let h = Harness::new(two_patterns(), FakeImageHost::default(), FakeFulfillment::default());

    let report = h.orchestrator.run(request(2, true)).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(*h.fulfillment.published.lock().unwrap(), vec!["prod-1", "prod-2"]);
}

#[tokio::test]
async fn stock_check_failure_keeps_created_product_id() {
    let h = Harness::new(
        FakeGenerator::returning(vec![pattern("Bug Tee", "Bug-Free Zone")]),
        FakeImageHost::default(),
        FakeFulfillment {
            fail_variant_check: true,
            ..FakeFulfillment::default()
        },
    );

    let report = h.orchestrator.run(request(1, false)).await.unwrap();

    assert!(report.products.is_empty());
    assert_eq!(report.failures[0].stage, FailureStage::Fulfillment);
    assert_eq!(report.failures[0].product_id.as_deref(), Some("prod-1"));
    assert!(h.fulfillment.pruned.lock().unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_runs_fetch_the_catalog_in_parallel() {
    let h = Harness::new(
        FakeGenerator::returning(vec![pattern("Bug Tee", "Bug-Free Zone")]),
        FakeImageHost::default(),
        FakeFulfillment {
            catalog_gate: Some(tokio::sync::Barrier::new(2)),
            ..FakeFulfillment::default()
        },
    );

    let both = async {
        tokio::join!(
            h.orchestrator.run(request(1, false)),
            h.orchestrator.run(request(1, false)),
        )
    };
    let (a, b) = tokio::time::timeout(std::time::Duration::from_secs(30), both)
        .await
        .expect("catalog fetches were serialised");

    assert!(a.unwrap().is_complete());
    assert!(b.unwrap().is_complete());
    assert_eq!(h.fulfillment.drafts.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn publish_failure_reports_created_product_id() {
    let h = Harness::new(
        two_patterns(),
        FakeImageHost::default(),
        FakeFulfillment {
            fail_publish: true,
            ..FakeFulfillment::default()
        },
    );

    let report = h.orchestrator.run(request(2, true)).await.unwrap();

    assert!(report.products.is_empty());
    let ids: Vec<_> = report
        .failures
        .iter()
        .map(|f| (f.stage, f.product_id.clone()))
        .collect();
    assert_eq!(
        ids,
        vec![
            (FailureStage::Publish, Some("prod-1".to_owned())),
            (FailureStage::Publish, Some("prod-2".to_owned())),
        ]
    );
    assert_eq!(h.store.count_products().unwrap(), 0);
}

#[tokio::test]
async fn existing_record_fails_pattern_at_persist() {
    let h = Harness::new(
        FakeGenerator::returning(vec![pattern("Bug Tee", "Bug-Free Zone")]),
        FakeImageHost::default(),
        FakeFulfillment::default(),
    );
    let earlier = FinishedProduct {
        pattern_id: uuid::Uuid::new_v4(),
        product_name: "Earlier".to_owned(),
        description: "d".to_owned(),
        tshirt_text: "t".to_owned(),
        marketing_tags: Vec::new(),
        product_id: "prod-1".to_owned(),
        image_ids: Vec::new(),
    };
    h.store.put_product(&earlier).unwrap();

    let report = h.orchestrator.run(request(1, false)).await.unwrap();

    assert!(report.products.is_empty());
    assert_eq!(report.failures[0].stage, FailureStage::Persist);
    assert_eq!(report.failures[0].product_id.as_deref(), Some("prod-1"));
    assert_eq!(h.store.get_product("prod-1").unwrap(), Some(earlier));
}

#[tokio::test]
async fn generation_failure_aborts_run() {
    let h = Harness::new(
        FakeGenerator::failing(http_error("openai", 500)),
        FakeImageHost::default(),
        FakeFulfillment::default(),
    );

    let err = h.orchestrator.run(request(3, false)).await.unwrap_err();

    assert!(matches!(err, PipelineError::Generation(_)));
    assert_eq!(std::fs::read_dir(h.output.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn empty_generation_is_an_error() {
    let h = Harness::new(
        FakeGenerator::returning(Vec::new()),
        FakeImageHost::default(),
        FakeFulfillment::default(),
    );
    let err = h.orchestrator.run(request(3, false)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));
}

#[tokio::test]
async fn pattern_count_is_capped() {
    let h = Harness::new(two_patterns(), FakeImageHost::default(), FakeFulfillment::default());
    h.orchestrator.run(request(100, false)).await.unwrap();
    assert_eq!(h.generator.calls()[0].1, 25);
    assert!(h.orchestrator.check_pattern_count(0).is_err());
    assert!(h.orchestrator.check_pattern_count(26).is_err());
    assert_eq!(h.orchestrator.check_pattern_count(25).unwrap(), 25);
}

#[tokio::test]
async fn empty_queue_is_not_an_error() {
    let h = Harness::new(two_patterns(), FakeImageHost::default(), FakeFulfillment::default());
    let outcome = h.orchestrator.run_next_queued(false).await.unwrap();
    assert_eq!(outcome, QueueRun::Empty);
    assert!(h.generator.calls().is_empty());
}

#[tokio::test]
async fn queued_ideas_run_oldest_first_with_queue_default() {
    let h = Harness::new(two_patterns(), FakeImageHost::default(), FakeFulfillment::default());
    h.orchestrator
        .enqueue(vec![
            QueueRequest {
                idea: "first".to_owned(),
                patterns: None,
            },
            QueueRequest {
                idea: "second".to_owned(),
                patterns: Some(2),
            },
        ])
        .await
        .unwrap();
    assert_eq!(h.orchestrator.queue_count().await.unwrap(), 2);

    let QueueRun::Processed { item, report } = h.orchestrator.run_next_queued(false).await.unwrap()
    else {
        panic!("expected a queued item");
    };
    assert_eq!(item.idea, "first");
    assert_eq!(item.patterns, 10);
    assert_eq!(report.products.len(), 2);
    assert_eq!(h.generator.calls(), vec![("first".to_owned(), 10)]);
    assert_eq!(h.orchestrator.queue_count().await.unwrap(), 1);
}

#[tokio::test]
async fn enqueue_rejects_out_of_range_counts_atomically() {
    let h = Harness::new(two_patterns(), FakeImageHost::default(), FakeFulfillment::default());
    let err = h
        .orchestrator
        .enqueue(vec![
            QueueRequest {
                idea: "fine".to_owned(),
                patterns: Some(3),
            },
            QueueRequest {
                idea: "too many".to_owned(),
                patterns: Some(0),
            },
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(h.orchestrator.queue_count().await.unwrap(), 0);
}

use super::*;

#[tokio::test]
async fn test_failed_commit_leaves_state_and_sends_nothing() {
    let store = Arc::new(FailingStore::default());
    let h = Harness::with_store(store.clone());

    // Seed a sold-out product directly in the wrapped store
    let seeded = Harness::with_store(store.inner.clone());
    seeded.catalog.only("brand_listing", &[(1, Page::SoldOut)]);
    seeded.run().await.unwrap();
    assert_eq!(h.state_of(1).await, Some(ProductState::OutOfStock));

    h.catalog.only("brand_listing", &[(1, Page::Buyable(Some(89900)))]);
    let result = h.run().await;

    assert!(matches!(result, Err(AppError::Store(_))));
    assert_eq!(h.state_of(1).await, Some(ProductState::OutOfStock));
    assert!(h.sent().is_empty());
    assert_eq!(store.inner.transition_count().await, 1);
}

#[tokio::test]
async fn test_failed_delivery_still_commits() {
    let mut h = Harness::new(Backend::Memory).await;
    h.notifier.fail = true;
    h.catalog.only("brand_listing", &[(1, Page::SoldOut)]);
    h.run().await.unwrap();

    h.catalog.page(1, Page::Buyable(Some(50000)));
    let summary = h.run().await.unwrap();

    assert_eq!(summary.alerts, 1);
    assert_eq!(summary.notifications_sent, 0);
    assert_eq!(summary.notifications_failed, 1);
    assert_eq!(h.state_of(1).await, Some(ProductState::Buyable));

    // Missed alerts are not retried on the next cycle
    let again = h.run().await.unwrap();
    assert_eq!(again.alerts, 0);
    assert_eq!(h.sent().len(), 1);
}

#[tokio::test]
async fn test_all_surfaces_failing_aborts_cycle() {
    let h = Harness::new(Backend::Sqlite).await;
    h.catalog.only("brand_listing", &[(1, Page::Buyable(None))]);
    h.run().await.unwrap();

    for surface in SURFACES {
        h.catalog.fail_surface(surface);
    }
    let result = h.run().await;

    assert!(matches!(result, Err(AppError::CycleAborted(_))));
    // An outage must not read as every product vanishing
    assert_eq!(h.state_of(1).await, Some(ProductState::Buyable));
    assert_eq!(h.store.transitions_for(&identity(1)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_one_surface_failing_still_processes_the_other() {
    let h = Harness::new(Backend::Memory).await;
    h.catalog.only("search_results", &[(1, Page::SoldOut)]);
    h.catalog.fail_surface("brand_listing");

    let summary = h.run().await.unwrap();

    assert_eq!(summary.surfaces_scanned, 2);
    assert_eq!(summary.surfaces_failed, 1);
    assert_eq!(h.state_of(1).await, Some(ProductState::OutOfStock));
}

#[tokio::test]
async fn test_broken_page_leaves_known_product_untouched() {
    let h = Harness::new(Backend::Memory).await;
    h.catalog.only("brand_listing", &[(1, Page::Buyable(Some(1000))), (2, Page::SoldOut)]);
    h.run().await.unwrap();
    let before = h.record(1).await;

    h.catalog.page(1, Page::Broken);
    h.catalog.page(2, Page::Buyable(Some(2000)));
    let summary = h.run().await.unwrap();

    assert_eq!(summary.validation_errors, 1);
    assert_eq!(summary.hidden, 0);
    assert_eq!(h.record(1).await, before);
    assert_eq!(h.state_of(2).await, Some(ProductState::Buyable));
    assert_eq!(h.sent().len(), 1);
}

#[tokio::test]
async fn test_broken_page_for_unknown_product_is_not_tracked() {
    let h = Harness::new(Backend::Memory).await;
    h.catalog.only("brand_listing", &[(5, Page::Broken)]);

    let summary = h.run().await.unwrap();

    assert_eq!(summary.validation_errors, 1);
    assert!(summary.transitions.is_empty());
    assert_eq!(h.state_of(5).await, None);
}

#[rstest::rstest]
#[case::memory(Backend::Memory)]
#[case::sqlite(Backend::Sqlite)]
#[tokio::test]
async fn test_unreadable_page_keeps_listed_product(#[case] backend: Backend) {
    let h = Harness::new(backend).await;
    h.catalog.only("brand_listing", &[(1, Page::Buyable(Some(1000)))]);
    h.run().await.unwrap();
    let before = h.record(1).await;

    // Listed, but the page no longer yields product data
    h.catalog.page(1, Page::Rejected);
    let summary = h.run().await.unwrap();

    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.hidden, 0);
    assert_eq!(h.record(1).await, before);

    h.catalog.page(1, Page::Buyable(Some(1000)));
    let summary = h.run().await.unwrap();

    assert!(summary.transitions.is_empty());
    assert!(h.sent().is_empty());
    assert_eq!(h.store.transitions_for(&identity(1)).await.unwrap().len(), 1);
}

use std::sync::{Arc, Barrier};
use std::thread;

use super::common::*;
use crate::collection::domain::{CustomerStatus, DocumentStatus, ReviewDecision};
use crate::collection::patch::{CustomerPatch, DocumentTypePatch, RequirementPatch};
use crate::collection::query::CustomerQuery;
use crate::collection::repository::{CatalogStore, EventKind, UploadStore};
use crate::collection::validation::ValidationError;
use crate::collection::{
    CollectionService, CollectionServiceError, DocumentTypeFilter, InMemoryCollectionStore,
    InMemoryFileStore, Resource, StorageError, UploadPolicy,
};

#[test]
fn new_customers_start_collecting_and_announce_themselves() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);

    let customer = harness
        .service
        .get_customer(&scenario.customer)
        .expect("customer");

    assert_eq!(customer.status, CustomerStatus::Collecting);
    assert_eq!(
        harness.events.kinds(),
        vec![EventKind::ProductCreated, EventKind::CustomerCreated]
    );
}

#[test]
fn duplicate_customer_numbers_conflict() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);

    match harness
        .service
        .create_customer(customer_input("C-001", scenario.product))
    {
        Err(CollectionServiceError::Conflict(message)) => assert!(message.contains("C-001")),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn customers_require_an_existing_product() {
    let harness = harness();
    let product = crate::collection::domain::ProductId::new();

    assert!(matches!(
        harness.service.create_customer(customer_input("C-9", product)),
        Err(CollectionServiceError::NotFound(Resource::Product(id))) if id == product
    ));
}

#[test]
fn upload_stores_object_under_customer_and_type_prefix() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);

    let file = upload(&harness.service, scenario.customer, scenario.type_a, "Front.JPG");

    assert_eq!(file.status, DocumentStatus::Pending);
    assert_eq!(file.mime_type, "image/jpeg");
    assert!(file
        .storage_key
        .starts_with(&format!("{}/ID_CARD/", scenario.customer)));
    assert!(file.storage_key.ends_with(".jpg"));
    assert!(harness.files.contains(&file.storage_key));

    let (record, body) = harness
        .service
        .document_content(&file.id)
        .expect("content");
    assert_eq!(record.id, file.id);
    assert_eq!(body, b"scanned-bytes".to_vec());
}

#[test]
fn upload_past_max_files_is_refused_until_a_file_is_rejected() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);
    let first = upload(&harness.service, scenario.customer, scenario.type_a, "front.jpg");
    upload(&harness.service, scenario.customer, scenario.type_a, "back.jpg");

    let third = harness.service.upload(upload_request(
        scenario.customer,
        scenario.type_a,
        "extra.jpg",
        b"bytes",
    ));
    assert!(matches!(
        third,
        Err(CollectionServiceError::Validation(ValidationError::TooManyFiles { max: 2, .. }))
    ));

    review(&harness.service, first.id, ReviewDecision::Rejected);
    assert!(harness
        .service
        .upload(upload_request(
            scenario.customer,
            scenario.type_a,
            "retake.jpg",
            b"bytes",
        ))
        .is_ok());
}

#[test]
fn parallel_uploads_never_exceed_max_files() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);

    for round in 0..10 {
        let customer = harness
            .service
            .create_customer(customer_input(&format!("R-{round}"), scenario.product))
            .expect("customer");
        let barrier = Barrier::new(8);
        let accepted = thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|worker| {
                    let service = &harness.service;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        service.upload(upload_request(
                            customer.id,
                            scenario.type_b,
                            &format!("payslip-{worker}.pdf"),
                            b"bytes",
                        ))
                    })
                })
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().expect("upload thread"))
                .filter(|outcome| match outcome {
                    Ok(_) => true,
                    Err(CollectionServiceError::Validation(ValidationError::TooManyFiles {
                        max: 1,
                        ..
                    })) => false,
                    Err(other) => panic!("unexpected upload failure: {other:?}"),
                })
                .count()
        });

        assert_eq!(accepted, 1, "round {round}");
        let stored = harness
            .store
            .list_uploads(&customer.id, &DocumentStatus::COUNTED)
            .expect("uploads");
        assert_eq!(stored.len(), 1, "round {round}");
    }
    assert_eq!(harness.files.len(), 10);
}

#[test]
fn document_type_codes_that_would_escape_the_storage_prefix_are_refused() {
    let harness = harness();
    seed_scenario(&harness.service);

    for code in ["..", "ID/CARD"] {
        assert!(matches!(
            harness
                .service
                .create_document_type(document_type_input(code, true, 1, 1)),
            Err(CollectionServiceError::Validation(ValidationError::InvalidCode { .. }))
        ));
    }
    let listed = harness
        .service
        .list_document_types(&DocumentTypeFilter::default())
        .expect("types");
    assert_eq!(listed.len(), 2);
}

#[test]
fn upload_respects_type_size_and_extension_limits() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);
    harness
        .service
        .update_document_type(
            &scenario.type_b,
            DocumentTypePatch {
                max_file_size: Some(4),
                allowed_file_types: Some(vec![".PDF".to_string()]),
                ..DocumentTypePatch::default()
            },
        )
        .expect("tightened type");

    assert!(matches!(
        harness.service.upload(upload_request(
            scenario.customer,
            scenario.type_b,
            "march.pdf",
            b"too large",
        )),
        Err(CollectionServiceError::Validation(ValidationError::FileTooLarge { limit: 4, .. }))
    ));
    assert!(matches!(
        harness.service.upload(upload_request(
            scenario.customer,
            scenario.type_b,
            "march.png",
            b"tiny",
        )),
        Err(CollectionServiceError::Validation(ValidationError::ExtensionNotAllowed { .. }))
    ));
    assert!(matches!(
        harness.service.upload(upload_request(
            scenario.customer,
            scenario.type_b,
            "march.pdf",
            b"",
        )),
        Err(CollectionServiceError::Validation(ValidationError::EmptyFile))
    ));
    assert!(harness.files.is_empty());
}

#[test]
fn storage_failure_leaves_no_ledger_entry() {
    let store = Arc::new(InMemoryCollectionStore::default());
    let service = CollectionService::new(
        store.clone(),
        Arc::new(BrokenFiles),
        Arc::new(RecordingEvents::default()),
        UploadPolicy::default(),
    );
    let document_type = service
        .create_document_type(document_type_input("ID_CARD", true, 1, 1))
        .expect("type");
    let product = service
        .create_product(product_input("P", Vec::new()))
        .expect("product");
    let customer = service
        .create_customer(customer_input("C-1", product.product.id))
        .expect("customer");

    let result = service.upload(upload_request(
        customer.id,
        document_type.id,
        "front.jpg",
        b"bytes",
    ));

    assert!(matches!(
        result,
        Err(CollectionServiceError::Storage(StorageError::Backend(_)))
    ));
    assert!(store.list_all_uploads().expect("uploads").is_empty());
}

#[test]
fn publish_failures_do_not_fail_the_operation() {
    let service = CollectionService::new(
        Arc::new(InMemoryCollectionStore::default()),
        Arc::new(InMemoryFileStore::default()),
        Arc::new(OfflineEvents),
        UploadPolicy::default(),
    );

    let product = service
        .create_product(product_input("P", Vec::new()))
        .expect("product despite offline webhook");
    assert!(service
        .create_customer(customer_input("C-1", product.product.id))
        .is_ok());
}

#[test]
fn review_and_delete_document_update_ledger_and_storage() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);
    let file = upload(&harness.service, scenario.customer, scenario.type_a, "front.jpg");

    let reviewed = harness
        .service
        .review_document(&file.id, ReviewDecision::Approved, Some("clear".to_string()))
        .expect("review");
    assert_eq!(reviewed.status, DocumentStatus::Approved);
    assert_eq!(reviewed.review_note.as_deref(), Some("clear"));
    assert!(reviewed.reviewed_at.is_some());

    harness.service.delete_document(&file.id).expect("delete");
    assert!(!harness.files.contains(&file.storage_key));
    assert!(matches!(
        harness.service.document_content(&file.id),
        Err(CollectionServiceError::NotFound(Resource::Document(_)))
    ));

    let kinds = harness.events.kinds();
    assert!(kinds.ends_with(&[
        EventKind::DocumentUploaded,
        EventKind::DocumentApproved,
        EventKind::DocumentDeleted,
    ]));
}

#[test]
fn document_types_in_use_cannot_be_deleted() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);

    assert!(matches!(
        harness.service.delete_document_type(&scenario.type_b),
        Err(CollectionServiceError::Conflict(_))
    ));

    let unused = harness
        .service
        .create_document_type(document_type_input("UNUSED", false, 0, 1))
        .expect("type");
    harness
        .service
        .delete_document_type(&unused.id)
        .expect("unused type deleted");
}

#[test]
fn products_with_customers_cannot_be_deleted() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);

    assert!(matches!(
        harness.service.delete_product(&scenario.product),
        Err(CollectionServiceError::Conflict(_))
    ));

    harness
        .service
        .delete_customer(&scenario.customer)
        .expect("customer deleted");
    harness
        .service
        .delete_product(&scenario.product)
        .expect("product deleted");
    assert!(harness
        .store
        .list_requirements(&scenario.product)
        .expect("requirements")
        .is_empty());
}

#[test]
fn deleting_a_customer_removes_uploads_and_objects() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);
    upload(&harness.service, scenario.customer, scenario.type_a, "front.jpg");
    upload(&harness.service, scenario.customer, scenario.type_b, "march.pdf");
    assert_eq!(harness.files.len(), 2);

    harness
        .service
        .delete_customer(&scenario.customer)
        .expect("delete");

    assert!(harness.files.is_empty());
    assert!(harness.store.list_all_uploads().expect("uploads").is_empty());
    assert!(matches!(
        harness.service.get_customer(&scenario.customer),
        Err(CollectionServiceError::NotFound(Resource::Customer(_)))
    ));
}

#[test]
fn customer_patch_checks_new_product_and_reports_status_change() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);

    let missing_product = CustomerPatch {
        product_id: Some(crate::collection::domain::ProductId::new()),
        ..CustomerPatch::default()
    };
    assert!(matches!(
        harness
            .service
            .update_customer(&scenario.customer, missing_product),
        Err(CollectionServiceError::NotFound(Resource::Product(_)))
    ));

    let updated = harness
        .service
        .update_customer(
            &scenario.customer,
            CustomerPatch {
                status: Some(CustomerStatus::Reviewing),
                ..CustomerPatch::default()
            },
        )
        .expect("update");
    assert_eq!(updated.status, CustomerStatus::Reviewing);

    let last = harness.events.events().pop().expect("event");
    assert_eq!(last.kind, EventKind::CustomerUpdated);
    assert_eq!(
        last.details.get("status").map(String::as_str),
        Some("reviewing")
    );
}

#[test]
fn requirement_changes_are_scoped_to_their_product() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);
    let other = harness
        .service
        .create_product(product_input("OTHER", Vec::new()))
        .expect("other product");
    let requirement_id = harness
        .service
        .get_product(&scenario.product)
        .expect("product")
        .document_requirements[0]
        .requirement
        .id;

    assert!(matches!(
        harness.service.update_requirement(
            &other.product.id,
            &requirement_id,
            RequirementPatch::default(),
        ),
        Err(CollectionServiceError::NotFound(Resource::Requirement(_)))
    ));
    assert!(matches!(
        harness.service.update_requirement(
            &scenario.product,
            &requirement_id,
            RequirementPatch {
                min_files: Some(5),
                ..RequirementPatch::default()
            },
        ),
        Err(CollectionServiceError::Validation(ValidationError::InvalidFileBounds { .. }))
    ));

    let relaxed = harness
        .service
        .update_requirement(
            &scenario.product,
            &requirement_id,
            RequirementPatch {
                min_files: Some(1),
                ..RequirementPatch::default()
            },
        )
        .expect("relaxed");
    assert_eq!(relaxed.requirement.min_files, 1);
    assert_eq!(relaxed.document_type.code, "ID_CARD");
}

#[test]
fn duplicate_requirements_conflict() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);

    assert!(matches!(
        harness.service.add_requirement(
            &scenario.product,
            requirement(scenario.type_a, true, 1, 1, 0),
        ),
        Err(CollectionServiceError::Conflict(_))
    ));

    harness
        .service
        .remove_requirement(
            &scenario.product,
            &harness
                .service
                .get_product(&scenario.product)
                .expect("product")
                .document_requirements[1]
                .requirement
                .id,
        )
        .expect("removed");
    let report = harness
        .service
        .completeness(&scenario.customer)
        .expect("report");
    assert_eq!(report.total_requirements, 1);
}

#[test]
fn customer_listing_filters_and_paginates() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);
    for index in 2..=5 {
        harness
            .service
            .create_customer(customer_input(&format!("C-00{index}"), scenario.product))
            .expect("customer");
    }

    let page = harness
        .service
        .list_customers(&CustomerQuery {
            page: 2,
            page_size: 2,
            ..CustomerQuery::default()
        })
        .expect("page");
    assert_eq!(page.total, 5);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items.len(), 2);

    let search = harness
        .service
        .list_customers(&CustomerQuery {
            search: Some("c-004".to_string()),
            ..CustomerQuery::default()
        })
        .expect("search");
    assert_eq!(search.total, 1);

    assert!(matches!(
        harness.service.list_customers(&CustomerQuery {
            page_size: 0,
            ..CustomerQuery::default()
        }),
        Err(CollectionServiceError::Validation(ValidationError::InvalidPagination { .. }))
    ));
}

#[test]
fn dashboard_counts_customers_and_documents() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);
    let file = upload(&harness.service, scenario.customer, scenario.type_a, "front.jpg");
    upload(&harness.service, scenario.customer, scenario.type_a, "back.jpg");
    review(&harness.service, file.id, ReviewDecision::Approved);

    let stats = harness.service.dashboard_stats().expect("stats");

    assert_eq!(stats.total_customers, 1);
    assert_eq!(stats.collecting_customers, 1);
    assert_eq!(stats.total_products, 1);
    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.pending_documents, 1);
    assert_eq!(stats.approved_documents, 1);
}

#[test]
fn document_type_updates_are_validated_after_merge() {
    let harness = harness();
    let scenario = seed_scenario(&harness.service);

    assert!(matches!(
        harness.service.update_document_type(
            &scenario.type_a,
            DocumentTypePatch {
                max_files: Some(0),
                ..DocumentTypePatch::default()
            },
        ),
        Err(CollectionServiceError::Validation(ValidationError::InvalidFileBounds { .. }))
    ));
    let unchanged = harness
        .store
        .fetch_document_type(&scenario.type_a)
        .expect("fetch")
        .expect("present");
    assert_eq!(unchanged.max_files, 2);
}

use crate::infra::RecordingEventPublisher;
use clap::Args;
use loan_docs::collection::domain::{
    CustomerId, DocumentTypeId, NewCustomer, NewDocumentType, NewProduct, NewRequirement,
    ProductId, ReviewDecision, UploadRequest, UploadSource,
};
use loan_docs::collection::{
    CollectionService, CollectionServiceError, InMemoryCollectionStore, InMemoryFileStore,
    UploadPolicy,
};
use loan_docs::error::AppError;
use serde_json::json;
use std::sync::Arc;

type DemoService =
    CollectionService<InMemoryCollectionStore, InMemoryFileStore, RecordingEventPublisher>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Include the per document type breakdown for each customer.
    #[arg(long)]
    pub(crate) detailed: bool,
    /// Include the emitted collection events in the output.
    #[arg(long)]
    pub(crate) events: bool,
    /// Print compact JSON instead of pretty-printed output.
    #[arg(long)]
    pub(crate) compact: bool,
}

struct DemoCatalog {
    id_card: DocumentTypeId,
    income_proof: DocumentTypeId,
    bank_statement: DocumentTypeId,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let events = Arc::new(RecordingEventPublisher::default());
    let service = CollectionService::new(
        Arc::new(InMemoryCollectionStore::default()),
        Arc::new(InMemoryFileStore::default()),
        events.clone(),
        UploadPolicy::default(),
    );

    let output = build_demo_output(&service, &events, &args)?;
    let rendered = if args.compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };
    println!("{rendered}");
    Ok(())
}

fn build_demo_output(
    service: &DemoService,
    events: &RecordingEventPublisher,
    args: &DemoArgs,
) -> Result<serde_json::Value, AppError> {
    let catalog = seed_catalog(service)?;
    let product = service.create_product(NewProduct {
        code: "PERSONAL_LOAN".to_string(),
        name: "Personal consumer loan".to_string(),
        description: Some("Unsecured loan up to 200k".to_string()),
        is_active: true,
        document_requirements: vec![
            requirement(catalog.id_card, true, 2, 2, 1),
            requirement(catalog.income_proof, true, 1, 3, 2),
            requirement(catalog.bank_statement, false, 1, 6, 3),
        ],
    })?;
    let product_id = product.product.id;

    let complete = customer(service, "LD-0001", "Li Wei", product_id)?;
    for file_name in ["id-front.jpg", "id-back.jpg"] {
        upload_and_review(
            service,
            complete,
            catalog.id_card,
            file_name,
            Some(ReviewDecision::Approved),
        )?;
    }
    upload_and_review(
        service,
        complete,
        catalog.income_proof,
        "payslip-may.pdf",
        None,
    )?;

    let partial = customer(service, "LD-0002", "Zhang Min", product_id)?;
    upload_and_review(
        service,
        partial,
        catalog.id_card,
        "id-front.jpg",
        Some(ReviewDecision::Approved),
    )?;
    upload_and_review(
        service,
        partial,
        catalog.bank_statement,
        "statement-q1.pdf",
        None,
    )?;

    let rejected = customer(service, "LD-0003", "Chen Jie", product_id)?;
    upload_and_review(
        service,
        rejected,
        catalog.income_proof,
        "payslip-blurry.jpg",
        Some(ReviewDecision::Rejected),
    )?;

    let mut customers = Vec::new();
    for customer_id in [complete, partial, rejected] {
        let record = service.get_customer(&customer_id)?;
        let mut entry = json!({
            "customer_no": record.customer_no,
            "name": record.name,
            "completeness": service.completeness(&customer_id)?,
            "missing_documents": service.missing_documents(&customer_id)?,
        });
        if args.detailed {
            let detailed = service.detailed_completeness(&customer_id)?;
            entry["detailed"] = serde_json::to_value(detailed)?;
        }
        customers.push(entry);
    }

    let mut output = json!({
        "product": product,
        "customers": customers,
        "dashboard": service.dashboard_stats()?,
    });
    if args.events {
        output["events"] = serde_json::to_value(events.events())?;
    }
    Ok(output)
}

fn seed_catalog(service: &DemoService) -> Result<DemoCatalog, CollectionServiceError> {
    let id_card = service.create_document_type(document_type(
        "ID_CARD",
        "National ID card",
        "identity",
        2,
        2,
        vec!["jpg", "jpeg", "png"],
        1,
    ))?;
    let income_proof = service.create_document_type(document_type(
        "INCOME_PROOF",
        "Proof of income",
        "income",
        1,
        3,
        vec!["jpg", "png", "pdf"],
        2,
    ))?;
    let bank_statement = service.create_document_type(document_type(
        "BANK_STATEMENT",
        "Bank statement",
        "income",
        1,
        6,
        vec!["pdf"],
        3,
    ))?;
    Ok(DemoCatalog {
        id_card: id_card.id,
        income_proof: income_proof.id,
        bank_statement: bank_statement.id,
    })
}

fn document_type(
    code: &str,
    name: &str,
    category: &str,
    min_files: u32,
    max_files: u32,
    extensions: Vec<&str>,
    sort_order: i32,
) -> NewDocumentType {
    NewDocumentType {
        code: code.to_string(),
        name: name.to_string(),
        category: Some(category.to_string()),
        description: None,
        is_required: true,
        min_files,
        max_files,
        max_file_size: 5 * 1024 * 1024,
        allowed_file_types: extensions.into_iter().map(str::to_string).collect(),
        is_active: true,
        sort_order,
    }
}

fn requirement(
    document_type_id: DocumentTypeId,
    is_required: bool,
    min_files: u32,
    max_files: u32,
    sort_order: i32,
) -> NewRequirement {
    NewRequirement {
        document_type_id,
        is_required,
        min_files,
        max_files,
        sort_order,
        note: None,
    }
}

fn customer(
    service: &DemoService,
    customer_no: &str,
    name: &str,
    product_id: ProductId,
) -> Result<CustomerId, CollectionServiceError> {
    let record = service.create_customer(NewCustomer {
        customer_no: customer_no.to_string(),
        name: name.to_string(),
        phone: None,
        id_card: None,
        email: None,
        address: None,
        product_id,
        note: None,
    })?;
    Ok(record.id)
}

fn upload_and_review(
    service: &DemoService,
    customer_id: CustomerId,
    document_type_id: DocumentTypeId,
    file_name: &str,
    decision: Option<ReviewDecision>,
) -> Result<(), CollectionServiceError> {
    let file = service.upload(UploadRequest {
        customer_id,
        document_type_id,
        file_name: file_name.to_string(),
        content_type: None,
        upload_source: UploadSource::Scanner,
        note: None,
        body: format!("demo scan of {file_name}").into_bytes(),
    })?;
    if let Some(decision) = decision {
        service.review_document(&file.id, decision, None)?;
    }
    Ok(())
}

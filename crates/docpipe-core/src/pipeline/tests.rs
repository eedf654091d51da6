use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use image::{DynamicImage, GenericImageView};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use super::*;
use crate::error::ProcessingError;
use crate::models::{ExtractedData, PaymentMethod, PipelineStatus, Receipt};
use crate::processors::{FormatConverter, ImageResizer};

fn doc_type(tag: &str) -> DocumentType {
    DocumentType::new(tag).unwrap()
}

fn image() -> DynamicImage {
    DynamicImage::new_rgb8(40, 20)
}

struct StubClassifier {
    name: String,
    types: Vec<DocumentType>,
    verdict: StageOutput<DocumentType>,
    calls: Arc<AtomicUsize>,
}

impl StubClassifier {
    fn new(name: &str, types: &[&str], verdict: StageOutput<DocumentType>) -> Self {
        Self {
            name: name.to_string(),
            types: types.iter().map(|t| doc_type(t)).collect(),
            verdict,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn voting(name: &str, tag: &str) -> Self {
        Self::new(name, &["receipt", "invoice"], StageOutput::Ok(doc_type(tag)))
    }
}

impl DocumentClassifier for StubClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_types(&self) -> &[DocumentType] {
        &self.types
    }

    fn classify(&self, _image: &DynamicImage) -> StageOutput<DocumentType> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone()
    }
}

struct PanickingClassifier;

impl DocumentClassifier for PanickingClassifier {
    fn name(&self) -> &str {
        "panicking"
    }

    fn supported_types(&self) -> &[DocumentType] {
        std::slice::from_ref(&*RECEIPT_TYPE)
    }

    fn classify(&self, _image: &DynamicImage) -> StageOutput<DocumentType> {
        panic!("model service unreachable")
    }
}

static RECEIPT_TYPE: std::sync::LazyLock<DocumentType> =
    std::sync::LazyLock::new(DocumentType::receipt);

struct StubExtractor {
    name: String,
    target: DocumentType,
    output: StageOutput<ExtractedData>,
    calls: Arc<AtomicUsize>,
    seen_size: Arc<Mutex<Option<(u32, u32)>>>,
}

impl StubExtractor {
    fn new(tag: &str, output: StageOutput<ExtractedData>) -> Self {
        Self {
            name: format!("{}-extractor", tag),
            target: doc_type(tag),
            output,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_size: Arc::new(Mutex::new(None)),
        }
    }

    fn ok(tag: &str) -> Self {
        Self::new(
            tag,
            StageOutput::Ok(ExtractedData::Other(serde_json::json!({"type": tag}))),
        )
    }
}

impl DocumentExtractor for StubExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_type(&self) -> &DocumentType {
        &self.target
    }

    fn extract(&self, image: &DynamicImage) -> StageOutput<ExtractedData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_size.lock().unwrap() = Some(image.dimensions());
        self.output.clone()
    }
}

struct PanickingExtractor;

impl DocumentExtractor for PanickingExtractor {
    fn name(&self) -> &str {
        "panicking-extractor"
    }

    fn target_type(&self) -> &DocumentType {
        &RECEIPT_TYPE
    }

    fn extract(&self, _image: &DynamicImage) -> StageOutput<ExtractedData> {
        panic!("schema mismatch")
    }
}

struct IdentityProcessor(&'static str);

impl DocumentProcessor for IdentityProcessor {
    fn name(&self) -> &str {
        self.0
    }

    fn process(&self, image: &DynamicImage) -> crate::processors::Result<DynamicImage> {
        Ok(image.clone())
    }
}

struct FailingProcessor;

impl DocumentProcessor for FailingProcessor {
    fn name(&self) -> &str {
        "failing"
    }

    fn process(&self, _image: &DynamicImage) -> crate::processors::Result<DynamicImage> {
        Err(ProcessingError::Failed("codec exploded".to_string()))
    }
}

struct PanickingProcessor;

impl DocumentProcessor for PanickingProcessor {
    fn name(&self) -> &str {
        "panicking"
    }

    fn process(&self, _image: &DynamicImage) -> crate::processors::Result<DynamicImage> {
        panic!("out of memory")
    }
}

/// Crops one pixel off the width and records its position in the chain.
struct RecordingProcessor {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl DocumentProcessor for RecordingProcessor {
    fn name(&self) -> &str {
        self.name
    }

    fn process(&self, image: &DynamicImage) -> crate::processors::Result<DynamicImage> {
        self.log.lock().unwrap().push(self.name);
        Ok(image.crop_imm(0, 0, image.width() - 1, image.height()))
    }
}

fn receipt() -> Receipt {
    Receipt {
        store_name: "Example".to_string(),
        store_address: None,
        store_registration_number: None,
        country: "US".to_string(),
        language: "en".to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        receipt_number: "0042".to_string(),
        items: Vec::new(),
        subtotal: None,
        discount: None,
        tax: Vec::new(),
        total: Decimal::new(1000, 1),
        currency: "USD".to_string(),
        payment_method: PaymentMethod::Cash,
        metadata: None,
    }
}

fn receipt_pipeline(extractor: StubExtractor) -> DocumentPipeline {
    DocumentPipeline::builder()
        .with_processor(IdentityProcessor("identity"))
        .with_classifier(StubClassifier::new(
            "first",
            &["receipt"],
            StageOutput::Ok(DocumentType::receipt()),
        ))
        .with_classifier(StubClassifier::new(
            "second",
            &["receipt"],
            StageOutput::Ok(DocumentType::receipt()),
        ))
        .with_extractor(extractor)
        .build()
        .unwrap()
}

#[test]
fn test_end_to_end_receipt() {
    let extractor = StubExtractor::new("receipt", StageOutput::Ok(receipt().into()));
    let pipeline = receipt_pipeline(extractor);

    let outcome = pipeline.process(image()).unwrap();

    assert_eq!(outcome.status(), PipelineStatus::Ok);
    assert_eq!(outcome, PipelineOutcome::Success(ExtractedData::Receipt(receipt())));
    assert_eq!(
        outcome.details(),
        Some(StageOutput::Ok(&ExtractedData::Receipt(receipt())))
    );

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "PIPELINE_OK");
    assert_eq!(json["details"]["status"], "OK");
    assert_eq!(json["details"]["details"]["store_name"], "Example");
    assert_eq!(json["details"]["details"]["currency"], "USD");
    assert_eq!(json["details"]["details"]["total"], serde_json::json!(100.0));
}

#[test]
fn test_extraction_failure() {
    let extractor = StubExtractor::new(
        "receipt",
        StageOutput::failed(StatusCode::ExtractionFailed, "missing total"),
    );
    let pipeline = receipt_pipeline(extractor);

    let outcome = pipeline.process(image()).unwrap();
    let failure = outcome.failure().unwrap();

    assert_eq!(outcome.status(), PipelineStatus::Error);
    assert_eq!(failure.stage, PipelineStage::Extracting);
    assert_eq!(failure.status, StatusCode::ExtractionFailed);
    assert!(failure.message.ends_with("missing total"));
}

#[test]
fn test_routes_to_matching_extractor_only() {
    let receipts = StubExtractor::ok("receipt");
    let invoices = StubExtractor::ok("invoice");
    let receipt_calls = receipts.calls.clone();
    let invoice_calls = invoices.calls.clone();

    let pipeline = DocumentPipeline::builder()
        .with_classifier(StubClassifier::voting("a", "invoice"))
        .with_classifier(StubClassifier::voting("b", "invoice"))
        .with_extractor(receipts)
        .with_extractor(invoices)
        .build()
        .unwrap();

    let outcome = pipeline.process(image()).unwrap();

    assert_eq!(
        outcome.data(),
        Some(&ExtractedData::Other(serde_json::json!({"type": "invoice"})))
    );
    assert_eq!(invoice_calls.load(Ordering::SeqCst), 1);
    assert_eq!(receipt_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_plurality_majority() {
    let pipeline = DocumentPipeline::builder()
        .with_classifier(StubClassifier::voting("a", "receipt"))
        .with_classifier(StubClassifier::voting("b", "invoice"))
        .with_classifier(StubClassifier::voting("c", "receipt"))
        .with_extractor(StubExtractor::ok("receipt"))
        .with_extractor(StubExtractor::ok("invoice"))
        .build()
        .unwrap();

    let outcome = pipeline.process(image()).unwrap();
    assert_eq!(
        outcome.data(),
        Some(&ExtractedData::Other(serde_json::json!({"type": "receipt"})))
    );
}

#[test]
fn test_plurality_tie_goes_to_first_registered() {
    for (first, second) in [("receipt", "invoice"), ("invoice", "receipt")] {
        let pipeline = DocumentPipeline::builder()
            .with_classifier(StubClassifier::voting("a", first))
            .with_classifier(StubClassifier::voting("b", second))
            .with_extractor(StubExtractor::ok("receipt"))
            .with_extractor(StubExtractor::ok("invoice"))
            .build()
            .unwrap();

        let outcome = pipeline.process(image()).unwrap();
        assert_eq!(
            outcome.data(),
            Some(&ExtractedData::Other(serde_json::json!({"type": first})))
        );
    }
}

#[test]
fn test_failed_verdict_can_win() {
    let extractor = StubExtractor::ok("receipt");
    let calls = extractor.calls.clone();
    let no_document = || StageOutput::failed(StatusCode::NoDocumentDetected, "blank page");

    let pipeline = DocumentPipeline::builder()
        .with_classifier(StubClassifier::new("a", &["receipt"], no_document()))
        .with_classifier(StubClassifier::voting("b", "receipt"))
        .with_classifier(StubClassifier::new("c", &["receipt"], no_document()))
        .with_extractor(extractor)
        .with_extractor(StubExtractor::ok("invoice"))
        .build()
        .unwrap();

    let failure = pipeline.process(image()).unwrap().failure().cloned().unwrap();

    assert_eq!(failure.stage, PipelineStage::Classifying);
    assert_eq!(failure.status, StatusCode::NoDocumentDetected);
    assert!(failure.message.ends_with("blank page"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_validation_gate_runs_no_classifier() {
    let classifier = StubClassifier::new("x", &["receipt", "X"], StageOutput::Ok(doc_type("X")));
    let calls = classifier.calls.clone();

    let pipeline = DocumentPipeline::builder()
        .with_classifier(classifier)
        .with_extractor(StubExtractor::ok("receipt"))
        .build()
        .unwrap();

    assert!(!pipeline.is_valid());
    assert_eq!(
        pipeline.missing_extractor_types(),
        BTreeSet::from([doc_type("X")])
    );

    let failure = pipeline.process(image()).unwrap().failure().cloned().unwrap();
    assert!(failure.is_configuration_error());
    assert_eq!(failure.status, StatusCode::UnsupportedType);
    assert_eq!(failure.message, "Missing extractors for document types: X");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_validation_names_every_missing_type() {
    let pipeline = DocumentPipeline::builder()
        .with_classifier(StubClassifier::new("a", &["passport", "receipt"], StageOutput::Ok(doc_type("receipt"))))
        .with_classifier(StubClassifier::new("b", &["id_card"], StageOutput::Ok(doc_type("id_card"))))
        .with_extractor(StubExtractor::ok("receipt"))
        .build()
        .unwrap();

    let failure = pipeline.process(image()).unwrap().failure().cloned().unwrap();
    assert_eq!(
        failure.message,
        "Missing extractors for document types: id_card, passport"
    );
}

#[test]
fn test_pipeline_without_classifiers_is_invalid() {
    let pipeline = DocumentPipeline::builder()
        .with_extractor(StubExtractor::ok("receipt"))
        .build()
        .unwrap();

    let failure = pipeline.process(image()).unwrap().failure().cloned().unwrap();
    assert_eq!(failure.stage, PipelineStage::Validating);
}

#[test]
fn test_revalidates_after_mutation() {
    let mut pipeline = receipt_pipeline(StubExtractor::ok("receipt"));
    assert!(pipeline.process(image()).unwrap().is_success());

    pipeline
        .add_classifier(Box::new(StubClassifier::voting("late", "receipt")))
        .unwrap();
    let failure = pipeline.process(image()).unwrap().failure().cloned().unwrap();
    assert_eq!(failure.message, "Missing extractors for document types: invoice");

    pipeline
        .add_extractor(Box::new(StubExtractor::ok("invoice")))
        .unwrap();
    assert!(pipeline.process(image()).unwrap().is_success());
}

#[test]
fn test_unmatched_runtime_type_fails_routing() {
    // Reports a type it never declared, so validation cannot catch it.
    let pipeline = DocumentPipeline::builder()
        .with_classifier(StubClassifier::new(
            "rogue",
            &["receipt"],
            StageOutput::Ok(doc_type("menu")),
        ))
        .with_extractor(StubExtractor::ok("receipt"))
        .build()
        .unwrap();

    let failure = pipeline.process(image()).unwrap().failure().cloned().unwrap();
    assert_eq!(failure.stage, PipelineStage::Routing);
    assert_eq!(failure.status, StatusCode::UnsupportedType);
    assert!(failure.message.ends_with("menu"));
}

#[test]
fn test_fail_open_processors_match_identity() {
    let run = |processor: Box<dyn DocumentProcessor>| {
        let mut pipeline = receipt_pipeline(StubExtractor::new(
            "receipt",
            StageOutput::Ok(receipt().into()),
        ));
        pipeline.add_processor(processor).unwrap();
        pipeline.process(image()).unwrap()
    };

    let baseline = run(Box::new(IdentityProcessor("slot")));
    assert!(baseline.is_success());
    assert_eq!(run(Box::new(FailingProcessor)), baseline);
    assert_eq!(run(Box::new(PanickingProcessor)), baseline);
}

#[test]
fn test_processors_run_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let extractor = StubExtractor::ok("receipt");
    let seen_size = extractor.seen_size.clone();

    let pipeline = DocumentPipeline::builder()
        .with_processor(RecordingProcessor { name: "first", log: log.clone() })
        .with_processor(FailingProcessor)
        .with_processor(RecordingProcessor { name: "second", log: log.clone() })
        .with_classifier(StubClassifier::voting("a", "receipt"))
        .with_extractor(extractor)
        .with_extractor(StubExtractor::ok("invoice"))
        .build()
        .unwrap();

    assert!(pipeline.process(image()).unwrap().is_success());
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    assert_eq!(*seen_size.lock().unwrap(), Some((38, 20)));
}

#[test]
fn test_builtin_processors_reach_extractor() {
    let extractor = StubExtractor::ok("receipt");
    let seen_size = extractor.seen_size.clone();

    let pipeline = DocumentPipeline::builder()
        .with_processor(FormatConverter::default())
        .with_processor(ImageResizer::new())
        .with_classifier(StubClassifier::new(
            "a",
            &["receipt"],
            StageOutput::Ok(DocumentType::receipt()),
        ))
        .with_extractor(extractor)
        .build()
        .unwrap();

    let outcome = pipeline
        .process(DynamicImage::new_rgba8(2100, 1050))
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(*seen_size.lock().unwrap(), Some((1024, 512)));
}

#[test]
fn test_empty_input_is_a_programmer_error() {
    let pipeline = receipt_pipeline(StubExtractor::ok("receipt"));

    assert_eq!(
        pipeline.process(ImageSource::Path(PathBuf::new())).unwrap_err(),
        PipelineError::EmptyInput
    );
    assert_eq!(
        pipeline.process(Vec::<u8>::new()).unwrap_err(),
        PipelineError::EmptyInput
    );
    assert_eq!(
        pipeline.process(DynamicImage::new_rgb8(0, 0)).unwrap_err(),
        PipelineError::EmptyInput
    );
}

#[test]
fn test_unreadable_image_fails_loading() {
    let pipeline = receipt_pipeline(StubExtractor::ok("receipt"));

    let failure = pipeline
        .process(PathBuf::from("/nonexistent/receipt.png"))
        .unwrap()
        .failure()
        .cloned()
        .unwrap();
    assert_eq!(failure.stage, PipelineStage::Loading);
    assert_eq!(failure.status, StatusCode::InvalidInput);
    assert!(failure.message.contains("/nonexistent/receipt.png"));

    let failure = pipeline
        .process(vec![0u8, 1, 2, 3])
        .unwrap()
        .failure()
        .cloned()
        .unwrap();
    assert_eq!(failure.stage, PipelineStage::Loading);
}

#[test]
fn test_panicking_classifier_counts_as_unknown_error() {
    let pipeline = DocumentPipeline::builder()
        .with_classifier(PanickingClassifier)
        .with_classifier(StubClassifier::new("a", &["receipt"], StageOutput::Ok(DocumentType::receipt())))
        .with_classifier(StubClassifier::new("b", &["receipt"], StageOutput::Ok(DocumentType::receipt())))
        .with_extractor(StubExtractor::ok("receipt"))
        .build()
        .unwrap();
    assert!(pipeline.process(image()).unwrap().is_success());

    let pipeline = DocumentPipeline::builder()
        .with_classifier(PanickingClassifier)
        .with_extractor(StubExtractor::ok("receipt"))
        .build()
        .unwrap();
    let failure = pipeline.process(image()).unwrap().failure().cloned().unwrap();
    assert_eq!(failure.status, StatusCode::UnknownError);
    assert!(failure.message.contains("model service unreachable"));
}

#[test]
fn test_panicking_extractor_is_caught() {
    let pipeline = DocumentPipeline::builder()
        .with_classifier(StubClassifier::new("a", &["receipt"], StageOutput::Ok(DocumentType::receipt())))
        .with_extractor(PanickingExtractor)
        .build()
        .unwrap();

    let failure = pipeline.process(image()).unwrap().failure().cloned().unwrap();
    assert_eq!(failure.stage, PipelineStage::Extracting);
    assert_eq!(failure.status, StatusCode::UnknownError);
    assert!(failure.message.contains("schema mismatch"));
}

#[test]
fn test_rejects_duplicates_and_empty_classifiers() {
    let mut pipeline = DocumentPipeline::new();

    pipeline.add_processor(Box::new(IdentityProcessor("identity"))).unwrap();
    assert_eq!(
        pipeline.add_processor(Box::new(IdentityProcessor("identity"))),
        Err(PipelineError::DuplicateComponent {
            kind: "processor",
            name: "identity".to_string()
        })
    );

    assert_eq!(
        pipeline.add_classifier(Box::new(StubClassifier::new(
            "empty",
            &[],
            StageOutput::failed(StatusCode::UnknownError, "unused"),
        ))),
        Err(PipelineError::NoSupportedTypes("empty".to_string()))
    );

    pipeline.add_extractor(Box::new(StubExtractor::ok("receipt"))).unwrap();
    let mut other = StubExtractor::ok("receipt");
    other.name = "another-receipt-extractor".to_string();
    assert_eq!(
        pipeline.add_extractor(Box::new(other)),
        Err(PipelineError::DuplicateTargetType("receipt".to_string()))
    );
}

#[test]
fn test_batch_mutation_is_all_or_nothing() {
    let mut pipeline = DocumentPipeline::new();
    pipeline
        .add_classifier(Box::new(StubClassifier::voting("a", "receipt")))
        .unwrap();

    let result = pipeline.add_classifiers(vec![
        Box::new(StubClassifier::voting("b", "receipt")),
        Box::new(StubClassifier::voting("a", "receipt")),
    ]);
    assert!(result.is_err());
    assert_eq!(pipeline.classifiers().len(), 1);

    let result = pipeline.add_extractors(vec![
        Box::new(StubExtractor::ok("receipt")),
        Box::new(StubExtractor::ok("receipt")),
    ]);
    assert!(result.is_err());
    assert!(pipeline.extractors().is_empty());

    let result = pipeline.add_processors(vec![
        Box::new(IdentityProcessor("p")),
        Box::new(IdentityProcessor("q")),
        Box::new(IdentityProcessor("p")),
    ]);
    assert!(result.is_err());
    assert!(pipeline.processors().is_empty());

    pipeline
        .add_extractors(vec![
            Box::new(StubExtractor::ok("receipt")),
            Box::new(StubExtractor::ok("invoice")),
        ])
        .unwrap();
    assert!(pipeline.is_valid());
}

#[test]
fn test_builder_rejects_invalid_components() {
    let err = DocumentPipeline::builder()
        .with_classifier(StubClassifier::voting("a", "receipt"))
        .with_classifier(StubClassifier::voting("a", "invoice"))
        .build()
        .unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateComponent { kind: "classifier", .. }));
}

#[test]
fn test_preprocess_with_config() {
    let dir = tempfile::tempdir().unwrap();
    DynamicImage::new_rgba8(1200, 600)
        .save(dir.path().join("scan.png"))
        .unwrap();

    let mut config = DocpipeConfig::default();
    config.loader.input_dir = Some(dir.path().to_path_buf());

    let pipeline = DocumentPipeline::builder().with_config(&config).build().unwrap();
    assert_eq!(pipeline.processors().len(), 2);

    let processed = pipeline.preprocess(PathBuf::from("scan.png")).unwrap();
    assert_eq!(processed.dimensions(), (800, 400));
    assert_eq!(processed.color(), image::ColorType::Rgb8);

    assert!(matches!(
        pipeline.preprocess(PathBuf::from("missing.png")),
        Err(DocpipeError::Load(_))
    ));
}

#[test]
fn test_debug_lists_components() {
    let pipeline = receipt_pipeline(StubExtractor::ok("receipt"));
    let debug = format!("{:?}", pipeline);
    assert!(debug.contains("identity"));
    assert!(debug.contains("receipt-extractor"));
}

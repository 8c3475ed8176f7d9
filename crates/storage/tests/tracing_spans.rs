//! Integration test verifying that `#[instrument]` annotations produce
//! the expected spans on `MemoryStore` operations, and that API keys never
//! appear as span fields.

#![allow(clippy::expect_used)]

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use chrono::{Duration, Utc};
use pocketjson_storage::{ApiKeyStore, Blob, BlobStore, MemoryStore};
use tracing::{
    Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer. Records span names and rendered fields as they are created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
    fields: Arc<Mutex<Vec<String>>>,
}

struct FieldRenderer<'a>(&'a mut Vec<String>);

impl Visit for FieldRenderer<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.push(format!("{}={value:?}", field.name()));
    }
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
        let mut fields = self.fields.lock().expect("lock poisoned");
        attrs.record(&mut FieldRenderer(&mut fields));
    }
}

fn sample_blob(id: &str) -> Blob {
    Blob::builder().id(id).data(r#"{"a":1}"#).expires_at(Utc::now() + Duration::hours(1)).build()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_store_create_blob_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let fields = Arc::clone(&collector.fields);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = MemoryStore::new();
    store.create_blob(&sample_blob("span-blob")).await.expect("create should succeed");

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "create_blob"),
        "expected a 'create_blob' span, got: {recorded:?}"
    );
    let recorded_fields = fields.lock().expect("lock poisoned");
    assert!(
        recorded_fields.iter().any(|f| f.contains("span-blob")),
        "expected the blob id as a span field, got: {recorded_fields:?}"
    );
}

#[tokio::test]
async fn memory_store_get_blob_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = MemoryStore::new();
    let _ = store.get_blob("missing").await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "get_blob"),
        "expected a 'get_blob' span, got: {recorded:?}"
    );
}

#[tokio::test]
async fn memory_store_delete_expired_blobs_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = MemoryStore::new();
    store.delete_expired_blobs(Utc::now()).await.expect("sweep should succeed");

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "delete_expired_blobs"),
        "expected a 'delete_expired_blobs' span, got: {recorded:?}"
    );
}

#[tokio::test]
async fn api_key_operations_produce_spans_without_the_key() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let fields = Arc::clone(&collector.fields);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let secret = "span-test-secret-key";
    let store = MemoryStore::new();
    store.create_api_key_record(secret, Some("ci"), false).await.expect("create");
    let _ = store.get_api_key_record(secret).await;
    store.delete_api_key_record(secret).await.expect("delete");

    let recorded = spans.lock().expect("lock poisoned");
    for name in ["create_api_key_record", "get_api_key_record", "delete_api_key_record"] {
        assert!(
            recorded.iter().any(|s| s == name),
            "missing span '{name}', recorded: {recorded:?}"
        );
    }

    let recorded_fields = fields.lock().expect("lock poisoned");
    assert!(
        recorded_fields.iter().all(|f| !f.contains(secret)),
        "api key leaked into span fields: {recorded_fields:?}"
    );
}

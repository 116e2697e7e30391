// Records emitted through the `log` facade only; the `tracing` feature routes
// elsewhere.
#![cfg(all(feature = "logging", not(feature = "tracing")))]

mod fail_open_logging_tests {
    use std::sync::{Arc, Mutex};

    use linked_resources::cache::{Cache, CacheError, FieldSelector, IndexFn, IndexName};
    use linked_resources::handler::{EventHandler, LinkedResourceHandler};
    use linked_resources::object::{DynamicObject, GroupVersionKind, TypeMeta};
    use linked_resources::queue::{Queue, ReconcileRequest};
    use linked_resources::scheme::Scheme;
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use once_cell::sync::Lazy;
    use tokio_util::sync::CancellationToken;

    struct CapturingLogger {
        records: Mutex<Vec<(Level, String)>>,
    }

    impl Log for CapturingLogger {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            self.records
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    static LOGGER: Lazy<&'static CapturingLogger> = Lazy::new(|| {
        let logger: &'static CapturingLogger = Box::leak(Box::new(CapturingLogger {
            records: Mutex::new(Vec::new()),
        }));
        log::set_logger(logger).unwrap();
        log::set_max_level(LevelFilter::Trace);
        logger
    });

    /// Returns the records at `level` mentioning `needle`. Tests run in
    /// parallel, so every test filters on its own object key.
    fn records(level: Level, needle: &str) -> Vec<String> {
        LOGGER
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, msg)| *l == level && msg.contains(needle))
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    fn request_kind() -> GroupVersionKind {
        GroupVersionKind::gvk("cert-manager.io", "v1", "CertificateRequest")
    }

    fn issuer(ns: &str, name: &str) -> DynamicObject {
        DynamicObject::new(
            TypeMeta::new("cert-manager.athenz.io/v1", "AthenzIssuer"),
            ns,
            name,
        )
    }

    struct UnavailableCache;

    impl Cache for UnavailableCache {
        fn index_field(
            &self,
            _cancel: &CancellationToken,
            _gvk: &GroupVersionKind,
            _index: &IndexName,
            _extractor: IndexFn,
        ) -> Result<(), CacheError> {
            Ok(())
        }

        fn list(
            &self,
            _gvk: &GroupVersionKind,
            _selector: &FieldSelector,
        ) -> Result<Vec<Arc<DynamicObject>>, CacheError> {
            Err(CacheError::Unavailable("connection reset".to_string()))
        }
    }

    /// Cache listing canned items regardless of the selector.
    struct CannedCache(Vec<Arc<DynamicObject>>);

    impl Cache for CannedCache {
        fn index_field(
            &self,
            _cancel: &CancellationToken,
            _gvk: &GroupVersionKind,
            _index: &IndexName,
            _extractor: IndexFn,
        ) -> Result<(), CacheError> {
            Ok(())
        }

        fn list(
            &self,
            _gvk: &GroupVersionKind,
            _selector: &FieldSelector,
        ) -> Result<Vec<Arc<DynamicObject>>, CacheError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingQueue(Mutex<Vec<ReconcileRequest>>);

    impl Queue for RecordingQueue {
        fn add(&self, request: ReconcileRequest) {
            self.0.lock().unwrap().push(request);
        }
    }

    fn handler(cache: Arc<dyn Cache>) -> LinkedResourceHandler {
        Lazy::force(&LOGGER);

        let mut scheme = Scheme::new();
        scheme.register(request_kind());

        LinkedResourceHandler::builder(
            Arc::new(scheme),
            cache,
            TypeMeta::kind("CertificateRequest"),
            |_: &DynamicObject| Vec::new(),
        )
        .name("issuer-to-requests")
        .build(&CancellationToken::new())
        .unwrap()
    }

    #[test]
    fn test_list_failure_logs_one_error_per_lookup() {
        let handler = handler(Arc::new(UnavailableCache));
        let queue = RecordingQueue::default();

        handler.create(&issuer("fail-open", "b1"), &queue);

        assert!(queue.0.lock().unwrap().is_empty());

        let errors = records(Level::Error, "fail-open/b1");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("issuer-to-requests"));
        assert!(errors[0].contains("AthenzIssuer"));
        assert!(errors[0].contains("connection reset"));
    }

    #[test]
    fn test_update_list_failure_logs_each_state() {
        let handler = handler(Arc::new(UnavailableCache));
        let queue = RecordingQueue::default();

        handler.update(
            &issuer("fail-open-update", "old"),
            &issuer("fail-open-update", "new"),
            &queue,
        );

        assert!(queue.0.lock().unwrap().is_empty());
        assert_eq!(records(Level::Error, "fail-open-update/old").len(), 1);
        assert_eq!(records(Level::Error, "fail-open-update/new").len(), 1);
    }

    #[test]
    fn test_malformed_items_are_skipped_with_warning() {
        let kind = TypeMeta::from(&request_kind());
        let handler = handler(Arc::new(CannedCache(vec![
            Arc::new(DynamicObject::new(kind.clone(), "skip", "")),
            Arc::new(DynamicObject::new(TypeMeta::new("v1", "Secret"), "skip", "s1")),
            Arc::new(DynamicObject::new(kind, "skip", "a1")),
        ])));
        let queue = RecordingQueue::default();

        handler.create(&issuer("skip", "b1"), &queue);

        assert_eq!(
            *queue.0.lock().unwrap(),
            vec![ReconcileRequest::new("skip", "a1")]
        );
        assert_eq!(records(Level::Warn, "object=skip/b1").len(), 2);
        assert!(records(Level::Error, "skip/b1").is_empty());
    }
}

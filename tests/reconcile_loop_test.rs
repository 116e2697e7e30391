mod reconcile_loop_tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use linked_resources::handler::{EventHandler, LinkedResourceHandler};
    use linked_resources::object::{DynamicObject, GroupVersionKind, TypeMeta};
    use linked_resources::queue::{Queue, RateLimiterConfig, RateLimitingQueue, ReconcileRequest};
    use linked_resources::scheme::Scheme;
    use linked_resources::InMemoryCache;
    use serde_json::json;
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;

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

    fn handler(cache: &Arc<InMemoryCache>) -> LinkedResourceHandler {
        let mut scheme = Scheme::new();
        scheme.register(request_kind());

        LinkedResourceHandler::builder(
            Arc::new(scheme),
            cache.clone(),
            TypeMeta::kind("CertificateRequest"),
            |object: &DynamicObject| {
                object.data["issuerRef"]
                    .as_str()
                    .map(|issuer| vec![format!("{}/{}", object.namespace(), issuer)])
                    .unwrap_or_default()
            },
        )
        .build(&CancellationToken::new())
        .unwrap()
    }

    fn certificate_request(ns: &str, name: &str, issuer: &str) -> DynamicObject {
        DynamicObject::new(TypeMeta::from(&request_kind()), ns, name)
            .with_data(json!({ "issuerRef": issuer }))
    }

    #[tokio::test]
    async fn test_issuer_event_drives_worker() {
        let cache = Arc::new(InMemoryCache::new());
        let handler = handler(&cache);
        for name in ["a1", "a2", "a3"] {
            cache.apply(&request_kind(), certificate_request("certs", name, "b1"));
        }
        cache.apply(&request_kind(), certificate_request("certs", "other", "b2"));
        cache.start();

        let queue = RateLimitingQueue::default();
        let reconciled = Arc::new(Mutex::new(BTreeMap::<ReconcileRequest, u32>::new()));

        let worker = {
            let queue = queue.clone();
            let reconciled = reconciled.clone();
            tokio::spawn(async move {
                while let Some(request) = queue.get().await {
                    *reconciled.lock().await.entry(request.clone()).or_default() += 1;
                    queue.forget(&request);
                    queue.done(&request);
                }
            })
        };

        // Two events before the worker catches up coalesce per request.
        handler.create(&issuer("certs", "b1"), &queue);
        handler.generic(&issuer("certs", "b1"), &queue);

        queue.shut_down();
        worker.await.unwrap();

        let reconciled = reconciled.lock().await;
        let names: Vec<_> = reconciled.keys().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a1", "a2", "a3"]);
        assert!(reconciled.values().all(|count| (1..=2).contains(count)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reconcile_is_retried_with_backoff() {
        let queue = RateLimitingQueue::new(RateLimiterConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        });
        let request = ReconcileRequest::new("certs", "a1");
        queue.add(request.clone());

        // First attempt fails.
        let got = queue.get().await.unwrap();
        queue.add_rate_limited(got.clone());
        queue.done(&got);
        assert_eq!(queue.num_requeues(&request), 1);
        assert!(queue.is_empty());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(queue.len(), 1);

        // Second attempt succeeds.
        let got = queue.get().await.unwrap();
        queue.forget(&got);
        queue.done(&got);
        assert_eq!(queue.num_requeues(&request), 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_hook_feeds_delayed_queue() {
        let cache = Arc::new(InMemoryCache::new());
        let queue = RateLimitingQueue::default();
        let delayed = queue.clone();

        let mut scheme = Scheme::new();
        scheme.register(request_kind());
        let handler = LinkedResourceHandler::builder(
            Arc::new(scheme),
            cache.clone(),
            TypeMeta::kind("CertificateRequest"),
            |object: &DynamicObject| {
                object.data["issuerRef"]
                    .as_str()
                    .map(|issuer| vec![format!("{}/{}", object.namespace(), issuer)])
                    .unwrap_or_default()
            },
        )
        .enqueue_hook(move |_queue: &dyn Queue, request| {
            delayed.add_after(request, Duration::from_millis(10));
        })
        .build(&CancellationToken::new())
        .unwrap();

        cache.apply(&request_kind(), certificate_request("certs", "a1", "b1"));
        cache.start();

        handler.create(&issuer("certs", "b1"), &queue);
        assert!(queue.is_empty());

        let got = tokio::time::timeout(Duration::from_secs(5), queue.get())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, ReconcileRequest::new("certs", "a1"));
    }
}

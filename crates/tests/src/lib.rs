//! # Integration Tests
//!
//! Cross-crate tests driving the full chain without a broker server:
//! scripted broker -> consumer loop -> output dispatcher -> sinks.

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use consumer::mock::MockBroker;
    use consumer::{Consumer, ConsumerState};
    use contracts::{
        ContractError, Message, OutputMode, OutputSink, QueueBackend, QueuePublisher, RouteTarget,
    };
    use dispatcher::{DispatcherBuilder, DispatcherConfig, LogSink, OutputDispatcher, QueueSink,
        SinkDependencies,
    };
    use throttle::RetryPolicy;

    fn message(symbol: &str) -> Message {
        serde_json::from_value(json!({
            "symbol": symbol,
            "timestamp": "2025-06-01T12:00:00Z",
            "data": { "price": 101.5, "volume": 300 }
        }))
        .unwrap()
    }

    fn bodyless(symbol: &str) -> Message {
        serde_json::from_value(json!({
            "symbol": symbol,
            "timestamp": "2025-06-01T12:00:00Z"
        }))
        .unwrap()
    }

    /// Publisher that counts messages instead of touching a broker
    #[derive(Default)]
    struct CountingPublisher {
        published: Arc<AtomicUsize>,
        routed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl QueuePublisher for CountingPublisher {
        fn backend(&self) -> QueueBackend {
            QueueBackend::Rabbitmq
        }

        async fn publish(
            &self,
            batch: &[Message],
            route: Option<&RouteTarget>,
        ) -> Result<(), ContractError> {
            self.published.fetch_add(batch.len(), Ordering::SeqCst);
            if route.is_some() {
                self.routed.fetch_add(batch.len(), Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn dispatcher_with_queue(
        modes: &[&str],
        paper_enabled: bool,
        paper_mode: &str,
        route: Option<RouteTarget>,
        publisher: Arc<CountingPublisher>,
    ) -> OutputDispatcher {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5));
        let mut sinks: HashMap<OutputMode, Box<dyn OutputSink>> = HashMap::new();
        sinks.insert(OutputMode::Log, Box::new(LogSink::new(true)));
        sinks.insert(
            OutputMode::Queue,
            Box::new(QueueSink::with_policy(publisher, route, policy)),
        );

        let config = DispatcherConfig {
            modes: modes.iter().map(|m| m.to_string()).collect(),
            paper_trading_enabled: paper_enabled,
            paper_trading_mode: paper_mode.to_string(),
        };
        OutputDispatcher::with_sinks(config, sinks)
    }

    /// End-to-end: scripted broker -> consumer -> dispatcher -> queue sink
    #[tokio::test]
    async fn test_e2e_consume_and_republish() {
        let shutdown = CancellationToken::new();
        let broker = MockBroker::new(vec![
            vec![message("AAPL"), message("MSFT")],
            vec![message("GOOG")],
        ])
        .cancel_when_drained(shutdown.clone());
        let counters = broker.counters();

        let published = Arc::new(AtomicUsize::new(0));
        let publisher = Arc::new(CountingPublisher {
            published: Arc::clone(&published),
            routed: Arc::default(),
        });
        let mut output = dispatcher_with_queue(&["log", "queue"], false, "queue", None, publisher);

        let mut message_consumer =
            Consumer::new(broker, 10, Duration::from_millis(10), shutdown);
        message_consumer.run(&mut output).await.unwrap();

        assert_eq!(counters.acked(), 3);
        assert_eq!(counters.rejected(), 0);
        assert_eq!(published.load(Ordering::SeqCst), 3);
        assert_eq!(message_consumer.state(), ConsumerState::Stopped);
    }

    /// A message failing shape validation is rejected; the rest still flow
    #[tokio::test]
    async fn test_e2e_invalid_message_rejected_others_dispatched() {
        let shutdown = CancellationToken::new();
        let broker = MockBroker::new(vec![vec![
            message("AAPL"),
            bodyless("BROKEN"),
            message("MSFT"),
        ]])
        .cancel_when_drained(shutdown.clone());
        let counters = broker.counters();

        let published = Arc::new(AtomicUsize::new(0));
        let publisher = Arc::new(CountingPublisher {
            published: Arc::clone(&published),
            routed: Arc::default(),
        });
        let mut output = dispatcher_with_queue(&["queue"], false, "queue", None, publisher);

        let mut message_consumer =
            Consumer::new(broker, 10, Duration::from_millis(10), shutdown);
        message_consumer.run(&mut output).await.unwrap();

        assert_eq!(counters.acked(), 2);
        assert_eq!(counters.rejected(), 1);
        assert_eq!(published.load(Ordering::SeqCst), 2);
    }

    /// Paper trading redirects everything through its single target
    #[tokio::test]
    async fn test_e2e_paper_trading_bypasses_queue() {
        let shutdown = CancellationToken::new();
        let broker = MockBroker::new(vec![vec![message("AAPL")]])
            .cancel_when_drained(shutdown.clone());
        let counters = broker.counters();

        let published = Arc::new(AtomicUsize::new(0));
        let publisher = Arc::new(CountingPublisher {
            published: Arc::clone(&published),
            routed: Arc::default(),
        });
        // configured mode list says queue, paper trading overrides to log
        let mut output = dispatcher_with_queue(&["queue"], true, "log", None, publisher);

        let mut message_consumer =
            Consumer::new(broker, 10, Duration::from_millis(10), shutdown);
        message_consumer.run(&mut output).await.unwrap();

        assert_eq!(counters.acked(), 1);
        assert_eq!(published.load(Ordering::SeqCst), 0);
    }

    /// Paper trading to the queue carries its route override
    #[tokio::test]
    async fn test_e2e_paper_trading_queue_route_override() {
        let shutdown = CancellationToken::new();
        let broker = MockBroker::new(vec![vec![message("AAPL")]])
            .cancel_when_drained(shutdown.clone());

        let published = Arc::new(AtomicUsize::new(0));
        let routed = Arc::new(AtomicUsize::new(0));
        let publisher = Arc::new(CountingPublisher {
            published: Arc::clone(&published),
            routed: Arc::clone(&routed),
        });
        let route = RouteTarget {
            queue: Some("paper-trades".into()),
            exchange: None,
        };
        let mut output =
            dispatcher_with_queue(&["log"], true, "queue", Some(route), publisher);

        let mut message_consumer =
            Consumer::new(broker, 10, Duration::from_millis(10), shutdown);
        message_consumer.run(&mut output).await.unwrap();

        assert_eq!(published.load(Ordering::SeqCst), 1);
        assert_eq!(routed.load(Ordering::SeqCst), 1, "route override not applied");
    }

    /// Blueprint -> builder -> dispatcher without any network sink
    #[tokio::test]
    async fn test_config_to_dispatcher() {
        let content = r#"
[broker]
backend = "rabbitmq"

[broker.rabbitmq]
username = "guest"
password = "guest"
queue = "market-data"

[outputs]
modes = ["log", "stdout"]
"#;
        let blueprint =
            config_loader::ConfigLoader::load_from_str(content, config_loader::ConfigFormat::Toml)
                .unwrap();

        let mut output = DispatcherBuilder::new(
            blueprint.outputs.clone(),
            SinkDependencies {
                redact_payloads: blueprint.service.redact_payloads,
                ..Default::default()
            },
        )
        .build()
        .await
        .unwrap();

        assert_eq!(output.sink_count(), 2);

        let summary = output.send(&[message("AAPL")]).await.unwrap();
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 0);
    }
}

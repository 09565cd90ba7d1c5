use std::sync::Arc;

use crate::{
    core::Config,
    events::Bus,
    runner::{DummyRunner, PeerRunner},
    subscribers::{LogWriter, RecentEvents, Subscribe, SubscriberSet},
};

use super::{
    classifier::MessageClassifier, correlator::ActionCorrelator, executor::SequenceExecutor,
    gateway::RunnerGateway, orchestrator::Orchestrator,
};

/// Builder for constructing an [`Orchestrator`] with optional components.
pub struct OrchestratorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    factory: Option<Box<dyn Fn() -> Box<dyn PeerRunner> + Send + Sync>>,
    classifier: MessageClassifier,
    log_events: bool,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            factory: None,
            classifier: MessageClassifier::standard(),
            log_events: true,
        }
    }

    /// Adds event subscribers next to the built-in ones.
    ///
    /// Each subscriber gets its own bounded queue and worker task.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the factory that creates the peer runner.
    ///
    /// It is called once at build time and again on every
    /// [`RunnerGateway::reinitialize`]. Defaults to [`DummyRunner::default`].
    pub fn with_runner_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn PeerRunner> + Send + Sync + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Replaces the message vocabulary.
    pub fn with_classifier(mut self, classifier: MessageClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Disables the built-in [`LogWriter`] subscriber.
    pub fn without_event_log(mut self) -> Self {
        self.log_events = false;
        self
    }

    /// Builds the orchestrator.
    ///
    /// This consumes the builder and initializes all runtime components:
    /// - Event bus
    /// - Subscriber workers (log, recent events, custom)
    /// - Runner gateway, correlator and executor
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Arc<Orchestrator> {
        let bus = Bus::new(self.cfg.subscriber_capacity_clamped());

        let history = self
            .cfg
            .history_limit()
            .map(|n| Arc::new(RecentEvents::new(n)));

        let mut subs: Vec<Arc<dyn Subscribe>> = Vec::new();
        if self.log_events {
            subs.push(Arc::new(LogWriter));
        }
        if let Some(h) = &history {
            subs.push(Arc::clone(h) as Arc<dyn Subscribe>);
        }
        subs.extend(self.subscribers);
        let subs = SubscriberSet::new(subs, &bus);

        let gateway = Arc::new(match self.factory {
            Some(factory) => RunnerGateway::new(factory),
            None => RunnerGateway::new(|| Box::new(DummyRunner::default()) as Box<dyn PeerRunner>),
        });
        let correlator = ActionCorrelator::new(
            Arc::clone(&gateway),
            self.classifier,
            self.cfg.primary_peer.clone(),
        );
        let executor = SequenceExecutor::new(
            Arc::clone(&gateway),
            correlator,
            bus.clone(),
            self.cfg.expect_timeout(),
        );

        Arc::new(Orchestrator::new_internal(
            self.cfg, bus, gateway, executor, history, subs,
        ))
    }
}

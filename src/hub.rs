//! The Hub: process-wide coordinator.
//!
//! The Hub owns the component and command registries, the event bus, the
//! DI container, the configuration registry, and the lazily constructed
//! logging pipeline. It is a process singleton reached through [`hub`];
//! everything else hangs off it.
//!
//! # Bootstrap
//!
//! [`Hub::init_foundation`] is idempotent and serialized by a process-wide
//! mutex: it loads [`TelemetryConfig`], assembles the processor chain,
//! instantiates the configured sinks, finalizes the pipeline, and wires
//! the built-in event handlers that turn registry mutations into debug
//! records. Concurrent callers block until the first one finishes.
//!
//! Logging *during* bootstrap cannot be allowed to re-enter bootstrap. A
//! thread-local depth counter tracks whether the current thread is inside
//! `init_foundation`; while it is (or once the depth bound is exceeded),
//! [`Hub::logger`] hands out the stderr fallback logger instead of
//! touching the pipeline. The counter is restored by a drop guard on
//! every exit path.

use crate::cli::{validate_command_name, CommandInfo, CommandTree, RegisteredCommand};
use crate::config::{ConfigLoader, ConfigRegistry, Source, TelemetryConfig};
use crate::di::Container;
use crate::fmt::{LogFormat, Renderer};
use crate::logger::Logger;
use crate::pipeline::{
    ContextMergeProcessor, EnrichmentProcessor, EventSet, EventSetProcessor, EventSetRegistry,
    ModuleFilter, ModuleLevels, Pipeline, RateLimitPolicy, RateLimitProcessor, RedactionPolicy,
    RedactionProcessor, SamplingProcessor, TraceContextProcessor,
};
use crate::sinks::{ConsoleSink, ConsoleStream};
use foundation_core::{
    attrs, AttributeMap, Dimension, EventBus, FoundationError, Registry, Result, Sink,
};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

#[cfg(feature = "otlp")]
use foundation_otlp::{OtlpConfig, OtlpSink, OtlpTransport};

const MAX_BOOTSTRAP_DEPTH: usize = 3;

thread_local! {
    static BOOTSTRAP_DEPTH: Cell<usize> = Cell::new(0);
}

struct BootstrapGuard;

impl BootstrapGuard {
    fn enter() -> Result<Self> {
        let previous = BOOTSTRAP_DEPTH.with(|depth| {
            let value = depth.get();
            depth.set(value + 1);
            value
        });
        let guard = BootstrapGuard;
        if previous >= MAX_BOOTSTRAP_DEPTH {
            return Err(FoundationError::concurrency(
                "foundation bootstrap recursed past its depth bound",
            )
            .with_context("hub.bootstrap_depth", previous as u64));
        }
        Ok(guard)
    }
}

impl Drop for BootstrapGuard {
    fn drop(&mut self) {
        BOOTSTRAP_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn in_bootstrap() -> bool {
    BOOTSTRAP_DEPTH.with(|depth| depth.get() > 0)
}

type ComponentValue = Arc<dyn Any + Send + Sync>;

/// The process-wide coordinator. See the [module docs](self).
pub struct Hub {
    components: Registry<ComponentValue>,
    commands: Registry<RegisteredCommand>,
    bus: Arc<EventBus>,
    container: Container,
    configs: ConfigRegistry,
    event_sets: Arc<EventSetRegistry>,
    pipeline: RwLock<Option<Arc<Pipeline>>>,
    loggers: Mutex<HashMap<String, Weak<crate::logger::LoggerInner>>>,
    extra_sinks: Mutex<Vec<Arc<dyn Sink>>>,
    #[cfg(feature = "otlp")]
    otlp_transport: Mutex<Option<Box<dyn OtlpTransport>>>,
    init_lock: Mutex<()>,
    initialized: AtomicBool,
}

lazy_static::lazy_static! {
    static ref HUB: Hub = Hub::new();
}

/// The process-wide [`Hub`].
pub fn hub() -> &'static Hub {
    &HUB
}

/// Returns the logger for `name` from the process-wide Hub.
pub fn get_logger(name: &str) -> Logger {
    hub().logger(name)
}

/// Initializes the process-wide Hub from the environment.
pub fn init_foundation() -> Result<()> {
    hub().init_foundation()
}

impl Hub {
    fn new() -> Self {
        let bus = Arc::new(EventBus::new());
        Hub {
            components: Registry::with_bus(bus.clone()),
            commands: Registry::with_bus(bus.clone()),
            bus,
            container: Container::new(),
            configs: ConfigRegistry::new(),
            event_sets: Arc::new(EventSetRegistry::new()),
            pipeline: RwLock::new(None),
            loggers: Mutex::new(HashMap::new()),
            extra_sinks: Mutex::new(Vec::new()),
            #[cfg(feature = "otlp")]
            otlp_transport: Mutex::new(None),
            init_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    // ===== bootstrap =====

    /// Loads [`TelemetryConfig`] from the environment and finalizes the
    /// pipeline. Idempotent; concurrent callers block until the first
    /// completes.
    pub fn init_foundation(&self) -> Result<()> {
        self.init_foundation_with(&ConfigLoader::new())
    }

    /// Like [`init_foundation`](Hub::init_foundation) with explicit
    /// configuration layers.
    pub fn init_foundation_with(&self, loader: &ConfigLoader) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let _init = self.init_lock.lock();
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let _depth = BootstrapGuard::enter()?;

        let (config, resolved) = loader.load::<TelemetryConfig>()?;
        let pipeline = self.build_pipeline(&config)?;
        *self.pipeline.write() = Some(Arc::new(pipeline));
        self.configs.register(config, &resolved);
        self.subscribe_builtin_handlers();
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// True once bootstrap completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn build_pipeline(&self, config: &TelemetryConfig) -> Result<Pipeline> {
        let stderr_tty = ConsoleStream::Stderr.is_tty();
        let ansi = config.formatter == LogFormat::Human && config.color.enabled_for(stderr_tty);

        // Built-in decorations; applied only for human output with
        // decoration allowed.
        self.event_sets.register(EventSet::http());
        self.event_sets.register(EventSet::db());
        self.event_sets.register(EventSet::task());
        self.event_sets.set_enabled(ansi);

        let mut builder = Pipeline::builder(Renderer::new(config.formatter, ansi))
            .processor(ContextMergeProcessor::new())
            .processor(EnrichmentProcessor::new(
                config.service_name.as_deref(),
                config.service_version.as_deref(),
                config.environment.as_deref(),
            ))
            .processor(ModuleFilter::new(ModuleLevels::new(
                config.default_level,
                config.module_levels.clone(),
            )));
        if let Some((capacity, refill_per_second)) = config.rate_limit {
            builder = builder.processor(RateLimitProcessor::new(RateLimitPolicy::new(
                capacity,
                refill_per_second,
            )));
        }
        if config.log_sample_rate < 1.0 {
            builder = builder.processor(SamplingProcessor::new(config.log_sample_rate));
        }
        builder = builder
            .processor(EventSetProcessor::new(self.event_sets.clone()))
            .processor(RedactionProcessor::new(RedactionPolicy::standard()))
            .processor(TraceContextProcessor::new());

        if config.console_enabled {
            builder = builder.sink(Arc::new(ConsoleSink::stderr()));
        }
        builder = self.add_file_sink(builder, config)?;
        builder = self.add_otlp_sink(builder, config)?;
        for sink in self.extra_sinks.lock().iter() {
            builder = builder.sink(sink.clone());
        }
        Ok(builder.build())
    }

    #[cfg(feature = "file")]
    fn add_file_sink(
        &self,
        builder: crate::pipeline::PipelineBuilder,
        config: &TelemetryConfig,
    ) -> Result<crate::pipeline::PipelineBuilder> {
        use foundation_appender::{FileSink, Rotation};
        let path = match &config.log_file {
            Some(path) => path,
            None => return Ok(builder),
        };
        let sink = FileSink::new(path, Rotation::DAILY).map_err(|err| {
            FoundationError::configuration(format!(
                "could not open log file {}",
                path.display()
            ))
            .with_context("config.field", "log_file")
            .with_cause(err)
        })?;
        Ok(builder.sink(Arc::new(sink)))
    }

    #[cfg(not(feature = "file"))]
    fn add_file_sink(
        &self,
        builder: crate::pipeline::PipelineBuilder,
        _config: &TelemetryConfig,
    ) -> Result<crate::pipeline::PipelineBuilder> {
        Ok(builder)
    }

    #[cfg(feature = "otlp")]
    fn add_otlp_sink(
        &self,
        builder: crate::pipeline::PipelineBuilder,
        config: &TelemetryConfig,
    ) -> Result<crate::pipeline::PipelineBuilder> {
        let endpoint = match &config.otlp_endpoint {
            Some(endpoint) => endpoint,
            None => return Ok(builder),
        };
        let transport = match self.otlp_transport.lock().take() {
            Some(transport) => transport,
            // An endpoint without a transport is a configuration the
            // embedding application chose not to complete; export is off.
            None => return Ok(builder),
        };
        let service_name = config
            .service_name
            .clone()
            .ok_or_else(|| {
                FoundationError::configuration("otlp export requires a service name")
                    .with_context("config.field", "service_name")
            })?;
        let mut otlp = OtlpConfig::new(endpoint.clone(), service_name);
        otlp.service_version = config.service_version.clone();
        otlp.environment = config.environment.clone();
        otlp.headers = config.otlp_headers.clone();
        let sink = OtlpSink::new(otlp, transport)?;
        Ok(builder.sink(Arc::new(sink)))
    }

    #[cfg(not(feature = "otlp"))]
    fn add_otlp_sink(
        &self,
        builder: crate::pipeline::PipelineBuilder,
        _config: &TelemetryConfig,
    ) -> Result<crate::pipeline::PipelineBuilder> {
        Ok(builder)
    }

    /// Supplies the OTLP wire transport. Must happen before bootstrap for
    /// export to activate.
    #[cfg(feature = "otlp")]
    pub fn set_otlp_transport(&self, transport: impl OtlpTransport) {
        *self.otlp_transport.lock() = Some(Box::new(transport));
    }

    /// Registers an additional sink appended after the built-in ones at
    /// bootstrap.
    pub fn install_sink(&self, sink: Arc<dyn Sink>) {
        self.extra_sinks.lock().push(sink);
    }

    fn subscribe_builtin_handlers(&self) {
        for topic in [
            foundation_core::topics::COMPONENT_REGISTERED,
            foundation_core::topics::COMPONENT_REMOVED,
            foundation_core::topics::COMMAND_REGISTERED,
            foundation_core::topics::COMMAND_REMOVED,
        ] {
            self.bus.subscribe(topic, move |event| {
                let logger = get_logger("foundation.registry");
                logger.debug(&event.topic, event.fields.clone());
            });
        }
    }

    // ===== loggers =====

    /// The logger for `name`.
    ///
    /// Bootstraps the foundation on first use. During bootstrap — or if
    /// bootstrap failed — returns the stderr fallback logger, so logging
    /// never blocks on or recurses into initialization.
    pub fn logger(&self, name: &str) -> Logger {
        if in_bootstrap() {
            return Logger::fallback(name);
        }
        if !self.is_initialized() {
            if let Err(err) = self.init_foundation() {
                static WARNED: AtomicBool = AtomicBool::new(false);
                if !WARNED.swap(true, Ordering::Relaxed) {
                    eprintln!("foundation bootstrap failed: {}", err);
                }
                return Logger::fallback(name);
            }
        }
        let pipeline = {
            let guard = self.pipeline.read();
            guard.clone()
        };
        let pipeline = match pipeline {
            Some(pipeline) => pipeline,
            None => return Logger::fallback(name),
        };

        let mut cache = self.loggers.lock();
        if let Some(existing) = cache.get(name).and_then(Weak::upgrade) {
            return Logger::from_inner(existing);
        }
        let inner = Logger::new_pipeline(name, pipeline);
        cache.insert(name.to_owned(), Arc::downgrade(&inner));
        Logger::from_inner(inner)
    }

    /// Flushes every sink.
    pub fn flush(&self) {
        let pipeline = self.pipeline.read().clone();
        if let Some(pipeline) = pipeline {
            pipeline.flush();
        }
    }

    /// Closes every sink, forcing final flushes.
    pub fn shutdown(&self) {
        let pipeline = self.pipeline.write().take();
        if let Some(pipeline) = pipeline {
            pipeline.close();
        }
        self.initialized.store(false, Ordering::Release);
        self.loggers.lock().clear();
    }

    // ===== components =====

    /// Registers a component under [`Dimension::COMPONENT`].
    pub fn register_component<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        value: T,
        aliases: Vec<String>,
        metadata: AttributeMap,
    ) -> Result<()> {
        self.components.register(
            Dimension::COMPONENT,
            name,
            Arc::new(value) as ComponentValue,
            aliases,
            metadata,
        )
    }

    /// Fetches a component, downcast to its concrete type.
    pub fn get_component<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.components
            .get(Dimension::COMPONENT, name)?
            .downcast::<T>()
            .ok()
    }

    /// True if a component resolves under `name`.
    pub fn has_component(&self, name: &str) -> bool {
        self.components.has(Dimension::COMPONENT, name)
    }

    /// Removes a component.
    pub fn remove_component(&self, name: &str) -> bool {
        self.components.remove(Dimension::COMPONENT, name).is_some()
    }

    /// A snapshot of registered component names.
    pub fn list_components(&self) -> Vec<String> {
        self.components
            .list_dimension(Dimension::COMPONENT)
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    /// A component's registration metadata.
    pub fn component_metadata(&self, name: &str) -> Option<AttributeMap> {
        self.components.get_metadata(Dimension::COMPONENT, name)
    }

    // ===== event sets =====

    /// Registers an event set for decoration and discovery.
    pub fn register_event_set(&self, set: EventSet) -> Result<()> {
        let name = set.name.clone();
        self.components.register(
            Dimension::EVENT_SET,
            name,
            Arc::new(set.clone()) as ComponentValue,
            Vec::new(),
            attrs! { "mappings" => set.mappings.len() as u64 },
        )?;
        self.event_sets.register(set);
        Ok(())
    }

    /// The event-set registry feeding the decoration processor.
    pub fn event_sets(&self) -> &Arc<EventSetRegistry> {
        &self.event_sets
    }

    // ===== commands =====

    /// Registers a CLI command by dotted name.
    pub fn register_command(
        &self,
        name: impl Into<String>,
        action: impl Fn(&[String]) -> i32 + Send + Sync + 'static,
        info: CommandInfo,
    ) -> Result<()> {
        let name = name.into();
        validate_command_name(&name)?;
        let metadata = info.to_metadata();
        let aliases = info.aliases.clone();
        let command = RegisteredCommand {
            name: name.clone(),
            info,
            action: Arc::new(action),
        };
        self.commands
            .register(Dimension::COMMAND, name, command, aliases, metadata)
    }

    /// Looks up a command by name or alias.
    pub fn get_command(&self, name: &str) -> Option<RegisteredCommand> {
        self.commands.get(Dimension::COMMAND, name)
    }

    /// Assembles the command tree for a binary.
    pub fn build_cli(&self, name: impl Into<String>, version: impl Into<String>) -> CommandTree {
        let commands = self
            .commands
            .list_dimension(Dimension::COMMAND)
            .into_iter()
            .map(|(_, command)| command);
        CommandTree::build(name, version, commands)
    }

    // ===== services =====

    /// The event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The DI container.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The registered configuration of type `T`.
    pub fn config<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.configs.get::<T>()
    }

    /// Registers a configuration loaded elsewhere.
    pub fn register_config<T: Send + Sync + 'static>(
        &self,
        value: T,
        resolved: &crate::config::Resolved,
    ) {
        self.configs.register(value, resolved)
    }

    /// Where `field` of `T`'s configuration came from.
    pub fn config_source<T: Send + Sync + 'static>(&self, field: &str) -> Option<Source> {
        self.configs.source_of::<T>(field)
    }

    // ===== test support =====

    /// Tears the Hub back down to its pristine state. Test scope only:
    /// real processes initialize once and stay initialized.
    pub fn reset(&self) {
        let _init = self.init_lock.lock();
        let pipeline = self.pipeline.write().take();
        if let Some(pipeline) = pipeline {
            pipeline.close();
        }
        self.initialized.store(false, Ordering::Release);
        self.loggers.lock().clear();
        self.extra_sinks.lock().clear();
        #[cfg(feature = "otlp")]
        {
            *self.otlp_transport.lock() = None;
        }
        self.components.reset();
        self.commands.reset();
        self.bus.reset();
        self.container.reset();
        self.configs.reset();
        self.event_sets.reset();
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("initialized", &self.is_initialized())
            .field("components", &self.components)
            .field("commands", &self.commands)
            .finish()
    }
}

//! Lifecycle engine that ties the order store to its observers.
//!
//! The engine owns every service of a running instance. Committed saves
//! arrive on a bounded queue from the order store; the run loop hands each
//! status change to the change observer on its own task, with a semaphore
//! capping how many run at once, and sweeps expired storage entries on a
//! fixed interval. The event bus only carries informational events.

pub mod event_bus;

use crate::audit::{AuditLog, StorageAuditLog};
use crate::observer::ChangeObserver;
use crate::repository::StorageOrderRepository;
use crate::status::OrderStatusService;
use lifecycle_config::Config;
use lifecycle_notify::NotificationDispatcher;
use lifecycle_storage::StorageService;
use lifecycle_types::OrderSavedEvent;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;

/// Errors that can occur while the engine is running.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

#[derive(Clone)]
pub struct LifecycleEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	/// Concrete store, so callers can also insert orders.
	pub(crate) orders: Arc<StorageOrderRepository>,
	pub(crate) status_service: Arc<OrderStatusService>,
	pub(crate) audit_log: Arc<dyn AuditLog>,
	pub(crate) observer: Arc<ChangeObserver>,
	pub(crate) event_bus: event_bus::EventBus,
	/// Consumer end of the save queue; taken by the running loop and put
	/// back on shutdown.
	saved_rx: Arc<Mutex<Option<mpsc::Receiver<OrderSavedEvent>>>>,
}

impl LifecycleEngine {
	/// Wires the order store, status service, audit log and observer around
	/// one storage service and one event bus.
	///
	/// The save queue holds `service.event_capacity` entries. Saves made
	/// before [`run_until`](Self::run_until) starts are kept and observed
	/// once it does.
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		notifier: Arc<dyn NotificationDispatcher>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let (saved_tx, saved_rx) = mpsc::channel(config.service.event_capacity.max(1));
		let orders = Arc::new(StorageOrderRepository::new(
			storage.clone(),
			event_bus.clone(),
			saved_tx,
		));
		let status_service = Arc::new(OrderStatusService::new(
			orders.clone(),
			event_bus.clone(),
		));
		let audit_log: Arc<dyn AuditLog> = Arc::new(StorageAuditLog::new(storage.clone()));
		let observer = Arc::new(ChangeObserver::new(
			audit_log.clone(),
			notifier,
			event_bus.clone(),
		));

		Self {
			config,
			storage,
			orders,
			status_service,
			audit_log,
			observer,
			event_bus,
			saved_rx: Arc::new(Mutex::new(Some(saved_rx))),
		}
	}

	/// Runs until Ctrl-C.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.run_until(async move {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!("Failed to listen for shutdown signal: {}", e);
			}
		})
		.await
	}

	/// Runs until `shutdown` resolves.
	///
	/// On shutdown, saves already queued are still handed to the observer and
	/// the call returns once every handler has finished.
	pub async fn run_until<S>(&self, shutdown: S) -> Result<(), EngineError>
	where
		S: Future<Output = ()>,
	{
		let cleanup_seconds = self.config.storage.cleanup_interval_seconds;
		if cleanup_seconds == 0 {
			return Err(EngineError::Config(
				"cleanup_interval_seconds must be greater than zero".into(),
			));
		}

		let mut saved_rx = self
			.saved_rx
			.lock()
			.await
			.take()
			.ok_or_else(|| EngineError::Service("Engine is already running".into()))?;

		let storage = self.storage.clone();
		let mut cleanup_interval = tokio::time::interval(Duration::from_secs(cleanup_seconds));
		let cleanup_handle = tokio::spawn(async move {
			loop {
				cleanup_interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		});

		let semaphore = Arc::new(Semaphore::new(self.config.service.max_concurrent_handlers));
		let mut handlers = JoinSet::new();
		tokio::pin!(shutdown);

		let result = loop {
			tokio::select! {
				saved = saved_rx.recv() => {
					match saved {
						Some(saved) => self.observe(&semaphore, &mut handlers, saved),
						None => {
							break Err(EngineError::Service("Order save queue closed".into()));
						},
					}
				}

				Some(_) = handlers.join_next(), if !handlers.is_empty() => {}

				_ = &mut shutdown => {
					tracing::info!("Shutdown requested");
					break Ok(());
				}
			}
		};

		cleanup_handle.abort();

		while let Ok(saved) = saved_rx.try_recv() {
			self.observe(&semaphore, &mut handlers, saved);
		}
		if !handlers.is_empty() {
			tracing::info!(pending = handlers.len(), "Waiting for observer handlers");
		}
		while handlers.join_next().await.is_some() {}

		*self.saved_rx.lock().await = Some(saved_rx);
		result
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn orders(&self) -> &Arc<StorageOrderRepository> {
		&self.orders
	}

	pub fn status_service(&self) -> &Arc<OrderStatusService> {
		&self.status_service
	}

	pub fn audit_log(&self) -> &Arc<dyn AuditLog> {
		&self.audit_log
	}

	fn observe(
		&self,
		semaphore: &Arc<Semaphore>,
		handlers: &mut JoinSet<()>,
		saved: OrderSavedEvent,
	) {
		if !saved.status_changed() {
			return;
		}
		self.spawn_handler(semaphore, handlers, move |engine| async move {
			engine.observer.handle(&saved).await;
			Ok(())
		});
	}

	/// Spawns a handler task that runs once a semaphore permit is available.
	fn spawn_handler<F, Fut>(
		&self,
		semaphore: &Arc<Semaphore>,
		handlers: &mut JoinSet<()>,
		handler: F,
	) where
		F: FnOnce(LifecycleEngine) -> Fut + Send + 'static,
		Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
	{
		let engine = self.clone();
		let semaphore = semaphore.clone();
		handlers.spawn(async move {
			let _permit = match semaphore.acquire_owned().await {
				Ok(permit) => permit,
				Err(e) => {
					tracing::error!("Failed to acquire semaphore permit: {}", e);
					return;
				},
			};
			if let Err(e) = handler(engine).await {
				tracing::error!("Handler error: {}", e);
			}
		});
	}
}

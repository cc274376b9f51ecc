//! Capacity pools, request spacing, and the rate-limit gate.

// crates.io
use tokio::{
	sync::{OwnedSemaphorePermit, Semaphore},
	time::{self, Instant},
};
// self
use crate::{_prelude::*, config::ThrottleConfig};

/// Pool a request draws its capacity slot from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lane {
	/// Buffered request: burst pool first, then the single-flight pool.
	Regular,
	/// Long-lived streaming request.
	Stream,
}

/// Capacity held for the lifetime of one request.
///
/// Dropping the slot returns single and stream permits to their pools. Burst draws are
/// consumed and only come back through the idle refill.
#[derive(Debug)]
pub(crate) enum Slot {
	Burst,
	Single { _permit: OwnedSemaphorePermit },
	Stream { _permit: OwnedSemaphorePermit },
}

/// Shared throttling state owned by one dispatcher.
#[derive(Debug)]
pub(crate) struct ThrottleState {
	config: ThrottleConfig,
	single: Arc<Semaphore>,
	burst: Semaphore,
	stream: Arc<Semaphore>,
	last_request: Mutex<Option<Instant>>,
	throttled: AsyncMutex<Option<Instant>>,
}
impl ThrottleState {
	pub(crate) fn new(config: ThrottleConfig) -> Self {
		Self {
			single: Arc::new(Semaphore::new(config.single)),
			burst: Semaphore::new(config.burst),
			stream: Arc::new(Semaphore::new(config.stream)),
			last_request: Mutex::new(None),
			throttled: AsyncMutex::new(None),
			config,
		}
	}

	pub(crate) fn config(&self) -> &ThrottleConfig {
		&self.config
	}

	/// Acquires a slot for `lane`, applying spacing to every non-burst draw.
	pub(crate) async fn acquire(&self, lane: Lane) -> Result<Slot> {
		let slot = match lane {
			Lane::Stream => {
				let permit = self.stream.clone().acquire_owned().await.map_err(|_| Error::Closed)?;

				Slot::Stream { _permit: permit }
			},
			Lane::Regular => {
				if let Ok(permit) = self.burst.try_acquire() {
					permit.forget();

					tracing::debug!(
						remaining = self.burst.available_permits(),
						"Using burst slot."
					);

					return Ok(Slot::Burst);
				}

				let permit = self.single.clone().acquire_owned().await.map_err(|_| Error::Closed)?;

				Slot::Single { _permit: permit }
			},
		};

		self.space().await;

		Ok(slot)
	}

	/// Blocks while a rate-limit cooldown is active, then clears it.
	///
	/// The check and the wait share one lock, so concurrent callers queue behind the first
	/// waiter and none of them sleeps twice.
	pub(crate) async fn pass_gate(&self) {
		let mut throttled = self.throttled.lock().await;

		if let Some(since) = *throttled {
			let until = since + self.config.cooldown;

			if until > Instant::now() {
				tracing::debug!(
					remaining = ?until.saturating_duration_since(Instant::now()),
					"Waiting out rate-limit cooldown."
				);

				time::sleep_until(until).await;
			}

			*throttled = None;
		}
	}

	/// Starts (or extends) the cooldown from `at`.
	pub(crate) async fn mark_throttled(&self, at: Instant) {
		let mut throttled = self.throttled.lock().await;

		*throttled = Some(throttled.map_or(at, |existing| existing.max(at)));
	}

	/// Reserves the next send time and sleeps until it.
	async fn space(&self) {
		let wait = {
			let mut last = self.last_request.lock();
			let now = Instant::now();
			let wait = match *last {
				Some(previous) => {
					if now.saturating_duration_since(previous) > self.config.burst_refill_after {
						self.refill_burst();
					}

					(previous + self.config.spacing).saturating_duration_since(now)
				},
				None => Duration::ZERO,
			};

			*last = Some(now + wait);

			wait
		};

		if !wait.is_zero() {
			tracing::debug!(wait = ?wait, "Spacing request.");

			time::sleep(wait).await;
		}
	}

	/// Closes every pool; pending and later acquisitions fail with [`Error::Closed`].
	pub(crate) fn close(&self) {
		self.single.close();
		self.burst.close();
		self.stream.close();

		tracing::debug!("Capacity pools closed.");
	}

	fn refill_burst(&self) {
		let missing = self.config.burst.saturating_sub(self.burst.available_permits());

		if missing > 0 {
			self.burst.add_permits(missing);

			tracing::debug!(refilled = missing, "Burst pool refilled after idle period.");
		}
	}
}

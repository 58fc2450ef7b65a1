//! Simulated Feed
//!
//! Random-walk quotes for a fixed symbol list, for running the board
//! without a data server. Every symbol is published once in full, then each
//! tick moves one symbol by up to half a percent and publishes only the
//! fields that changed. With probability `churn` a tick removes the symbol
//! instead; it is re-added in full the next time it is picked.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::MissedTickBehavior;

use super::state::{ConnectionState, FeedState};
use crate::application::ports::{FeedError, FeedEvent, FeedSink, FeedSource};
use crate::domain::row::{Field, FieldUpdate, RowKey};
use crate::infrastructure::config::SimulationSettings;
use crate::infrastructure::metrics;

const FEED_NAME: &str = "simulated";
const MAX_STEP: f64 = 0.005;
const SPREAD: f64 = 0.0005;

#[derive(Debug, Clone)]
struct Quote {
    key: RowKey,
    price: f64,
    open: f64,
    high: f64,
    low: f64,
    volume: f64,
    listed: bool,
}

impl Quote {
    fn open_at(key: RowKey, price: f64) -> Self {
        Self {
            key,
            price,
            open: price,
            high: price,
            low: price,
            volume: 0.0,
            listed: false,
        }
    }

    fn movement(&self) -> f64 {
        (self.price - self.open) / self.open * 100.0
    }

    fn full_update(&self) -> FieldUpdate {
        FieldUpdate::new()
            .with(Field::Price, self.price)
            .with(Field::Volume, self.volume)
            .with(Field::Movement, self.movement())
            .with(Field::Open, self.open)
            .with(Field::High, self.high)
            .with(Field::Low, self.low)
            .with(Field::Bid, self.price * (1.0 - SPREAD))
            .with(Field::Ask, self.price * (1.0 + SPREAD))
            .with_timestamp(chrono::Utc::now().timestamp())
    }
}

/// Feed source producing random-walk quotes.
#[derive(Debug)]
pub struct SimulatedFeed {
    quotes: Vec<Quote>,
    tick_interval: Duration,
    churn: f64,
    rng: StdRng,
    state: Arc<FeedState>,
}

impl SimulatedFeed {
    /// Create a simulated feed reporting into `state`.
    ///
    /// Uses `settings.seed` when set so runs are reproducible.
    #[must_use]
    pub fn new(settings: &SimulationSettings, state: Arc<FeedState>) -> Self {
        let mut rng = settings
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        let quotes = settings
            .symbols
            .iter()
            .map(|symbol| {
                let price = (rng.random_range(20.0..500.0_f64) * 100.0).round() / 100.0;
                Quote::open_at(RowKey::new(symbol), price)
            })
            .collect();

        Self {
            quotes,
            tick_interval: settings.tick_interval,
            churn: settings.churn,
            rng,
            state,
        }
    }

    /// Full upserts for every symbol, in configured order.
    pub fn initial_events(&mut self) -> Vec<FeedEvent> {
        self.quotes
            .iter_mut()
            .map(|quote| {
                quote.listed = true;
                FeedEvent::upsert(quote.key.clone(), quote.full_update())
            })
            .collect()
    }

    /// The next simulated event, or `None` with no symbols configured.
    pub fn next_event(&mut self) -> Option<FeedEvent> {
        if self.quotes.is_empty() {
            return None;
        }

        let index = self.rng.random_range(0..self.quotes.len());
        let churn = self.churn > 0.0 && self.rng.random_bool(self.churn);
        let step = self.rng.random_range(-MAX_STEP..=MAX_STEP);
        let traded = f64::from(self.rng.random_range(100_u32..5_000));
        let quote = &mut self.quotes[index];

        if !quote.listed {
            quote.listed = true;
            return Some(FeedEvent::upsert(quote.key.clone(), quote.full_update()));
        }

        if churn {
            quote.listed = false;
            return Some(FeedEvent::remove(quote.key.clone()));
        }

        quote.price = ((quote.price * (1.0 + step)) * 100.0).round() / 100.0;
        quote.price = quote.price.max(0.01);
        quote.volume += traded;

        let mut update = FieldUpdate::new()
            .with(Field::Price, quote.price)
            .with(Field::Volume, quote.volume)
            .with(Field::Movement, quote.movement())
            .with(Field::Bid, quote.price * (1.0 - SPREAD))
            .with(Field::Ask, quote.price * (1.0 + SPREAD))
            .with_timestamp(chrono::Utc::now().timestamp());

        if quote.price > quote.high {
            quote.high = quote.price;
            update.set(Field::High, quote.high);
        }
        if quote.price < quote.low {
            quote.low = quote.price;
            update.set(Field::Low, quote.low);
        }

        Some(FeedEvent::upsert(quote.key.clone(), update))
    }

    async fn publish(&self, sink: &FeedSink, event: FeedEvent) -> Result<(), FeedError> {
        self.state.increment_messages();
        sink.send(event).await
    }
}

#[async_trait]
impl FeedSource for SimulatedFeed {
    fn name(&self) -> &'static str {
        FEED_NAME
    }

    async fn run(self: Box<Self>, sink: FeedSink) -> Result<(), FeedError> {
        let mut this = self;
        this.state.set_state(ConnectionState::Connected);
        metrics::set_feed_connected(FEED_NAME, true);
        tracing::info!(
            symbols = this.quotes.len(),
            tick_ms = u64::try_from(this.tick_interval.as_millis()).unwrap_or(u64::MAX),
            churn = this.churn,
            "Simulated feed started"
        );

        let result = this.stream(&sink).await;

        this.state.set_state(ConnectionState::Closed);
        metrics::set_feed_connected(FEED_NAME, false);
        tracing::info!("Simulated feed stopped");

        match result {
            Ok(()) | Err(FeedError::SinkClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl SimulatedFeed {
    async fn stream(&mut self, sink: &FeedSink) -> Result<(), FeedError> {
        for event in self.initial_events() {
            self.publish(sink, event).await?;
        }
        self.state.set_synced(true);

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                () = sink.closed() => return Ok(()),
                _ = ticker.tick() => {
                    if let Some(event) = self.next_event() {
                        self.publish(sink, event).await?;
                    }
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

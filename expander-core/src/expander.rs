//! Text expander: owns the dictionary, accumulator, playback engine and the
//! queue of key events held back while playback runs.

use heapless::Deque;

use crate::accumulator::{Accumulator, TextSource, TriggerOutcome};
use crate::codec::{Codec, UsLayout};
use crate::dictionary::Dictionary;
use crate::engine::PlaybackEngine;
use crate::hal::{Duration, KeyOutput};
use crate::types::{ExpandResult, ExpanderConfig, ExpanderError, KeyEvent, UnicodeMode};

/// Default capacity of the candidate buffer
pub const DEFAULT_CODE_CAPACITY: usize = 32;
/// Default capacity of the pending-event queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Complete expander state, constructed once at startup.
///
/// `CODE` and `QUEUE` are the static capacities behind the runtime
/// `max_code_len` and `event_queue_depth` limits of [`ExpanderConfig`].
pub struct TextExpander<
    D: Dictionary,
    C: Codec = UsLayout,
    const CODE: usize = DEFAULT_CODE_CAPACITY,
    const QUEUE: usize = DEFAULT_QUEUE_CAPACITY,
> {
    dictionary: D,
    codec: C,
    config: ExpanderConfig,
    accumulator: Accumulator<CODE>,
    engine: PlaybackEngine,
    pending: Deque<KeyEvent, QUEUE>,
    dropped: u32,
    error: Option<ExpanderError>,
}

impl<D: Dictionary> TextExpander<D> {
    /// Expander with the US layout and default capacities
    pub fn with_defaults(dictionary: D, config: ExpanderConfig) -> Result<Self, &'static str> {
        Self::new(dictionary, UsLayout, config)
    }
}

impl<D: Dictionary, C: Codec, const CODE: usize, const QUEUE: usize> TextExpander<D, C, CODE, QUEUE> {
    /// Create an expander; the configuration must fit the static capacities
    pub fn new(dictionary: D, codec: C, config: ExpanderConfig) -> Result<Self, &'static str> {
        config.validate()?;
        if config.max_code_len > CODE {
            return Err("Max short code length exceeds buffer capacity");
        }
        if config.event_queue_depth > QUEUE {
            return Err("Event queue depth exceeds queue capacity");
        }

        #[cfg(feature = "defmt")]
        defmt::info!("Text expander initialized with {} expansions", dictionary.len());

        Ok(Self {
            engine: PlaybackEngine::new(&config),
            dictionary,
            codec,
            config,
            accumulator: Accumulator::new(),
            pending: Deque::new(),
            dropped: 0,
            error: None,
        })
    }

    pub fn config(&self) -> &ExpanderConfig {
        &self.config
    }

    pub fn dictionary(&self) -> &D {
        &self.dictionary
    }

    /// Mutable access for runtime inserts; only meaningful for mutable backends
    pub fn dictionary_mut(&mut self) -> &mut D {
        &mut self.dictionary
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Current candidate code
    pub fn buffer(&self) -> &str {
        self.accumulator.buffer()
    }

    pub fn unicode_mode(&self) -> UnicodeMode {
        self.engine.unicode_mode()
    }

    /// True when no expansion is in flight
    pub fn is_idle(&self) -> bool {
        self.engine.is_idle()
    }

    /// Key presses discarded because the pending queue was full
    pub fn dropped_events(&self) -> u32 {
        self.dropped
    }

    /// Key presses waiting for playback to finish
    pub fn queued_events(&self) -> usize {
        self.pending.len()
    }

    /// Failure that aborted the most recent expansion, cleared by reading it
    pub fn take_error(&mut self) -> Option<ExpanderError> {
        self.error.take()
    }

    /// Feed one key event.
    ///
    /// While playback is active, presses are queued (dropping the oldest when
    /// full) and processed once the engine is idle again. Presses left queued
    /// by a cancelled expansion are processed ahead of `event`. Returns the
    /// delay before the first playback step when an expansion started.
    pub fn handle_key_event<O: KeyOutput>(
        &mut self,
        event: KeyEvent,
        out: &mut O,
    ) -> Option<Duration> {
        if self.engine.is_idle() && self.pending.is_empty() {
            return self.process(event, out);
        }
        if event.pressed {
            self.enqueue(event);
        }
        if self.engine.is_idle() {
            return self.drain_pending(out);
        }
        None
    }

    /// Run one playback step; returns the delay before the next call, or
    /// `None` once playback is idle and the queue is drained.
    pub fn on_timer<O: KeyOutput>(&mut self, out: &mut O) -> Option<Duration> {
        if !self.engine.is_idle() {
            let text = source_text(self.engine.source(), &self.dictionary, &self.accumulator);
            if let Some(delay) = self.engine.step(text, out, &self.codec) {
                return Some(delay);
            }
            if let Some(error) = self.engine.take_error() {
                self.accumulator.forget_undo();
                self.error = Some(error);
            }
        }
        self.drain_pending(out)
    }

    /// Manual trigger: expand the buffer if it holds a known code
    pub fn try_expand<O: KeyOutput>(&mut self, out: &mut O) -> ExpandResult {
        match self
            .accumulator
            .trigger(&self.dictionary, &self.codec, &self.config)
        {
            TriggerOutcome::Play(request) => ExpandResult::Started(self.engine.start(request, out)),
            TriggerOutcome::NoMatch => ExpandResult::NoMatch,
            TriggerOutcome::Empty => ExpandResult::Idle,
        }
    }

    /// Stop the active expansion, releasing any key it holds.
    ///
    /// A partly typed expansion can no longer be undone.
    pub fn cancel_active_expansion<O: KeyOutput>(&mut self, out: &mut O) {
        if self.engine.is_idle() {
            return;
        }
        self.engine.cancel(out);
        self.accumulator.forget_undo();
    }

    fn process<O: KeyOutput>(&mut self, event: KeyEvent, out: &mut O) -> Option<Duration> {
        let request = self
            .accumulator
            .on_key(event, &self.dictionary, &self.codec, &self.config)?;
        Some(self.engine.start(request, out))
    }

    fn enqueue(&mut self, event: KeyEvent) {
        let depth = self.config.event_queue_depth.min(QUEUE);
        if self.pending.len() >= depth {
            let _dropped = self.pending.pop_front();
            self.dropped = self.dropped.saturating_add(1);
            #[cfg(feature = "defmt")]
            defmt::warn!("Event queue full, dropped {}", _dropped);
        }
        // The check above leaves room for one more event
        let _ = self.pending.push_back(event);
    }

    fn drain_pending<O: KeyOutput>(&mut self, out: &mut O) -> Option<Duration> {
        while let Some(event) = self.pending.pop_front() {
            if let Some(delay) = self.process(event, out) {
                return Some(delay);
            }
        }
        None
    }
}

fn source_text<'a, D: Dictionary, const N: usize>(
    source: TextSource,
    dictionary: &'a D,
    accumulator: &'a Accumulator<N>,
) -> &'a str {
    match source {
        TextSource::Dictionary(text) => dictionary.resolve(text),
        TextSource::UndoCode => accumulator.undo_code(),
        TextSource::Empty => "",
    }
}

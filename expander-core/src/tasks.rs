//! Embassy glue: a shared expander and the playback timer task

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use portable_atomic::{AtomicU32, Ordering};

use crate::codec::{Codec, UsLayout};
use crate::dictionary::Dictionary;
use crate::expander::{TextExpander, DEFAULT_CODE_CAPACITY, DEFAULT_QUEUE_CAPACITY};
use crate::hal::KeyOutput;
use crate::types::{ExpandResult, ExpanderError, KeyEvent};

/// Expander and its output sink, always locked together
pub struct ExpanderState<D: Dictionary, O, C: Codec, const CODE: usize, const QUEUE: usize> {
    pub expander: TextExpander<D, C, CODE, QUEUE>,
    pub output: O,
}

/// Expander shared between the key-event producer and the playback task
pub struct SharedExpander<
    D: Dictionary,
    O: KeyOutput,
    C: Codec = UsLayout,
    const CODE: usize = DEFAULT_CODE_CAPACITY,
    const QUEUE: usize = DEFAULT_QUEUE_CAPACITY,
> {
    state: Mutex<CriticalSectionRawMutex, ExpanderState<D, O, C, CODE, QUEUE>>,
    wake: Signal<CriticalSectionRawMutex, Duration>,
    contended: AtomicU32,
}

impl<D, O, C, const CODE: usize, const QUEUE: usize> SharedExpander<D, O, C, CODE, QUEUE>
where
    D: Dictionary,
    O: KeyOutput,
    C: Codec,
{
    pub const fn new(expander: TextExpander<D, C, CODE, QUEUE>, output: O) -> Self {
        Self {
            state: Mutex::new(ExpanderState { expander, output }),
            wake: Signal::new(),
            contended: AtomicU32::new(0),
        }
    }

    /// Feed a key event without waiting for the lock.
    ///
    /// Returns false when the lock was busy and the event was dropped.
    pub fn on_key_event(&self, event: KeyEvent) -> bool {
        let Ok(mut guard) = self.state.try_lock() else {
            self.contended.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "defmt")]
            defmt::debug!("Expander busy, dropping {}", event);
            return false;
        };
        let state = &mut *guard;
        if let Some(delay) = state.expander.handle_key_event(event, &mut state.output) {
            self.wake.signal(delay);
        }
        true
    }

    /// Manual trigger
    pub async fn try_expand(&self) -> ExpandResult {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let result = state.expander.try_expand(&mut state.output);
        if let ExpandResult::Started(delay) = result {
            self.wake.signal(delay);
        }
        result
    }

    pub async fn cancel(&self) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.expander.cancel_active_expansion(&mut state.output);
    }

    pub async fn is_idle(&self) -> bool {
        self.state.lock().await.expander.is_idle()
    }

    /// Events lost to lock contention plus events dropped from the full queue
    pub async fn dropped_events(&self) -> u32 {
        let queued = self.state.lock().await.expander.dropped_events();
        self.contended.load(Ordering::Relaxed).saturating_add(queued)
    }

    /// Failure that aborted the most recent expansion, cleared by reading it
    pub async fn take_error(&self) -> Option<ExpanderError> {
        self.state.lock().await.expander.take_error()
    }

    /// Run `f` with the locked state, e.g. to insert entries at startup
    pub async fn with_state<R>(
        &self,
        f: impl FnOnce(&mut ExpanderState<D, O, C, CODE, QUEUE>) -> R,
    ) -> R {
        let mut guard = self.state.lock().await;
        f(&mut guard)
    }
}

/// Playback timer task; the only place engine steps run
pub async fn playback_task<D, O, C, const CODE: usize, const QUEUE: usize>(
    shared: &SharedExpander<D, O, C, CODE, QUEUE>,
) -> !
where
    D: Dictionary,
    O: KeyOutput,
    C: Codec,
{
    loop {
        let mut delay = shared.wake.wait().await;
        loop {
            Timer::after(delay).await;
            let next = {
                let mut guard = shared.state.lock().await;
                let state = &mut *guard;
                state.expander.on_timer(&mut state.output)
            };
            match next {
                Some(next) => delay = next,
                None => break,
            }
        }
        #[cfg(feature = "defmt")]
        defmt::trace!("Playback idle");
    }
}

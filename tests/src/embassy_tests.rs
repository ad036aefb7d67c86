//! SharedExpander and the playback task on the embassy std time driver
//!
//! These run in real time: the playback task sleeps on `embassy_time::Timer`.

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use expander_core::codec::keys;
    use expander_core::dictionary::Entry;
    use expander_core::tasks::{playback_task, SharedExpander};
    use expander_core::test_utils::RecordingOutput;
    use expander_core::{ExpandResult, ExpanderConfig, ExpanderError, KeyEvent};

    use crate::support::{keys_for, pool_expander, screen, Trie};

    type Shared = SharedExpander<Trie, RecordingOutput>;

    fn shared(entries: &[Entry<'_>], config: ExpanderConfig) -> Shared {
        SharedExpander::new(pool_expander(entries, config), RecordingOutput::new())
    }

    async fn wait_idle(shared: &Shared) {
        let idle = async {
            while !shared.is_idle().await {
                tokio::time::sleep(StdDuration::from_millis(2)).await;
            }
        };
        tokio::time::timeout(StdDuration::from_secs(5), idle)
            .await
            .expect("playback should finish");
    }

    #[tokio::test]
    async fn test_playback_task_types_expansion() {
        println!("\n=== Playback Task ===");
        let shared = shared(&[Entry::new("brb", "be right back")], ExpanderConfig::default());

        for key in keys_for("brb") {
            assert!(shared.on_key_event(KeyEvent::press(key)));
            assert!(shared.on_key_event(KeyEvent::release(key)));
        }

        tokio::select! {
            _ = playback_task(&shared) => unreachable!(),
            _ = async {
                assert!(matches!(shared.try_expand().await, ExpandResult::Started(_)));
                wait_idle(&shared).await;
            } => {}
        }

        let text = shared.with_state(|state| screen(state.output.events())).await;
        assert_eq!(text, "be right back");
        assert_eq!(shared.dropped_events().await, 0);
        println!("✓ Expansion typed by the timer task");
    }

    #[tokio::test]
    async fn test_auto_expand_from_producer_wakes_task() {
        let mut config = ExpanderConfig::default();
        let _ = config.auto_expand_keys.push(keys::DOT);
        let shared = shared(
            &[Entry::new("ty", "thank you"), Entry::new("np", "no problem")],
            config,
        );

        tokio::select! {
            _ = playback_task(&shared) => unreachable!(),
            _ = async {
                for key in keys_for("ty.np.") {
                    assert!(shared.on_key_event(KeyEvent::press(key)));
                    tokio::time::sleep(StdDuration::from_millis(1)).await;
                }
                // The second code was queued behind the first expansion
                wait_idle(&shared).await;
            } => {}
        }

        let (backspaces, queued) = shared
            .with_state(|state| {
                (
                    state.output.press_count(keys::BACKSPACE),
                    state.expander.queued_events(),
                )
            })
            .await;
        assert_eq!(backspaces, 6);
        assert_eq!(queued, 0);
    }

    #[tokio::test]
    async fn test_contended_event_is_dropped_and_counted() {
        let shared = shared(&[Entry::new("brb", "be right back")], ExpanderConfig::default());

        let accepted = shared
            .with_state(|_| shared.on_key_event(KeyEvent::press(keys::B)))
            .await;
        assert!(!accepted);
        assert_eq!(shared.dropped_events().await, 1);
        assert_eq!(shared.with_state(|state| state.expander.buffer().len()).await, 0);
    }

    #[tokio::test]
    async fn test_cancel_releases_keys() {
        let shared = shared(&[Entry::new("brb", "be right back")], ExpanderConfig::default());
        for key in keys_for("brb") {
            shared.on_key_event(KeyEvent::press(key));
        }

        tokio::select! {
            _ = playback_task(&shared) => unreachable!(),
            _ = async {
                shared.try_expand().await;
                tokio::time::sleep(StdDuration::from_millis(25)).await;
                shared.cancel().await;
            } => {}
        }

        assert!(shared.is_idle().await);
        let held = shared.with_state(|state| state.output.held_keys()).await;
        assert!(held.is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_is_reported_through_shared_state() {
        let expander = pool_expander(&[Entry::new("brb", "be right back")], ExpanderConfig::default());
        let shared: Shared = SharedExpander::new(expander, RecordingOutput::new().fail_on(keys::T, true));
        for key in keys_for("brb") {
            shared.on_key_event(KeyEvent::press(key));
        }

        tokio::select! {
            _ = playback_task(&shared) => unreachable!(),
            _ = async {
                shared.try_expand().await;
                wait_idle(&shared).await;
            } => {}
        }

        assert_eq!(shared.take_error().await, Some(ExpanderError::KeySendFailure));
        assert_eq!(shared.take_error().await, None);
        let text = shared.with_state(|state| screen(state.output.events())).await;
        assert_eq!(text, "be righ");
    }
}

//! Playback timing on a paused tokio clock
//!
//! Every delay returned by the expander is slept on tokio's timer, the same
//! way the embassy playback task sleeps on `Timer::after`.

#[cfg(test)]
mod tests {
    use expander_core::codec::keys;
    use expander_core::dictionary::Entry;
    use expander_core::{ExpandResult, ExpanderConfig, KeyEvent};

    use crate::support::{keys_for, play, pool_expander, screen, TimedOutput};

    /// Typing delay D=10ms: each backspace and character takes one D, the
    /// first step waits D and the switch from deleting to typing waits D.
    #[tokio::test(start_paused = true)]
    async fn test_brb_timeline() {
        println!("\n=== brb Playback Timeline ===");
        let mut exp = pool_expander(&[Entry::new("brb", "be right back")], ExpanderConfig::default());
        let mut out = TimedOutput::new();

        for key in keys_for("brb") {
            exp.handle_key_event(KeyEvent::press(key), &mut out);
        }
        let ExpandResult::Started(first) = exp.try_expand(&mut out) else {
            panic!("brb should expand");
        };
        play(&mut exp, Some(first), &mut out).await;

        assert_eq!(out.presses_of(keys::BACKSPACE), vec![10, 20, 30]);

        let typed: Vec<u64> = out
            .stamped()
            .iter()
            .filter(|s| s.pressed && s.key != keys::BACKSPACE)
            .map(|s| s.at_ms)
            .collect();
        let expected: Vec<u64> = (0..13).map(|i| 50 + 10 * i).collect();
        assert_eq!(typed, expected);

        // Every release lands half a delay after its press
        for pair in out.stamped().chunks(2) {
            assert_eq!(pair[0].key, pair[1].key);
            assert!(pair[0].pressed && !pair[1].pressed);
            assert_eq!(pair[1].at_ms - pair[0].at_ms, 5);
        }

        assert_eq!(out.elapsed_ms(), 180);
        assert_eq!(screen(&out.transitions()), "be right back");
        println!("✓ 3 backspaces + 13 characters in {}ms", out.elapsed_ms());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sixty_ms_suffix_timeline() {
        println!("\n=== 60ms Delay, Suffix Only ===");
        let config = ExpanderConfig::new(60, 16, 256, 64, 16).unwrap();
        let mut exp = pool_expander(&[Entry::new("exp", "expanded")], config);
        let mut out = TimedOutput::new();

        for key in keys_for("exp") {
            exp.handle_key_event(KeyEvent::press(key), &mut out);
        }
        let ExpandResult::Started(first) = exp.try_expand(&mut out) else {
            panic!("exp should expand");
        };
        play(&mut exp, Some(first), &mut out).await;

        let presses: Vec<u64> = out
            .stamped()
            .iter()
            .filter(|s| s.pressed)
            .map(|s| s.at_ms)
            .collect();
        assert_eq!(presses, vec![60, 120, 180, 240, 300]);
        assert_eq!(out.presses_of(keys::BACKSPACE), Vec::<u64>::new());
        assert_eq!(out.elapsed_ms(), 360);
        assert_eq!(screen(&out.transitions()), "anded");
        println!("✓ 'anded' typed at 60ms intervals");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shift_held_only_for_shifted_characters() {
        let mut exp = pool_expander(&[Entry::new("gm", "Good morning")], ExpanderConfig::default());
        let mut out = TimedOutput::new();

        for key in keys_for("gm") {
            exp.handle_key_event(KeyEvent::press(key), &mut out);
        }
        let ExpandResult::Started(first) = exp.try_expand(&mut out) else {
            panic!("gm should expand");
        };
        play(&mut exp, Some(first), &mut out).await;

        // Shift goes down with G and comes up as o is pressed
        assert_eq!(out.presses_of(keys::LEFT_SHIFT), vec![40]);
        assert_eq!(out.presses_of(keys::G)[0], 40);
        let shift_up = out
            .stamped()
            .iter()
            .find(|s| s.key == keys::LEFT_SHIFT && !s.pressed)
            .map(|s| s.at_ms);
        assert_eq!(shift_up, Some(50));
        assert_eq!(screen(&out.transitions()), "Good morning");
    }

    /// Unicode entry on Linux: mods, U, hex digits, mods up, Enter
    #[tokio::test(start_paused = true)]
    async fn test_linux_unicode_sequence_timing() {
        let mut exp = pool_expander(&[Entry::new("deg", "{{u:b0}}")], ExpanderConfig::default());
        let mut out = TimedOutput::new();

        for key in keys_for("deg") {
            exp.handle_key_event(KeyEvent::press(key), &mut out);
        }
        let ExpandResult::Started(first) = exp.try_expand(&mut out) else {
            panic!("deg should expand");
        };
        play(&mut exp, Some(first), &mut out).await;

        let sequence = out.transitions();
        let tail = &sequence[6..];
        assert_eq!(
            tail,
            &[
                (keys::LEFT_CTRL, true),
                (keys::LEFT_SHIFT, true),
                (keys::U, true),
                (keys::U, false),
                (keys::B, true),
                (keys::B, false),
                (keys::N0, true),
                (keys::N0, false),
                (keys::LEFT_SHIFT, false),
                (keys::LEFT_CTRL, false),
                (keys::ENTER, true),
                (keys::ENTER, false),
            ]
        );

        // Command and modifier steps wait a full delay, digits half of one
        let at = |key, pressed| {
            out.stamped()
                .iter()
                .find(|s| s.key == key && s.pressed == pressed)
                .map(|s| s.at_ms)
                .unwrap()
        };
        assert_eq!(at(keys::U, true) - at(keys::LEFT_CTRL, true), 10);
        assert_eq!(at(keys::U, false) - at(keys::U, true), 10);
        assert_eq!(at(keys::B, false) - at(keys::B, true), 5);
        assert!(out.stamped().iter().all(|s| s.key != keys::LEFT_ALT));
        assert!(exp.is_idle());
    }

    /// Presses arriving mid-playback wait for it and are replayed in order
    #[tokio::test(start_paused = true)]
    async fn test_events_during_playback_are_deferred() {
        println!("\n=== Deferred Key Events ===");
        let mut config = ExpanderConfig::default();
        let _ = config.auto_expand_keys.push(keys::DOT);
        let mut exp = pool_expander(
            &[Entry::new("brb", "be right back"), Entry::new("ty", "thank you")],
            config,
        );
        let mut out = TimedOutput::new();

        for key in keys_for("brb") {
            exp.handle_key_event(KeyEvent::press(key), &mut out);
        }
        let first = exp.handle_key_event(KeyEvent::press(keys::DOT), &mut out);
        assert!(first.is_some());

        // Typed while "be right back" is still playing
        for key in keys_for("ty.") {
            assert_eq!(exp.handle_key_event(KeyEvent::press(key), &mut out), None);
            exp.handle_key_event(KeyEvent::release(key), &mut out);
        }
        assert_eq!(exp.queued_events(), 3);

        play(&mut exp, first, &mut out).await;

        assert!(exp.is_idle());
        assert_eq!(exp.queued_events(), 0);
        assert_eq!(exp.dropped_events(), 0);
        // Each trigger deletes its code plus the dot that reached the host
        assert_eq!(out.presses_of(keys::BACKSPACE).len(), 4 + 3);
        println!("✓ Second expansion ran after {}ms", out.elapsed_ms());
    }
}

//! Typing scenarios as seen by the host
//!
//! Keys typed by the user are echoed to the recording sink before the
//! expander sees them, so the sink holds everything that reached the screen.

#[cfg(test)]
mod tests {
    use expander_core::codec::keys;
    use expander_core::dictionary::Entry;
    use expander_core::test_utils::{run_to_idle, tap_keys, RecordingOutput};
    use expander_core::{
        Duration, ExpandResult, ExpanderConfig, KeyCode, KeyEvent, KeyOutput, TextExpander,
        UnicodeMode,
    };
    use rstest::rstest;

    use crate::support::{keys_for, pool_expander, screen, Trie};

    /// Type `text` as the user would; returns the delay of an expansion it started
    fn type_echoed(
        exp: &mut TextExpander<Trie>,
        out: &mut RecordingOutput,
        text: &str,
    ) -> Option<Duration> {
        let mut started = None;
        for key in keys_for(text) {
            out.send_key(key, true).unwrap();
            out.send_key(key, false).unwrap();
            if let Some(delay) = exp.handle_key_event(KeyEvent::press(key), out) {
                started = Some(delay);
            }
            exp.handle_key_event(KeyEvent::release(key), out);
        }
        started
    }

    fn auto_expand_config(trigger: KeyCode) -> ExpanderConfig {
        let mut config = ExpanderConfig::default();
        let _ = config.auto_expand_keys.push(trigger);
        config
    }

    #[rstest]
    #[case::replaced("brb", "be right back", 3)]
    #[case::suffix_only("exp", "expanded", 0)]
    #[case::shifted("gm", "Good morning", 2)]
    #[case::symbols("em", "me@example.com", 2)]
    fn test_manual_trigger(#[case] code: &str, #[case] text: &str, #[case] backspaces: usize) {
        let mut exp = pool_expander(&[Entry::new(code, text)], ExpanderConfig::default());
        let mut out = RecordingOutput::new();

        assert_eq!(type_echoed(&mut exp, &mut out, code), None);
        let ExpandResult::Started(first) = exp.try_expand(&mut out) else {
            panic!("{code} should expand");
        };
        run_to_idle(&mut exp, Some(first), &mut out);

        assert_eq!(out.press_count(keys::BACKSPACE), backspaces);
        assert_eq!(screen(out.events()), text);
        assert!(out.held_keys().is_empty());
    }

    #[rstest]
    #[case::dropped(false, false, "be right back")]
    #[case::entry_flag(true, false, "be right back.")]
    #[case::global_policy(false, true, "be right back.")]
    fn test_auto_expand_trigger(
        #[case] entry_flag: bool,
        #[case] global: bool,
        #[case] expected: &str,
    ) {
        let mut config = auto_expand_config(keys::DOT);
        config.preserve_trigger = global;
        let entry = Entry::new("brb", "be right back");
        let entry = if entry_flag { entry.preserving_trigger() } else { entry };
        let mut exp = pool_expander(&[entry], config);
        let mut out = RecordingOutput::new();

        let first = type_echoed(&mut exp, &mut out, "brb.");
        assert!(first.is_some());
        run_to_idle(&mut exp, first, &mut out);

        // The code and the trigger that reached the host
        assert_eq!(out.press_count(keys::BACKSPACE), 4);
        assert_eq!(screen(out.events()), expected);
    }

    #[rstest]
    #[case::space_resets("x brb", false, true, true)]
    #[case::junk_prefix("xbrb", false, true, false)]
    #[case::aggressive_drops_junk("xbrb", true, true, true)]
    #[case::enter_resets("br\nb", false, true, false)]
    #[case::enter_ignored("br\nb", false, false, true)]
    #[case::backspace_edits("brx\u{8}b", false, true, true)]
    fn test_buffer_reset_rules(
        #[case] typed: &str,
        #[case] aggressive: bool,
        #[case] reset_on_enter: bool,
        #[case] expands: bool,
    ) {
        let mut config = ExpanderConfig::default();
        config.aggressive_reset = aggressive;
        config.reset_on_enter = reset_on_enter;
        let mut exp = pool_expander(&[Entry::new("brb", "be right back")], config);
        let mut out = RecordingOutput::new();

        type_echoed(&mut exp, &mut out, typed);
        let result = exp.try_expand(&mut out);
        assert_eq!(matches!(result, ExpandResult::Started(_)), expands, "{typed:?}: {result:?}");
    }

    #[rstest]
    #[case::linux(
        "{{u:1f600}}",
        UnicodeMode::Linux,
        vec![keys::LEFT_CTRL, keys::LEFT_SHIFT, keys::U, keys::N1, keys::F, keys::N6, keys::N0, keys::N0, keys::ENTER]
    )]
    #[case::windows(
        "{{cmd:win}}{{u:1f600}}",
        UnicodeMode::Windows,
        vec![keys::LEFT_ALT, keys::KP1, keys::KP2, keys::KP8, keys::KP5, keys::KP1, keys::KP2]
    )]
    #[case::macos(
        "{{cmd:mac}}{{u:e9}}",
        UnicodeMode::MacOs,
        vec![keys::LEFT_ALT, keys::N0, keys::N0, keys::E, keys::N9]
    )]
    fn test_unicode_entry(
        #[case] text: &str,
        #[case] mode: UnicodeMode,
        #[case] expected: Vec<KeyCode>,
    ) {
        let mut exp = pool_expander(&[Entry::new("smile", text)], ExpanderConfig::default());
        let mut out = RecordingOutput::new();

        tap_keys(&mut exp, &keys_for("smile"), &mut out);
        let ExpandResult::Started(first) = exp.try_expand(&mut out) else {
            panic!("smile should expand");
        };
        run_to_idle(&mut exp, Some(first), &mut out);

        let pressed: Vec<KeyCode> = out
            .events()
            .iter()
            .filter(|&&(key, pressed)| pressed && key != keys::BACKSPACE)
            .map(|&(key, _)| key)
            .collect();
        assert_eq!(pressed, expected);
        assert!(out.held_keys().is_empty());
        assert_eq!(exp.unicode_mode(), mode);
    }

    #[rstest]
    #[case::retyped("brb", "be right back", false)]
    #[case::retyped_with_trigger("brb", "be right back", true)]
    #[case::suffix("exp", "expanded", false)]
    #[case::suffix_with_trigger("exp", "expanded", true)]
    fn test_undo_restores_code(#[case] code: &str, #[case] text: &str, #[case] preserve: bool) {
        let mut config = auto_expand_config(keys::DOT);
        config.undo_key = Some(keys::ESCAPE);
        config.preserve_trigger = preserve;
        let mut exp = pool_expander(&[Entry::new(code, text)], config);
        let mut out = RecordingOutput::new();

        let first = type_echoed(&mut exp, &mut out, &format!("{code}."));
        run_to_idle(&mut exp, first, &mut out);
        let expanded = if preserve { format!("{text}.") } else { text.to_string() };
        assert_eq!(screen(out.events()), expanded);

        let undo = exp.handle_key_event(KeyEvent::press(keys::ESCAPE), &mut out);
        assert!(undo.is_some());
        run_to_idle(&mut exp, undo, &mut out);

        assert_eq!(screen(out.events()), code);
        assert_eq!(exp.buffer(), code);
        assert!(exp.is_idle());
    }

    /// A full queue keeps the newest presses
    #[rstest]
    #[case(1, "b")]
    #[case(2, "rb")]
    #[case(4, "xbrb")]
    fn test_queue_keeps_newest(#[case] depth: usize, #[case] survivors: &str) {
        let mut config = auto_expand_config(keys::DOT);
        config.event_queue_depth = depth;
        let mut exp = pool_expander(&[Entry::new("ty", "thank you")], config);
        let mut out = RecordingOutput::new();

        let first = tap_keys(&mut exp, &keys_for("ty."), &mut out);
        assert!(first.is_some());
        tap_keys(&mut exp, &keys_for("xbrb"), &mut out);
        assert_eq!(exp.queued_events(), depth);
        assert_eq!(exp.dropped_events() as usize, 4 - depth);

        run_to_idle(&mut exp, first, &mut out);
        assert_eq!(exp.buffer(), survivors);
    }
}

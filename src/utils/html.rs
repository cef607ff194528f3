// src/utils/html.rs

/// Sanitizes examiner-authored rich text before it is stored.
///
/// Formatting tags such as `<b>` and `<code>` survive; scripts, iframes and
/// event-handler attributes are removed. Question and answer text is later
/// rendered to participants, so it goes through here on every write.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}

// src/utils/html.rs

/// Whitelist sanitization for author-supplied text (quiz titles, question
/// and option content). Safe inline tags survive; `<script>` and event
/// handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Sanitizes an optional field, keeping `None` as `None`.
pub fn clean_opt(input: Option<&str>) -> Option<String> {
    input.map(clean_html)
}

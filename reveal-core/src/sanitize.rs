/// Trim, HTML-escape, and truncate to `max_chars`. Used by the Chat Engine
/// for both the message body and the chat display name (spec §4.G step 3)
/// — a blank chat name is left blank, only the vote path defaults it.
pub fn clean(raw: &str, max_chars: usize) -> String {
	let trimmed = raw.trim();
	let truncated: String = trimmed.chars().take(max_chars).collect();
	html_escape::encode_text(&truncated).into_owned()
}

/// Same as `clean`, but empty/whitespace-only names default to "Guest".
/// Applies only to the Vote Engine's display-name handling (spec §8
/// boundary behavior); the chat path leaves a blank name blank.
pub fn clean_voter_name(raw: &str, max_chars: usize) -> String {
	let cleaned = clean(raw, max_chars);
	if cleaned.is_empty() {
		"Guest".to_string()
	} else {
		cleaned
	}
}

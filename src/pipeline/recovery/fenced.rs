//! Fenced-block extraction — pulls JSON out of Markdown code fences.
//!
//! Models frequently wrap output in ```` ```json ```` fences, and truncated
//! responses often lose the closing fence, so an unterminated block is
//! still extracted.

/// Extract the contents of the first fenced code block whose body starts
/// with an opening brace. A language-tagged ```` ```json ```` fence is
/// preferred over a generic one; an unterminated fence yields everything
/// after the opening tag.
pub fn extract_fenced_block(text: &str) -> Option<&str> {
    fenced_contents(text, "```json").or_else(|| fenced_contents(text, "```"))
}

fn fenced_contents<'a>(text: &'a str, fence: &str) -> Option<&'a str> {
    let tag_start = text.find(fence)?;
    let body_start = tag_start + fence.len();

    // Skip the remainder of the fence line (a generic fence may still
    // carry a language tag we did not match on).
    let body = &text[body_start..];
    let body = match body.find('\n') {
        Some(newline) => &body[newline + 1..],
        None => body,
    };

    let contents = match body.find("```") {
        Some(end) => &body[..end],
        None => body, // unterminated fence — truncated response
    };

    let trimmed = contents.trim();
    if trimmed.starts_with('{') {
        Some(trimmed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_tagged_block() {
        let text = "Here it is:\n```json\n{\"a\": 1}\n```\nDone.";
        assert_eq!(extract_fenced_block(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn extracts_generic_block() {
        let text = "```\n{\"b\": 2}\n```";
        assert_eq!(extract_fenced_block(text), Some("{\"b\": 2}"));
    }

    #[test]
    fn prefers_tagged_block_over_generic() {
        let text = "```\nnot json\n```\n```json\n{\"tagged\": true}\n```";
        assert_eq!(extract_fenced_block(text), Some("{\"tagged\": true}"));
    }

    #[test]
    fn unterminated_block_is_still_extracted() {
        let text = "```json\n{\"a\": 1, \"b\": 2}";
        assert_eq!(extract_fenced_block(text), Some("{\"a\": 1, \"b\": 2}"));
    }

    #[test]
    fn block_not_starting_with_brace_is_rejected() {
        let text = "```json\n[1, 2, 3]\n```";
        assert_eq!(extract_fenced_block(text), None);
    }

    #[test]
    fn no_fence_returns_none() {
        assert_eq!(extract_fenced_block("{\"a\": 1}"), None);
    }
}

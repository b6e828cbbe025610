/// Strips a leading markdown code fence (```yaml, ```text, bare ```) and
/// its closing fence, keeping the trimmed inner content. Strings that do
/// not open with a fence are returned trimmed and otherwise unmodified.
pub fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();

    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    // The opening fence line may carry a language hint ("```yaml").
    // A fence with no newline has no inner content to recover.
    let Some(newline) = after_open.find('\n') else {
        return trimmed.to_string();
    };

    let inner = after_open[newline + 1..].trim_end();
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::strip_code_fence;

    #[test]
    fn yaml_fence_is_stripped() {
        assert_eq!(strip_code_fence("```yaml\nfoo: bar\n```"), "foo: bar");
    }

    #[test]
    fn unlabeled_fence_is_stripped() {
        assert_eq!(strip_code_fence("```\nplain text\n```"), "plain text");
    }

    #[test]
    fn unfenced_text_is_trimmed_only() {
        assert_eq!(strip_code_fence("  hello world \n"), "hello world");
    }

    #[test]
    fn unterminated_fence_keeps_inner_content() {
        assert_eq!(strip_code_fence("```text\nleft open"), "left open");
    }

    #[test]
    fn fence_without_newline_is_left_alone() {
        assert_eq!(strip_code_fence("```inline```"), "```inline```");
    }

    #[test]
    fn multiline_inner_content_survives() {
        let fenced = "```yaml\nscene: dusk\nstyle: noir\n```";
        assert_eq!(strip_code_fence(fenced), "scene: dusk\nstyle: noir");
    }
}

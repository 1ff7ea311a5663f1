use crate::dispatch::ActionResult;

/// Local text cleanup, no network involved: trims each line, drops blank
/// lines and collapses runs of spaces.
pub fn format_text(text: &str) -> ActionResult {
    let mut result = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    while result.contains("  ") {
        result = result.replace("  ", " ");
    }

    ActionResult {
        text: result,
        kind: "local_format".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_blank_lines_and_spaces() {
        let input = "  first   line  \n\n\n   second line\n   \n third";
        let result = format_text(input);
        assert_eq!(result.text, "first line\nsecond line\nthird");
        assert_eq!(result.kind, "local_format");
    }

    #[test]
    fn single_line_is_trimmed() {
        assert_eq!(format_text("   hello    world   ").text, "hello world");
    }
}

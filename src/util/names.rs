/// Characters that can never appear in a file or folder name on any platform
/// we write boards for.
const INVALID_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Strip characters that are invalid in a file name.
/// Falls back to `fallback` when nothing printable is left.
pub fn sanitize_name(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !INVALID_NAME_CHARS.contains(c))
        .collect();
    if cleaned.trim().is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

/// Pick `base`, or `base (n)` with the smallest n >= 1, so that the result
/// does not collide case-insensitively with any name in `existing`.
///
/// A name equal to `exclude` never counts as a collision, which lets an
/// entity keep its own name on rename.
pub fn unique_name<'a, I>(existing: I, base: &str, exclude: Option<&str>) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: Vec<String> = existing
        .into_iter()
        .filter(|n| match exclude {
            Some(ex) => !n.eq_ignore_ascii_case(ex),
            None => true,
        })
        .map(|n| n.to_lowercase())
        .collect();

    if !taken.contains(&base.to_lowercase()) {
        return base.to_string();
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{} ({})", base, counter);
        if !taken.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        counter += 1;
    }
}

/// `stem-n.ext` (or `stem-n` without an extension).
pub fn numbered_file_name(stem: &str, extension: Option<&str>, n: usize) -> String {
    match extension {
        Some(ext) if !ext.is_empty() => format!("{}-{}.{}", stem, n, ext),
        _ => format!("{}-{}", stem, n),
    }
}

/// Dot-prefixed names are hidden on every platform.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_invalid_chars() {
        assert_eq!(sanitize_name("a/b:c?", "untitled"), "abc");
        assert_eq!(sanitize_name("Fix \"bug\" <now>", "untitled"), "Fix bug now");
    }

    #[test]
    fn sanitize_falls_back_when_empty() {
        assert_eq!(sanitize_name("///", "untitled"), "untitled");
        assert_eq!(sanitize_name("   ", "Group"), "Group");
        assert_eq!(sanitize_name("", "New Column"), "New Column");
    }

    #[test]
    fn unique_name_counts_up_from_one() {
        let existing = ["Todo"];
        assert_eq!(unique_name(existing, "Todo", None), "Todo (1)");
        let existing = ["Todo", "todo (1)"];
        assert_eq!(unique_name(existing, "Todo", None), "Todo (2)");
        assert_eq!(unique_name(["Done"], "Todo", None), "Todo");
    }

    #[test]
    fn unique_name_is_case_insensitive() {
        assert_eq!(unique_name(["URGENT"], "urgent", None), "urgent (1)");
    }

    #[test]
    fn unique_name_ignores_excluded() {
        assert_eq!(unique_name(["Todo", "Done"], "todo", Some("Todo")), "todo");
    }

    #[test]
    fn numbered_names() {
        assert_eq!(numbered_file_name("note", Some("md"), 2), "note-2.md");
        assert_eq!(numbered_file_name("Makefile", None, 1), "Makefile-1");
    }
}

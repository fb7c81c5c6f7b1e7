use glob_match::glob_match;

/// 判斷此次提交是否應跳過整個流水線
///
/// Skips when the message carries a marker (case-insensitive), or when there
/// is at least one changed path and every one of them is ignored. An empty
/// change list never skips.
pub fn skip_reason(
    message: &str,
    changed_paths: &[String],
    markers: &[String],
    ignore_patterns: &[String],
) -> Option<String> {
    let lowered = message.to_lowercase();
    if let Some(marker) = markers
        .iter()
        .find(|m| !m.is_empty() && lowered.contains(&m.to_lowercase()))
    {
        return Some(format!("commit message contains '{}'", marker));
    }

    if !changed_paths.is_empty()
        && changed_paths
            .iter()
            .all(|path| is_ignored(path, ignore_patterns))
    {
        return Some(format!(
            "all {} changed path(s) match ignore patterns",
            changed_paths.len()
        ));
    }

    None
}

/// Patterns without a `/` also match against the file name, so `*.md`
/// covers `docs/guide/setup.md`.
pub fn is_ignored(path: &str, patterns: &[String]) -> bool {
    let path = path.trim_start_matches("./");
    let file_name = path.rsplit('/').next().unwrap_or(path);

    patterns.iter().any(|pattern| {
        glob_match(pattern, path) || (!pattern.contains('/') && glob_match(pattern, file_name))
    })
}

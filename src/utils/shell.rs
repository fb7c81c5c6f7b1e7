/// Quote a single argument for `sh -c`.
/// Plain words pass through untouched, anything with shell metacharacters
/// is wrapped in single quotes with embedded quotes escaped.
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", arg.replace('\'', "'\\''"))
}

/// Quote a `--flag=value` pair, quoting only the value side.
pub fn flag(name: &str, value: &str) -> String {
    format!("--{}={}", name, quote_arg(value))
}

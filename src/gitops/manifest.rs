use crate::utils::error::{Result, ShipError};
use std::path::Path;

/// `KEY=VALUE` 形式的映像清單檔，例如 `BACKEND_IMAGE=registry/backend:sha`
///
/// Comments, blank lines, line order and line endings are preserved on
/// render. Only entries whose value changed are rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageManifest {
    lines: Vec<Line>,
    line_ending: &'static str,
    trailing_newline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Entry {
        key: String,
        value: String,
        /// 未修改時原樣輸出
        raw: Option<String>,
    },
    Verbatim(String),
}

impl ImageManifest {
    pub fn parse(content: &str) -> Self {
        let lines = content
            .lines()
            .map(|raw| {
                let trimmed = raw.trim_start();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    return Line::Verbatim(raw.to_string());
                }
                match raw.split_once('=') {
                    Some((key, value)) if !key.trim().is_empty() => Line::Entry {
                        key: key.trim().to_string(),
                        value: value.trim().to_string(),
                        raw: Some(raw.to_string()),
                    },
                    _ => Line::Verbatim(raw.to_string()),
                }
            })
            .collect();

        Self {
            lines,
            line_ending: if content.contains("\r\n") { "\r\n" } else { "\n" },
            trailing_newline: content.is_empty() || content.ends_with('\n'),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Entry { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Returns `true` when the stored value changed. Absent keys are appended.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        for line in &mut self.lines {
            if let Line::Entry {
                key: k,
                value: v,
                raw,
            } = line
            {
                if k == key {
                    if v == value {
                        return false;
                    }
                    *v = value.to_string();
                    *raw = None;
                    return true;
                }
            }
        }

        self.lines.push(Line::Entry {
            key: key.to_string(),
            value: value.to_string(),
            raw: None,
        });
        true
    }

    pub fn render(&self) -> String {
        let mut out = self
            .lines
            .iter()
            .map(|line| match line {
                Line::Entry {
                    raw: Some(raw), ..
                } => raw.clone(),
                Line::Entry { key, value, .. } => format!("{}={}", key, value),
                Line::Verbatim(raw) => raw.clone(),
            })
            .collect::<Vec<_>>()
            .join(self.line_ending);
        if self.trailing_newline && !out.is_empty() {
            out.push_str(self.line_ending);
        }
        out
    }
}

pub fn read_manifest(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| ShipError::ManifestError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// `backend` -> `BACKEND_IMAGE`, `web-ui` -> `WEB_UI_IMAGE`
pub fn image_key(service: &str) -> String {
    let normalized: String = service
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_IMAGE", normalized)
}

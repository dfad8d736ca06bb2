//! Local file browser — read-only access under configured allowed roots.
//!
//! Code does traversal (mechanical), the model does matching (decision):
//! `list_dir` shows one level at a time so the model decides where to
//! drill down; `search` does the recursive walk so the model only judges
//! results. Every result is bounded to keep rounds small.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::Tool;

const MAX_READ_CHARS: usize = 10_000;
const MAX_LIST_ENTRIES: usize = 100;
const MAX_SEARCH_RESULTS: usize = 50;

/// Directories that clutter results and are never what the user wants.
const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "target",
    ".cache",
];

pub struct LocalFilesTool {
    allowed_roots: Vec<PathBuf>,
}

impl LocalFilesTool {
    pub fn new(allowed_paths: &[String]) -> Self {
        let allowed_roots = allowed_paths
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| PathBuf::from(p.trim()))
            .collect();
        Self { allowed_roots }
    }

    /// Check the canonicalized path is within an allowed root (blocks
    /// `..` escapes and symlink tricks).
    fn is_allowed(&self, path: &Path) -> bool {
        let Ok(resolved) = path.canonicalize() else {
            return false;
        };
        self.allowed_roots.iter().any(|root| {
            root.canonicalize()
                .map(|r| resolved.starts_with(r))
                .unwrap_or(false)
        })
    }

    fn search(&self, path: &Path, query: &str) -> String {
        if query.is_empty() {
            return "Error: 'query' parameter is required for search action".into();
        }
        if !path.is_dir() {
            return format!("Error: '{}' is not a directory", path.display());
        }

        let query_lower = query.to_lowercase();
        let mut matches = Vec::new();
        walk(path, &mut |entry, is_dir| {
            if matches.len() >= MAX_SEARCH_RESULTS {
                return false;
            }
            let name = entry
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if name.contains(&query_lower) {
                let kind = if is_dir { "dir" } else { "file" };
                matches.push(format!("[{}] {}", kind, entry.display()));
            }
            true
        });

        if matches.is_empty() {
            return format!(
                "No files matching '{}' found under '{}'",
                query,
                path.display()
            );
        }

        let truncated = matches.len() >= MAX_SEARCH_RESULTS;
        let mut result = matches.join("\n");
        if truncated {
            result.push_str(&format!(
                "\n\n... (showing first {} matches, there may be more)",
                MAX_SEARCH_RESULTS
            ));
        }
        result
    }

    fn list_dir(&self, path: &Path) -> String {
        if !path.is_dir() {
            return format!("Error: '{}' is not a directory", path.display());
        }

        let entries = match fs::read_dir(path) {
            Ok(rd) => rd,
            Err(e) => return format!("Error: cannot list '{}': {}", path.display(), e),
        };

        let mut items: Vec<(bool, String)> = entries
            .flatten()
            .map(|e| {
                let is_dir = e.path().is_dir();
                (is_dir, e.file_name().to_string_lossy().into_owned())
            })
            .filter(|(is_dir, name)| !(*is_dir && SKIP_DIRS.contains(&name.as_str())))
            .collect();
        items.sort_by(|a, b| a.1.cmp(&b.1));

        if items.is_empty() {
            return "(empty directory)".into();
        }

        let total = items.len();
        let lines: Vec<String> = items
            .into_iter()
            .take(MAX_LIST_ENTRIES)
            .map(|(is_dir, name)| {
                let kind = if is_dir { "dir" } else { "file" };
                format!("[{}] {}", kind, name)
            })
            .collect();

        let mut result = lines.join("\n");
        if total > MAX_LIST_ENTRIES {
            result.push_str(&format!(
                "\n\n... (showing {} of {} entries)",
                MAX_LIST_ENTRIES, total
            ));
        }
        result
    }

    fn read_file(&self, path: &Path) -> String {
        if !path.is_file() {
            return format!("Error: '{}' is not a file", path.display());
        }

        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(_) => {
                return format!(
                    "Error: '{}' is not a readable text file",
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string())
                )
            }
        };

        if text.chars().count() > MAX_READ_CHARS {
            let head: String = text.chars().take(MAX_READ_CHARS).collect();
            return format!(
                "{}\n\n... (truncated, {} total characters)",
                head,
                text.chars().count()
            );
        }
        text
    }

    fn file_info(&self, path: &Path) -> String {
        let meta = match fs::metadata(path) {
            Ok(m) => m,
            Err(_) => return format!("Error: '{}' does not exist", path.display()),
        };

        let kind = if meta.is_dir() { "directory" } else { "file" };
        let modified = meta
            .modified()
            .ok()
            .map(|t| {
                DateTime::<Local>::from(t)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| "unknown".into());

        format!(
            "type: {}\nsize: {} bytes\nmodified: {}",
            kind,
            meta.len(),
            modified
        )
    }
}

/// Depth-first walk that prunes junk directories. The visitor returns
/// `false` to stop early.
fn walk(dir: &Path, visit: &mut impl FnMut(&Path, bool) -> bool) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return true;
    };

    let mut items: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    items.sort();

    for entry in items {
        let is_dir = entry.is_dir();
        if is_dir {
            let name = entry
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
        }
        if !visit(&entry, is_dir) {
            return false;
        }
        if is_dir && !walk(&entry, visit) {
            return false;
        }
    }
    true
}

#[async_trait]
impl Tool for LocalFilesTool {
    fn name(&self) -> &str {
        "local_files"
    }

    fn description(&self) -> &str {
        "Access local files. Use search to find files by name across \
         directories (one call). Use list_dir to browse one directory at a \
         time.\nActions: search, list_dir, read_file, file_info."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["search", "list_dir", "read_file", "file_info"],
                    "description": "search: find files/dirs by name recursively (use query param); \
                                    list_dir: list one directory; \
                                    read_file: read text file; \
                                    file_info: metadata"
                },
                "path": {
                    "type": "string",
                    "description": "Absolute file or directory path"
                },
                "query": {
                    "type": "string",
                    "description": "Search term for file/directory name (required for search action)"
                }
            },
            "required": ["action", "path"]
        })
    }

    fn usage_hint(&self) -> Option<&str> {
        Some(
            "Files and directories — use search to find files by name, \
             list_dir to browse, read_file to read content.",
        )
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.allowed_roots.is_empty() {
            anyhow::bail!(
                "at least one allowed root is required for the local_files tool \
                 (tools.localFiles.allowedPaths in config.json)"
            );
        }
        for root in &self.allowed_roots {
            if !root.is_dir() {
                anyhow::bail!("allowed path does not exist: {}", root.display());
            }
        }
        info!(roots = ?self.allowed_roots, "local_files allowed roots");
        Ok(())
    }

    async fn execute(&self, args: Map<String, Value>) -> String {
        let action = args.get("action").and_then(|v| v.as_str()).unwrap_or("");
        let path_str = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
        let path = Path::new(path_str);

        if !self.is_allowed(path) {
            return format!("Error: path '{}' is outside allowed directories", path_str);
        }

        debug!(action, path = path_str, "local_files request");

        match action {
            "search" => self.search(path, query),
            "list_dir" => self.list_dir(path),
            "read_file" => self.read_file(path),
            "file_info" => self.file_info(path),
            other => format!("Error: unknown action '{}'", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (PathBuf, LocalFilesTool) {
        let root = std::env::temp_dir().join(format!(
            "pulsebot_test_files_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("notes")).unwrap();
        fs::write(root.join("notes/todo.txt"), "buy milk").unwrap();
        fs::write(root.join("readme.md"), "# hello").unwrap();

        let tool = LocalFilesTool::new(&[root.to_string_lossy().into_owned()]);
        (root, tool)
    }

    #[tokio::test]
    async fn test_outside_allowed_roots_is_rejected() {
        let (root, tool) = setup();

        let mut args = Map::new();
        args.insert("action".into(), "read_file".into());
        args.insert("path".into(), "/etc/hostname".into());
        let result = tool.execute(args).await;
        assert!(result.contains("outside allowed directories"));

        let _ = fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_read_and_list() {
        let (root, tool) = setup();

        let mut args = Map::new();
        args.insert("action".into(), "read_file".into());
        args.insert(
            "path".into(),
            root.join("notes/todo.txt").to_string_lossy().into_owned().into(),
        );
        assert_eq!(tool.execute(args).await, "buy milk");

        let mut args = Map::new();
        args.insert("action".into(), "list_dir".into());
        args.insert("path".into(), root.to_string_lossy().into_owned().into());
        let listing = tool.execute(args).await;
        assert!(listing.contains("[dir] notes"));
        assert!(listing.contains("[file] readme.md"));

        let _ = fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_search_finds_nested_files() {
        let (root, tool) = setup();

        let mut args = Map::new();
        args.insert("action".into(), "search".into());
        args.insert("path".into(), root.to_string_lossy().into_owned().into());
        args.insert("query".into(), "todo".into());
        let result = tool.execute(args).await;
        assert!(result.contains("todo.txt"));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_validate_requires_existing_roots() {
        let tool = LocalFilesTool::new(&[]);
        assert!(tool.validate().is_err());

        let tool = LocalFilesTool::new(&["/definitely/not/a/real/path".into()]);
        assert!(tool.validate().is_err());
    }
}

//! Compiler driver (spec §4.C): writes sources, invokes the host C++
//! toolchain, captures diagnostics, and verifies the resulting artifact.
//!
//! Never executes the artifact itself — that's [`crate::child`]'s job.

use std::os::unix::fs::PermissionsExt;
use std::process::Stdio;

use tracing::{debug, warn};

use crate::workspace::Workspace;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const SOURCE_EXTENSIONS: &[&str] = &[".cpp", ".cxx", ".cc"];
const MAIN_MARKERS: &[&str] = &["int main(", "void main(", "main()"];

/// Outcome of a compile attempt.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub success: bool,
    /// Captured compiler stderr on failure, or a synthesized diagnostic
    /// (e.g. "No C++ source files found") when the compiler was never run.
    pub diagnostics: String,
}

/// Drives `g++` (or whatever `binary`/`std` config names) over a workspace.
pub struct Compiler {
    binary: String,
    std: String,
}

impl Compiler {
    #[must_use]
    pub fn new(binary: impl Into<String>, std: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            std: std.into(),
        }
    }

    /// Compile a single inline source blob as `main.cpp`.
    pub async fn compile_single(
        &self,
        workspace: &Workspace,
        source: &str,
    ) -> std::io::Result<CompileOutcome> {
        self.compile_multi(workspace, &[("main.cpp".to_string(), source.to_string())])
            .await
    }

    /// Compile a multi-file submission. `files` is `(name, content)` pairs in
    /// wire order; names are sanitized and the compile list is reordered so
    /// the first file containing a `main` marker leads (spec §3 "Main
    /// selection").
    pub async fn compile_multi(
        &self,
        workspace: &Workspace,
        files: &[(String, String)],
    ) -> std::io::Result<CompileOutcome> {
        let sanitized: Vec<(String, String)> = files
            .iter()
            .enumerate()
            .map(|(i, (name, content))| (sanitize_filename(name, i), content.clone()))
            .collect();

        for (name, content) in &sanitized {
            write_bom_source(workspace, name, content).await?;
        }

        let ordered = order_main_first(&sanitized);
        let source_names: Vec<&str> = ordered
            .iter()
            .map(String::as_str)
            .filter(|n| is_cpp_source(n))
            .collect();

        if source_names.is_empty() {
            return Ok(CompileOutcome {
                success: false,
                diagnostics: "No C++ source files found".to_string(),
            });
        }

        self.invoke(workspace, &source_names).await
    }

    async fn invoke(
        &self,
        workspace: &Workspace,
        source_names: &[&str],
    ) -> std::io::Result<CompileOutcome> {
        let artifact = workspace.artifact_path();
        let errors_path = workspace.compile_errors_path();
        let errors_file = std::fs::File::create(&errors_path)?;

        debug!(compiler = %self.binary, files = ?source_names, "invoking compiler");

        let status = tokio::process::Command::new(&self.binary)
            .current_dir(workspace.path())
            .arg(format!("-std={}", self.std))
            .arg("-finput-charset=UTF-8")
            .arg("-fexec-charset=UTF-8")
            .args(source_names)
            .arg("-o")
            .arg("program")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(errors_file))
            .status()
            .await?;

        let diagnostics = tokio::fs::read_to_string(&errors_path)
            .await
            .unwrap_or_default();

        let artifact_exists = tokio::fs::metadata(&artifact).await.is_ok();
        let success = status.success() && artifact_exists;

        if success {
            let perms = std::fs::Permissions::from_mode(0o755);
            tokio::fs::set_permissions(&artifact, perms).await?;
        } else {
            warn!(status = ?status, "compile failed");
        }

        Ok(CompileOutcome {
            success,
            diagnostics,
        })
    }
}

async fn write_bom_source(
    workspace: &Workspace,
    name: &str,
    content: &str,
) -> std::io::Result<()> {
    let path = workspace.path().join(name);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut bytes = Vec::with_capacity(UTF8_BOM.len() + content.len());
    bytes.extend_from_slice(UTF8_BOM);
    bytes.extend_from_slice(content.as_bytes());
    tokio::fs::write(path, bytes).await
}

fn is_cpp_source(name: &str) -> bool {
    SOURCE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

fn contains_main(content: &str) -> bool {
    MAIN_MARKERS.iter().any(|m| content.contains(m))
}

/// Normalize backslashes to `/`; replace any name containing a non-ASCII
/// byte with a synthetic `file_<i><ext>` keeping only the trailing
/// extension (spec §3 "File name sanitization").
#[must_use]
fn sanitize_filename(name: &str, index: usize) -> String {
    let normalized = name.replace('\\', "/");
    if normalized.is_ascii() {
        return normalized;
    }
    let ext = std::path::Path::new(&normalized)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("file_{index}{ext}")
}

/// Reorder `files` so the first file (by original order) containing a
/// `main` marker is moved to the head. Stable otherwise — files without a
/// main marker, and files after the first main hit, keep their relative
/// enumeration order.
fn order_main_first(files: &[(String, String)]) -> Vec<String> {
    let Some(main_idx) = files.iter().position(|(_, content)| contains_main(content)) else {
        return files.iter().map(|(name, _)| name.clone()).collect();
    };

    let mut ordered = Vec::with_capacity(files.len());
    ordered.push(files[main_idx].0.clone());
    for (i, (name, _)) in files.iter().enumerate() {
        if i != main_idx {
            ordered.push(name.clone());
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_normalizes_backslashes() {
        assert_eq!(sanitize_filename("sub\\helper.cpp", 0), "sub/helper.cpp");
    }

    #[test]
    fn sanitize_replaces_non_ascii_names() {
        let got = sanitize_filename("héllo.cpp", 2);
        assert_eq!(got, "file_2.cpp");
    }

    #[test]
    fn sanitize_keeps_ascii_names_untouched() {
        assert_eq!(sanitize_filename("main.cpp", 0), "main.cpp");
    }

    #[test]
    fn main_file_moves_to_head() {
        let files = vec![
            ("a.cpp".to_string(), "void f(){}".to_string()),
            ("m.cpp".to_string(), "int main(){ f(); }".to_string()),
        ];
        let ordered = order_main_first(&files);
        assert_eq!(ordered, vec!["m.cpp".to_string(), "a.cpp".to_string()]);
    }

    #[test]
    fn first_main_wins_ties() {
        let files = vec![
            ("a.cpp".to_string(), "int main(){}".to_string()),
            ("b.cpp".to_string(), "int main(){}".to_string()),
        ];
        let ordered = order_main_first(&files);
        assert_eq!(ordered[0], "a.cpp");
    }

    #[test]
    fn adding_non_main_file_keeps_head_stable() {
        let before = vec![
            ("a.cpp".to_string(), "void f(){}".to_string()),
            ("m.cpp".to_string(), "int main(){}".to_string()),
        ];
        let head_before = order_main_first(&before)[0].clone();

        let after = vec![
            ("a.cpp".to_string(), "void f(){}".to_string()),
            ("m.cpp".to_string(), "int main(){}".to_string()),
            ("b.cpp".to_string(), "void g(){}".to_string()),
        ];
        let head_after = order_main_first(&after)[0].clone();

        assert_eq!(head_before, head_after);
    }

    #[test]
    fn no_main_marker_leaves_order_unchanged() {
        let files = vec![
            ("a.cpp".to_string(), "void f(){}".to_string()),
            ("b.cpp".to_string(), "void g(){}".to_string()),
        ];
        let ordered = order_main_first(&files);
        assert_eq!(ordered, vec!["a.cpp".to_string(), "b.cpp".to_string()]);
    }

    #[tokio::test]
    async fn missing_source_files_short_circuits_without_invoking_compiler() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path().to_str().unwrap()).unwrap();
        let compiler = Compiler::new("g++", "c++17");

        let outcome = compiler
            .compile_multi(&ws, &[("readme.txt".to_string(), "not code".to_string())])
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.diagnostics, "No C++ source files found");
    }
}

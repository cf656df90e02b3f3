//! Python graph-structure scanner
//!
//! Walks a repository, parses every `.py` file with tree-sitter and
//! records the building blocks of a LangGraph `StateGraph`: instantiations,
//! `add_node`, `add_edge` and `add_conditional_edges` call sites, plus the
//! class and function names of each file.

use crate::error::RepositoryError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser};
use walkdir::WalkDir;

const SKIPPED_DIRS: [&str; 2] = [".git", "__pycache__"];

/// A located call expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSite {
    /// File relative to the scan root
    pub file: String,
    /// 1-based line
    pub line: usize,
    /// 0-based column
    pub column: usize,
    /// Receiver identifier (`builder` in `builder.add_edge(..)`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,
    /// Literal node name passed to `add_node`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
}

/// Graph construction call sites across the repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphComponents {
    /// `StateGraph(...)` calls
    pub stategraph_instantiations: Vec<CallSite>,
    /// `*.add_node(...)` calls
    pub add_node_calls: Vec<CallSite>,
    /// `*.add_edge(...)` calls
    pub add_edge_calls: Vec<CallSite>,
    /// `*.add_conditional_edges(...)` calls
    pub add_conditional_edges_calls: Vec<CallSite>,
}

/// A file that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    /// File relative to the scan root
    pub file: String,
    /// Description
    pub error: String,
}

/// Headline counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Python files visited
    pub python_files_scanned: usize,
    /// Class definitions across all parsed files
    pub classes_found: usize,
    /// Function definitions (sync and async) across all parsed files
    pub functions_found: usize,
    /// At least one `StateGraph(...)` call
    pub stategraph_detected: bool,
    /// At least one `add_node` call
    pub node_definitions_detected: bool,
}

/// Result of scanning a repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphScan {
    /// Headline counts
    pub summary: ScanSummary,
    /// Class names per file
    pub classes: BTreeMap<String, Vec<String>>,
    /// Function names per file
    pub functions: BTreeMap<String, Vec<String>>,
    /// Graph construction call sites
    pub graph_components: GraphComponents,
    /// Files that failed to parse
    pub errors: Vec<ParseFailure>,
}

impl GraphScan {
    /// JSON form used as evidence content
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Default)]
struct FileScan {
    classes: Vec<String>,
    functions: Vec<String>,
    components: GraphComponents,
}

/// tree-sitter based scanner
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonGraphScanner;

impl PythonGraphScanner {
    /// Create a scanner
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Python files under `root`, sorted, skipping VCS and bytecode dirs
    #[must_use]
    pub fn python_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !(entry.file_type().is_dir()
                        && SKIPPED_DIRS.iter().any(|skip| entry.file_name() == *skip))
            })
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| path.extension().is_some_and(|ext| ext == "py"))
            .collect();
        files.sort();
        files
    }

    /// Scan every Python file under `root`
    ///
    /// # Errors
    /// [`RepositoryError::MissingPath`] when `root` does not exist. Files
    /// that fail to read or parse are recorded in [`GraphScan::errors`].
    pub fn scan(&self, root: &Path) -> Result<GraphScan, RepositoryError> {
        if !root.exists() {
            return Err(RepositoryError::MissingPath(root.to_path_buf()));
        }

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| RepositoryError::Generic {
                operation: "scan",
                target: root.display().to_string(),
                detail: e.to_string(),
            })?;

        let files = self.python_files(root);
        let mut scan = GraphScan::default();
        scan.summary.python_files_scanned = files.len();

        for path in &files {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            let result = std::fs::read_to_string(path)
                .map_err(|e| format!("unreadable source: {e}"))
                .and_then(|source| scan_source(&mut parser, &relative, &source));

            match result {
                Ok(file) => {
                    scan.summary.classes_found += file.classes.len();
                    scan.summary.functions_found += file.functions.len();
                    let components = &mut scan.graph_components;
                    components.stategraph_instantiations.extend(file.components.stategraph_instantiations);
                    components.add_node_calls.extend(file.components.add_node_calls);
                    components.add_edge_calls.extend(file.components.add_edge_calls);
                    components
                        .add_conditional_edges_calls
                        .extend(file.components.add_conditional_edges_calls);
                    scan.classes.insert(relative.clone(), file.classes);
                    scan.functions.insert(relative, file.functions);
                }
                Err(error) => {
                    tracing::debug!(file = %relative, %error, "python file skipped");
                    scan.errors.push(ParseFailure { file: relative, error });
                }
            }
        }

        let components = &scan.graph_components;
        scan.summary.stategraph_detected = !components.stategraph_instantiations.is_empty();
        scan.summary.node_definitions_detected = !components.add_node_calls.is_empty();
        Ok(scan)
    }
}

fn scan_source(parser: &mut Parser, file: &str, source: &str) -> Result<FileScan, String> {
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| "parser produced no tree".to_string())?;
    let root = tree.root_node();
    if root.has_error() {
        let line = first_error(root).map_or(0, |node| node.start_position().row + 1);
        return Err(format!("syntax error (line {line})"));
    }

    let mut out = FileScan::default();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "class_definition" => out.classes.extend(field_text(node, "name", source)),
            "function_definition" => out.functions.extend(field_text(node, "name", source)),
            "call" => visit_call(node, file, source, &mut out.components),
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    Ok(out)
}

fn visit_call(node: Node<'_>, file: &str, source: &str, components: &mut GraphComponents) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    let position = node.start_position();
    let site = |builder: Option<String>, node_name: Option<String>| CallSite {
        file: file.to_string(),
        line: position.row + 1,
        column: position.column,
        builder,
        node_name,
    };

    match function.kind() {
        "identifier" if text(function, source) == Some("StateGraph") => {
            components.stategraph_instantiations.push(site(None, None));
        }
        "attribute" => {
            let builder = function
                .child_by_field_name("object")
                .filter(|object| object.kind() == "identifier")
                .and_then(|object| text(object, source))
                .map(str::to_string);
            match field_text(function, "attribute", source).as_deref() {
                Some("add_node") => {
                    let name = first_argument(node).and_then(|arg| string_literal(arg, source));
                    components.add_node_calls.push(site(builder, name));
                }
                Some("add_edge") => components.add_edge_calls.push(site(builder, None)),
                Some("add_conditional_edges") => {
                    components.add_conditional_edges_calls.push(site(builder, None));
                }
                _ => {}
            }
        }
        _ => {}
    }
}

fn first_argument(call: Node<'_>) -> Option<Node<'_>> {
    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    let first = arguments.named_children(&mut cursor).next();
    first
}

/// Content of a plain (non-interpolated) string literal
fn string_literal(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut cursor = node.walk();
    let mut content = String::new();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "interpolation" => return None,
            "string_content" | "escape_sequence" => content.push_str(text(child, source)?),
            _ => {}
        }
    }
    Some(content)
}

fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

fn text<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    source.get(node.byte_range())
}

fn field_text(node: Node<'_>, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|child| text(child, source))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GRAPH: &str = r#"from langgraph.graph import StateGraph

class AgentState:
    pass

def investigate(state):
    return state

async def judge(state):
    return state

builder = StateGraph(AgentState)
builder.add_node("investigate", investigate)
builder.add_node(name_var, judge)
builder.add_edge("investigate", "judge")
builder.add_conditional_edges("judge", route)
"#;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/__pycache__")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("src/graph.py"), GRAPH).unwrap();
        std::fs::write(dir.path().join("src/broken.py"), "def broken(:\n    pass\n").unwrap();
        std::fs::write(dir.path().join("src/__pycache__/cached.py"), "StateGraph()\n").unwrap();
        std::fs::write(dir.path().join(".git/hook.py"), "StateGraph()\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# readme\n").unwrap();
        dir
    }

    #[test]
    fn skips_vcs_and_bytecode_dirs() {
        let dir = fixture();
        let files = PythonGraphScanner::new().python_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["src/broken.py", "src/graph.py"]);
    }

    #[test]
    fn detects_graph_construction() {
        let dir = fixture();
        let scan = PythonGraphScanner::new().scan(dir.path()).unwrap();

        assert_eq!(
            scan.summary,
            ScanSummary {
                python_files_scanned: 2,
                classes_found: 1,
                functions_found: 2,
                stategraph_detected: true,
                node_definitions_detected: true,
            }
        );
        assert_eq!(scan.classes["src/graph.py"], vec!["AgentState"]);
        assert_eq!(scan.functions["src/graph.py"], vec!["investigate", "judge"]);

        let components = &scan.graph_components;
        assert_eq!(components.stategraph_instantiations[0].line, 12);
        assert_eq!(components.add_node_calls.len(), 2);
        assert_eq!(components.add_node_calls[0].node_name.as_deref(), Some("investigate"));
        assert_eq!(components.add_node_calls[0].builder.as_deref(), Some("builder"));
        assert_eq!(components.add_node_calls[1].node_name, None);
        assert_eq!(components.add_edge_calls.len(), 1);
        assert_eq!(components.add_conditional_edges_calls[0].line, 16);

        assert_eq!(scan.errors.len(), 1);
        assert_eq!(scan.errors[0].file, "src/broken.py");
        assert!(scan.errors[0].error.starts_with("syntax error"));
    }

    #[test]
    fn scan_json_carries_summary_flags() {
        let dir = fixture();
        let value = PythonGraphScanner::new().scan(dir.path()).unwrap().to_value();
        assert_eq!(value["summary"]["stategraph_detected"], true);
        assert!(value["graph_components"]["add_edge_calls"][0].get("node_name").is_none());
    }

    #[test]
    fn missing_root_is_an_error() {
        let result = PythonGraphScanner::new().scan(Path::new("/no/such/repository"));
        assert!(matches!(result, Err(RepositoryError::MissingPath(_))));
    }
}

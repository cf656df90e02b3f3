//! PDF report location policy

use std::path::{Path, PathBuf};

/// Glob patterns tried, in order, under the repository root
pub const SEARCH_PATTERNS: [&str; 4] = [
    "reports/final_report.pdf",
    "**/final_report.pdf",
    "reports/*.pdf",
    "**/*.pdf",
];

/// Path used when nothing was requested and nothing was found
pub const DEFAULT_REPORT: &str = "reports/final_report.pdf";

/// Resolve the PDF report to analyze
///
/// Order: the requested path if absolute and existing; the requested path
/// under the repository root if it is an existing `.pdf`; the first glob
/// hit of [`SEARCH_PATTERNS`]; finally the requested path (or
/// [`DEFAULT_REPORT`]) joined to the root. Without a usable repository
/// root the requested path is returned unchanged.
#[must_use]
pub fn resolve_pdf_path(repo_root: Option<&Path>, requested: Option<&Path>) -> Option<PathBuf> {
    let requested = requested.filter(|path| !path.as_os_str().is_empty());
    let Some(root) = repo_root.filter(|root| root.is_dir()) else {
        return requested.map(Path::to_path_buf);
    };

    if let Some(candidate) = requested {
        if candidate.is_absolute() && candidate.is_file() {
            return Some(candidate.to_path_buf());
        }
        let relative = root.join(candidate);
        if is_pdf(&relative) && relative.is_file() {
            return Some(relative);
        }
    }

    if let Some(found) = SEARCH_PATTERNS.iter().find_map(|pattern| first_match(root, pattern)) {
        return Some(found);
    }

    Some(root.join(requested.unwrap_or_else(|| Path::new(DEFAULT_REPORT))))
}

fn first_match(root: &Path, pattern: &str) -> Option<PathBuf> {
    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let full = format!("{escaped}/{pattern}");
    let entries = glob::glob(&full).ok()?;
    entries
        .filter_map(Result::ok)
        .find(|path| is_pdf(path) && path.is_file())
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        path
    }

    #[test]
    fn no_repository_returns_request_verbatim() {
        assert_eq!(
            resolve_pdf_path(None, Some(Path::new("report.pdf"))),
            Some(PathBuf::from("report.pdf"))
        );
        assert_eq!(resolve_pdf_path(None, None), None);
        assert_eq!(
            resolve_pdf_path(Some(Path::new("/definitely/not/here")), Some(Path::new("x.pdf"))),
            Some(PathBuf::from("x.pdf"))
        );
    }

    #[test]
    fn absolute_then_relative_request_wins() {
        let repo = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let absolute = touch(elsewhere.path(), "mine.pdf");
        touch(repo.path(), "reports/final_report.pdf");
        let relative = touch(repo.path(), "docs/design.pdf");

        assert_eq!(resolve_pdf_path(Some(repo.path()), Some(&absolute)), Some(absolute));
        assert_eq!(
            resolve_pdf_path(Some(repo.path()), Some(Path::new("docs/design.pdf"))),
            Some(relative)
        );
    }

    #[test]
    fn glob_patterns_are_tried_in_order() {
        let repo = tempfile::tempdir().unwrap();
        touch(repo.path(), "a/notes.pdf");
        let nested = touch(repo.path(), "deep/dir/final_report.pdf");
        assert_eq!(resolve_pdf_path(Some(repo.path()), None), Some(nested));

        let canonical = touch(repo.path(), "reports/final_report.pdf");
        assert_eq!(
            resolve_pdf_path(Some(repo.path()), Some(Path::new("missing.pdf"))),
            Some(canonical)
        );
    }

    #[test]
    fn falls_back_to_joined_default() {
        let repo = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_pdf_path(Some(repo.path()), None),
            Some(repo.path().join(DEFAULT_REPORT))
        );
        assert_eq!(
            resolve_pdf_path(Some(repo.path()), Some(Path::new("docs/x.pdf"))),
            Some(repo.path().join("docs/x.pdf"))
        );
    }
}

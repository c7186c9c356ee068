//! Build orchestrator.
//!
//! Drives the per-page pipeline: discover page units in the source tree,
//! bundle each page's pre-render entry, execute it inside the emulated DOM,
//! merge the leftover inline scripts, render captured diagnostics, serialize,
//! bundle the client entry, and write everything under the output directory
//! mirroring the source's relative paths. Pages are independent and run in
//! parallel; one page's failure never aborts its siblings.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use regex::Regex;
use walkdir::WalkDir;

use crate::bundler::{self, BundleOptions};
use crate::cache::BuildCache;
use crate::diagnostics;
use crate::error::BuildError;
use crate::hotreload;
use crate::merge;
use crate::runner::{self, RuntimeError};

/// Class carried by the injected pre-render bundle script, so it can be
/// stripped after emulation. The pre-render bundle never ships to the
/// browser.
pub const PRERENDER_SCRIPT_CLASS: &str = "tk-prerender";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub src_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Resilient dev mode: compile errors become in-page diagnostics instead
    /// of page failures, and the hot-reload polling script is injected.
    pub dev: bool,
    /// Keep only pages whose relative path matches.
    pub include: Option<Regex>,
    /// Drop pages whose relative path matches.
    pub exclude: Option<Regex>,
    pub cache_dir: Option<PathBuf>,
}

impl BuildOptions {
    pub fn new(src_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        BuildOptions {
            src_dir: src_dir.into(),
            out_dir: out_dir.into(),
            dev: false,
            include: None,
            exclude: None,
            cache_dir: None,
        }
    }
}

/// One page discovered in the source tree: an HTML template plus optional
/// sibling scripts sharing its base name. The back-end script is discovered
/// so callers can see it, but it never ships to the output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PageUnit {
    pub html: PathBuf,
    /// Path relative to the source directory; mirrored under the output.
    pub rel: PathBuf,
    pub prerender: Option<PathBuf>,
    pub client: Option<PathBuf>,
    pub back: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discover,
    BundlePrerender,
    Emulate,
    MergeScripts,
    RenderDiagnostics,
    Serialize,
    BundleClient,
    WriteOutput,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discover => "discover",
            Stage::BundlePrerender => "bundle-prerender",
            Stage::Emulate => "emulate",
            Stage::MergeScripts => "merge-scripts",
            Stage::RenderDiagnostics => "render-diagnostics",
            Stage::Serialize => "serialize",
            Stage::BundleClient => "bundle-client",
            Stage::WriteOutput => "write-output",
        };
        f.write_str(name)
    }
}

/// A page that reached a terminal `failed` state, with enough context to
/// locate the cause.
#[derive(Debug, Clone)]
pub struct PageFailure {
    pub page: PathBuf,
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.page.display(), self.stage, self.message)
    }
}

/// Aggregate result of one build pass.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub built: Vec<PathBuf>,
    pub failures: Vec<PageFailure>,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

fn sibling(html: &Path, suffix: &str) -> Option<PathBuf> {
    let stem = html.file_stem()?.to_str()?;
    let candidate = html.with_file_name(format!("{}{}", stem, suffix));
    candidate.is_file().then_some(candidate)
}

/// Enumerate page units under `src_dir`, filtered by the include/exclude
/// patterns applied to each page's relative path. Order is sorted by
/// relative path so a build pass is deterministic.
pub fn discover_pages(
    src_dir: &Path,
    include: Option<&Regex>,
    exclude: Option<&Regex>,
) -> Result<Vec<PageUnit>, BuildError> {
    if !src_dir.is_dir() {
        return Err(BuildError::missing_file(src_dir));
    }

    let mut pages = Vec::new();
    for entry in WalkDir::new(src_dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }
        let rel = match path.strip_prefix(src_dir) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };
        let rel_str = rel.to_string_lossy();
        if let Some(include) = include {
            if !include.is_match(&rel_str) {
                continue;
            }
        }
        if let Some(exclude) = exclude {
            if exclude.is_match(&rel_str) {
                continue;
            }
        }
        pages.push(PageUnit {
            prerender: sibling(path, ".pre.ts"),
            client: sibling(path, ".ts"),
            back: sibling(path, ".back.ts"),
            html: path.to_path_buf(),
            rel,
        });
    }
    pages.sort_by(|a, b| a.rel.cmp(&b.rel));
    Ok(pages)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PER-PAGE PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

fn fail(page: &Path, stage: Stage, error: BuildError) -> PageFailure {
    PageFailure {
        page: page.to_path_buf(),
        stage,
        message: error.to_string(),
    }
}

fn build_page(
    unit: &PageUnit,
    options: &BuildOptions,
    cache: Option<&BuildCache>,
) -> Result<(), PageFailure> {
    let page = unit.html.as_path();
    let html_source =
        fs::read_to_string(page).map_err(|e| fail(page, Stage::Discover, e.into()))?;

    // Pre-render bundle. In dev mode a compile error is downgraded to an
    // in-page diagnostic so the dev server stays alive.
    let mut compile_diagnostics: Vec<RuntimeError> = Vec::new();
    let mut prerender_code = String::new();
    if let Some(entry) = &unit.prerender {
        let bundle_opts = BundleOptions {
            cache,
            ..Default::default()
        };
        match bundler::bundle(Some(entry), &bundle_opts) {
            Ok(code) => prerender_code = code,
            Err(BuildError::Compile { message }) if options.dev => {
                tracing::warn!(page = %page.display(), %message, "pre-render compile error");
                compile_diagnostics.push(RuntimeError::new(message));
            }
            Err(e) => return Err(fail(page, Stage::BundlePrerender, e)),
        }
    }

    // The pre-render bundle executes before any script already present in
    // the template, then gets stripped after emulation.
    let composed = if prerender_code.is_empty() {
        html_source
    } else {
        format!(
            "<script class=\"{}\">{}</script>{}",
            PRERENDER_SCRIPT_CLASS, prerender_code, html_source
        )
    };

    let mut report =
        runner::run(&composed).map_err(|e| fail(page, Stage::Emulate, e))?;
    report
        .document
        .remove_scripts_with_class(PRERENDER_SCRIPT_CLASS);

    merge::merge(&mut report.document);

    let mut errors = compile_diagnostics;
    errors.extend(report.errors);
    diagnostics::render_errors(&errors, &mut report.document);
    diagnostics::render_logs(&report.logs, &mut report.document);

    if options.dev {
        hotreload::inject_hot_reload(&mut report.document);
    }

    let final_html = report.document.serialize();

    // The client bundle ships to the browser next to the page's HTML; it
    // never goes through the DOM emulation.
    if let Some(entry) = &unit.client {
        let out_js = options.out_dir.join(unit.rel.with_extension("js"));
        let bundle_opts = BundleOptions {
            suppress_errors: options.dev,
            cache,
            ..Default::default()
        };
        bundler::bundle_to_file(Some(entry), Some(&out_js), &bundle_opts)
            .map_err(|e| fail(page, Stage::BundleClient, e))?;
    }

    let out_html = options.out_dir.join(&unit.rel);
    let write = || -> Result<(), BuildError> {
        if let Some(parent) = out_html.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_html, final_html.as_bytes())?;
        hotreload::write_marker(&options.out_dir)
    };
    write().map_err(|e| fail(page, Stage::WriteOutput, e))?;

    tracing::debug!(page = %unit.rel.display(), "page built");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILD PASS
// ═══════════════════════════════════════════════════════════════════════════════

/// Run one full build pass over the source tree.
///
/// Every discovered page is processed even when siblings fail; the summary
/// carries the built pages and the per-page failures with their stage.
pub fn build(options: &BuildOptions) -> Result<BuildSummary, BuildError> {
    let pages = discover_pages(
        &options.src_dir,
        options.include.as_ref(),
        options.exclude.as_ref(),
    )?;
    let cache = options.cache_dir.as_ref().map(|dir| BuildCache::new(dir));

    let results: Vec<(PathBuf, Result<(), PageFailure>)> = pages
        .par_iter()
        .map(|unit| (unit.rel.clone(), build_page(unit, options, cache.as_ref())))
        .collect();

    let mut summary = BuildSummary::default();
    for (rel, result) in results {
        match result {
            Ok(()) => summary.built.push(rel),
            Err(failure) => {
                tracing::warn!(%failure, "page failed");
                summary.failures.push(failure);
            }
        }
    }
    Ok(summary)
}

/// Bounded wait for a path to appear on disk, polling until `timeout`
/// expires. Used by callers that race a build against an external watcher.
pub fn wait_for_path(path: &Path, timeout: Duration) -> Result<(), BuildError> {
    let start = Instant::now();
    loop {
        if path.exists() {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(BuildError::Timeout {
                path: path.display().to_string(),
                millis: timeout.as_millis() as u64,
            });
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    #[test]
    fn discovery_groups_siblings_by_base_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "home.html", "<body></body>");
        touch(dir.path(), "home.pre.ts", "");
        touch(dir.path(), "home.ts", "");
        touch(dir.path(), "home.back.ts", "");
        touch(dir.path(), "blog/post.html", "<body></body>");

        let pages = discover_pages(dir.path(), None, None).expect("discover");
        assert_eq!(pages.len(), 2);

        // Sorted by relative path: blog/post.html first.
        assert_eq!(pages[0].rel, PathBuf::from("blog/post.html"));
        assert!(pages[0].prerender.is_none());
        assert!(pages[0].client.is_none());

        assert_eq!(pages[1].rel, PathBuf::from("home.html"));
        assert!(pages[1].prerender.is_some());
        assert!(pages[1].client.is_some());
        assert!(pages[1].back.is_some());
    }

    #[test]
    fn discovery_applies_include_and_exclude_patterns() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "home.html", "");
        touch(dir.path(), "blog/post.html", "");
        touch(dir.path(), "blog/draft.html", "");

        let include = Regex::new("^blog/").expect("regex");
        let exclude = Regex::new("draft").expect("regex");
        let pages =
            discover_pages(dir.path(), Some(&include), Some(&exclude)).expect("discover");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].rel, PathBuf::from("blog/post.html"));
    }

    #[test]
    fn discovery_rejects_a_missing_source_directory() {
        let err = discover_pages(Path::new("no/such/src"), None, None).unwrap_err();
        assert_eq!(err.to_string(), "file no/such/src doesn't exist");
    }

    #[test]
    fn stages_report_their_pipeline_names() {
        assert_eq!(Stage::BundlePrerender.to_string(), "bundle-prerender");
        assert_eq!(Stage::WriteOutput.to_string(), "write-output");
        let failure = PageFailure {
            page: PathBuf::from("home.html"),
            stage: Stage::Emulate,
            message: "boom".to_string(),
        };
        assert_eq!(failure.to_string(), "home.html [emulate]: boom");
    }

    #[test]
    fn waiting_for_an_absent_path_times_out() {
        let err = wait_for_path(Path::new("no/such/resource"), Duration::from_millis(60))
            .unwrap_err();
        assert!(matches!(err, BuildError::Timeout { .. }));
        assert!(err.to_string().contains("no/such/resource"));
    }

    #[test]
    fn waiting_for_an_existing_path_returns_immediately() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "present.txt", "");
        wait_for_path(&dir.path().join("present.txt"), Duration::from_millis(10))
            .expect("present");
    }
}

//! # tkeron-build
//!
//! Static-site build pipeline for per-page TypeScript/HTML sources: bundle a
//! page's pre-render entry, execute it inside an emulated DOM at build time,
//! merge the resulting inline scripts, surface captured errors and console
//! output as an in-page overlay, and write the serialized HTML plus a
//! separately bundled client script to the output directory.
//!
//! ## Pipeline Invariants
//!
//! 1. **Per-page isolation**: each page's pipeline owns its own emulated-DOM
//!    context; no two pages share one, and one page's failure never aborts
//!    its siblings.
//! 2. **Captured, never propagated**: an uncaught exception inside a page
//!    script lands in the execution report (and from there in the
//!    diagnostics overlay), not in the build's error channel.
//! 3. **Pre-render code never ships**: the pre-render bundle is injected as
//!    a tagged inline script, executed, and stripped before serialization;
//!    only the client bundle reaches the browser.
//! 4. **Deterministic outputs**: bundling and pre-rendering are pure
//!    functions of their input bytes, which is what makes the
//!    content-addressed cache sound.

pub mod bundler;
pub mod cache;
pub mod diagnostics;
pub mod dom;
pub mod error;
pub mod hotreload;
pub mod merge;
pub mod pipeline;
pub mod runner;


pub use bundler::{bundle, bundle_to_file, BundleOptions};
pub use cache::BuildCache;
pub use error::BuildError;
pub use pipeline::{
    build, discover_pages, BuildOptions, BuildSummary, PageFailure, PageUnit, Stage,
};
pub use runner::{run, ExecutionReport, RuntimeError};

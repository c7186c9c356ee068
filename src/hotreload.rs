//! Hot-reload signal.
//!
//! Dev builds append a small polling script to every page and drop a marker
//! file at the output root. The marker body is the epoch-millisecond
//! timestamp of the build that wrote it; the polling script reloads the page
//! whenever the body changes. Concurrent page builds all rewrite the marker
//! and the last writer wins, which is fine: any write signals "something
//! rebuilt".

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::dom::{PageDocument, PageNode};
use crate::error::BuildError;

/// Marker file name, relative to the output root. Served alongside the pages
/// so the polling script can fetch it from the site root.
pub const MARKER_FILE: &str = "hot-reload.json";

pub const HOT_RELOAD_CLASS: &str = "tk-hot-reload";

/// Polling client. Tolerates fetch failures (the dev server may be
/// restarting) and also honors an explicit `{"reload": true}` body so a
/// server can force a reload without touching timestamps.
const HOT_RELOAD_SCRIPT: &str = r#"(function () {
  var last = null;
  function poll() {
    fetch("/hot-reload.json", { cache: "no-store" })
      .then(function (r) { return r.text(); })
      .then(function (body) {
        if (body.indexOf("\"reload\"") !== -1 && body.indexOf("true") !== -1) {
          location.reload();
          return;
        }
        if (last === null) { last = body; return; }
        if (body !== last) { location.reload(); }
      })
      .catch(function () {});
  }
  setInterval(poll, 500);
})();"#;

/// Append the polling script to `<body>`, once per document.
pub fn inject_hot_reload(document: &mut PageDocument) {
    if document.has_element_with_class(HOT_RELOAD_CLASS) {
        return;
    }
    document.append_to(
        "body",
        PageNode::element(
            "script",
            vec![("class".to_string(), HOT_RELOAD_CLASS.to_string())],
            vec![PageNode::text(HOT_RELOAD_SCRIPT)],
        ),
    );
}

/// Write the marker file under `out_dir` with the current build timestamp.
pub fn write_marker(out_dir: &Path) -> Result<(), BuildError> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    fs::create_dir_all(out_dir)?;
    fs::write(out_dir.join(MARKER_FILE), millis.to_string())?;
    Ok(())
}

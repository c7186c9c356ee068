//! Emulated-DOM runner.
//!
//! Loads a page's HTML into an in-process DOM emulation, executes every
//! inline `<script>` in document order, and returns the mutated document
//! together with every uncaught error and console call captured during
//! execution. Each run owns a fresh engine context; nothing leaks between
//! pages or between concurrent runs of the same page.
//!
//! The DOM itself lives in an embedded JS prelude (`dom_prelude.js`)
//! evaluated before any page script: the parsed tree is shipped in as JSON,
//! mutated in place by the page's code, and shipped back out through a
//! snapshot call at the end.

use boa_engine::{Context, Source};
use serde::{Deserialize, Serialize};

use crate::dom::PageDocument;
use crate::error::BuildError;

const DOM_PRELUDE: &str = include_str!("dom_prelude.js");

/// One uncaught error captured while the page's scripts executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeError {
    pub message: String,
    pub stack: Option<String>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
            stack: None,
        }
    }
}

/// Result of one emulation pass: the mutated document plus everything the
/// page's scripts logged or threw. Consumed by the diagnostics renderer
/// immediately after the run.
#[derive(Debug)]
pub struct ExecutionReport {
    pub document: PageDocument,
    pub errors: Vec<RuntimeError>,
    pub logs: Vec<String>,
}

#[derive(Deserialize)]
struct Snapshot {
    dom: SnapshotDom,
    logs: Vec<String>,
    errors: Vec<RuntimeError>,
}

#[derive(Deserialize)]
struct SnapshotDom {
    nodes: Vec<crate::dom::PageNode>,
}

/// Encode arbitrary text as a JS string literal. JSON string syntax is a
/// subset of JS string syntax, so the page source survives verbatim.
fn js_string_literal(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| String::from("\"\""))
}

fn eval(context: &mut Context, code: &str) -> Result<boa_engine::JsValue, BuildError> {
    context
        .eval(Source::from_bytes(code))
        .map_err(|e| BuildError::script(e.to_string()))
}

/// Execute every inline script of `html_source` inside a fresh emulated DOM.
///
/// Scripts with an external `src` are not fetched; pre-rendering operates on
/// local data. Uncaught exceptions and console output are captured into the
/// report rather than propagated, and one failing script never prevents its
/// siblings from running. The returned error only signals a failure of the
/// emulation environment itself.
pub fn run(html_source: &str) -> Result<ExecutionReport, BuildError> {
    let document = PageDocument::parse(html_source);
    let scripts = document.inline_script_texts();

    let mut context = Context::default();
    eval(&mut context, DOM_PRELUDE)?;

    let dom_json = serde_json::to_string(&document)
        .map_err(|e| BuildError::script(format!("document encode failed: {}", e)))?;
    eval(
        &mut context,
        &format!("__tk_load__({});", js_string_literal(&dom_json)),
    )?;

    // Engine-level failures of the trampoline itself (the trampoline catches
    // everything a page script throws) still end up in the report so one bad
    // script cannot take the page down.
    let mut engine_errors = Vec::new();
    for script in &scripts {
        let call = format!("__tk_run__({});", js_string_literal(script));
        if let Err(e) = eval(&mut context, &call) {
            engine_errors.push(RuntimeError::new(e.to_string()));
        }
        context.run_jobs();
    }

    // Flush queued timers (bounded), fire the document-ready transition,
    // then drain remaining microtask jobs before snapshotting.
    eval(&mut context, "__tk_finish__();")?;
    context.run_jobs();

    let value = eval(&mut context, "__tk_snapshot__()")?;
    let json = value
        .to_json(&mut context)
        .map_err(|e| BuildError::script(format!("snapshot decode failed: {}", e)))?;
    let snapshot: Snapshot = serde_json::from_value(json)
        .map_err(|e| BuildError::script(format!("snapshot decode failed: {}", e)))?;

    let mut document = PageDocument {
        nodes: snapshot.dom.nodes,
    };
    document.resolve_raw_fragments();

    let mut errors = snapshot.errors;
    errors.extend(engine_errors);

    Ok(ExecutionReport {
        document,
        errors,
        logs: snapshot.logs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executes_inline_scripts_against_the_document() {
        let report = run(
            "<html><head></head><body><h1 id=\"build-time\"></h1>\
             <script>document.getElementById(\"build-time\").textContent = \"Clicks: 0\";</script>\
             </body></html>",
        )
        .expect("run");
        assert!(report.errors.is_empty());
        assert!(report.document.serialize().contains(">Clicks: 0</h1>"));
    }

    #[test]
    fn captures_uncaught_errors_and_continues() {
        let report = run(
            "<body>\
             <script>throw new Error(\"custom error\");</script>\
             <script>document.body.setAttribute(\"data-ran\", \"yes\");</script>\
             </body>",
        )
        .expect("run");
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("custom error"));
        assert!(report.document.serialize().contains("data-ran=\"yes\""));
    }

    #[test]
    fn captures_console_output_in_order() {
        let report = run(
            "<body><script>\
             console.log(\"plain\");\
             console.log(\"count:\", 2);\
             console.log({ a: 1 });\
             </script></body>",
        )
        .expect("run");
        assert_eq!(report.logs[0], "plain");
        assert_eq!(report.logs[1], "count: 2");
        assert!(report.logs[2].contains("\"a\": 1"));
    }

    #[test]
    fn random_values_fill_all_nine_supported_kinds() {
        let report = run(
            "<body><script>\
             var kinds = [Int8Array, Uint8Array, Uint8ClampedArray, Int16Array, Uint16Array,\
                          Int32Array, Uint32Array, Float32Array, Float64Array];\
             var lens = [];\
             for (var i = 0; i < kinds.length; i++) {\
               lens.push(crypto.getRandomValues(new kinds[i](5)).length);\
             }\
             console.log(lens.join(\",\"));\
             </script></body>",
        )
        .expect("run");
        assert_eq!(report.logs, vec!["5,5,5,5,5,5,5,5,5"]);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn random_values_rejects_unsupported_kinds_and_oversized_requests() {
        let report = run(
            "<body>\
             <script>crypto.getRandomValues([1, 2, 3]);</script>\
             <script>crypto.getRandomValues(new Uint8Array(65537));</script>\
             </body>",
        )
        .expect("run");
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].message.contains("not supported"));
        assert!(report.errors[1].message.contains("quota exceeded"));
    }

    #[test]
    fn fetch_shim_resolves_to_an_empty_response() {
        let report = run(
            "<body><div id=\"out\"></div><script>\
             fetch(\"/anything\").then(function (r) { return r.text(); })\
               .then(function (t) {\
                 document.getElementById(\"out\").textContent = \"got:[\" + t + \"]\";\
               });\
             </script></body>",
        )
        .expect("run");
        assert!(report.document.serialize().contains("got:[]"));
    }

    #[test]
    fn document_ready_queue_flushes_exactly_once() {
        let report = run(
            "<body><div id=\"out\"></div><script>\
             document.addEventListener(\"DOMContentLoaded\", function () {\
               document.getElementById(\"out\").textContent += \"ready;\";\
             });\
             </script></body>",
        )
        .expect("run");
        assert!(report.document.serialize().contains(">ready;</div>"));
    }

    #[test]
    fn value_accessor_depends_on_element_kind() {
        let report = run(
            "<body><input id=\"field\"><div id=\"box\"></div><script>\
             document.getElementById(\"field\").value = \"typed\";\
             document.getElementById(\"box\").value = \"content\";\
             </script></body>",
        )
        .expect("run");
        let html = report.document.serialize();
        assert!(html.contains("value=\"typed\""));
        assert!(html.contains(">content</div>"));
    }

    #[test]
    fn inner_html_writes_become_structured_markup() {
        let report = run(
            "<body><div id=\"slot\"></div><script>\
             document.getElementById(\"slot\").innerHTML = \"<p class='inner'>hi</p>\";\
             </script></body>",
        )
        .expect("run");
        assert!(report.document.has_element_with_class("inner"));
    }

    #[test]
    fn concurrent_runs_share_no_state() {
        let failing = "<body><script>throw new Error(\"only here\");</script></body>";
        let clean = "<body><script>console.log(\"clean page\");</script></body>";

        let (left, right) = rayon::join(|| run(failing), || run(clean));
        let left = left.expect("left run");
        let right = right.expect("right run");

        assert_eq!(left.errors.len(), 1);
        assert!(right.errors.is_empty());
        assert_eq!(right.logs, vec!["clean page"]);
        assert!(left.logs.is_empty());
    }

    #[test]
    fn external_src_scripts_are_not_executed() {
        let report = run(
            "<body><script src=\"missing.js\"></script>\
             <script>document.body.setAttribute(\"data-ok\", \"1\");</script></body>",
        )
        .expect("run");
        assert!(report.errors.is_empty());
        assert!(report.document.serialize().contains("data-ok=\"1\""));
    }
}

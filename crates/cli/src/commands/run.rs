use crate::OutputFormat;
use crate::util::{CliResult, plural, read_source};
use anyhow::Context;
use clap::Args;
use fieldsearch_core::{FieldValue, SitePrefix};
use fieldsearch_dom::Document;
use fieldsearch_engine::{Bindings, ExecutionLimits, Interpreter, ResultSlot, Warning, assemble};
use fieldsearch_store_memory::MemoryStore;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Node name the program can address as `&root`.
pub const ROOT_BINDING: &str = "root";
/// Result slot the program can address as `@result`.
pub const RESULT_BINDING: &str = "result";

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(
        long = "site",
        value_name = "FILE",
        help = "XML site description holding pages, fields and links."
    )]
    pub site: PathBuf,

    #[arg(value_name = "PROGRAM", help = "Assembly source of the program to run.")]
    pub program: PathBuf,

    #[arg(
        long = "prefix",
        value_name = "URL",
        help = "Site prefix for resolving paths. Default: the prefix of the site file."
    )]
    pub prefix: Option<String>,

    #[arg(
        long = "root",
        value_name = "NAME",
        default_value = "snap",
        help = "Name of the output document element bound to &root."
    )]
    pub root: String,

    #[arg(long = "max-steps", value_name = "N", help = "Abort after executing N instructions.")]
    pub max_steps: Option<usize>,

    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(long = "no-color", help = "Disable ANSI colors in text output.")]
    pub no_color: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub(crate) struct WarningSummary {
    message: String,
    path: String,
    field: String,
}

impl From<Warning> for WarningSummary {
    fn from(warning: Warning) -> Self {
        Self { message: warning.message, path: warning.path, field: warning.field }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub(crate) struct RunSummary {
    document: String,
    result: Vec<FieldValue>,
    remaining: Vec<FieldValue>,
    warnings: Vec<WarningSummary>,
    steps: usize,
}

pub fn run(args: &RunArgs) -> CliResult<String> {
    if args.no_color {
        owo_colors::set_override(false);
    }
    let site = read_source(&args.site)?;
    let store = MemoryStore::from_xml(&site)
        .with_context(|| format!("failed to load site description {}", args.site.display()))?;
    tracing::debug!(site = %store.site(), pages = store.page_count(), "site loaded");

    let source = read_source(&args.program)?;
    let summary = execute(store, &source, args)
        .with_context(|| format!("program {} failed", args.program.display()))?;

    let output = match args.format {
        OutputFormat::Text => render_run_text(&summary),
        OutputFormat::Json => render_run_json(&summary)?,
    };
    Ok(output)
}

pub(crate) fn execute(store: MemoryStore, source: &str, args: &RunArgs) -> CliResult<RunSummary> {
    let site = args.prefix.as_deref().map_or_else(|| store.site().clone(), SitePrefix::from);

    let document = Document::new();
    let root = document.root().append_element(&args.root);
    let slot = ResultSlot::new();
    let bindings = Bindings::new()
        .with_node(ROOT_BINDING, root.clone())
        .with_result(RESULT_BINDING, slot.clone());
    let program = assemble(source, &bindings)?;

    let store = Arc::new(store);
    let mut interpreter = Interpreter::new(store.clone(), store);
    if let Some(max_steps) = args.max_steps {
        interpreter = interpreter.with_limits(ExecutionLimits::new(max_steps));
    }
    let outcome = interpreter.run(&program, &site, Some(root))?;

    Ok(RunSummary {
        document: document.to_xml()?,
        result: slot.values(),
        remaining: outcome.result,
        warnings: outcome.warnings.into_iter().map(WarningSummary::from).collect(),
        steps: outcome.steps,
    })
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "null".to_owned(),
        FieldValue::String(text) => format!("{text:?}"),
        other => other.to_string(),
    }
}

fn render_values(output: &mut String, heading: &str, values: &[FieldValue]) {
    let heading = heading.if_supports_color(Stream::Stdout, |t| t.bold().to_string());
    let _ = writeln!(output, "{heading} ({})", plural(values.len(), "value"));
    for value in values {
        let value = render_value(value);
        let value = value.if_supports_color(Stream::Stdout, |t| t.fg_rgb::<136, 192, 74>().to_string());
        let _ = writeln!(output, "  {value}");
    }
}

pub(crate) fn render_run_text(summary: &RunSummary) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", summary.document);
    let _ = writeln!(output);

    render_values(&mut output, "result", &summary.result);
    if !summary.remaining.is_empty() {
        render_values(&mut output, "remaining", &summary.remaining);
    }

    if !summary.warnings.is_empty() {
        let heading = "warnings".if_supports_color(Stream::Stdout, |t| t.bold().to_string());
        let _ = writeln!(output, "{heading} ({})", plural(summary.warnings.len(), "warning"));
        for warning in &summary.warnings {
            let message = warning.message.if_supports_color(Stream::Stdout, |t| t.yellow().to_string());
            let _ = writeln!(output, "  {message} (path: \"{}\", field: \"{}\")", warning.path, warning.field);
        }
    }

    let steps = plural(summary.steps, "step");
    let _ = write!(output, "{}", steps.if_supports_color(Stream::Stdout, |t| t.dimmed().to_string()));
    output
}

pub(crate) fn render_run_json(summary: &RunSummary) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::borrow::Cow;
    use std::fs;

    const SITE: &str = r#"
<site prefix="http://example.com/">
  <page path="journal">
    <field name="title">Journal</field>
    <page path="2024">
      <field name="modified" type="int64">1700000000000000</field>
      <page path="spring"/>
    </page>
  </page>
</site>"#;

    const PROGRAM: &str = r#"
MODE EACH
FIELD_NAME "title"
PATH "journal/2024/spring"
PARENTS ""
ELEMENT &root
SAVE "title"
WARNING "title missing"

RESET
FIELD_NAME "summary"
PATH "journal/2024/spring"
WARNING "no summary"

RESET
MODE PATHS
FIELD_NAME "modified"
PATH "journal"
CHILDREN 1
RESULT @result
RESET
"#;

    fn strip_ansi(input: &str) -> Cow<'_, str> {
        if !input.contains('\u{1b}') {
            return Cow::Borrowed(input);
        }

        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars();
        while let Some(ch) = chars.next() {
            if ch == '\u{1b}' {
                for next in chars.by_ref() {
                    if next == 'm' {
                        break;
                    }
                }
            } else {
                result.push(ch);
            }
        }
        Cow::Owned(result)
    }

    #[fixture]
    fn args() -> RunArgs {
        RunArgs {
            site: PathBuf::from("site.xml"),
            program: PathBuf::from("program.fsa"),
            prefix: None,
            root: "snap".into(),
            max_steps: None,
            format: OutputFormat::Text,
            no_color: true,
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::from_xml(SITE).expect("site")
    }

    #[rstest]
    fn execute_collects_document_result_and_warnings(args: RunArgs) {
        let summary = execute(store(), PROGRAM, &args).expect("run");
        assert_eq!(summary.document, "<snap><title>Journal</title></snap>");
        assert_eq!(summary.result, vec![FieldValue::from("http://example.com/journal/2024")]);
        assert!(summary.remaining.is_empty());
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(summary.warnings[0].message, "no summary");
        assert_eq!(summary.warnings[0].field, "summary");
        assert_eq!(summary.steps, 18);
    }

    #[rstest]
    fn root_name_is_configurable(mut args: RunArgs) {
        args.root = "page".into();
        let summary = execute(store(), PROGRAM, &args).expect("run");
        assert_eq!(summary.document, "<page><title>Journal</title></page>");
    }

    #[rstest]
    fn max_steps_aborts_long_programs(mut args: RunArgs) {
        args.max_steps = Some(3);
        let error = execute(store(), PROGRAM, &args).expect_err("limit");
        assert_eq!(error.to_string(), "program did not terminate within 3 steps");
    }

    #[rstest]
    fn unbound_names_are_reported(args: RunArgs) {
        let error = execute(store(), "RESULT @other", &args).expect_err("unbound");
        assert!(error.to_string().contains("other"));
    }

    #[rstest]
    fn text_output_lists_every_section(args: RunArgs) {
        let summary = execute(store(), PROGRAM, &args).expect("run");
        let text = render_run_text(&summary);
        let plain = strip_ansi(&text);
        assert!(plain.starts_with("<snap><title>Journal</title></snap>\n"));
        assert!(plain.contains("result (1 value)\n  \"http://example.com/journal/2024\""));
        assert!(plain.contains("warnings (1 warning)\n  no summary"));
        assert!(!plain.contains("remaining"));
        assert!(plain.ends_with("18 steps"));
    }

    #[rstest]
    fn json_output_is_structured(args: RunArgs) {
        let summary = execute(store(), PROGRAM, &args).expect("run");
        let json: serde_json::Value =
            serde_json::from_str(&render_run_json(&summary).expect("json")).expect("parse");
        assert_eq!(json["document"], "<snap><title>Journal</title></snap>");
        assert_eq!(json["result"][0], "http://example.com/journal/2024");
        assert_eq!(json["warnings"][0]["path"], "http://example.com/journal/2024/spring");
        assert_eq!(json["steps"], 18);
    }

    #[rstest]
    fn demo_program_renders_the_demo_site(args: RunArgs) {
        const DEMO_SITE: &str = include_str!("../../assets/demo_site.xml");
        const DEMO_PROGRAM: &str = include_str!("../../assets/demo.fsa");

        let store = MemoryStore::from_xml(DEMO_SITE).expect("demo site");
        let summary = execute(store, DEMO_PROGRAM, &args).expect("demo run");
        assert_eq!(
            summary.document,
            concat!(
                "<snap><header><title>Hello, world</title><modified>2023-11-14</modified></header>",
                "<body><p>First <em>post</em>.</p></body></snap>"
            )
        );
        assert_eq!(summary.result, vec![FieldValue::from("http://example.com/blog/second-post")]);
        assert!(summary.warnings.is_empty());
    }

    #[rstest]
    fn run_reads_site_and_program_files(mut args: RunArgs) {
        let dir = tempfile::tempdir().expect("tempdir");
        args.site = dir.path().join("site.xml");
        args.program = dir.path().join("program.fsa");
        args.format = OutputFormat::Json;
        fs::write(&args.site, SITE).expect("write site");
        fs::write(&args.program, PROGRAM).expect("write program");

        let output = run(&args).expect("run");
        assert!(output.contains("\"steps\": 18"));
    }

    #[rstest]
    fn missing_site_file_names_the_path(mut args: RunArgs) {
        let dir = tempfile::tempdir().expect("tempdir");
        args.site = dir.path().join("absent.xml");
        let error = run(&args).expect_err("missing");
        assert!(format!("{error:#}").contains("absent.xml"));
    }
}

use crate::util::{CliResult, plural, read_source};
use anyhow::Context;
use clap::Args;
use fieldsearch_engine::{Bindings, Program, assemble};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(value_name = "PROGRAM", help = "Assembly source to validate.")]
    pub program: PathBuf,

    #[arg(long = "quiet", short = 'q', help = "Only report the instruction count.")]
    pub quiet: bool,
}

pub fn run(args: &CheckArgs) -> CliResult<String> {
    let source = read_source(&args.program)?;
    let program =
        check_source(&source).with_context(|| format!("{} is invalid", args.program.display()))?;
    Ok(render_check(&program, args.quiet))
}

/// Assembles `source` with every `&node` and `@result` name bound to a placeholder.
pub(crate) fn check_source(source: &str) -> CliResult<Program> {
    Ok(assemble(source, &Bindings::placeholders())?)
}

pub(crate) fn render_check(program: &Program, quiet: bool) -> String {
    let mut output = String::new();
    if !quiet {
        let _ = write!(output, "{program}");
        if !program.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
    }
    let _ = write!(output, "ok: {}", plural(program.len(), "instruction"));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn disassembly_lists_each_instruction() {
        let program = check_source("mode each\nfield_name \"title\" # trailing\nPATH \"\"\nRESULT @anything\n")
            .expect("assemble");
        let output = render_check(&program, false);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec!["MODE EACH", "FIELD_NAME \"title\"", "PATH \"\"", "RESULT @result", "ok: 4 instructions"]
        );
    }

    #[rstest]
    fn quiet_prints_the_count_only() {
        let program = check_source("LABEL 1").expect("assemble");
        assert_eq!(render_check(&program, true), "ok: 1 instruction");
    }

    #[rstest]
    #[case("FROBNICATE 1", "unknown instruction 'FROBNICATE'")]
    #[case("PATH 3", "PATH does not accept")]
    #[case("PATH \"unterminated", "syntax error at line 1")]
    fn invalid_sources_are_rejected(#[case] source: &str, #[case] message: &str) {
        let error = check_source(source).expect_err("invalid");
        assert!(error.to_string().contains(message), "{error}");
    }
}

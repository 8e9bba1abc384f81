//! Rendering of lexer and parser errors as ariadne reports.

use std::fmt;
use std::io::{Cursor, Read};

use ariadne::{Config, Label, Report, ReportKind, Source};

use crate::parser::ParseError;

/// Render each error as a plain-text ariadne report.
pub fn render_errors<'code, T: fmt::Display + 'code>(
    errors: impl IntoIterator<Item = ParseError<'code, T>>,
    filename: &str,
    source_code: &str,
) -> Vec<String> {
    let mut reports = Vec::new();
    let mut report_bytes = Cursor::new(Vec::new());
    for error in errors {
        report_bytes.set_position(0);
        report_bytes.get_mut().clear();
        let write_result = Report::build(ReportKind::Error, (filename, error.span().into_range()))
            .with_config(Config::default().with_color(false))
            .with_message(error.to_string())
            .with_label(
                Label::new((filename, error.span().into_range()))
                    .with_message(error.reason().to_string()),
            )
            .finish()
            .write((filename, Source::from(source_code)), &mut report_bytes);
        if write_result.is_err() {
            reports.push(error.to_string());
            continue;
        }
        report_bytes.set_position(0);
        let mut report_string = String::new();
        if report_bytes.read_to_string(&mut report_string).is_ok() {
            reports.push(report_string);
        } else {
            reports.push(error.to_string());
        }
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer;
    use chumsky::prelude::Parser;

    #[test]
    fn lex_error_renders_with_filename() {
        let code = "ABC";
        let errors = lexer().parse(code).into_errors();
        assert!(!errors.is_empty());
        let reports = render_errors(errors, "page.thinc", code);
        assert!(reports[0].contains("page.thinc"));
    }
}

//! Line-by-line template filter

use crate::parse::{Node, Template};
use crate::TemplateError;
use std::io::{BufRead, Write};

/// Error type returned by lookup functions
pub type LookupError = Box<dyn std::error::Error + Send + Sync>;

/// The single function templates may call.
///
/// Implemented for any `FnMut(&str) -> Result<String, E>`, so a closure over
/// a fetcher (or a stub in tests) can be passed directly.
pub trait Lookup {
    /// Resolve a secret reference to its value.
    ///
    /// # Errors
    ///
    /// Any error aborts the filter run.
    fn lookup(&mut self, reference: &str) -> Result<String, LookupError>;
}

impl<F, E> Lookup for F
where
    F: FnMut(&str) -> Result<String, E>,
    E: Into<LookupError>,
{
    fn lookup(&mut self, reference: &str) -> Result<String, LookupError> {
        self(reference).map_err(Into::into)
    }
}

/// Render `input` to `output`, one line at a time.
///
/// Blank lines are copied without being parsed. Every other line is parsed
/// as a template and its lookups resolved in order; the rendered line is
/// written only once all of its lookups have succeeded. Every output line,
/// including the last, ends with `\n`.
///
/// The first error stops the run. Lines rendered before it have already been
/// written to `output`.
///
/// # Errors
///
/// Returns [`TemplateError`] on read, syntax, lookup or write failure.
pub fn filter<L, R, W>(lookup: &mut L, input: R, output: &mut W) -> Result<(), TemplateError>
where
    L: Lookup + ?Sized,
    R: BufRead,
    W: Write + ?Sized,
{
    let mut rendered_lines = 0usize;

    for (index, line) in input.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|source| TemplateError::Read {
            line: line_number,
            source,
        })?;

        if !line.is_empty() {
            let rendered = render_line(lookup, &line, line_number)?;
            output
                .write_all(rendered.as_bytes())
                .map_err(TemplateError::Write)?;
        }
        output.write_all(b"\n").map_err(TemplateError::Write)?;
        rendered_lines += 1;
    }

    output.flush().map_err(TemplateError::Write)?;
    tracing::debug!(lines = rendered_lines, "template rendered");
    Ok(())
}

/// Parse and render a single non-empty line
///
/// # Errors
///
/// Returns [`TemplateError::Syntax`] or [`TemplateError::Lookup`].
pub fn render_line<L>(
    lookup: &mut L,
    line: &str,
    line_number: usize,
) -> Result<String, TemplateError>
where
    L: Lookup + ?Sized,
{
    let template = Template::parse(line).map_err(|error| TemplateError::Syntax {
        line: line_number,
        column: line[..error.span.offset].chars().count() + 1,
        source_line: line.to_string(),
        error,
    })?;

    let mut rendered = String::with_capacity(line.len());
    for node in template.nodes() {
        match node {
            Node::Text(text) => rendered.push_str(text),
            Node::Lookup { reference, .. } => {
                tracing::debug!(line = line_number, reference = %reference, "resolving lookup");
                let value = lookup
                    .lookup(reference)
                    .map_err(|source| TemplateError::Lookup {
                        line: line_number,
                        reference: reference.clone(),
                        source,
                    })?;
                rendered.push_str(&value);
            }
        }
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stub(reference: &str) -> Result<String, String> {
        match reference {
            "https://example.vault/secrets/pass" => Ok("mysecretvalue1".to_string()),
            "https://example.vault/secrets/user" => Ok("admin".to_string()),
            other => Err(format!("no such secret: {other}")),
        }
    }

    fn run(template: &str) -> (Result<(), TemplateError>, String) {
        let mut out = Vec::new();
        let mut lookup = stub;
        let result = filter(&mut lookup, Cursor::new(template), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn valid_template() {
        let template = "USER=foo@example.com\nPASSWORD={{lookup \"https://example.vault/secrets/pass\"}}\n";
        let (result, out) = run(template);

        result.unwrap();
        assert_eq!(out, "USER=foo@example.com\nPASSWORD=mysecretvalue1\n");
    }

    #[test]
    fn empty_line_passes_through_without_lookup() {
        let mut calls = 0;
        let mut lookup = |reference: &str| {
            calls += 1;
            stub(reference)
        };
        let mut out = Vec::new();
        filter(
            &mut lookup,
            Cursor::new("USER=foo@example.com\n\nPASSWORD=mysecretvalue1\n"),
            &mut out,
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "USER=foo@example.com\n\nPASSWORD=mysecretvalue1\n"
        );
        assert_eq!(calls, 0);
    }

    #[test]
    fn last_line_gets_newline() {
        let (result, out) = run("A=1\nB={{ kv \"https://example.vault/secrets/user\" }}");
        result.unwrap();
        assert_eq!(out, "A=1\nB=admin\n");
    }

    #[test]
    fn crlf_input_is_normalized() {
        let (result, out) = run("A=1\r\n\r\nB=2\r\n");
        result.unwrap();
        assert_eq!(out, "A=1\n\nB=2\n");
    }

    #[test]
    fn empty_input_produces_no_output() {
        let (result, out) = run("");
        result.unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn lookup_failure_keeps_earlier_lines() {
        let template = "A=1\nB={{ kv \"https://example.vault/secrets/user\" }}\nC=x{{ kv \"https://example.vault/secrets/missing\" }}\nD=never\n";
        let (result, out) = run(template);

        let err = result.unwrap_err();
        assert!(matches!(err, TemplateError::Lookup { line: 3, .. }));
        assert!(err.to_string().contains("https://example.vault/secrets/missing"));
        assert_eq!(out, "A=1\nB=admin\n");
    }

    #[test]
    fn syntax_error_aborts_at_line() {
        let (result, out) = run("A=1\nB={{ kv \"https://example.vault/secrets/user\"\nC=3\n");

        let err = result.unwrap_err();
        let TemplateError::Syntax { line, column, .. } = &err else {
            panic!("expected syntax error, got {err:?}");
        };
        assert_eq!((*line, *column), (2, 3));
        assert_eq!(out, "A=1\n");
    }

    #[test]
    fn lookups_run_in_order() {
        let mut seen = Vec::new();
        let mut lookup = |reference: &str| -> Result<String, String> {
            seen.push(reference.to_string());
            Ok(reference.rsplit('/').next().unwrap_or_default().to_uppercase())
        };
        let mut out = Vec::new();
        filter(
            &mut lookup,
            Cursor::new("X={{ kv \"https://v/secrets/a\" }}-{{ kv \"https://v/secrets/b\" }}\nY={{ kv \"https://v/secrets/c\" }}\n"),
            &mut out,
        )
        .unwrap();

        assert_eq!(seen, vec!["https://v/secrets/a", "https://v/secrets/b", "https://v/secrets/c"]);
        assert_eq!(String::from_utf8(out).unwrap(), "X=A-B\nY=C\n");
    }

    #[test]
    fn secret_values_are_not_reparsed() {
        let mut lookup = |_: &str| -> Result<String, String> { Ok("{{ kv \"x\" }}".to_string()) };
        let mut out = Vec::new();
        filter(&mut lookup, Cursor::new("A={{ kv \"https://v/secrets/a\" }}\n"), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "A={{ kv \"x\" }}\n");
    }

    #[test]
    fn invalid_utf8_is_read_error() {
        let mut out: Vec<u8> = Vec::new();
        let mut lookup = stub;
        let err = filter(&mut lookup, Cursor::new(vec![b'A', b'=', 0xff, b'\n']), &mut out)
            .unwrap_err();
        assert!(matches!(err, TemplateError::Read { line: 1, .. }));
    }
}

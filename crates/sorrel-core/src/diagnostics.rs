use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use regex::Regex;

use crate::error::SorrelError;
use crate::form::Span;

/// Position of the reader's cursor, used when re-emitting reader
/// diagnostics on its behalf.
#[derive(Clone, Debug)]
pub struct ReadCursor {
    pub file: Option<Arc<str>>,
    pub line: u32,
    pub column: u32,
}

impl ReadCursor {
    fn to_span(&self) -> Span {
        Span::point(self.file.clone(), self.line, self.column)
    }
}

/// Sink for analyzer diagnostics. Lines have the shape
/// `FILE:LINE:COL: LEVEL: MESSAGE`. Diagnostics whose file matches a
/// silencing regex are neither printed nor counted.
///
/// The problem counter is atomic: it is the one piece of state a host
/// parallelizing top-level forms would share.
pub struct Diagnostics {
    out: Box<dyn Write + Send>,
    problems: AtomicUsize,
    silenced_files: Vec<Regex>,
}

impl Diagnostics {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            problems: AtomicUsize::new(0),
            silenced_files: Vec::new(),
        }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    pub fn with_silenced_files(mut self, regexes: Vec<Regex>) -> Self {
        self.silenced_files = regexes;
        self
    }

    pub fn problem_count(&self) -> usize {
        self.problems.load(Ordering::Relaxed)
    }

    fn is_silenced(&self, file: &str) -> bool {
        self.silenced_files.iter().any(|re| re.is_match(file))
    }

    fn emit(&mut self, span: Option<&Span>, message: &str) {
        let (file, line, col) = match span {
            Some(span) => (span.file_name(), span.start_line, span.start_col),
            None => ("<file>", 0, 0),
        };
        if self.is_silenced(file) {
            return;
        }
        self.problems.fetch_add(1, Ordering::Relaxed);
        let _ = writeln!(self.out, "{}:{}:{}: {}", file, line, col, message);
    }

    pub fn parse_warning(&mut self, span: Option<&Span>, message: &str) {
        self.emit(span, &format!("Parse warning: {}", message));
    }

    pub fn parse_error(&mut self, span: Option<&Span>, message: &str) {
        self.emit(span, &format!("Parse error: {}", message));
    }

    pub fn read_warning(&mut self, cursor: &ReadCursor, message: &str) {
        self.emit(Some(&cursor.to_span()), &format!("Read warning: {}", message));
    }

    pub fn read_error(&mut self, cursor: &ReadCursor, message: &str) {
        self.emit(Some(&cursor.to_span()), &format!("Read error: {}", message));
    }

    /// The per-form boundary: report an error that aborted a top-level
    /// form. Parse errors already carry their own location prefix.
    pub fn report(&mut self, err: &SorrelError) {
        let file = err
            .span()
            .map(|span| span.file_name().to_string())
            .unwrap_or_else(|| "<file>".to_string());
        if self.is_silenced(&file) {
            return;
        }
        self.problems.fetch_add(1, Ordering::Relaxed);
        let _ = writeln!(self.out, "{}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn emits_position_prefixed_lines_and_counts() {
        let buf = SharedBuf::default();
        let mut diag = Diagnostics::new(Box::new(buf.clone()));
        let span = Span::new("lib.srl", 3, 7, 3, 9);
        diag.parse_warning(Some(&span), "missing else branch");
        diag.parse_error(None, "Unable to resolve symbol: x");
        assert_eq!(diag.problem_count(), 2);
        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            text,
            "lib.srl:3:7: Parse warning: missing else branch\n\
             <file>:0:0: Parse error: Unable to resolve symbol: x\n"
        );
    }

    #[test]
    fn silenced_files_are_neither_printed_nor_counted() {
        let buf = SharedBuf::default();
        let mut diag = Diagnostics::new(Box::new(buf.clone()))
            .with_silenced_files(vec![Regex::new(r"generated").unwrap()]);
        let span = Span::new("generated/out.srl", 1, 1, 1, 2);
        diag.parse_warning(Some(&span), "unused binding: x");
        assert_eq!(diag.problem_count(), 0);
        assert!(buf.0.lock().unwrap().is_empty());
    }
}

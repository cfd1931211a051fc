use std::fmt;

use thiserror::Error;

use crate::form::{Form, Span};

#[derive(Clone, Debug)]
pub struct ParseErrorData {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseErrorData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }
}

impl fmt::Display for ParseErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (file, line, col) = match &self.span {
            Some(span) => (span.file_name(), span.start_line, span.start_col),
            None => ("<file>", 0, 0),
        };
        write!(f, "{}:{}:{}: Parse error: {}", file, line, col, self.message)
    }
}

#[derive(Clone, Debug)]
pub struct EvalErrorData {
    pub message: String,
    pub span: Option<Span>,
}

impl EvalErrorData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }
}

impl fmt::Display for EvalErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors crossing the analyzer boundary. `Parse` carries the position
/// of the offending read object; `Eval` wraps failures propagated out
/// of macro expansion.
#[derive(Error, Debug, Clone)]
pub enum SorrelError {
    #[error("{0}")]
    Parse(ParseErrorData),

    #[error("Eval error: {0}")]
    Eval(EvalErrorData),
}

impl SorrelError {
    pub fn parse(message: impl Into<String>) -> Self {
        SorrelError::Parse(ParseErrorData::new(message))
    }

    /// A parse error positioned at the offending form.
    pub fn parse_at(message: impl Into<String>, form: &Form) -> Self {
        let mut data = ParseErrorData::new(message);
        data.span = form.span.clone();
        SorrelError::Parse(data)
    }

    pub fn eval(message: impl Into<String>) -> Self {
        SorrelError::Eval(EvalErrorData::new(message))
    }

    pub fn with_span(mut self, span: Span) -> Self {
        match &mut self {
            SorrelError::Parse(data) => {
                if data.span.is_none() {
                    data.span = Some(span);
                }
            }
            SorrelError::Eval(data) => {
                if data.span.is_none() {
                    data.span = Some(span);
                }
            }
        }
        self
    }

    pub fn span(&self) -> Option<&Span> {
        match self {
            SorrelError::Parse(data) => data.span.as_ref(),
            SorrelError::Eval(data) => data.span.as_ref(),
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, SorrelError::Parse(_))
    }
}

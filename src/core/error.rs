use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Range,
    NotFound,
    Permission,
    Io,
    Cancelled,
    InvalidInteger,
    InvalidFloat,
    InvalidBoolean,
    InvalidDatetime,
    InvalidTerm,
    InvalidStructured,
}

impl ErrorKind {
    /// Stable snake_case label, used for codec errors and remote error envelopes.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Internal => "internal",
            ErrorKind::Usage => "usage",
            ErrorKind::Range => "range",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Permission => "permission",
            ErrorKind::Io => "io",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidInteger => "invalid_integer_format",
            ErrorKind::InvalidFloat => "invalid_float_format",
            ErrorKind::InvalidBoolean => "invalid_boolean_format",
            ErrorKind::InvalidDatetime => "invalid_datetime_format",
            ErrorKind::InvalidTerm => "invalid_term_format",
            ErrorKind::InvalidStructured => "invalid_structured_format",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        let kind = match label {
            "internal" => ErrorKind::Internal,
            "usage" => ErrorKind::Usage,
            "range" => ErrorKind::Range,
            "not_found" => ErrorKind::NotFound,
            "permission" => ErrorKind::Permission,
            "io" => ErrorKind::Io,
            "cancelled" => ErrorKind::Cancelled,
            "invalid_integer_format" => ErrorKind::InvalidInteger,
            "invalid_float_format" => ErrorKind::InvalidFloat,
            "invalid_boolean_format" => ErrorKind::InvalidBoolean,
            "invalid_datetime_format" => ErrorKind::InvalidDatetime,
            "invalid_term_format" => ErrorKind::InvalidTerm,
            "invalid_structured_format" => ErrorKind::InvalidStructured,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_codec(self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidInteger
                | ErrorKind::InvalidFloat
                | ErrorKind::InvalidBoolean
                | ErrorKind::InvalidDatetime
                | ErrorKind::InvalidTerm
                | ErrorKind::InvalidStructured
        )
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    table: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            table: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_str())?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(table) = &self.table {
            write!(f, " (table: {table})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Range => 3,
        ErrorKind::NotFound => 4,
        ErrorKind::Permission => 5,
        ErrorKind::Io => 6,
        ErrorKind::Cancelled => 7,
        ErrorKind::InvalidInteger
        | ErrorKind::InvalidFloat
        | ErrorKind::InvalidBoolean
        | ErrorKind::InvalidDatetime
        | ErrorKind::InvalidTerm
        | ErrorKind::InvalidStructured => 8,
    }
}

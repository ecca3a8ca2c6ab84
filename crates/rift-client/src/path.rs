//! Control-plane URL paths.

/// Control-plane operations exposed under `/mockserver/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Status,
    Bind,
    Stop,
    Reset,
    Clear,
    Verify,
    VerifySequence,
    Retrieve,
    Expectation,
    OpenApi,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Status => "status",
            Operation::Bind => "bind",
            Operation::Stop => "stop",
            Operation::Reset => "reset",
            Operation::Clear => "clear",
            Operation::Verify => "verify",
            Operation::VerifySequence => "verifySequence",
            Operation::Retrieve => "retrieve",
            Operation::Expectation => "expectation",
            Operation::OpenApi => "openapi",
        }
    }
}

/// Build the path of a control-plane operation, honouring a context path.
///
/// ```
/// use rift_client::path::{control_path, Operation};
///
/// assert_eq!(control_path("", Operation::Reset), "/mockserver/reset");
/// assert_eq!(control_path("api", Operation::Reset), "/api/mockserver/reset");
/// ```
pub fn control_path(context_path: &str, operation: Operation) -> String {
    let path = format!("mockserver/{}", operation.as_str());
    let context_path = context_path.trim();
    if context_path.is_empty() {
        return format!("/{}", path);
    }

    let mut full = String::with_capacity(context_path.len() + path.len() + 2);
    if !context_path.starts_with('/') {
        full.push('/');
    }
    full.push_str(context_path);
    if !context_path.ends_with('/') {
        full.push('/');
    }
    full.push_str(&path);
    full
}

//! Wire types exchanged with the control plane.
//!
//! The JSON shapes follow the MockServer control-plane API (camelCase
//! fields, enum values in upper case).

mod expectation;
mod multimap;
mod request;
mod retrieve;
mod verification;

pub use expectation::{
    Delay, Expectation, ExpectationId, HttpError, HttpForward, HttpResponse, OpenApiExpectation,
    Scheme, TimeToLive, TimeUnit, Times,
};
pub use multimap::Multimap;
pub use request::{HttpRequest, OpenApiDefinition, RequestDefinition};
pub use retrieve::{
    ClearType, Format, LogEventRequestAndResponse, PortBinding, RetrieveType, LOG_SEPARATOR,
};
pub use verification::{Verification, VerificationSequence, VerificationTimes};

//! The uniform result shape of the command layer.

use std::error::Error as StdError;
use std::fmt::Write as _;

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, HeaderValue, LOCATION,
};
use http::{Response, StatusCode};
use serde::Serialize;

use crate::error::CommandError;

/// HTTP response produced by a command.
pub type HttpResponse = Response<String>;

/// Origin reported for failures caught by the dispatcher.
pub const EXCEPTION_FROM: &str = "CommandControl commandOperation";

/// Outcome of a request as seen by the caller.
#[derive(Debug, Default)]
pub struct ResponseData {
    /// The request has been fully handled; the caller must not resolve it.
    pub stop_processing: bool,
    /// Set whenever `stop_processing` is.
    pub http_response: Option<HttpResponse>,
}

/// Envelope returned for every request, successful or not.
#[derive(Debug, Default)]
pub struct ResponseEnvelope {
    pub is_exception: bool,
    pub exception_stack: String,
    pub exception_from: String,
    pub data: ResponseData,
}

impl ResponseEnvelope {
    /// The request is not a command and continues to DNS resolution.
    pub fn pass_through() -> Self {
        Self::default()
    }

    /// The request was answered by this layer.
    pub fn handled(response: HttpResponse) -> Self {
        Self {
            data: ResponseData {
                stop_processing: true,
                http_response: Some(response),
            },
            ..Self::default()
        }
    }

    /// A command failed; `trace` is returned to the client as a JSON string.
    pub fn exception(trace: String) -> Self {
        let body = serde_json::Value::String(trace.clone()).to_string();
        Self {
            is_exception: true,
            exception_stack: trace,
            exception_from: EXCEPTION_FROM.to_string(),
            data: ResponseData {
                stop_processing: true,
                http_response: Some(with_json_headers(body)),
            },
        }
    }

    pub fn http_response(&self) -> Option<&HttpResponse> {
        self.data.http_response.as_ref()
    }
}

/// Serialize `payload` into a `200` JSON response with open CORS headers.
pub fn json_response<T>(payload: &T) -> Result<HttpResponse, CommandError>
where
    T: Serialize + ?Sized,
{
    Ok(with_json_headers(serde_json::to_string(payload)?))
}

/// `302` redirect to `location`. Carries no body and no CORS headers.
pub fn redirect(location: &str) -> Result<HttpResponse, CommandError> {
    Ok(Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, location)
        .body(String::new())?)
}

fn with_json_headers(body: String) -> HttpResponse {
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    response
}

/// Render an error and its chain of sources, one per line.
pub fn error_trace(err: &(dyn StdError + 'static)) -> String {
    let mut trace = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(trace, "\nCaused by: {cause}");
        source = cause.source();
    }
    trace
}

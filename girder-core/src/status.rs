// HTTP status produced by endpoints and by the pipeline's failure paths

use std::borrow::Cow;
use std::fmt;

/// A numeric HTTP status code paired with a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub description: Cow<'static, str>,
}

impl Status {
    pub const OK: Status = Status::from_static(200, "OK");
    pub const CREATED: Status = Status::from_static(201, "Created");
    pub const NO_CONTENT: Status = Status::from_static(204, "No Content");
    pub const BAD_REQUEST: Status = Status::from_static(400, "Bad request.");
    pub const UNAUTHORIZED: Status = Status::from_static(401, "Unauthorized");
    pub const FORBIDDEN: Status = Status::from_static(403, "Forbidden");
    pub const NOT_FOUND: Status = Status::from_static(404, "Not Found");
    pub const UNSUPPORTED_MEDIA_TYPE: Status =
        Status::from_static(415, "Unsupported media type requested.");
    pub const INTERNAL_SERVER_ERROR: Status = Status::from_static(500, "Internal server error.");

    /// Create a status with an arbitrary description.
    pub fn new(code: u16, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// Create a status from a static description, usable in constants.
    pub const fn from_static(code: u16, description: &'static str) -> Self {
        Self {
            code,
            description: Cow::Borrowed(description),
        }
    }

    /// Create a status using the standard reason phrase for `code`.
    pub fn from_code(code: u16) -> Self {
        Self::from_static(code, reason_phrase(code))
    }

    /// 301 Moved Permanently
    pub fn moved_permanently() -> Self {
        Self::from_code(301)
    }

    /// 302 Found
    pub fn found() -> Self {
        Self::from_code(302)
    }

    /// 303 See Other
    pub fn see_other() -> Self {
        Self::from_code(303)
    }

    /// 307 Temporary Redirect
    pub fn temporary_redirect() -> Self {
        Self::from_code(307)
    }

    /// Only a plain 200 lets output writing and post-behaviors run.
    pub fn is_success(&self) -> bool {
        self.code == 200
    }

    /// Redirect codes that carry a `Location` header.
    pub fn is_redirect(&self) -> bool {
        matches!(self.code, 301..=303 | 307)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// The `"<code> <description>"` form used on a status line.
    pub fn to_status_line(&self) -> String {
        format!("{} {}", self.code, self.description)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.description)
    }
}

impl From<u16> for Status {
    fn from(code: u16) -> Self {
        Status::from_code(code)
    }
}

/// Standard reason phrase for a status code.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        409 => "Conflict",
        410 => "Gone",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

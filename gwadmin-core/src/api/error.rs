use gwadmin_http::HttpResponse;

use super::wire::ErrorBody;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx response. Displays as the status text, e.g. "Bad Request".
    #[error("{text}")]
    HttpStatus {
        status: u16,
        text: String,
        /// `detail` from a JSON error body, when the gateway sent one.
        detail: Option<String>,
    },

    /// No response: connect failure, timeout, or a dropped connection.
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    /// 2xx response whose body could not be decoded.
    #[error("invalid response body: {0}")]
    InvalidBody(String),

    /// The request could not be built locally (bad header value, bad URL).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub(crate) fn from_response(res: &HttpResponse) -> Self {
        let detail = serde_json::from_slice::<ErrorBody>(&res.body)
            .ok()
            .and_then(ErrorBody::into_detail);

        Self::HttpStatus {
            status: res.status,
            text: res.status_text(),
            detail,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl From<gwadmin_http::Error> for ApiError {
    fn from(err: gwadmin_http::Error) -> Self {
        if err.is_network() {
            Self::Unreachable(err.to_string())
        } else {
            Self::InvalidRequest(err.to_string())
        }
    }
}

use crate::retry::RetryClass;

/// A stable error code: the only error detail that is allowed to cross the
/// service boundary together with the user-safe message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: &'static str,
    pub http_status: u16,
    pub retry: RetryClass,
}

pub const AUTH_UNAUTHENTICATED: ErrorCode = ErrorCode {
    code: "AUTH.UNAUTHENTICATED",
    http_status: 401,
    retry: RetryClass::None,
};

pub const SCHEMA_VALIDATION: ErrorCode = ErrorCode {
    code: "SCHEMA.VALIDATION",
    http_status: 400,
    retry: RetryClass::None,
};

pub const STORAGE_NOT_FOUND: ErrorCode = ErrorCode {
    code: "STORAGE.NOT_FOUND",
    http_status: 404,
    retry: RetryClass::None,
};

pub const STORAGE_CONFLICT: ErrorCode = ErrorCode {
    code: "STORAGE.CONFLICT",
    http_status: 409,
    retry: RetryClass::Permanent,
};

pub const PROVIDER_UNAVAILABLE: ErrorCode = ErrorCode {
    code: "PROVIDER.UNAVAILABLE",
    http_status: 503,
    retry: RetryClass::Transient,
};

pub const UNKNOWN_INTERNAL: ErrorCode = ErrorCode {
    code: "UNKNOWN.INTERNAL",
    http_status: 500,
    retry: RetryClass::Transient,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Not logged in, rejected credentials, or an expired session.
    AuthFailed = 20,

    /// The gateway was unreachable or answered with an error.
    GatewayError = 21,

    /// Invalid CLI/config (bad flags, invalid durations, malformed gateway URL, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (token storage IO, runtime setup).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

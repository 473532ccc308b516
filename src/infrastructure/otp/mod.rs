//! OTP dispatchers

mod log_dispatcher;

pub use log_dispatcher::LogOtpDispatcher;

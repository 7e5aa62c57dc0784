/// Dispatch a formatted record at `ERROR` through a [`LogRouter`](crate::LogRouter).
#[macro_export]
macro_rules! log_error {
    ($router:expr, $($arg:tt)+) => {
        $router.error(::core::format_args!($($arg)+))
    };
}

/// Dispatch a formatted record at `WARNING`.
#[macro_export]
macro_rules! log_warning {
    ($router:expr, $($arg:tt)+) => {
        $router.warning(::core::format_args!($($arg)+))
    };
}

/// Dispatch a formatted record at `INFO`.
#[macro_export]
macro_rules! log_info {
    ($router:expr, $($arg:tt)+) => {
        $router.info(::core::format_args!($($arg)+))
    };
}

/// Dispatch a formatted record at `DEBUG`.
#[macro_export]
macro_rules! log_debug {
    ($router:expr, $($arg:tt)+) => {
        $router.debug(::core::format_args!($($arg)+))
    };
}

pub mod clock;
pub mod dir;
pub mod logging;
pub mod retry;
pub mod runtime;
pub mod time;

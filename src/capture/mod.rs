// SPDX-License-Identifier: MIT
//! Capture layer: console and failure interception, the log ring buffer,
//! and the screenshot collaborator interface.

pub mod buffer;
pub mod console;
pub mod failure;
pub mod screenshot;

pub use buffer::{LogEntry, LogLevel, LogRing};
pub use console::{Console, ConsoleArg, ConsoleInterceptor, ConsoleSink};
pub use failure::{ErrorInterceptor, ErrorRecord};
pub use screenshot::{CaptureError, ImagePayload, NoScreenshot, ScreenshotSource};

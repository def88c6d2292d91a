// SPDX-License-Identifier: MIT
//! BugLink client — in-app diagnostic capture and sync agent.
//!
//! Embeds into a host process, mirrors its console and failure channels,
//! and exchanges debug reports and peer-driven clarification questions
//! with a companion server over HTTP and a persistent WebSocket.
//!
//! ```rust,ignore
//! let widget = buglink::Widget::new(None);
//! widget.start();
//! // … host runs; console output and failures are being captured …
//! widget.controller.set_comment("saving a draft loses the title").await;
//! widget.controller.send_report(ReportMode::Wait, None, "app://editor").await;
//! ```

pub mod capture;
pub mod channel;
pub mod config;
pub mod controller;
pub mod history;
pub mod observability;
pub mod questions;
pub mod report;
pub mod sync;

use std::sync::Arc;

use tracing::info;

use capture::buffer::LogRing;
use capture::console::{Console, ConsoleInterceptor};
use capture::failure::ErrorInterceptor;
use capture::screenshot::{NoScreenshot, ScreenshotSource};
use channel::DuplexChannel;
use config::{WidgetConfig, WidgetOverrides};
use controller::InteractionController;
use history::SessionStore;
use sync::SyncClient;

pub use controller::WidgetState;
pub use report::{ReportMode, ReportPriority};

/// The assembled widget: interceptors, duplex channel, session store, and
/// the interaction controller, wired to one configuration.
pub struct Widget {
    pub config: Arc<WidgetConfig>,
    pub console: Arc<Console>,
    pub buffer: Arc<LogRing>,
    pub controller: InteractionController,
    pub channel: DuplexChannel,
    console_interceptor: ConsoleInterceptor,
    failures: Arc<ErrorInterceptor>,
}

impl Widget {
    /// Build a widget from host overrides, using the process-global
    /// console and no screenshot source.
    pub fn new(overrides: Option<WidgetOverrides>) -> Self {
        Self::with_parts(
            WidgetConfig::load(overrides),
            Console::global(),
            Arc::new(NoScreenshot),
        )
    }

    /// Build a widget from explicit parts, for hosts with their own
    /// console instance or rasterizer.
    pub fn with_parts(
        config: WidgetConfig,
        console: Arc<Console>,
        screenshots: Arc<dyn ScreenshotSource>,
    ) -> Self {
        let config = Arc::new(config);
        let buffer = Arc::new(LogRing::new(config.log_capacity()));
        let failures = Arc::new(ErrorInterceptor::new());
        let store = Arc::new(SessionStore::new(&config.data_dir));
        let sync = Arc::new(SyncClient::new(&config.peer_url));
        let channel = DuplexChannel::new(&config.peer_url);
        let controller = InteractionController::new(
            config.clone(),
            buffer.clone(),
            failures.clone(),
            screenshots,
            sync,
            store,
        );
        let console_interceptor = ConsoleInterceptor::new(console.clone(), buffer.clone());
        Self {
            config,
            console,
            buffer,
            controller,
            channel,
            console_interceptor,
            failures,
        }
    }

    /// Install both interceptors, wire the question-batch subscription,
    /// and connect to the peer. A widget disabled by configuration does
    /// nothing. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if !self.config.enabled {
            info!("widget disabled by configuration");
            return;
        }
        self.console_interceptor.start();
        self.failures.start();

        let controller = self.controller.clone();
        self.channel.on_questions(move |batch| {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller.on_question_batch(batch).await;
            });
        });
        self.channel.connect();
        info!(peer = %self.config.peer_url, "widget started");
    }

    /// Reverse everything `start()` did: close the channel, drop any
    /// in-progress answer flow, restore the panic hook and the console
    /// sink. Session history stays on disk.
    pub async fn shutdown(&self) {
        self.channel.disconnect();
        self.controller.teardown().await;
        self.failures.stop();
        self.console_interceptor.stop();
        info!("widget stopped");
    }
}

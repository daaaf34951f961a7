//! Poll loop
//!
//! One tick, in order:
//!
//! 1. a pending reset request erases the store and ends the loop
//! 2. a down network link is handed to provisioning, then the tick ends
//! 3. the session is (re)connected, blocking through the retry policy
//! 4. at most one frame is decoded and dispatched
//! 5. the updater is polled
//! 6. the loop sleeps for the tick interval
//!
//! Step 4 never dispatches more than one frame so a command flood cannot
//! starve connectivity checks and updates.

use iot_core::{Decoded, Frame, FrameCodec};
use iot_transport::Connector;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::collaborators::{Network, ResetHook, Updater};
use crate::connection::ConnectionManager;
use crate::device::Device;
use crate::interpreter::{Interpreter, Outcome, ProtocolStats};
use crate::session::Session;
use crate::store::ConfigStore;

/// Everything the loop owns, built once at startup
pub struct AppContext<S, D> {
    pub session: Session<S>,
    pub device: D,
    pub network: Box<dyn Network>,
    pub updater: Box<dyn Updater>,
    pub store: Box<dyn ConfigStore>,
    pub reset: ResetHook,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    /// Stored configuration was erased; the device must restart
    Restart,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Restart,
    Shutdown,
}

/// The single-threaded device loop
pub struct PollLoop<C: Connector, D: Device> {
    ctx: AppContext<C::Stream, D>,
    connections: ConnectionManager<C>,
    codec: FrameCodec,
    interpreter: Interpreter,
    read_window: Duration,
    tick_interval: Duration,
    last_outcome: Option<Outcome>,
}

impl<C: Connector, D: Device> PollLoop<C, D> {
    pub fn new(
        ctx: AppContext<C::Stream, D>,
        connections: ConnectionManager<C>,
        codec: FrameCodec,
        read_window: Duration,
        tick_interval: Duration,
    ) -> Self {
        Self {
            ctx,
            connections,
            codec,
            interpreter: Interpreter::new(),
            read_window,
            tick_interval,
            last_outcome: None,
        }
    }

    pub fn context(&self) -> &AppContext<C::Stream, D> {
        &self.ctx
    }

    pub fn session(&self) -> &Session<C::Stream> {
        &self.ctx.session
    }

    pub fn device(&self) -> &D {
        &self.ctx.device
    }

    pub fn stats(&self) -> &ProtocolStats {
        self.interpreter.stats()
    }

    /// Outcome of the most recently dispatched frame
    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }

    pub fn reset_hook(&self) -> ResetHook {
        self.ctx.reset.clone()
    }

    pub fn into_context(self) -> AppContext<C::Stream, D> {
        self.ctx
    }

    /// Run one iteration
    pub async fn tick(&mut self) -> Tick {
        if self.ctx.reset.take() {
            warn!("Reset requested, clearing stored configuration");
            if let Err(e) = self.ctx.store.erase() {
                error!("Failed to erase configuration: {}", e);
            }
            self.ctx.session.disconnect("reset");
            return Tick::Restart;
        }

        if !self.ctx.network.is_link_up() {
            warn!("Network link lost, attempting to reconnect");
            self.ctx.session.disconnect("link down");
            let up = self.ctx.network.ensure_link_up().await;
            self.ctx.device.on_link_change(up);
            tokio::time::sleep(self.tick_interval).await;
            return Tick::Continue;
        }

        match self.connections.ensure_connected(&mut self.ctx.session).await {
            Ok(_) => self.service().await,
            Err(e) => warn!("Server unreachable: {}", e),
        }

        self.ctx.updater.poll();
        tokio::time::sleep(self.tick_interval).await;
        Tick::Continue
    }

    /// Tick until a reset request
    pub async fn run(&mut self) -> Exit {
        info!(
            "Poll loop started for {} at {}:{}",
            self.ctx.device.device_type(),
            self.ctx.session.host(),
            self.ctx.session.port()
        );
        loop {
            if self.tick().await == Tick::Restart {
                return Exit::Restart;
            }
        }
    }

    /// Tick until a reset request or until `shutdown` resolves
    pub async fn run_until<F>(&mut self, shutdown: F) -> Exit
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down");
                    self.ctx.session.disconnect("shutdown");
                    return Exit::Shutdown;
                }
                tick = self.tick() => {
                    if tick == Tick::Restart {
                        return Exit::Restart;
                    }
                }
            }
        }
    }

    async fn service(&mut self) {
        let codec = &self.codec;
        let filled = self
            .ctx
            .session
            .fill(self.read_window, |rx| codec.is_frame_ready(rx))
            .await;
        if let Err(e) = filled {
            warn!("Read failed: {}", e);
            self.ctx.session.disconnect("read error");
            return;
        }

        match self.codec.decode(self.ctx.session.rx_mut()) {
            Ok(Decoded::Frame(frame)) => self.dispatch(frame).await,
            Ok(Decoded::NeedMoreData) => {}
            Err(e) => {
                warn!("Dropped frame: {}", e);
                self.interpreter.record_framing_error();
            }
        }

        if self.ctx.session.at_eof() {
            self.ctx.session.disconnect("closed by server");
        }
    }

    async fn dispatch(&mut self, frame: Frame) {
        let outcome = self
            .interpreter
            .interpret(&frame, self.ctx.session.identity(), &mut self.ctx.device);

        match &outcome {
            Outcome::Reply(reply) => match self.codec.encode_frame(reply) {
                Ok(bytes) => {
                    if let Err(e) = self.ctx.session.send(&bytes).await {
                        warn!("Write failed: {}", e);
                        self.ctx.session.disconnect("write error");
                    }
                }
                Err(e) => error!("Cannot encode reply: {}", e),
            },
            Outcome::EndSession => self.ctx.session.disconnect("ended by server"),
            other => debug!("Frame handled: {:?}", other),
        }
        self.last_outcome = Some(outcome);
    }
}

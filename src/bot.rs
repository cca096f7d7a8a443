//! Bot builder and polling loop.
//!
//! The [`BotBuilder`] provides a fluent API for configuring options and
//! registering handlers. The [`Bot`] manages the lifecycle:
//! 1. `Starting`: fetch the bot identity, rebuild triggers, run `on_init`
//! 2. `Running`: long-poll `getUpdates` and dispatch each update
//! 3. `Stopping`: run `on_disconnect`, drain handlers, close connections
//!
//! # Example
//!
//! ```ignore
//! use botwire::{Bot, Envelope, HandlerResult, Request};
//!
//! async fn start(bot: Bot, update: Envelope) -> HandlerResult {
//!     let chat_id = update["message"]["chat"]["id"].as_i64();
//!     bot.call(Request::new("sendMessage").arg("chat_id", chat_id).arg("text", "Hello!")).await;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> botwire::Result<()> {
//!     let bot = Bot::builder(std::env::var("BOT_TOKEN").unwrap())
//!         .timeout(30)
//!         .command("start", start)
//!         .build()?;
//!
//!     bot.run().await
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::Instrument;

use crate::codec::Request;
use crate::config::BotConfig;
use crate::envelope::Envelope;
use crate::error::{BotwireError, Result};
use crate::rpc::{Response, RpcClient};
use crate::transport::{ConnectionPool, Connector, TlsConnector};
use crate::trigger::{CallbackHandler, HandlerResult, LifecycleHook, TriggerTable, UpdateHandler};

tokio::task_local! {
    /// Set while a handler or hook runs.
    static IN_HANDLER: ();
}

/// Pause after a poll that failed without reaching the remote.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Lifecycle of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Stopped => "stopped",
            LoopState::Starting => "starting",
            LoopState::Running => "running",
            LoopState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Id of the last consumed update. Only ever moves forward.
#[derive(Debug, Default)]
pub struct Cursor(AtomicI64);

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Advance to `update_id` unless already past it. Returns the new value.
    pub fn advance(&self, update_id: i64) -> i64 {
        self.0.fetch_max(update_id, Ordering::SeqCst).max(update_id)
    }

    /// The `offset` for the next `getUpdates`.
    #[inline]
    pub fn next_offset(&self) -> i64 {
        self.get() + 1
    }
}

/// Handlers as registered, before a run snapshots them.
#[derive(Clone, Default)]
struct Registrations {
    triggers: TriggerTable,
    fallback: Option<Arc<dyn UpdateHandler>>,
    on_init: Option<Arc<dyn LifecycleHook>>,
    on_disconnect: Option<Arc<dyn LifecycleHook>>,
}

/// Routing state for one run, rebuilt at every start.
struct Dispatch {
    triggers: TriggerTable,
    fallback: Option<Arc<dyn UpdateHandler>>,
    on_disconnect: Option<Arc<dyn LifecycleHook>>,
    me_username: Option<String>,
}

/// Builder for configuring and creating a [`Bot`].
pub struct BotBuilder {
    config: BotConfig,
    registrations: Registrations,
    connector: Option<Arc<dyn Connector>>,
    error: Option<BotwireError>,
}

impl BotBuilder {
    /// Builder with default options for `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_config(BotConfig::new(token))
    }

    /// Builder starting from a loaded configuration.
    pub fn with_config(config: BotConfig) -> Self {
        Self {
            config,
            registrations: Registrations::default(),
            connector: None,
            error: None,
        }
    }

    /// Long-poll timeout in seconds.
    ///
    /// Default: 10
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.config.timeout = seconds;
        self
    }

    /// Handle updates one at a time, in order.
    ///
    /// Default: false (each update in its own task)
    pub fn sequential(mut self, sequential: bool) -> Self {
        self.config.sequential = sequential;
        self
    }

    /// Pool size and bound on concurrent requests.
    ///
    /// Default: 4
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// API host and port.
    ///
    /// Default: api.telegram.org:443
    pub fn endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.host = host.into();
        self.config.port = port;
        self
    }

    /// Per-request transport timeout.
    ///
    /// Default: 30 seconds
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// How long stopping waits for running handlers before aborting them.
    ///
    /// Default: 5 seconds
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Largest accepted response body.
    ///
    /// Default: 64 MiB
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config.max_body_size = bytes;
        self
    }

    /// Stop the loop on Ctrl-C.
    ///
    /// Default: true
    pub fn handle_ctrl_c(mut self, enabled: bool) -> Self {
        self.config.handle_ctrl_c = enabled;
        self
    }

    /// Open connections with a custom connector instead of TLS to the
    /// configured endpoint.
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Register a command handler (`/name`).
    pub fn command(mut self, name: &str, handler: impl UpdateHandler) -> Self {
        self.registrations.triggers.register_command(name, Arc::new(handler));
        self
    }

    /// Register a handler for callback data fully matching `pattern`.
    ///
    /// An invalid pattern is reported by [`build`](Self::build).
    pub fn pattern(mut self, pattern: &str, handler: impl CallbackHandler) -> Self {
        if let Err(e) = self.registrations.triggers.register_pattern(pattern, Arc::new(handler)) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Handler for updates no trigger matched.
    pub fn on_update(mut self, handler: impl UpdateHandler) -> Self {
        self.registrations.fallback = Some(Arc::new(handler));
        self
    }

    /// Hook run once the bot identity is known, before polling.
    pub fn on_init(mut self, hook: impl LifecycleHook) -> Self {
        self.registrations.on_init = Some(Arc::new(hook));
        self
    }

    /// Hook run when the bot stops, before connections close.
    pub fn on_disconnect(mut self, hook: impl LifecycleHook) -> Self {
        self.registrations.on_disconnect = Some(Arc::new(hook));
        self
    }

    /// Validate the configuration and create the bot. No connection is
    /// opened until the first call.
    pub fn build(self) -> Result<Bot> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.config.validate()?;

        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(TlsConnector::new(&self.config.host, self.config.port)?),
        };
        let pool = ConnectionPool::new(connector, self.config.max_connections, self.config.max_body_size);
        let rpc = RpcClient::new(&self.config.token, &self.config.host, pool, self.config.read_timeout);

        let (state, _) = watch::channel(LoopState::Stopped);
        let (stop, _) = watch::channel(false);

        Ok(Bot {
            inner: Arc::new(Inner {
                config: self.config,
                rpc,
                registrations: Mutex::new(self.registrations),
                dispatch: RwLock::new(None),
                me: RwLock::new(Envelope::Empty),
                cursor: Cursor::new(),
                state,
                stop,
                polling: AtomicBool::new(false),
            }),
        })
    }
}

struct Inner {
    config: BotConfig,
    rpc: RpcClient,
    registrations: Mutex<Registrations>,
    dispatch: RwLock<Option<Arc<Dispatch>>>,
    me: RwLock<Envelope>,
    cursor: Cursor,
    state: watch::Sender<LoopState>,
    stop: watch::Sender<bool>,
    /// A `run` owns the loop; `shutdown` must signal it instead of tearing down.
    polling: AtomicBool,
}

/// A bot: RPC client plus polling loop.
///
/// Cheap to clone; every clone shares the same connections and state.
/// Handlers receive a clone.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<Inner>,
}

impl Bot {
    /// Create a new bot builder.
    pub fn builder(token: impl Into<String>) -> BotBuilder {
        BotBuilder::new(token)
    }

    /// Call an API method. Never fails; see [`Response`].
    pub async fn call(&self, request: Request) -> Response {
        self.inner.rpc.call(request).await
    }

    /// Call with a read timeout other than the configured one.
    pub async fn call_with_timeout(&self, request: Request, timeout: Duration) -> Response {
        self.inner.rpc.call_with_timeout(request, timeout).await
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.inner.rpc
    }

    pub fn config(&self) -> &BotConfig {
        &self.inner.config
    }

    #[inline]
    pub fn state(&self) -> LoopState {
        *self.inner.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn state_changes(&self) -> watch::Receiver<LoopState> {
        self.inner.state.subscribe()
    }

    /// Last consumed update id.
    pub fn cursor(&self) -> i64 {
        self.inner.cursor.get()
    }

    /// The bot's own user object from `getMe`; empty until started or when
    /// `getMe` failed.
    pub fn me(&self) -> Envelope {
        self.inner.me.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Register a command handler. Takes effect at the next start.
    pub fn register_command(&self, name: &str, handler: impl UpdateHandler) {
        self.registrations().triggers.register_command(name, Arc::new(handler));
    }

    /// Register a callback pattern handler. Takes effect at the next start.
    pub fn register_pattern(&self, pattern: &str, handler: impl CallbackHandler) -> Result<()> {
        self.registrations().triggers.register_pattern(pattern, Arc::new(handler))
    }

    /// Replace the fallback handler. Takes effect at the next start.
    pub fn register_fallback(&self, handler: impl UpdateHandler) {
        self.registrations().fallback = Some(Arc::new(handler));
    }

    /// Run until stopped, a fatal error, or Ctrl-C (when enabled).
    ///
    /// Fails with [`BotwireError::Unauthorized`] when the token is rejected
    /// and [`BotwireError::AlreadyRunning`] when the bot is not stopped.
    /// Connections are closed before this returns.
    ///
    /// Dropping the returned future stops the bot in the background: the
    /// state moves to `Stopping` at once and to `Stopped` after teardown.
    pub async fn run(&self) -> Result<()> {
        async move {
            let guard = self.begin(true)?;
            let dispatch = match self.enter().await {
                Ok(dispatch) => dispatch,
                Err(e) => {
                    guard.disarm();
                    return Err(e);
                }
            };
            tracing::info!("Polling for updates");
            let (result, tasks) = self.poll_loop(dispatch).await;
            self.exit(tasks).await;
            guard.disarm();
            result
        }
        .instrument(self.span())
        .await
    }

    /// Enter the running state without polling: fetch the identity, rebuild
    /// triggers and run `on_init`. Pair with [`shutdown`](Self::shutdown).
    pub async fn start(&self) -> Result<()> {
        async move {
            let guard = self.begin(false)?;
            let entered = self.enter().await;
            guard.disarm();
            entered.map(|_| ())
        }
        .instrument(self.span())
        .await
    }

    /// Leave the running state and close connections.
    ///
    /// Stops a running loop and waits for it to finish. No-op when stopped.
    /// Called from a handler or hook, this only requests the stop, like
    /// [`stop`](Self::stop), since the loop waits on the caller.
    pub async fn shutdown(&self) {
        if IN_HANDLER.try_with(|_| ()).is_ok() {
            self.stop();
            return;
        }

        if self.inner.polling.load(Ordering::SeqCst) {
            self.stop();
            self.wait_for(LoopState::Stopped).await;
            return;
        }

        if self.transition(LoopState::Running, LoopState::Stopping) {
            let guard = TeardownGuard::new(self);
            self.exit(JoinSet::new()).instrument(self.span()).await;
            guard.disarm();
        } else if self.state() != LoopState::Stopped {
            self.wait_for(LoopState::Stopped).await;
        }
    }

    /// Ask a running loop to stop. Returns immediately; callable from
    /// handlers.
    pub fn stop(&self) {
        self.inner.stop.send_replace(true);
    }

    fn span(&self) -> tracing::Span {
        tracing::info_span!("bot", id = %self.inner.config.bot_id())
    }

    fn registrations(&self) -> MutexGuard<'_, Registrations> {
        self.inner.registrations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LoopState) {
        tracing::debug!("Bot {}", state);
        self.inner.state.send_replace(state);
    }

    /// Move from `from` to `to` if currently in `from`.
    fn transition(&self, from: LoopState, to: LoopState) -> bool {
        let moved = self.inner.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::debug!("Bot {}", to);
        }
        moved
    }

    async fn wait_for(&self, target: LoopState) {
        let mut states = self.inner.state.subscribe();
        loop {
            if *states.borrow_and_update() == target {
                return;
            }
            if states.changed().await.is_err() {
                return;
            }
        }
    }

    /// `Stopped -> Starting`. Teardown runs if the guard drops armed.
    fn begin(&self, polling: bool) -> Result<TeardownGuard> {
        if !self.transition(LoopState::Stopped, LoopState::Starting) {
            return Err(BotwireError::AlreadyRunning);
        }
        self.inner.polling.store(polling, Ordering::SeqCst);
        self.inner.stop.send_replace(false);
        Ok(TeardownGuard::new(self))
    }

    /// `Starting -> Running`.
    async fn enter(&self) -> Result<Arc<Dispatch>> {
        let me = self.inner.rpc.get_me().await;
        if me.is_unauthorized() {
            let reason = me.description().unwrap_or("Unauthorized").to_owned();
            tracing::error!("Token rejected: {}", reason);
            self.inner.rpc.close().await;
            self.inner.polling.store(false, Ordering::SeqCst);
            self.set_state(LoopState::Stopped);
            return Err(BotwireError::Unauthorized(reason));
        }

        let me = if me.ok() {
            me.into_envelope()
        } else {
            tracing::warn!("getMe failed: {}", me.description().unwrap_or_default());
            Envelope::Empty
        };
        let me_username = me["username"].as_str().map(str::to_owned);
        *self.inner.me.write().unwrap_or_else(PoisonError::into_inner) = me;

        let registrations = self.registrations().clone();
        let dispatch = Arc::new(Dispatch {
            triggers: registrations.triggers,
            fallback: registrations.fallback,
            on_disconnect: registrations.on_disconnect,
            me_username,
        });
        *self.inner.dispatch.write().unwrap_or_else(PoisonError::into_inner) = Some(dispatch.clone());

        if let Some(hook) = registrations.on_init {
            if let Err(e) = invoke(hook.call(self.clone())).await {
                tracing::error!("on_init failed: {}", e);
            }
        }

        self.set_state(LoopState::Running);
        Ok(dispatch)
    }

    /// `Running` body. Returns the outcome and the handlers still running.
    async fn poll_loop(&self, dispatch: Arc<Dispatch>) -> (Result<()>, JoinSet<()>) {
        let config = &self.inner.config;
        let mut tasks = JoinSet::new();
        let shutdown = shutdown_signal(self.inner.stop.subscribe(), config.handle_ctrl_c);
        tokio::pin!(shutdown);

        let result = loop {
            reap(&mut tasks);

            let response = tokio::select! {
                response = self.inner.rpc.get_updates(self.inner.cursor.next_offset(), config.timeout) => response,
                () = &mut shutdown => break Ok(()),
            };

            if !response.ok() {
                if response.is_timeout() {
                    continue;
                }
                if response.is_unauthorized() {
                    let reason = response.description().unwrap_or("Unauthorized").to_owned();
                    tracing::error!("Token rejected while polling: {}", reason);
                    break Err(BotwireError::Unauthorized(reason));
                }
                if response.is_transport_failure() {
                    tracing::warn!(
                        "Connection error when fetching updates: {}",
                        response.description().unwrap_or_default()
                    );
                    tokio::select! {
                        () = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                        () = &mut shutdown => break Ok(()),
                    }
                    continue;
                }
                tracing::warn!(
                    "Update result was not ok ({}): {}",
                    response.error_code().unwrap_or_default(),
                    response.description().unwrap_or_default()
                );
                continue;
            }

            let updates = match response.into_envelope() {
                Envelope::List(updates) => updates,
                other => {
                    tracing::warn!("Unexpected getUpdates result: {}", other);
                    continue;
                }
            };
            if updates.is_empty() {
                continue;
            }

            if let Some(last) = updates.iter().filter_map(|u| u["update_id"].as_i64()).max() {
                self.inner.cursor.advance(last);
            }

            for update in updates {
                let handling = handle_update(self.clone(), dispatch.clone(), update);
                if config.sequential {
                    handling.await;
                } else {
                    tasks.spawn(handling);
                }
            }
        };

        (result, tasks)
    }

    /// `Stopping -> Stopped`.
    async fn exit(&self, mut tasks: JoinSet<()>) {
        if self.state() != LoopState::Stopping {
            self.set_state(LoopState::Stopping);
        }

        let dispatch = self.inner.dispatch.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(hook) = dispatch.and_then(|d| d.on_disconnect.clone()) {
            if let Err(e) = invoke(hook.call(self.clone())).await {
                tracing::error!("on_disconnect failed: {}", e);
            }
        }

        if !tasks.is_empty() {
            let grace = self.inner.config.shutdown_grace;
            let drained = tokio::time::timeout(grace, async {
                while tasks.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                tracing::warn!("Aborting {} handlers still running after {:?}", tasks.len(), grace);
                tasks.shutdown().await;
            }
        }

        self.inner.rpc.close().await;
        self.inner.polling.store(false, Ordering::SeqCst);
        self.set_state(LoopState::Stopped);
    }
}

/// Finishes `Stopping -> Stopped` when a lifecycle future is dropped
/// before it completes.
struct TeardownGuard {
    bot: Option<Bot>,
}

impl TeardownGuard {
    fn new(bot: &Bot) -> Self {
        Self { bot: Some(bot.clone()) }
    }

    fn disarm(mut self) {
        self.bot = None;
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        let Some(bot) = self.bot.take() else {
            return;
        };

        tracing::debug!("Lifecycle cancelled in state {}, tearing down", bot.state());
        bot.inner.polling.store(false, Ordering::SeqCst);
        bot.set_state(LoopState::Stopping);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let span = bot.span();
                runtime.spawn(async move { bot.exit(JoinSet::new()).await }.instrument(span));
            }
            Err(_) => {
                // No runtime left to close on; connections drop with the pool.
                bot.inner.dispatch.write().unwrap_or_else(PoisonError::into_inner).take();
                bot.set_state(LoopState::Stopped);
            }
        }
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("id", &self.inner.config.bot_id())
            .field("state", &self.state())
            .field("cursor", &self.cursor())
            .finish()
    }
}

/// Route one update and, for callback buttons, acknowledge it afterwards.
async fn handle_update(bot: Bot, dispatch: Arc<Dispatch>, update: Envelope) {
    let update_id = update["update_id"].as_i64().unwrap_or_default();
    let callback = &update["callback_query"];

    if callback.is_truthy() {
        let query_id = callback["id"].as_str().map(str::to_owned);
        let handling = match dispatch.triggers.resolve_pattern(callback["data"].as_str().unwrap_or_default()) {
            Some((handler, matched)) => handler.call(bot.clone(), update, matched),
            None => fallback(&dispatch, bot.clone(), update),
        };
        report(update_id, invoke(handling).await);

        if let Some(id) = query_id {
            let ack = bot.inner.rpc.answer_callback_query(&id).await;
            if !ack.ok() {
                tracing::debug!(
                    "answerCallbackQuery for update {} failed: {}",
                    update_id,
                    ack.description().unwrap_or_default()
                );
            }
        }
        return;
    }

    let handling = match dispatch
        .triggers
        .resolve_command(&update["message"], dispatch.me_username.as_deref())
    {
        Some(handler) => handler.call(bot.clone(), update),
        None => fallback(&dispatch, bot, update),
    };
    report(update_id, invoke(handling).await);
}

fn fallback(dispatch: &Dispatch, bot: Bot, update: Envelope) -> crate::BoxFuture<'static, HandlerResult> {
    match &dispatch.fallback {
        Some(handler) => handler.call(bot, update),
        None => Box::pin(async { HandlerResult::Ok(()) }),
    }
}

fn report(update_id: i64, result: HandlerResult) {
    if let Err(e) = result {
        tracing::error!("Unhandled error handling update {}: {}", update_id, e);
    }
}

/// Run a handler in its own task so a panic stays isolated.
///
/// The task is aborted if the caller is dropped.
async fn invoke(handling: crate::BoxFuture<'static, HandlerResult>) -> HandlerResult {
    struct AbortOnDrop(JoinHandle<HandlerResult>);

    impl Drop for AbortOnDrop {
        fn drop(&mut self) {
            self.0.abort();
        }
    }

    let mut task = AbortOnDrop(tokio::spawn(IN_HANDLER.scope((), handling)));
    match (&mut task.0).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err("handler panicked".into()),
        Err(e) => Err(e.into()),
    }
}

/// Log and drop finished concurrent handlers.
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(finished) = tasks.try_join_next() {
        if let Err(e) = finished {
            tracing::error!("Update task failed: {}", e);
        }
    }
}

/// Completes on `Bot::stop` or, when enabled, Ctrl-C.
async fn shutdown_signal(mut stop: watch::Receiver<bool>, handle_ctrl_c: bool) {
    let stopped = async move {
        loop {
            let requested = *stop.borrow_and_update();
            if requested || stop.changed().await.is_err() {
                return;
            }
        }
    };

    let ctrl_c = async move {
        if handle_ctrl_c {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C, stopping");
                return;
            }
        }
        std::future::pending::<()>().await
    };

    tokio::select! {
        () = stopped => {}
        () = ctrl_c => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_is_monotonic() {
        let cursor = Cursor::new();
        assert_eq!(cursor.next_offset(), 1);

        assert_eq!(cursor.advance(10), 10);
        assert_eq!(cursor.advance(4), 10);
        assert_eq!(cursor.get(), 10);
        assert_eq!(cursor.advance(11), 11);
        assert_eq!(cursor.next_offset(), 12);
    }

    async fn ignore(_bot: Bot, _update: Envelope, _matched: crate::trigger::CallbackMatch) -> HandlerResult {
        Ok(())
    }

    async fn panics() -> HandlerResult {
        panic!("boom")
    }

    async fn fails() -> HandlerResult {
        Err("bad input".into())
    }

    #[test]
    fn test_build_rejects_invalid_pattern() {
        let result = Bot::builder("1:x").pattern("(", ignore).build();
        assert!(matches!(result, Err(BotwireError::InvalidPattern(_))));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        assert!(matches!(Bot::builder("").build(), Err(BotwireError::Config(_))));
        assert!(matches!(
            Bot::builder("1:x").max_connections(0).build(),
            Err(BotwireError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_new_bot_is_stopped() {
        let bot = Bot::builder("123:secret").build().unwrap();
        assert_eq!(bot.state(), LoopState::Stopped);
        assert_eq!(bot.cursor(), 0);
        assert!(bot.me().is_missing());
        assert!(!format!("{:?}", bot).contains("secret"));

        // no-op when stopped
        bot.shutdown().await;
        assert_eq!(bot.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn test_invoke_isolates_panics() {
        let result = invoke(Box::pin(panics())).await;
        assert_eq!(result.unwrap_err().to_string(), "handler panicked");

        let result = invoke(Box::pin(fails())).await;
        assert_eq!(result.unwrap_err().to_string(), "bad input");
    }
}

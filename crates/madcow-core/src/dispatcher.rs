//! Request dispatcher for madcow.
//!
//! The [`Dispatcher`] runs one full candidate-selection / invoke / collect
//! cycle per [`Request`]:
//!
//! 1. Public lines are handed to the [`ChatterLog`](crate::chatter::ChatterLog),
//!    then ignored nicks and ignore patterns drop the line
//! 2. The [`AddressingResolver`] sets the addressing flags and strips the prefix
//! 3. A bare `bot?` ping is answered with `yes?` and nothing else runs
//! 4. An addressed `help` is answered with every module's help text, privately
//!    to the sender when `private_help` is on
//! 5. Modules are scanned in ascending priority; each matching module is
//!    invoked inline or on a worker task, and a matching module declaring
//!    `terminate` stops the scan
//!
//! ```rust,ignore
//! use madcow_core::{Dispatcher, ModuleRegistry, OutputHandle, Request};
//!
//! let dispatcher = Dispatcher::builder(registry, OutputHandle::new(sink))
//!     .identity(BotIdentity::new("madcow"))
//!     .allow_threading(true)
//!     .build();
//!
//! dispatcher.process(Request::new("madcow: hi", "alice")).await?;
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use regex::Regex;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Level, debug, error, info, span, trace, warn};

use crate::addressing::{AddressingResolver, BotIdentity};
use crate::chatter::BoxedChatterLog;
use crate::error::{DispatchResult, ModuleError};
use crate::output::OutputHandle;
use crate::pattern::MatchArgs;
use crate::registry::{LoadedModule, ModuleRegistry};
use crate::request::Request;

/// Canned reply to a bare `bot?` ping.
pub const FEEDBACK_REPLY: &str = "yes?";

/// Lines the dispatcher drops before any processing.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    nicks: Vec<String>,
    patterns: Vec<Regex>,
}

impl IgnoreList {
    /// Creates an ignore list. Nicks compare case-insensitively.
    pub fn new<I, S>(nicks: I, patterns: Vec<Regex>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            nicks: nicks
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .collect(),
            patterns,
        }
    }

    /// Returns `true` if the request should be dropped.
    pub fn is_ignored(&self, req: &Request) -> bool {
        let nick = req.nick().to_lowercase();
        self.nicks.iter().any(|n| *n == nick)
            || self.patterns.iter().any(|p| p.is_match(req.message()))
    }
}

/// What one dispatch pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The sender or message is on the ignore list.
    Ignored,
    /// A `bot?` ping was answered.
    Feedback,
    /// The `help` built-in was answered.
    Help,
    /// The module scan ran.
    Scanned {
        /// Modules whose pattern matched.
        matched: usize,
        /// Of those, how many were handed to worker tasks.
        spawned: usize,
        /// The terminating module that stopped the scan, if any.
        terminated_by: Option<String>,
    },
}

/// Builder for a [`Dispatcher`].
pub struct DispatcherBuilder {
    registry: Arc<ModuleRegistry>,
    output: OutputHandle,
    resolver: Option<AddressingResolver>,
    identity: BotIdentity,
    allow_threading: bool,
    module_timeout: Option<Duration>,
    ignore: IgnoreList,
    private_help: bool,
    chatter: Option<BoxedChatterLog>,
}

impl DispatcherBuilder {
    /// Sets the bot identity used for addressing.
    pub fn identity(mut self, identity: BotIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Shares an existing resolver (and therefore its identity).
    pub fn resolver(mut self, resolver: AddressingResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Globally allows or forbids worker tasks.
    pub fn allow_threading(mut self, allow: bool) -> Self {
        self.allow_threading = allow;
        self
    }

    /// Abandons module invocations that run longer than `timeout`.
    ///
    /// Disabled by default: without a deadline a module may answer at any time.
    pub fn module_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.module_timeout = timeout;
        self
    }

    /// Sets the ignore list.
    pub fn ignore(mut self, ignore: IgnoreList) -> Self {
        self.ignore = ignore;
        self
    }

    /// Sends `help` output to the asking nick instead of the channel.
    pub fn private_help(mut self, private: bool) -> Self {
        self.private_help = private;
        self
    }

    /// Records every public line with `chatter`.
    pub fn chatter_log(mut self, chatter: BoxedChatterLog) -> Self {
        self.chatter = Some(chatter);
        self
    }

    /// Builds the dispatcher.
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            registry: self.registry,
            output: self.output,
            resolver: self
                .resolver
                .unwrap_or_else(|| AddressingResolver::new(self.identity)),
            allow_threading: self.allow_threading,
            module_timeout: self.module_timeout,
            ignore: self.ignore,
            private_help: self.private_help,
            chatter: self.chatter,
            workers: TaskTracker::new(),
        }
    }
}

/// The central request dispatcher.
///
/// `Dispatcher` is `Send + Sync`; one instance serves every request for the
/// lifetime of the process.
pub struct Dispatcher {
    registry: Arc<ModuleRegistry>,
    output: OutputHandle,
    resolver: AddressingResolver,
    allow_threading: bool,
    module_timeout: Option<Duration>,
    ignore: IgnoreList,
    private_help: bool,
    chatter: Option<BoxedChatterLog>,
    workers: TaskTracker,
}

impl Dispatcher {
    /// Starts building a dispatcher over `registry` writing to `output`.
    pub fn builder(registry: Arc<ModuleRegistry>, output: OutputHandle) -> DispatcherBuilder {
        DispatcherBuilder {
            registry,
            output,
            resolver: None,
            identity: BotIdentity::new("madcow"),
            allow_threading: true,
            module_timeout: None,
            ignore: IgnoreList::default(),
            private_help: false,
            chatter: None,
        }
    }

    /// The loaded modules.
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// The addressing resolver (use it to rename the bot).
    pub fn resolver(&self) -> &AddressingResolver {
        &self.resolver
    }

    /// A handle to the shared output, for other producers.
    pub fn output(&self) -> &OutputHandle {
        &self.output
    }

    /// Number of worker tasks still running.
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Waits until every worker task spawned so far has finished.
    pub async fn wait_idle(&self) {
        self.workers.close();
        self.workers.wait().await;
        self.workers.reopen();
    }

    /// Filters, resolves addressing for and dispatches a raw request.
    pub async fn process(&self, mut req: Request) -> DispatchResult<DispatchOutcome> {
        if let Some(chatter) = &self.chatter
            && !req.is_private()
        {
            chatter.record(&req);
        }

        if self.ignore.is_ignored(&req) {
            info!(nick = %req.nick(), line = %req.message(), "Ignored line");
            return Ok(DispatchOutcome::Ignored);
        }

        self.resolver.resolve(&mut req)?;
        self.dispatch(req).await
    }

    /// Dispatches a request whose addressing is already resolved.
    pub async fn dispatch(&self, req: Request) -> DispatchResult<DispatchOutcome> {
        let span = span!(Level::DEBUG, "dispatch", nick = %req.nick());

        async move {
            if req.is_feedback() {
                self.output.send(FEEDBACK_REPLY, &req).await?;
                return Ok(DispatchOutcome::Feedback);
            }

            if req.is_addressed() && req.message().eq_ignore_ascii_case("help") {
                let help = self.registry.help_text();
                if !help.is_empty() {
                    if self.private_help {
                        let to = req.nick().to_string();
                        self.output.send(&help, &req.clone().send_to(to)).await?;
                    } else {
                        self.output.send(&help, &req).await?;
                    }
                }
                return Ok(DispatchOutcome::Help);
            }

            self.scan(Arc::new(req)).await
        }
        .instrument(span)
        .await
    }

    async fn scan(&self, req: Arc<Request>) -> DispatchResult<DispatchOutcome> {
        let mut matched = 0;
        let mut spawned = 0;
        let mut terminated_by = None;

        for loaded in self.registry.iter() {
            let options = loaded.options();
            if options.require_addressing && !req.is_addressed() {
                continue;
            }
            if options.private_only && !req.is_private() {
                continue;
            }

            let Some(args) = loaded.module().pattern().captures(req.message()) else {
                trace!(module = %loaded.name(), "Pattern did not match");
                continue;
            };
            matched += 1;

            if self.allow_threading && options.allow_threading {
                debug!(module = %loaded.name(), "Matched, invoking on worker task");
                spawned += 1;
                let loaded = Arc::clone(loaded);
                let req = Arc::clone(&req);
                let output = self.output.clone();
                let timeout = self.module_timeout;
                self.workers.spawn(
                    async move {
                        if let Some(text) = invoke(&loaded, &args, &req, timeout).await
                            && let Err(e) = output.send(&text, &req).await
                        {
                            error!(module = %loaded.name(), error = %e, "Failed to send module output");
                        }
                    }
                    .in_current_span(),
                );
            } else {
                debug!(module = %loaded.name(), "Matched, invoking inline");
                if let Some(text) = invoke(loaded, &args, &req, self.module_timeout).await {
                    self.output.send(&text, &req).await?;
                }
            }

            if options.terminate {
                debug!(module = %loaded.name(), "Terminating module matched, stopping scan");
                terminated_by = Some(loaded.name().to_string());
                break;
            }
        }

        Ok(DispatchOutcome::Scanned {
            matched,
            spawned,
            terminated_by,
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("allow_threading", &self.allow_threading)
            .field("module_timeout", &self.module_timeout)
            .field("private_help", &self.private_help)
            .finish_non_exhaustive()
    }
}

/// Calls `response()`, isolating errors, panics and (optionally) overruns.
///
/// Returns the text to send, or `None` when the module has nothing to say.
async fn invoke(
    loaded: &LoadedModule,
    args: &MatchArgs,
    req: &Request,
    timeout: Option<Duration>,
) -> Option<String> {
    let call = AssertUnwindSafe(loaded.module().response(args, req)).catch_unwind();

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Ok(Err(ModuleError::Timeout(limit))),
        },
        None => call.await,
    };

    match result {
        Ok(Ok(Some(text))) if !text.is_empty() => Some(text),
        Ok(Ok(_)) => None,
        Ok(Err(ModuleError::Timeout(limit))) => {
            warn!(
                module = %loaded.name(),
                line = %req.message(),
                timeout = ?limit,
                "Module timed out"
            );
            None
        }
        Ok(Err(e)) => {
            error!(
                module = %loaded.name(),
                line = %req.message(),
                error = %e,
                "Module response failed"
            );
            None
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(
                module = %loaded.name(),
                line = %req.message(),
                panic = %reason,
                "Module panicked"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::error::{DispatchError, ModuleResult};
    use crate::chatter::ChatterLog;
    use crate::module::{Module, ModuleOptions};
    use crate::output::testing::RecordingSink;
    use crate::pattern::Pattern;

    /// What a test module does when invoked.
    #[derive(Clone)]
    enum Behaviour {
        Reply(&'static str),
        Echo,
        Fail,
        Panic,
        Sleep(Duration, &'static str),
    }

    struct TestModule {
        pattern: Pattern,
        options: ModuleOptions,
        help: Option<&'static str>,
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    impl TestModule {
        fn new(pattern: Pattern, options: ModuleOptions, behaviour: Behaviour) -> Self {
            Self {
                pattern,
                options,
                help: None,
                behaviour,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn help(mut self, help: &'static str) -> Self {
            self.help = Some(help);
            self
        }

        fn calls(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl Module for TestModule {
        fn pattern(&self) -> &Pattern {
            &self.pattern
        }

        fn options(&self) -> ModuleOptions {
            self.options
        }

        fn help(&self) -> Option<&str> {
            self.help
        }

        async fn response(&self, args: &MatchArgs, _req: &Request) -> ModuleResult<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Reply(text) => Ok(Some(text.to_string())),
                Behaviour::Echo => Ok(args.get(0).map(str::to_string)),
                Behaviour::Fail => Err(ModuleError::msg("boom")),
                Behaviour::Panic => panic!("module exploded"),
                Behaviour::Sleep(delay, text) => {
                    tokio::time::sleep(*delay).await;
                    Ok(Some(text.to_string()))
                }
            }
        }
    }

    fn inline() -> ModuleOptions {
        ModuleOptions::default().allow_threading(false)
    }

    /// Collects formatted log output.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Transcript(Mutex<Vec<String>>);

    impl ChatterLog for Transcript {
        fn record(&self, req: &Request) {
            self.0.lock().push(format!("<{}> {}", req.nick(), req.message()));
        }
    }

    fn dispatcher(registry: ModuleRegistry, sink: Arc<RecordingSink>) -> Dispatcher {
        Dispatcher::builder(Arc::new(registry), OutputHandle::new(sink))
            .identity(BotIdentity::new("madcow"))
            .build()
    }

    #[tokio::test]
    async fn test_feedback_answers_without_modules() {
        let any = TestModule::new(
            Pattern::Any,
            inline().require_addressing(false),
            Behaviour::Reply("should not run"),
        );
        let calls = any.calls();
        let registry = ModuleRegistry::builder()
            .register("any", Arc::new(any))
            .unwrap()
            .build();
        let sink = RecordingSink::new();

        let outcome = dispatcher(registry, sink.clone())
            .process(Request::new("madcow?", "alice"))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Feedback);
        assert_eq!(sink.calls(), vec![FEEDBACK_REPLY.to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_help_lists_module_help() {
        let registry = ModuleRegistry::builder()
            .register(
                "weather",
                Arc::new(
                    TestModule::new(Pattern::Never, inline().priority(60), Behaviour::Echo)
                        .help("weather <zip> - look up weather"),
                ),
            )
            .unwrap()
            .register(
                "learn",
                Arc::new(
                    TestModule::new(Pattern::Never, inline().priority(10), Behaviour::Echo)
                        .help("set <db> <nick> <val> - set db attribs"),
                ),
            )
            .unwrap()
            .build();
        let sink = RecordingSink::new();

        let outcome = dispatcher(registry, sink.clone())
            .process(Request::new("madcow: HELP", "alice"))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Help);
        assert_eq!(
            sink.calls(),
            vec!["set <db> <nick> <val> - set db attribs\nweather <zip> - look up weather"]
        );
    }

    #[tokio::test]
    async fn test_private_help_goes_to_sender() {
        let registry = || {
            ModuleRegistry::builder()
                .register(
                    "learn",
                    Arc::new(
                        TestModule::new(Pattern::Never, inline(), Behaviour::Echo)
                            .help("set <db> <nick> <val> - set db attribs"),
                    ),
                )
                .unwrap()
                .build()
        };
        let req = || Request::new("madcow: help", "alice").channel("#madcow");

        let sink = RecordingSink::new();
        Dispatcher::builder(Arc::new(registry()), OutputHandle::new(sink.clone()))
            .private_help(true)
            .build()
            .process(req())
            .await
            .unwrap();
        assert_eq!(sink.targets(), vec!["alice".to_string()]);

        let sink = RecordingSink::new();
        dispatcher(registry(), sink.clone())
            .process(req())
            .await
            .unwrap();
        assert_eq!(sink.targets(), vec!["#madcow".to_string()]);
    }

    #[tokio::test]
    async fn test_chatter_log_sees_public_lines_only() {
        let transcript = Arc::new(Transcript::default());
        let sink = RecordingSink::new();
        let dispatcher = Dispatcher::builder(
            Arc::new(ModuleRegistry::default()),
            OutputHandle::new(sink.clone()),
        )
        .ignore(IgnoreList::new(["spammer"], Vec::new()))
        .chatter_log(transcript.clone())
        .build();

        dispatcher
            .process(Request::new("madcow: hi", "alice").channel("#madcow"))
            .await
            .unwrap();
        dispatcher
            .process(Request::new("buy stuff", "spammer").channel("#madcow"))
            .await
            .unwrap();
        dispatcher
            .process(Request::new("secret", "bob").private(true))
            .await
            .unwrap();

        assert_eq!(
            *transcript.0.lock(),
            vec!["<alice> madcow: hi".to_string(), "<spammer> buy stuff".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unaddressed_help_is_not_builtin() {
        let echo = TestModule::new(
            Pattern::Any,
            inline().require_addressing(false),
            Behaviour::Echo,
        );
        let registry = ModuleRegistry::builder()
            .register("echo", Arc::new(echo))
            .unwrap()
            .build();
        let sink = RecordingSink::new();

        dispatcher(registry, sink.clone())
            .process(Request::new("help", "alice"))
            .await
            .unwrap();

        assert_eq!(sink.calls(), vec!["help".to_string()]);
    }

    #[tokio::test]
    async fn test_terminating_module_stops_scan() {
        let ping = TestModule::new(
            Pattern::new("ping").unwrap(),
            inline().priority(10).terminate(true),
            Behaviour::Reply("pong"),
        );
        let also = TestModule::new(
            Pattern::Any,
            inline().priority(50),
            Behaviour::Reply("also matched"),
        );
        let also_calls = also.calls();
        // Registered out of priority order on purpose.
        let registry = ModuleRegistry::builder()
            .register("b", Arc::new(also))
            .unwrap()
            .register("a", Arc::new(ping))
            .unwrap()
            .build();
        let sink = RecordingSink::new();

        let outcome = dispatcher(registry, sink.clone())
            .process(Request::new("ping", "alice").addressed(true))
            .await
            .unwrap();

        assert_eq!(sink.calls(), vec!["pong".to_string()]);
        assert_eq!(also_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            outcome,
            DispatchOutcome::Scanned {
                matched: 1,
                spawned: 0,
                terminated_by: Some("a".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_terminate_applies_even_without_output() {
        let silent = TestModule::new(
            Pattern::Any,
            inline().priority(10).terminate(true),
            Behaviour::Fail,
        );
        let later = TestModule::new(Pattern::Any, inline().priority(20), Behaviour::Reply("late"));
        let later_calls = later.calls();
        let registry = ModuleRegistry::builder()
            .register("silent", Arc::new(silent))
            .unwrap()
            .register("later", Arc::new(later))
            .unwrap()
            .build();
        let sink = RecordingSink::new();

        dispatcher(registry, sink.clone())
            .process(Request::new("madcow: anything", "alice"))
            .await
            .unwrap();

        assert!(sink.calls().is_empty());
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_module_produces_no_output() {
        let before = TestModule::new(
            Pattern::new("^never$").unwrap(),
            inline().priority(10),
            Behaviour::Reply("nope"),
        );
        let boom = TestModule::new(
            Pattern::new("boom").unwrap(),
            inline().priority(50),
            Behaviour::Fail,
        );
        let boom_calls = boom.calls();
        let registry = ModuleRegistry::builder()
            .register("d", Arc::new(before))
            .unwrap()
            .register("c", Arc::new(boom))
            .unwrap()
            .build();
        let sink = RecordingSink::new();

        let outcome = dispatcher(registry, sink.clone())
            .process(Request::new("boom", "alice").addressed(true))
            .await
            .unwrap();

        assert!(sink.calls().is_empty());
        assert_eq!(boom_calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, DispatchOutcome::Scanned { matched: 1, .. }));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_lower_priority_modules() {
        let boom = TestModule::new(
            Pattern::Any,
            inline().priority(10).terminate(false),
            Behaviour::Fail,
        );
        let crash = TestModule::new(
            Pattern::Any,
            inline().priority(20).terminate(false),
            Behaviour::Panic,
        );
        let echo = TestModule::new(Pattern::Any, inline().priority(30), Behaviour::Echo);
        let registry = ModuleRegistry::builder()
            .register("boom", Arc::new(boom))
            .unwrap()
            .register("crash", Arc::new(crash))
            .unwrap()
            .register("echo", Arc::new(echo))
            .unwrap()
            .build();
        let sink = RecordingSink::new();

        dispatcher(registry, sink.clone())
            .process(Request::new("madcow: still here", "alice"))
            .await
            .unwrap();

        assert_eq!(sink.calls(), vec!["still here".to_string()]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_failing_module_logs_one_error() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(Level::ERROR)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let boom = TestModule::new(Pattern::new("kaboom").unwrap(), inline(), Behaviour::Fail);
        let registry = ModuleRegistry::builder()
            .register("boom", Arc::new(boom))
            .unwrap()
            .build();
        let sink = RecordingSink::new();

        dispatcher(registry, sink.clone())
            .process(Request::new("madcow: kaboom", "alice"))
            .await
            .unwrap();

        let text = logs.contents();
        assert_eq!(text.matches("Module response failed").count(), 1);
        assert!(text.contains("module=boom"), "{text}");
        assert!(text.contains("line=kaboom"), "{text}");
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_worker_failures_are_isolated() {
        let crash = TestModule::new(
            Pattern::Any,
            ModuleOptions::default().priority(10).terminate(false),
            Behaviour::Panic,
        );
        let boom = TestModule::new(
            Pattern::Any,
            ModuleOptions::default().priority(20).terminate(false),
            Behaviour::Fail,
        );
        let echo = TestModule::new(Pattern::Any, inline().priority(30), Behaviour::Echo);
        let (crash_calls, boom_calls) = (crash.calls(), boom.calls());
        let registry = ModuleRegistry::builder()
            .register("crash", Arc::new(crash))
            .unwrap()
            .register("boom", Arc::new(boom))
            .unwrap()
            .register("echo", Arc::new(echo))
            .unwrap()
            .build();
        let sink = RecordingSink::new();
        let dispatcher = dispatcher(registry, sink.clone());

        let outcome = dispatcher
            .process(Request::new("madcow: still here", "alice"))
            .await
            .unwrap();
        dispatcher.wait_idle().await;

        assert_eq!(
            outcome,
            DispatchOutcome::Scanned {
                matched: 3,
                spawned: 2,
                terminated_by: Some("echo".to_string()),
            }
        );
        assert_eq!(crash_calls.load(Ordering::SeqCst), 1);
        assert_eq!(boom_calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.calls(), vec!["still here".to_string()]);
        assert_eq!(dispatcher.active_workers(), 0);
    }

    #[tokio::test]
    async fn test_threaded_terminating_module_stops_scan() {
        let first = TestModule::new(
            Pattern::Any,
            ModuleOptions::default()
                .require_addressing(false)
                .priority(1)
                .terminate(true),
            Behaviour::Panic,
        );
        let later = TestModule::new(
            Pattern::Any,
            inline().require_addressing(false),
            Behaviour::Reply("later"),
        );
        let (first_calls, later_calls) = (first.calls(), later.calls());
        let registry = ModuleRegistry::builder()
            .register("later", Arc::new(later))
            .unwrap()
            .register("first", Arc::new(first))
            .unwrap()
            .build();
        let sink = RecordingSink::new();
        let dispatcher = dispatcher(registry, sink.clone());

        let outcome = dispatcher
            .process(Request::new("anything", "alice"))
            .await
            .unwrap();
        dispatcher.wait_idle().await;

        assert_eq!(
            outcome,
            DispatchOutcome::Scanned {
                matched: 1,
                spawned: 1,
                terminated_by: Some("first".to_string()),
            }
        );
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_require_addressing_skips_unaddressed() {
        let addressed_only = TestModule::new(Pattern::Any, inline(), Behaviour::Reply("hi"));
        let calls = addressed_only.calls();
        let registry = ModuleRegistry::builder()
            .register("addressed", Arc::new(addressed_only))
            .unwrap()
            .build();
        let sink = RecordingSink::new();
        let dispatcher = dispatcher(registry, sink.clone());

        dispatcher
            .process(Request::new("just chatting", "alice"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        dispatcher
            .process(Request::new("madcow, just chatting", "alice"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.calls(), vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn test_private_only_skips_channel_requests() {
        let secret = TestModule::new(
            Pattern::Any,
            inline().private_only(true),
            Behaviour::Reply("psst"),
        );
        let registry = ModuleRegistry::builder()
            .register("secret", Arc::new(secret))
            .unwrap()
            .build();
        let sink = RecordingSink::new();
        let dispatcher = dispatcher(registry, sink.clone());

        dispatcher
            .process(Request::new("madcow: lyrics", "alice").channel("#madcow"))
            .await
            .unwrap();
        assert!(sink.calls().is_empty());

        dispatcher
            .process(Request::new("madcow: lyrics", "alice").private(true))
            .await
            .unwrap();
        assert_eq!(sink.calls(), vec!["psst".to_string()]);
    }

    #[tokio::test]
    async fn test_ignored_nick_is_dropped() {
        let echo = TestModule::new(
            Pattern::Any,
            inline().require_addressing(false),
            Behaviour::Echo,
        );
        let registry = ModuleRegistry::builder()
            .register("echo", Arc::new(echo))
            .unwrap()
            .build();
        let sink = RecordingSink::new();
        let dispatcher = Dispatcher::builder(Arc::new(registry), OutputHandle::new(sink.clone()))
            .ignore(IgnoreList::new(
                ["OtherBot"],
                vec![Regex::new("NOBOT").unwrap()],
            ))
            .build();

        let outcome = dispatcher
            .process(Request::new("hello", "otherbot"))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);

        let outcome = dispatcher
            .process(Request::new("secret NOBOT link", "alice"))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);

        assert!(sink.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_threaded_outputs_never_interleave() {
        let sink = RecordingSink::slow(Duration::from_millis(10));
        let mut builder = ModuleRegistry::builder();
        for i in 0..5 {
            let module = TestModule::new(
                Pattern::Any,
                ModuleOptions::default()
                    .require_addressing(false)
                    .terminate(false),
                Behaviour::Reply(["one", "two", "three", "four", "five"][i]),
            );
            builder = builder.register(format!("m{i}"), Arc::new(module)).unwrap();
        }
        let dispatcher = dispatcher(builder.build(), sink.clone());

        let outcome = dispatcher
            .process(Request::new("anything", "alice"))
            .await
            .unwrap();
        dispatcher.wait_idle().await;

        assert_eq!(
            outcome,
            DispatchOutcome::Scanned {
                matched: 5,
                spawned: 5,
                terminated_by: None,
            }
        );
        let mut calls = sink.calls();
        calls.sort();
        assert_eq!(calls, vec!["five", "four", "one", "three", "two"]);
        assert!(!sink.overlapped());
    }

    #[tokio::test]
    async fn test_scan_does_not_wait_for_worker() {
        let slow = TestModule::new(
            Pattern::Any,
            ModuleOptions::default()
                .require_addressing(false)
                .terminate(false),
            Behaviour::Sleep(Duration::from_millis(50), "slow"),
        );
        let fast = TestModule::new(
            Pattern::Any,
            inline().require_addressing(false).priority(60),
            Behaviour::Reply("fast"),
        );
        let registry = ModuleRegistry::builder()
            .register("slow", Arc::new(slow))
            .unwrap()
            .register("fast", Arc::new(fast))
            .unwrap()
            .build();
        let sink = RecordingSink::new();
        let dispatcher = dispatcher(registry, sink.clone());

        dispatcher
            .process(Request::new("go", "alice"))
            .await
            .unwrap();
        assert_eq!(sink.calls(), vec!["fast".to_string()]);

        dispatcher.wait_idle().await;
        assert_eq!(sink.calls(), vec!["fast".to_string(), "slow".to_string()]);
        assert_eq!(dispatcher.active_workers(), 0);
    }

    #[tokio::test]
    async fn test_global_threading_off_runs_inline() {
        let slow = TestModule::new(
            Pattern::Any,
            ModuleOptions::default().require_addressing(false),
            Behaviour::Sleep(Duration::from_millis(5), "done"),
        );
        let registry = ModuleRegistry::builder()
            .register("slow", Arc::new(slow))
            .unwrap()
            .build();
        let sink = RecordingSink::new();
        let dispatcher = Dispatcher::builder(Arc::new(registry), OutputHandle::new(sink.clone()))
            .allow_threading(false)
            .build();

        let outcome = dispatcher
            .process(Request::new("go", "alice"))
            .await
            .unwrap();

        assert_eq!(sink.calls(), vec!["done".to_string()]);
        assert!(matches!(outcome, DispatchOutcome::Scanned { spawned: 0, .. }));
    }

    #[tokio::test]
    async fn test_module_timeout_discards_late_answer() {
        let slow = TestModule::new(
            Pattern::Any,
            inline().require_addressing(false),
            Behaviour::Sleep(Duration::from_secs(5), "too late"),
        );
        let registry = ModuleRegistry::builder()
            .register("slow", Arc::new(slow))
            .unwrap()
            .build();
        let sink = RecordingSink::new();
        let dispatcher = Dispatcher::builder(Arc::new(registry), OutputHandle::new(sink.clone()))
            .module_timeout(Some(Duration::from_millis(20)))
            .build();

        dispatcher
            .process(Request::new("go", "alice"))
            .await
            .unwrap();

        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_addressing_error_aborts_dispatch() {
        let registry = ModuleRegistry::builder().build();
        let sink = RecordingSink::new();
        let dispatcher = Dispatcher::builder(Arc::new(registry), OutputHandle::new(sink.clone()))
            .identity(BotIdentity::new(""))
            .build();

        let result = dispatcher.process(Request::new("hi", "alice")).await;
        assert!(matches!(result, Err(DispatchError::Addressing(_))));
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_inline_sink_failure_propagates() {
        let echo = TestModule::new(
            Pattern::Any,
            inline().require_addressing(false),
            Behaviour::Echo,
        );
        let registry = ModuleRegistry::builder()
            .register("echo", Arc::new(echo))
            .unwrap()
            .build();
        let dispatcher = dispatcher(registry, RecordingSink::failing());

        let result = dispatcher.process(Request::new("hello", "alice")).await;
        assert!(matches!(result, Err(DispatchError::Sink(_))));
    }

    #[tokio::test]
    async fn test_rename_changes_addressing() {
        let echo = TestModule::new(Pattern::Any, inline(), Behaviour::Echo);
        let registry = ModuleRegistry::builder()
            .register("echo", Arc::new(echo))
            .unwrap()
            .build();
        let sink = RecordingSink::new();
        let dispatcher = dispatcher(registry, sink.clone());

        dispatcher.resolver().set_name("madcow_");
        dispatcher
            .process(Request::new("madcow: old name", "alice"))
            .await
            .unwrap();
        dispatcher
            .process(Request::new("madcow_: new name", "alice"))
            .await
            .unwrap();

        assert_eq!(sink.calls(), vec!["new name".to_string()]);
    }
}

//! Running the component under record, replay or passthrough.
//!
//! [`RunCapture`] wires the component's clock and transport, attaches log
//! capture for exactly the duration of the call, converts every kind of
//! termination into a [`ComponentRunResult`], and persists record artifacts
//! only after the call has fully returned.

pub mod component;
pub mod logs;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeZone, Utc};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;

pub use component::{Component, ComponentContext, ComponentExit};
pub use logs::{CaptureLayer, CapturedLog, ComponentRunResult, LogSink, DEFAULT_IGNORED_LOGGERS};

use crate::adapters::clock::{LiveClock, PinnedClock};
use crate::adapters::live::LiveHttp;
use crate::adapters::recording::RecordingHttp;
use crate::adapters::replaying::ReplayingHttp;
use crate::cassette::format::{CassetteMetadata, Interaction};
use crate::cassette::matcher::{EndpointRule, Matcher};
use crate::cassette::store::InteractionStore;
use crate::config::{load_config, Environment, MissingSecret};
use crate::error::HarnessError;
use crate::fixture::FixtureLayout;
use crate::ports::clock::Clock;
use crate::ports::http::HttpTransport;
use crate::sanitize::{SanitizationPipeline, Sanitizer, TokenSanitizer, REDACTED};
use crate::secrets::Secrets;
use crate::settings::HarnessSettings;
use crate::snapshot::OutputSnapshot;

/// Exit status reported for a component that panicked.
pub const PANIC_EXIT_CODE: i32 = 101;

/// Requested run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Call the real network and write a new cassette.
    Record,
    /// Answer every call from the existing cassette.
    Replay,
    /// Replay if a cassette exists, otherwise run with no interception.
    Auto,
}

impl FromStr for RunMode {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "record" => Ok(Self::Record),
            "replay" => Ok(Self::Replay),
            "auto" => Ok(Self::Auto),
            _ => Err(HarnessError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Record => "record",
            Self::Replay => "replay",
            Self::Auto => "auto",
        })
    }
}

/// What the run actually did once `Auto` was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveMode {
    /// A cassette and log file were written.
    Recorded,
    /// Every call was answered from the cassette.
    Replayed,
    /// No cassette existed; the component used the real network.
    Passthrough,
}

/// How the component's clock is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreezeTime {
    /// Record at the default instant; replay at the first recorded instant.
    #[default]
    Auto,
    /// Pin to this instant in both modes.
    At(DateTime<Utc>),
    /// Use the real clock.
    Live,
}

/// Instant used when nothing else decides the frozen time.
#[must_use]
pub fn default_freeze_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).single().unwrap_or_default()
}

/// Result of [`RunCapture::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// What happened after resolving `Auto`.
    pub mode: EffectiveMode,
    /// Exit code and captured logs.
    pub result: ComponentRunResult,
    /// Recorded interactions never served (replay only).
    pub unplayed: usize,
    /// `true` when the run needed real credentials (record or passthrough).
    pub credentials_required: bool,
}

/// Runs a component against one fixture.
pub struct RunCapture {
    fixture: FixtureLayout,
    mode: RunMode,
    freeze: FreezeTime,
    pipeline: Arc<SanitizationPipeline>,
    body_ignored: Vec<EndpointRule>,
    strict: bool,
    ignored_loggers: Vec<String>,
    redaction_values: Vec<String>,
    live: Option<Box<dyn HttpTransport>>,
    output_root: Option<PathBuf>,
    snapshot: OutputSnapshot,
    config: serde_json::Value,
}

impl RunCapture {
    /// A capture with an empty sanitizer pipeline and no config.
    ///
    /// Use [`from_fixture`](Self::from_fixture) to pick up the fixture's
    /// secrets, settings and config.
    #[must_use]
    pub fn new(fixture: FixtureLayout, mode: RunMode) -> Self {
        Self {
            fixture,
            mode,
            freeze: FreezeTime::Auto,
            pipeline: Arc::new(SanitizationPipeline::new()),
            body_ignored: Vec::new(),
            strict: true,
            ignored_loggers: DEFAULT_IGNORED_LOGGERS.iter().map(ToString::to_string).collect(),
            redaction_values: Vec::new(),
            live: None,
            output_root: None,
            snapshot: OutputSnapshot::default(),
            config: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// A capture configured from the fixture directory: `harness.yaml`,
    /// `config.secrets.json`, `.env` and `config.json`.
    ///
    /// Secrets are merged into the config only when the run will reach the
    /// network. During replay a `{{secret.*}}` placeholder with no value
    /// resolves to the redaction marker.
    ///
    /// # Errors
    ///
    /// Fails fast on malformed settings or secrets, invalid patterns, and
    /// unresolved placeholders.
    pub fn from_fixture(fixture: FixtureLayout, mode: RunMode) -> Result<Self, HarnessError> {
        let settings_path = fixture.settings();
        let settings = HarnessSettings::load(&settings_path)?;
        let secrets = Secrets::load(&fixture.secrets())?;
        let env = Environment::load(&fixture.env_file())?;

        let live_run = match mode {
            RunMode::Record => true,
            RunMode::Replay => false,
            RunMode::Auto => !fixture.has_cassette(),
        };
        let missing = if live_run { MissingSecret::Fail } else { MissingSecret::Redact };
        let mut config = load_config(&fixture.config(), &env, &secrets, missing)?;
        if live_run {
            secrets.merge_into(&mut config);
        }

        let redaction_values = secrets.redaction_values();
        let pipeline = settings.pipeline(&redaction_values)?;
        Ok(Self::new(fixture, mode)
            .freeze_time(settings.freeze_time(&settings_path)?)
            .strict(settings.strict())
            .body_ignored(settings.body_ignored_rules()?)
            .ignore_loggers(settings.ignored_loggers.iter().cloned())
            .pipeline(pipeline)
            .redact(redaction_values)
            .config(config))
    }

    /// Sets how the clock is frozen.
    #[must_use]
    pub fn freeze_time(mut self, freeze: FreezeTime) -> Self {
        self.freeze = freeze;
        self
    }

    /// Sets the sanitizer pipeline applied to recorded interactions.
    #[must_use]
    pub fn pipeline(mut self, pipeline: SanitizationPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    /// Declares endpoints whose request body is ignored for matching.
    #[must_use]
    pub fn body_ignored(mut self, rules: Vec<EndpointRule>) -> Self {
        self.body_ignored = rules;
        self
    }

    /// Strict replay fails the run on any unmatched request.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Adds logger namespaces to exclude from capture.
    #[must_use]
    pub fn ignore_loggers<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_loggers.extend(namespaces.into_iter().map(Into::into));
        self
    }

    /// Values scrubbed from captured log messages.
    #[must_use]
    pub fn redact(mut self, values: Vec<String>) -> Self {
        self.redaction_values = values;
        self
    }

    /// Transport used for record and passthrough; defaults to [`LiveHttp`].
    #[must_use]
    pub fn live_transport(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.live = Some(Box::new(transport));
        self
    }

    /// Directory the component writes output to; snapshotted after record.
    #[must_use]
    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(root.into());
        self
    }

    /// Overrides the snapshot ignore rules.
    #[must_use]
    pub fn snapshot(mut self, snapshot: OutputSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Component configuration passed through [`ComponentContext::config`].
    #[must_use]
    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Fixture this capture reads from and writes to.
    #[must_use]
    pub fn fixture(&self) -> &FixtureLayout {
        &self.fixture
    }

    /// Runs the component once.
    ///
    /// The component's exit request or panic never escapes; it becomes the
    /// outcome's exit code.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingCassette`] or
    /// [`HarnessError::MalformedCassette`] for replay without a usable
    /// cassette, [`HarnessError::NoMatchingInteraction`] for strict replay
    /// with unmatched requests, and [`HarnessError::Io`] if record
    /// artifacts cannot be written.
    pub fn run<C>(self, component: &mut C) -> Result<RunOutcome, HarnessError>
    where
        C: Component + ?Sized,
    {
        match self.mode {
            RunMode::Record => self.record(component),
            RunMode::Replay => self.replay(component),
            RunMode::Auto if self.fixture.has_cassette() => self.replay(component),
            RunMode::Auto => self.passthrough(component),
        }
    }

    fn record<C: Component + ?Sized>(mut self, component: &mut C) -> Result<RunOutcome, HarnessError> {
        info!(fixture = %self.fixture.root().display(), "recording");
        let cassette = self.fixture.cassette();
        let (result, interactions) = self.record_traffic(component, cassette, self.freeze)?;

        result.save(&self.fixture.logs())?;
        if let Some(root) = &self.output_root {
            self.snapshot.capture_to(root, &self.fixture.output_snapshot())?;
        }
        info!(interactions, exit_code = ?result.exit_code, "recording finished");

        Ok(RunOutcome { mode: EffectiveMode::Recorded, result, unplayed: 0, credentials_required: true })
    }

    /// Records against the live network with the real clock into a
    /// timestamped cassette `<stem>_<YYYYMMDD_HHMMSS>.json` under
    /// `output_dir`, for downloading traffic from a diagnostic run.
    ///
    /// The mode and freeze setting are ignored, and nothing is written to
    /// the fixture: no logs file, no output snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the cassette cannot be written.
    pub fn record_debug<C>(
        mut self,
        component: &mut C,
        output_dir: &Path,
        stem: &str,
    ) -> Result<(PathBuf, ComponentRunResult), HarnessError>
    where
        C: Component + ?Sized,
    {
        let file_name = format!("{}_{}.json", debug_stem(stem), Utc::now().format("%Y%m%d_%H%M%S"));
        let cassette = output_dir.join(file_name);
        info!(cassette = %cassette.display(), "recording debug run");
        let (result, interactions) = self.record_traffic(component, cassette.clone(), FreezeTime::Live)?;
        info!(interactions, exit_code = ?result.exit_code, "debug recording finished");
        Ok((cassette, result))
    }

    /// Runs the component through a recording transport and persists the
    /// cassette plus its metadata sidecar once the call has returned.
    fn record_traffic<C: Component + ?Sized>(
        &mut self,
        component: &mut C,
        cassette: PathBuf,
        freeze: FreezeTime,
    ) -> Result<(ComponentRunResult, usize), HarnessError> {
        let frozen_at = match freeze {
            FreezeTime::Auto => Some(default_freeze_instant()),
            FreezeTime::At(at) => Some(at),
            FreezeTime::Live => None,
        };
        let clock: Arc<dyn Clock> = match frozen_at {
            Some(at) => Arc::new(PinnedClock::new(at)),
            None => Arc::new(LiveClock),
        };
        let store = Arc::new(Mutex::new(InteractionStore::new(cassette)));
        let live = self.live.take().unwrap_or_else(|| Box::new(LiveHttp::new()));
        let http = RecordingHttp::new(live, Arc::clone(&store), Arc::clone(&self.pipeline), Arc::clone(&clock));

        let ctx = ComponentContext {
            clock: Box::new(SharedClock(clock)),
            http: Box::new(http),
            config: self.config.clone(),
        };
        let result = self.invoke(component, &ctx);
        drop(ctx);

        let store = store.lock().unwrap_or_else(PoisonError::into_inner);
        store.persist()?;
        store.persist_metadata(&CassetteMetadata::new(frozen_at))?;
        Ok((result, store.len()))
    }

    fn replay<C: Component + ?Sized>(self, component: &mut C) -> Result<RunOutcome, HarnessError> {
        let cassette = self.fixture.cassette();
        let store = InteractionStore::load(&cassette)?;
        let at = match self.freeze {
            FreezeTime::At(at) => Some(at),
            FreezeTime::Live => None,
            FreezeTime::Auto => Some(resolve_replay_instant(
                InteractionStore::load_metadata(&cassette)?.as_ref(),
                store.interactions().first(),
            )),
        };
        let clock: Box<dyn Clock> = match at {
            Some(at) => Box::new(PinnedClock::new(at)),
            None => Box::new(LiveClock),
        };

        let normalizer: Arc<dyn Sanitizer> = Arc::clone(&self.pipeline) as Arc<dyn Sanitizer>;
        let matcher = Matcher::new(store.into_interactions(), self.body_ignored.clone())
            .with_request_normalizer(normalizer);
        let http = Arc::new(ReplayingHttp::new(matcher));

        info!(fixture = %self.fixture.root().display(), "replaying");
        let ctx = ComponentContext { clock, http: Box::new(Arc::clone(&http)), config: self.config.clone() };
        let result = self.invoke(component, &ctx);
        drop(ctx);

        let unplayed = http.unplayed();
        if unplayed > 0 {
            warn!(unplayed, "recorded interactions were never requested");
        }
        let unmatched = http.unmatched();
        if let Some(first) = unmatched.first() {
            warn!(count = unmatched.len(), "requests had no recorded interaction");
            if self.strict {
                warn!(
                    exit_code = ?result.exit_code,
                    logs = result.logs.len(),
                    "strict replay failed; the captured run is attached to the error"
                );
                return Err(HarnessError::NoMatchingInteraction {
                    method: first.method.clone(),
                    path: first.path.clone(),
                    captured: Some(Box::new(result)),
                });
            }
        }
        info!(exit_code = ?result.exit_code, "replay finished");

        Ok(RunOutcome { mode: EffectiveMode::Replayed, result, unplayed, credentials_required: false })
    }

    fn passthrough<C: Component + ?Sized>(mut self, component: &mut C) -> Result<RunOutcome, HarnessError> {
        warn!(
            fixture = %self.fixture.root().display(),
            "no cassette; running against the live network with real credentials"
        );
        let live = self.live.take().unwrap_or_else(|| Box::new(LiveHttp::new()));
        let ctx = ComponentContext { clock: Box::new(LiveClock), http: live, config: self.config.clone() };
        let result = self.invoke(component, &ctx);
        Ok(RunOutcome { mode: EffectiveMode::Passthrough, result, unplayed: 0, credentials_required: true })
    }

    /// Calls the component with log capture attached; the capture
    /// subscriber is detached when this returns, whatever the component did.
    fn invoke<C: Component + ?Sized>(&self, component: &mut C, ctx: &ComponentContext) -> ComponentRunResult {
        let sink = LogSink::new();
        let layer = CaptureLayer::new(
            sink.clone(),
            self.ignored_loggers.clone(),
            TokenSanitizer::new(self.redaction_values.clone(), REDACTED),
        );
        let subscriber = tracing_subscriber::registry().with(layer);

        let outcome = tracing::subscriber::with_default(subscriber, || {
            panic::catch_unwind(AssertUnwindSafe(|| component.run(ctx)))
        });

        let mut logs = sink.take();
        let exit_code = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(exit)) => Some(exit.code),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let scrubbed = TokenSanitizer::new(self.redaction_values.clone(), REDACTED).scrub(&message);
                logs.push(CapturedLog::new("ERROR", "panic", scrubbed));
                Some(PANIC_EXIT_CODE)
            }
        };
        ComponentRunResult::new(exit_code, logs)
    }
}

impl fmt::Debug for RunCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunCapture")
            .field("fixture", &self.fixture)
            .field("mode", &self.mode)
            .field("freeze", &self.freeze)
            .field("strict", &self.strict)
            .field("pipeline", &self.pipeline)
            .field("output_root", &self.output_root)
            .finish_non_exhaustive()
    }
}

/// Replay instant for `FreezeTime::Auto`: the instant the recording froze
/// its clock at, else the first interaction's timestamp, else the default.
fn resolve_replay_instant(metadata: Option<&CassetteMetadata>, first: Option<&Interaction>) -> DateTime<Utc> {
    if let Some(at) = metadata.and_then(|m| m.freeze_time) {
        return at;
    }
    if let Some(first) = first {
        return first.recorded_at;
    }
    warn!("cassette is empty and records no freeze time; pinning clock to the default instant");
    default_freeze_instant()
}

fn debug_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "component".to_string()
    } else {
        cleaned
    }
}

struct SharedClock(Arc<dyn Clock>);

impl Clock for SharedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.now()
    }

    fn is_pinned(&self) -> bool {
        self.0.is_pinned()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("component panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("component panicked: {s}")
    } else {
        "component panicked".to_string()
    }
}

//! Pipeline specifications, assembly and per-connection execution.
//!
//! # How a pipeline is built
//!
//! Each [`ProtocolFamily`] has one [`PipelineSpec`]: an ordered list of
//! [`StageSpec`]s with exactly one [`StageSpec::Terminal`] marking where the
//! application's request handler sits.  Specs are built once, when the
//! [`PipelineAssembler`] is created, and each accepted connection gets a fresh
//! [`Pipeline`] instantiated from its family's spec before any byte is read.
//!
//! # How messages move
//!
//! ```text
//!   socket ──▶ stage 0 ──▶ stage 1 ──▶ … ──▶ Terminal        (inbound)
//!   socket ◀── stage 0 ◀── stage 1 ◀── … ◀── … ◀── last      (outbound)
//! ```
//!
//! - Inbound bytes enter at the head.  Everything that reaches the terminal
//!   slot becomes a [`Dispatch`] for the handler.
//! - A response from the handler enters at the tail and passes through every
//!   stage in reverse, including the encoder stages placed after the terminal.
//! - A write issued by a stage itself (the `101` upgrade response) passes only
//!   through the stages before that stage.

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

use gate_core::{ConnectionEvent, PipelineError, Request, Response};

use crate::application::stage::{ConnectionState, Inbound, Outbound, Stage, StageContext};
use crate::application::stages::{
    AsciiTextStage, FileRequestStage, FileResponseEncodeStage, FramerStage,
    GameFrameDecodeStage, GameFrameEncodeStage, HttpCodecStage, HttpUpgradeStage,
    IdleTimeoutStage, WebSocketEnvelopeStage,
};
use crate::domain::{GatewayConfig, ProtocolFamily, SessionId, Transport};

/// Errors raised when a pipeline specification is malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("pipeline for {0} has no terminal handler slot")]
    MissingTerminal(ProtocolFamily),

    #[error("pipeline for {family} has {count} terminal handler slots; exactly one is allowed")]
    DuplicateTerminal { family: ProtocolFamily, count: usize },
}

// ── Specifications ────────────────────────────────────────────────────────────

/// One declared position in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSpec {
    HttpCodec,
    HttpUpgrade,
    Framer,
    AsciiText,
    FileRequestDecoder,
    GameFrameDecoder,
    IdleTimeout,
    /// Where decoded requests leave the pipeline for the handler.
    Terminal,
    WebSocketEnvelope,
    FileResponseEncoder,
    GameFrameEncoder,
}

impl StageSpec {
    fn instantiate(self) -> Slot {
        let stage: Box<dyn Stage> = match self {
            StageSpec::Terminal => return Slot::Terminal,
            StageSpec::HttpCodec => Box::<HttpCodecStage>::default(),
            StageSpec::HttpUpgrade => Box::new(HttpUpgradeStage),
            StageSpec::Framer => Box::<FramerStage>::default(),
            StageSpec::AsciiText => Box::new(AsciiTextStage),
            StageSpec::FileRequestDecoder => Box::new(FileRequestStage),
            StageSpec::GameFrameDecoder => Box::<GameFrameDecodeStage>::default(),
            StageSpec::IdleTimeout => Box::new(IdleTimeoutStage),
            StageSpec::WebSocketEnvelope => Box::new(WebSocketEnvelopeStage),
            StageSpec::FileResponseEncoder => Box::new(FileResponseEncodeStage),
            StageSpec::GameFrameEncoder => Box::new(GameFrameEncodeStage),
        };
        Slot::Stage(stage)
    }
}

/// Options that shape the standard pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub idle_timeout: Duration,
    /// Include the WebSocket envelope encoder in the upgrade pipelines.
    pub websocket_envelope: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(15),
            websocket_envelope: true,
        }
    }
}

impl From<&GatewayConfig> for PipelineOptions {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            websocket_envelope: config.websocket_envelope,
        }
    }
}

/// The declarative stage list for one protocol family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    family: ProtocolFamily,
    stages: Vec<StageSpec>,
}

impl PipelineSpec {
    /// Validates and wraps a stage list.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] unless `stages` contains exactly one
    /// [`StageSpec::Terminal`].
    pub fn new(family: ProtocolFamily, stages: Vec<StageSpec>) -> Result<Self, AssemblyError> {
        match stages.iter().filter(|s| **s == StageSpec::Terminal).count() {
            0 => Err(AssemblyError::MissingTerminal(family)),
            1 => Ok(Self { family, stages }),
            count => Err(AssemblyError::DuplicateTerminal { family, count }),
        }
    }

    /// The standard chain for `family`.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn standard(family: ProtocolFamily, options: &PipelineOptions) -> Result<Self, AssemblyError> {
        use StageSpec::*;

        let (decoders, encoder) = match family {
            ProtocolFamily::FileGrabWebSocket => (
                vec![HttpCodec, HttpUpgrade, Framer, AsciiText, FileRequestDecoder],
                FileResponseEncoder,
            ),
            ProtocolFamily::FileGrab => {
                (vec![Framer, AsciiText, FileRequestDecoder], FileResponseEncoder)
            }
            ProtocolFamily::Game => (vec![GameFrameDecoder], GameFrameEncoder),
            ProtocolFamily::GameWebSocket => {
                (vec![HttpCodec, HttpUpgrade, GameFrameDecoder], GameFrameEncoder)
            }
        };

        let mut stages = decoders;
        stages.push(IdleTimeout);
        stages.push(Terminal);
        if family.is_upgrade() && options.websocket_envelope {
            stages.push(WebSocketEnvelope);
        }
        stages.push(encoder);

        Self::new(family, stages)
    }

    pub fn family(&self) -> ProtocolFamily {
        self.family
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────────

/// Builds a fresh [`Pipeline`] for each accepted connection.
#[derive(Debug, Clone)]
pub struct PipelineAssembler {
    options: PipelineOptions,
    specs: [PipelineSpec; ProtocolFamily::COUNT],
}

impl PipelineAssembler {
    /// Builds the standard spec for every protocol family.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] if any standard spec is malformed.
    pub fn new(options: PipelineOptions) -> Result<Self, AssemblyError> {
        let specs = [
            PipelineSpec::standard(ProtocolFamily::ALL[0], &options)?,
            PipelineSpec::standard(ProtocolFamily::ALL[1], &options)?,
            PipelineSpec::standard(ProtocolFamily::ALL[2], &options)?,
            PipelineSpec::standard(ProtocolFamily::ALL[3], &options)?,
        ];
        Ok(Self { options, specs })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn spec(&self, family: ProtocolFamily) -> &PipelineSpec {
        &self.specs[family.index()]
    }

    /// Instantiates `family`'s pipeline for a connection accepted at
    /// `accepted_at`.
    pub fn assemble(
        &self,
        family: ProtocolFamily,
        session_id: SessionId,
        accepted_at: Instant,
    ) -> Pipeline {
        let state = ConnectionState {
            session_id,
            protocol: family,
            transport: Transport::Raw,
            last_read: accepted_at,
            idle_timeout: self.options.idle_timeout,
        };
        let slots = self
            .spec(family)
            .stages()
            .iter()
            .map(|spec| spec.instantiate())
            .collect();
        Pipeline { state, slots }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

enum Slot {
    Stage(Box<dyn Stage>),
    Terminal,
}

impl Slot {
    fn name(&self) -> &'static str {
        match self {
            Slot::Stage(stage) => stage.name(),
            Slot::Terminal => "handler",
        }
    }
}

/// Something the terminal handler must be told about, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Event(ConnectionEvent),
    Request(Request),
}

/// The result of feeding one read into a pipeline.
#[derive(Debug, Default)]
pub struct Transfer {
    /// Encoded bytes stages wrote back; send these before dispatching.
    pub writes: Vec<Vec<u8>>,
    pub dispatches: Vec<Dispatch>,
    /// The first error any stage raised.  Writes and dispatches produced
    /// before it are still valid; the connection closes after them.
    pub failure: Option<PipelineError>,
}

impl Transfer {
    fn fail(&mut self, error: PipelineError) {
        if self.failure.is_none() {
            self.failure = Some(error);
        }
    }
}

/// One connection's instantiated stage chain and state.
pub struct Pipeline {
    state: ConnectionState,
    slots: Vec<Slot>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// The instant after which the connection counts as idle.
    pub fn read_deadline(&self) -> Instant {
        self.state.read_deadline()
    }

    /// Slot names in order; the terminal slot is `"handler"`.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.slots.iter().map(Slot::name).collect()
    }

    /// Feeds one read's worth of bytes through the inbound chain.
    ///
    /// Each stage handles every message from the previous stage before the
    /// next stage runs, so message order is preserved end to end.
    ///
    /// When a stage fails, it handles no further messages from this read,
    /// but whatever it forwarded before the failure still runs to the
    /// handler.  A read carrying two complete requests and then an oversized
    /// frame therefore dispatches both requests and reports the violation in
    /// [`Transfer::failure`].
    pub fn fire_read(&mut self, bytes: Vec<u8>, now: Instant) -> Transfer {
        let mut transfer = Transfer::default();
        let mut pending = vec![Inbound::Bytes(bytes)];

        for index in 0..self.slots.len() {
            if pending.is_empty() {
                break;
            }
            let (before, rest) = self.slots.split_at_mut(index);
            match &mut rest[0] {
                Slot::Terminal => {
                    for message in pending.drain(..) {
                        match into_dispatch(message) {
                            Ok(dispatch) => transfer.dispatches.push(dispatch),
                            Err(e) => {
                                transfer.fail(e);
                                break;
                            }
                        }
                    }
                    break;
                }
                Slot::Stage(stage) => {
                    let mut ctx = StageContext::new(&mut self.state, now);
                    for message in pending.drain(..) {
                        if let Err(e) = stage.inbound(message, &mut ctx) {
                            transfer.fail(e);
                            break;
                        }
                    }
                    let (forwarded, writes) = ctx.finish();
                    for write in writes {
                        match encode_through(before, write, &self.state) {
                            Ok(bytes) => transfer.writes.push(bytes),
                            Err(e) => transfer.fail(e),
                        }
                    }
                    pending = forwarded;
                }
            }
        }

        transfer
    }

    /// Encodes a handler response through every stage, tail to head.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`] an encoder raises.
    pub fn write(&mut self, response: Response) -> Result<Vec<u8>, PipelineError> {
        encode_through(&mut self.slots, Outbound::Response(response), &self.state)
    }
}

fn into_dispatch(message: Inbound) -> Result<Dispatch, PipelineError> {
    match message {
        Inbound::Request(request) => Ok(Dispatch::Request(request)),
        Inbound::Event(event) => Ok(Dispatch::Event(event)),
        other => Err(PipelineError::ProtocolDecode(format!(
            "undecoded message reached the handler: {other:?}"
        ))),
    }
}

/// Runs `message` outbound through `slots` in reverse and expects bytes out.
fn encode_through(
    slots: &mut [Slot],
    message: Outbound,
    state: &ConnectionState,
) -> Result<Vec<u8>, PipelineError> {
    let mut message = message;
    for slot in slots.iter_mut().rev() {
        if let Slot::Stage(stage) = slot {
            message = stage.outbound(message, state)?;
        }
    }
    match message {
        Outbound::Bytes(bytes) => Ok(bytes),
        other => Err(PipelineError::ProtocolDecode(format!(
            "no stage encoded outbound message {other:?}"
        ))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

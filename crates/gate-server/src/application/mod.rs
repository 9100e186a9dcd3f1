//! Application layer for gate-server.
//!
//! Everything between "bytes arrived" and "a request is ready": protocol
//! detection, the stage chains, and the handler seam.  The code here is
//! synchronous and socket-free, so each piece is unit tested directly; the
//! infrastructure layer drives it with real I/O.

pub mod detect;
pub mod handler;
pub mod pipeline;
pub mod stage;
pub mod stages;

pub use detect::{detect, Detection};
pub use handler::{RequestHandler, SessionContext};
pub use pipeline::{
    AssemblyError, Dispatch, Pipeline, PipelineAssembler, PipelineOptions, PipelineSpec,
    StageSpec, Transfer,
};

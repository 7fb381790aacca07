//! Port traits decoupling the download engine from its collaborators.

mod queue_emitter;
mod remote_client;

pub use queue_emitter::{NoopQueueEmitter, QueueEventEmitterPort};
pub use remote_client::{
    CompletionCallback, FileProgressFn, ParsedModelUrl, ProgressCallback, RemoteClientPort,
};

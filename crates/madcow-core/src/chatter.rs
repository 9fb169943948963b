//! Recording of public chatter.

use std::sync::Arc;

use crate::request::Request;

/// Receives every public (non-private) line before it is filtered or resolved.
///
/// Implementations own their storage and report their own failures; a
/// recorder never affects dispatch.
pub trait ChatterLog: Send + Sync + 'static {
    fn record(&self, req: &Request);
}

/// A shared, type-erased chatter recorder.
pub type BoxedChatterLog = Arc<dyn ChatterLog>;

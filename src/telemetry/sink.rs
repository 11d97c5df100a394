use std::sync::{Arc, Mutex, OnceLock};

use anyhow::Result;

use crate::output::config::OutputConfig;
use crate::output::types::Envelope;
use crate::output::Emitter;

/// Destination for result envelopes.
pub trait OutputSink: Send + Sync {
    fn on_result(&self, env: &Envelope) -> Result<()>;
}

#[derive(Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn on_result(&self, env: &Envelope) -> Result<()> {
        let emitter = Emitter::from_env(OutputConfig::from_env());
        emitter.emit(env).map_err(anyhow::Error::from)
    }
}

type DynSink = Arc<dyn OutputSink>;

fn sink_slot() -> &'static Mutex<DynSink> {
    static SINK: OnceLock<Mutex<DynSink>> = OnceLock::new();
    SINK.get_or_init(|| Mutex::new(Arc::new(StdoutSink) as DynSink))
}

pub fn current_sink() -> DynSink {
    match sink_slot().lock() {
        Ok(g) => g.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

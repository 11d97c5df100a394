use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Meeting;

#[derive(Copy, Clone, Debug)]
pub enum Phase { FetchYear, Extract }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::FetchYear => "fetch_year", Phase::Extract => "extract" } }
    fn span(&self) -> Span { match self { Phase::FetchYear => info_span!("fetch_year"), Phase::Extract => info_span!("extract") } }
}

impl OpMarker for Meeting {
    const NAME: &'static str = "meeting";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("meeting") }
}

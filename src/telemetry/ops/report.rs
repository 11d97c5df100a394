use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Report;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Dispatch, Process, Shorten, Render }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Plan => "plan",
        Phase::Dispatch => "dispatch",
        Phase::Process => "process",
        Phase::Shorten => "shorten",
        Phase::Render => "render",
    }}
    fn span(&self) -> Span { match self {
        Phase::Plan => info_span!("plan"),
        Phase::Dispatch => info_span!("dispatch"),
        Phase::Process => info_span!("process"),
        Phase::Shorten => info_span!("shorten"),
        Phase::Render => info_span!("render"),
    }}
}

impl OpMarker for Report {
    const NAME: &'static str = "report";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("report") }
}

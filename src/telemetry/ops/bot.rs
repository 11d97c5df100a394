use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Bot;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Activate, Dispatch, Poll, Deactivate }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Activate => "activate",
        Phase::Dispatch => "dispatch",
        Phase::Poll => "poll",
        Phase::Deactivate => "deactivate",
    }}
    fn span(&self) -> Span { match self {
        Phase::Activate => info_span!("activate"),
        Phase::Dispatch => info_span!("dispatch"),
        Phase::Poll => info_span!("poll"),
        Phase::Deactivate => info_span!("deactivate"),
    }}
}

impl OpMarker for Bot {
    const NAME: &'static str = "bot";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("bot") }
}

pub mod config;
pub mod ctx;
pub mod emit;
pub mod ops;
pub mod sink;

use ctx::LogCtx;

fn ctx<O: ctx::OpMarker>() -> LogCtx<O> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }

pub fn report() -> LogCtx<ops::report::Report> { ctx() }
pub fn meeting() -> LogCtx<ops::meeting::Meeting> { ctx() }
pub fn bot() -> LogCtx<ops::bot::Bot> { ctx() }
pub fn settings() -> LogCtx<ops::settings::Settings> { ctx() }

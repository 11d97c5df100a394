use anyhow::Result;
use serde::Serialize;

use crate::output::types::{Envelope, Meta};

use super::sink::current_sink;

pub fn print_result<T: Serialize>(op: &'static str, result: &T, text: Option<String>, meta: Option<Meta>) -> Result<()> {
    let mut env = Envelope::result(op, result, meta)?;
    if let Some(t) = text { env = env.with_text(t); }
    current_sink().on_result(&env)
}

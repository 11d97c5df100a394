#[cfg(test)]
pub(crate) mod http_stub;
pub mod template;
pub mod time;

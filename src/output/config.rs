use std::env;

use crate::telemetry::config::json_mode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl OutputConfig {
    /// `--json` wins; otherwise OSLOBOT_OUTPUT_FORMAT / OSLOBOT_OUTPUT_PRETTY.
    pub fn from_env() -> Self {
        Self::from_parts(json_mode(), env::var("OSLOBOT_OUTPUT_FORMAT").ok().as_deref(), env::var("OSLOBOT_OUTPUT_PRETTY").ok().as_deref())
    }

    fn from_parts(json_flag: bool, format: Option<&str>, pretty: Option<&str>) -> Self {
        let format = match (json_flag, format) {
            (true, _) | (_, Some("json")) => OutputFormat::Json,
            _ => OutputFormat::Text,
        };
        let pretty = matches!(pretty, Some(v) if v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"));
        OutputConfig { format, pretty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_overrides_env_format() {
        assert_eq!(OutputConfig::from_parts(true, Some("text"), None).format, OutputFormat::Json);
        assert_eq!(OutputConfig::from_parts(false, Some("json"), None).format, OutputFormat::Json);
        assert_eq!(OutputConfig::from_parts(false, None, None), OutputConfig { format: OutputFormat::Text, pretty: false });
        assert!(OutputConfig::from_parts(false, None, Some("YES")).pretty);
    }
}

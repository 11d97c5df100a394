use std::io::{self, Write};

use super::config::{OutputConfig, OutputFormat};
use super::types::Envelope;

pub trait Presenter: Send + Sync {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()>;
}

pub struct JsonPresenter { pub pretty: bool }
impl Presenter for JsonPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        if self.pretty { serde_json::to_writer_pretty(&mut *w, env).map_err(to_io)? } else { serde_json::to_writer(&mut *w, env).map_err(to_io)? }
        writeln!(w)
    }
}

/// Prints the human rendering when the op supplied one, else the result as JSON.
pub struct TextPresenter { pub pretty: bool }
impl Presenter for TextPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        if let Some(text) = &env.text {
            return writeln!(w, "{}", text.trim_end());
        }
        writeln!(w, "Result: {}", env.op)?;
        if self.pretty {
            serde_json::to_writer_pretty(&mut *w, &env.result).map_err(to_io)?;
            writeln!(w)?;
        }
        Ok(())
    }
}

pub struct Emitter {
    presenter: Box<dyn Presenter>,
}

impl Emitter {
    pub fn from_env(cfg: OutputConfig) -> Self {
        let presenter: Box<dyn Presenter> = match cfg.format {
            OutputFormat::Json => Box::new(JsonPresenter { pretty: cfg.pretty }),
            OutputFormat::Text => Box::new(TextPresenter { pretty: cfg.pretty }),
        };
        Emitter { presenter }
    }

    pub fn emit(&self, env: &Envelope) -> io::Result<()> {
        let mut out = io::stdout();
        self.emit_to(env, &mut out)?;
        out.flush()
    }

    pub fn emit_to(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        self.presenter.emit(env, w)
    }
}

fn to_io(e: serde_json::Error) -> io::Error { io::Error::new(io::ErrorKind::Other, e) }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(format: OutputFormat, env: &Envelope) -> String {
        let mut buf = Vec::new();
        Emitter::from_env(OutputConfig { format, pretty: false }).emit_to(env, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn text_prefers_rendered_table() {
        let env = Envelope::result("report", &json!([{"project": "Nova (3.4)"}]), None)
            .unwrap()
            .with_text("Project  Status\nNova (3.4)  1 failures\n");
        assert_eq!(render(OutputFormat::Text, &env), "Project  Status\nNova (3.4)  1 failures\n");
    }

    #[test]
    fn json_is_one_line_and_hides_text() {
        let env = Envelope::result("meeting", &json!({"url": "http://m"}), None).unwrap().with_text("Last meeting url is http://m");
        let out = render(OutputFormat::Json, &env);
        assert_eq!(out.lines().count(), 1);
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["op"], "meeting");
        assert_eq!(v["result"]["url"], "http://m");
        assert!(v.get("text").is_none());
    }
}

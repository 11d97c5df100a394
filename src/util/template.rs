use regex::Regex;
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static placeholder regex"))
}

/// Expand `{name}` placeholders in `tpl`.
///
/// Every placeholder must have a value; unknown names are an error so a typo in a
/// configured template surfaces before any request is made.
pub fn render(tpl: &str, vars: &[(&str, &str)]) -> Result<String, String> {
    let mut missing: Option<String> = None;
    let out = placeholder_re().replace_all(tpl, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, v)) => v.to_string(),
            None => {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(key) => Err(format!("template '{tpl}' references unknown placeholder '{{{key}}}'")),
        None => Ok(out.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_all_placeholders() {
        let got = render(
            "periodic-{project_name}-{py_version}-with-oslo-master",
            &[("project_name", "nova"), ("py_version", "py34")],
        )
        .unwrap();
        assert_eq!(got, "periodic-nova-py34-with-oslo-master");
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let err = render("{team}/{yaer}/", &[("team", "oslo"), ("year", "2016")]).unwrap_err();
        assert!(err.contains("{yaer}"));
    }
}

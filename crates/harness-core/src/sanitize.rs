use regex::{Captures, Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn fence_re() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        RegexBuilder::new(r"```(?:python|tcl)?")
            .build()
            .unwrap_or_else(|e| panic!("fence pattern is a literal: {e}"))
    })
}

/// Strips markdown fence markers and surrounding whitespace from generated code.
///
/// Removal repeats until the text stops changing, so the result never contains a fence
/// marker and `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(raw: &str) -> String {
    let re = fence_re();
    let mut code = raw.to_string();
    loop {
        let next = re.replace_all(&code, "");
        if next == code {
            break;
        }
        code = next.into_owned();
    }
    code.trim().to_string()
}

/// Rewrites top-level variable assignments so generated scripts point at local design
/// inputs (`design_dir = "../Design"` and friends) instead of whatever path the model
/// invented.
#[derive(Debug, Clone, Default)]
pub struct Rewrites {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
struct Rule {
    name: String,
    value: String,
    re: Regex,
}

impl Rewrites {
    pub fn new(assignments: &BTreeMap<String, String>) -> anyhow::Result<Self> {
        let mut rules = Vec::with_capacity(assignments.len());
        for (name, value) in assignments {
            if name.trim().is_empty() {
                anyhow::bail!("config error: rewrite variable name must not be empty");
            }
            let pattern = format!(r"(?m)^([ \t]*){}[ \t]*=([^=\n].*)?$", regex::escape(name));
            let re = Regex::new(&pattern).map_err(|e| {
                anyhow::anyhow!("config error: invalid rewrite for '{}': {}", name, e)
            })?;
            rules.push(Rule {
                name: name.clone(),
                value: value.clone(),
                re,
            });
        }
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&self, code: &str) -> String {
        let mut out = code.to_string();
        for rule in &self.rules {
            let quoted = rule.value.replace('\\', "\\\\").replace('"', "\\\"");
            out = rule
                .re
                .replace_all(&out, |caps: &Captures| {
                    let rhs = caps.get(2).map_or("", |m| m.as_str());
                    match path_wrapper_re().captures(rhs) {
                        Some(w) => {
                            format!("{}{} = {}(\"{}\")", &caps[1], rule.name, &w[1], quoted)
                        }
                        None => format!("{}{} = \"{}\"", &caps[1], rule.name, quoted),
                    }
                })
                .into_owned();
        }
        out
    }
}

/// Path constructors kept around a rewritten value, so `designDir = Path(...)` stays a
/// path object for later `designDir / "gcd.v"` joins.
fn path_wrapper_re() -> &'static Regex {
    static WRAPPER: OnceLock<Regex> = OnceLock::new();
    WRAPPER.get_or_init(|| {
        Regex::new(r"^\s*((?:pathlib\.)?(?:Path|PurePath|PosixPath))\s*\(.*\)\s*$")
            .unwrap_or_else(|e| panic!("wrapper pattern is a literal: {e}"))
    })
}

/// Full source preparation: fence cleanup, then assignment rewrites.
pub fn prepare(raw: &str, rewrites: &Rewrites) -> String {
    let code = sanitize(raw);
    if rewrites.is_empty() {
        code
    } else {
        rewrites.apply(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_python_fences_once() {
        let raw = "```python\nimport openroad as ord\nprint(ord.get_db())\n```\n";
        assert_eq!(sanitize(raw), "import openroad as ord\nprint(ord.get_db())");
    }

    #[test]
    fn strips_bare_and_tcl_fences() {
        assert_eq!(sanitize("  ```\nread_lef x.lef\n```  "), "read_lef x.lef");
        assert_eq!(sanitize("```tcl\nread_def a.def\n```"), "read_def a.def");
    }

    #[test]
    fn idempotent_on_clean_and_partial_input() {
        let inputs = [
            "",
            "   ",
            "print('ok')",
            "```python\nx = 1\n```",
            "``````python\n```",
            "`````",
            "````python````",
            "a `` ``` ` b",
            "``python",
            "\n\n```\n\n```\n\n",
            "x = '```'",
        ];
        for x in inputs {
            let once = sanitize(x);
            assert_eq!(sanitize(&once), once, "not idempotent for {x:?}");
            assert!(!once.contains("```"), "fence left in {once:?}");
        }
    }

    #[test]
    fn short_backtick_runs_survive() {
        assert_eq!(sanitize("a``````` b"), "a` b");
        assert_eq!(sanitize("````python"), "`python");
        assert_eq!(sanitize("``"), "``");
    }

    #[test]
    fn body_is_preserved_verbatim() {
        let body = "for i in range(3):\n    print(i)\n\n# done";
        let raw = format!("```python\n{}\n```", body);
        assert_eq!(sanitize(&raw), body);
    }

    #[test]
    fn rewrites_assignments_only() {
        let mut m = BTreeMap::new();
        m.insert("design_dir".to_string(), "../Design".to_string());
        m.insert("design_top_module_name".to_string(), "gcd".to_string());
        let rw = Rewrites::new(&m).unwrap();

        let code = "design_dir = '/home/x/designs'\n    design_top_module_name=\"top\"\nif design_dir == 'a':\n    pass\nprint(design_dir)";
        let out = rw.apply(code);
        assert_eq!(
            out,
            "design_dir = \"../Design\"\n    design_top_module_name = \"gcd\"\nif design_dir == 'a':\n    pass\nprint(design_dir)"
        );
        assert_eq!(rw.apply(&out), out);
    }

    #[test]
    fn path_constructor_survives_rewrite() {
        let mut m = BTreeMap::new();
        m.insert("designDir".to_string(), "../Design".to_string());
        m.insert("verilogFile".to_string(), "1_synth.v".to_string());
        let rw = Rewrites::new(&m).unwrap();

        let code = "designDir = Path(\"/home/x\")\nverilogFile=pathlib.Path('/tmp/gcd.v')\nv = designDir / \"gcd.v\"";
        let out = rw.apply(code);
        assert_eq!(
            out,
            "designDir = Path(\"../Design\")\nverilogFile = pathlib.Path(\"1_synth.v\")\nv = designDir / \"gcd.v\""
        );
        assert_eq!(rw.apply(&out), out);

        // other calls are not path constructors
        let out = rw.apply("designDir = os.getcwd()");
        assert_eq!(out, "designDir = \"../Design\"");
    }

    #[test]
    fn prepare_sanitizes_before_rewriting() {
        let mut m = BTreeMap::new();
        m.insert("verilog_file".to_string(), "1_synth.v".to_string());
        let rw = Rewrites::new(&m).unwrap();
        let out = prepare("```python\nverilog_file = 'gcd.v'\n```", &rw);
        assert_eq!(out, "verilog_file = \"1_synth.v\"");
    }

    #[test]
    fn empty_rewrite_name_is_rejected() {
        let mut m = BTreeMap::new();
        m.insert(" ".to_string(), "x".to_string());
        assert!(Rewrites::new(&m).is_err());
    }
}

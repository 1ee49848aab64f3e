//! Spec file parser
//!
//! Decodes the line-oriented spec format into [`TestCase`]s:
//! - `#### name` starts a case; it runs until the next `#### ` line or EOF
//! - the lines right after the header, up to the first `## ` line, are the script
//! - `## ` lines after the script are annotations; unknown ones are ignored
//! - `## STDOUT:` (and its dialect-scoped forms) opens a verbatim block that
//!   runs until `## END`, the next `## OK|BUG*|N-I ` line, or the next case
//!
//! Expected stdout is assembled from three slots with different write policies,
//! resolved once the case block is finished:
//! - plain `## STDOUT:` / `## stdout:` — first value wins
//! - target-dialect `## OK|BUG <dialect> ...` — always replaces, last one wins
//! - `## stdout-json:` — fallback, used only when neither slot above is set
//!
//! `## status:` (plain or target-dialect `OK`/`BUG`) is last-wins, and any
//! `## N-I <dialect>` line marks the case as not implemented.

use regex::Regex;
use crate::case::TestCase;
use crate::dialect::Dialect;

const CASE_HEADER: &str = "#### ";
const ANNOTATION: &str = "## ";
const END_MARKER: &str = "## END";

/// How an stdout annotation writes into the case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    /// Keep an already-set value
    FirstWins,
    /// Target-dialect `OK`/`BUG`: replace whatever is there
    Override,
}

/// What a `STDOUT:` block header asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    /// `## STDOUT:`
    Expected,
    /// `## OK|BUG <dialect> STDOUT:`
    Override,
    /// `## N-I <dialect> STDOUT:` — body dropped
    NotImplemented,
    /// Any other dialect or tag — body dropped
    Foreign,
}

/// One classified line of the annotation section
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    /// Opens a block; its body is captured before it is applied
    BlockHeader(BlockKind),
    Single(Annotation),
}

/// A single-line annotation
#[derive(Debug, Clone, PartialEq, Eq)]
enum Annotation {
    /// `## code: X` — replaces the script body
    Code(String),
    Stdout(Policy, String),
    /// Already decoded `stdout-json` value
    StdoutJson(Policy, String),
    Status(i32),
    NotImplemented,
    Unknown,
}

/// Per-case accumulator
struct CaseBuilder {
    name: String,
    line: usize,
    body: String,
    code: Option<String>,
    stdout: Option<String>,
    stdout_json: Option<String>,
    stdout_override: Option<String>,
    status: i32,
    not_implemented: bool,
}

impl CaseBuilder {
    fn new(name: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            line,
            body: String::new(),
            code: None,
            stdout: None,
            stdout_json: None,
            stdout_override: None,
            status: 0,
            not_implemented: false,
        }
    }

    fn apply(&mut self, annotation: Annotation) {
        match annotation {
            Annotation::Code(code) => self.code = Some(code),
            Annotation::Stdout(Policy::FirstWins, s) => {
                self.stdout.get_or_insert(s);
            }
            Annotation::StdoutJson(Policy::FirstWins, s) => {
                self.stdout_json.get_or_insert(s);
            }
            Annotation::Stdout(Policy::Override, s)
            | Annotation::StdoutJson(Policy::Override, s) => self.stdout_override = Some(s),
            Annotation::Status(n) => self.status = n,
            Annotation::NotImplemented => self.not_implemented = true,
            Annotation::Unknown => {}
        }
    }

    fn apply_block(&mut self, kind: BlockKind, body: String) {
        match kind {
            BlockKind::Expected => {
                self.stdout.get_or_insert(body);
            }
            BlockKind::Override => self.stdout_override = Some(body),
            BlockKind::NotImplemented => self.not_implemented = true,
            BlockKind::Foreign => {}
        }
    }

    fn finish(self) -> TestCase {
        TestCase {
            name: self.name,
            code: self.code.unwrap_or(self.body),
            expected_stdout: self.stdout_override.or(self.stdout).or(self.stdout_json),
            expected_status: self.status,
            not_implemented: self.not_implemented,
            line: self.line,
        }
    }
}

/// Parser for spec files, bound to one active dialect
pub struct SpecParser {
    dialect: Dialect,
    /// `## STDOUT:` with an optional `<tag> <dialect> ` qualifier
    block_header: Regex,
    /// Start of another outcome-tagged line; ends a block early
    block_stop: Regex,
    /// `## N-I <dialect>` with anything after it
    not_implemented: Regex,
    /// `## OK|BUG <dialect> field: value`
    scoped: Regex,
    /// `## field: value`
    plain: Regex,
}

impl SpecParser {
    /// Build a parser for the given dialect
    pub fn new(dialect: Dialect) -> Result<Self, regex::Error> {
        let d = dialect.pattern();
        Ok(Self {
            block_header: Regex::new(r"^## (?:(OK|BUG\S*|N-I) (\S+) )?STDOUT:")?,
            block_stop: Regex::new(r"^## (?:OK|BUG\S*|N-I) ")?,
            not_implemented: Regex::new(&format!(r"^## N-I {}\b", d))?,
            scoped: Regex::new(&format!(r"^## (?:OK|BUG) {} (stdout|stdout-json|status): (.*)$", d))?,
            plain: Regex::new(r"^## (code|stdout|stdout-json|status): (.*)$")?,
            dialect,
        })
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Parse a whole spec file into its cases, in file order
    pub fn parse(&self, text: &str) -> Vec<TestCase> {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let mut cases = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let Some(name) = lines[i].strip_prefix(CASE_HEADER) else {
                i += 1;
                continue;
            };
            let mut builder = CaseBuilder::new(name.trim(), i + 1);
            i += 1;

            while i < lines.len() && !is_header(lines[i]) && !lines[i].starts_with(ANNOTATION) {
                builder.body.push_str(lines[i]);
                i += 1;
            }

            while i < lines.len() && !is_header(lines[i]) {
                let line = lines[i].strip_suffix('\n').unwrap_or(lines[i]);
                i += 1;
                match self.classify(line) {
                    Line::BlockHeader(kind) => {
                        let (body, next) = self.capture_block(&lines, i);
                        i = next;
                        builder.apply_block(kind, body);
                    }
                    Line::Single(annotation) => builder.apply(annotation),
                }
            }

            cases.push(builder.finish());
        }

        cases
    }

    /// Collect block lines starting at `start`. Returns the body and the index
    /// of the first line after the block (past `## END` if present).
    fn capture_block(&self, lines: &[&str], start: usize) -> (String, usize) {
        let mut body = String::new();
        let mut i = start;
        while i < lines.len() {
            let line = lines[i];
            if line.starts_with(END_MARKER) {
                return (body, i + 1);
            }
            if is_header(line) || self.block_stop.is_match(line) {
                break;
            }
            body.push_str(line);
            i += 1;
        }
        (body, i)
    }

    /// Classify one line (without its newline) of the annotation section
    fn classify(&self, line: &str) -> Line {
        if let Some(caps) = self.block_header.captures(line) {
            let kind = match (caps.get(1), caps.get(2)) {
                (Some(tag), Some(token)) if self.dialect.matches(token.as_str()) => match tag.as_str() {
                    "OK" | "BUG" => BlockKind::Override,
                    "N-I" => BlockKind::NotImplemented,
                    _ => BlockKind::Foreign,
                },
                (Some(_), _) => BlockKind::Foreign,
                _ => BlockKind::Expected,
            };
            return Line::BlockHeader(kind);
        }
        Line::Single(self.classify_single(line))
    }

    fn classify_single(&self, line: &str) -> Annotation {
        if self.not_implemented.is_match(line) {
            return Annotation::NotImplemented;
        }

        if let Some(caps) = self.scoped.captures(line) {
            return scalar(&caps[1], &caps[2], Policy::Override);
        }

        if let Some(caps) = self.plain.captures(line) {
            if &caps[1] == "code" {
                return Annotation::Code(format!("{}\n", &caps[2]));
            }
            return scalar(&caps[1], &caps[2], Policy::FirstWins);
        }

        Annotation::Unknown
    }
}

fn is_header(line: &str) -> bool {
    line.starts_with(CASE_HEADER)
}

/// Decode a `stdout` / `stdout-json` / `status` value
fn scalar(field: &str, value: &str, policy: Policy) -> Annotation {
    match field {
        "stdout" => Annotation::Stdout(policy, format!("{}\n", value)),
        "stdout-json" => match decode_json_string(value) {
            Some(s) => Annotation::StdoutJson(policy, s),
            None => Annotation::Unknown,
        },
        "status" => match parse_status(value) {
            Some(n) => Annotation::Status(n),
            None => Annotation::Unknown,
        },
        _ => Annotation::Unknown,
    }
}

/// Decode a double-quoted JSON string literal (`"a\nb"`, `"\u00e9"`)
fn decode_json_string(value: &str) -> Option<String> {
    if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
        return None;
    }
    serde_json::from_str::<String>(value).ok()
}

fn parse_status(value: &str) -> Option<i32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<TestCase> {
        SpecParser::new(Dialect::default()).unwrap().parse(text)
    }

    fn parse_one(text: &str) -> TestCase {
        let mut cases = parse(text);
        assert_eq!(cases.len(), 1, "expected exactly one case: {:?}", cases);
        cases.remove(0)
    }

    #[test]
    fn test_parse_empty_file() {
        assert!(parse("").is_empty());
        assert!(parse("# just a comment\necho hi\n").is_empty());
    }

    #[test]
    fn test_parse_no_annotations_defaults() {
        let case = parse_one("#### bare\necho hi\n");
        assert_eq!(case.name, "bare");
        assert_eq!(case.code, "echo hi\n");
        assert_eq!(case.expected_stdout, None);
        assert_eq!(case.expected_status, 0);
        assert!(!case.not_implemented);
        assert_eq!(case.line, 1);
    }

    #[test]
    fn test_case_without_annotations_does_not_swallow_next() {
        let cases = parse("#### one\necho 1\n#### two\necho 2\n## stdout: 2\n");
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].code, "echo 1\n");
        assert_eq!(cases[0].expected_stdout, None);
        assert_eq!(cases[1].code, "echo 2\n");
        assert_eq!(cases[1].expected_stdout.as_deref(), Some("2\n"));
        assert_eq!(cases[1].line, 3);
    }

    #[test]
    fn test_parse_preamble_ignored() {
        let cases = parse("## compare_shells: dash bash\n\n#### first\ntrue\n");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name, "first");
        assert_eq!(cases[0].line, 3);
    }

    #[test]
    fn test_parse_stdout_block() {
        let case = parse_one("#### echo\necho hi\necho there\n## STDOUT:\nhi\nthere\n## END\n");
        assert_eq!(case.code, "echo hi\necho there\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("hi\nthere\n"));
    }

    #[test]
    fn test_parse_empty_stdout_block() {
        let case = parse_one("#### quiet\ntrue\n## STDOUT:\n## END\n");
        assert_eq!(case.expected_stdout.as_deref(), Some(""));
    }

    #[test]
    fn test_stdout_block_without_end_stops_at_next_case() {
        let cases = parse("#### a\necho a\n## STDOUT:\na\n#### b\necho b\n## stdout: b\n");
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].expected_stdout.as_deref(), Some("a\n"));
        assert_eq!(cases[1].expected_stdout.as_deref(), Some("b\n"));
    }

    #[test]
    fn test_stdout_block_stops_at_outcome_tag() {
        let text = "#### t\necho x\n## STDOUT:\nx\n## OK dash STDOUT:\ny\n## END\n";
        let case = parse_one(text);
        // The dash block is still parsed after the early stop, and overrides
        assert_eq!(case.expected_stdout.as_deref(), Some("y\n"));
    }

    #[test]
    fn test_stdout_block_keeps_other_annotation_lines() {
        // Only END and outcome tags terminate a block
        let case = parse_one("#### t\necho x\n## STDOUT:\nx\n## status: 1\n## END\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("x\n## status: 1\n"));
        assert_eq!(case.expected_status, 0);
    }

    #[test]
    fn test_stdout_block_at_eof_without_trailing_newline() {
        let case = parse_one("#### t\necho x\n## STDOUT:\nx");
        assert_eq!(case.expected_stdout.as_deref(), Some("x"));
    }

    #[test]
    fn test_inline_stdout_appends_newline() {
        let case = parse_one("#### t\necho hello world\n## stdout: hello world\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("hello world\n"));
    }

    #[test]
    fn test_first_wins_block_then_inline() {
        let case = parse_one("#### t\necho a\n## STDOUT:\na\n## END\n## stdout: b\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("a\n"));
    }

    #[test]
    fn test_first_wins_inline_then_inline() {
        let case = parse_one("#### t\necho a\n## stdout: a\n## stdout: b\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("a\n"));
    }

    #[test]
    fn test_override_block_wins_over_earlier_block() {
        let text = "#### t\necho a\n## STDOUT:\na\n## END\n## BUG dash STDOUT:\nb\n## END\n";
        let case = parse_one(text);
        assert_eq!(case.expected_stdout.as_deref(), Some("b\n"));
    }

    #[test]
    fn test_override_block_with_variant_suffix() {
        let text = "#### t\necho a\n## STDOUT:\na\n## END\n## OK dash/mksh STDOUT:\nm\n## END\n";
        assert_eq!(parse_one(text).expected_stdout.as_deref(), Some("m\n"));
    }

    #[test]
    fn test_override_inline_stdout() {
        let case = parse_one("#### t\necho a\n## stdout: a\n## OK dash stdout: b\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("b\n"));
        let case = parse_one("#### t\necho a\n## stdout: a\n## BUG dash/zsh stdout: c\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("c\n"));
    }

    #[test]
    fn test_override_survives_later_plain_stdout() {
        let case = parse_one("#### t\necho a\n## OK dash stdout: b\n## stdout: a\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("b\n"));
    }

    #[test]
    fn test_last_override_wins() {
        let case = parse_one("#### t\necho\n## OK dash stdout: one\n## BUG dash stdout: two\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("two\n"));
    }

    #[test]
    fn test_foreign_dialect_blocks_discarded() {
        let text = "#### t\necho a\n## STDOUT:\na\n## END\n\
                    ## OK bash STDOUT:\nbash\n## END\n\
                    ## N-I mksh STDOUT:\nmksh\n## END\n\
                    ## BUG bash/dash STDOUT:\nboth\n## END\n";
        let case = parse_one(text);
        assert_eq!(case.expected_stdout.as_deref(), Some("a\n"));
        assert!(!case.not_implemented);
    }

    #[test]
    fn test_bug_variant_tag_is_foreign() {
        let text = "#### t\necho a\n## stdout: a\n## BUG-2 dash STDOUT:\nz\n## END\n";
        assert_eq!(parse_one(text).expected_stdout.as_deref(), Some("a\n"));
    }

    #[test]
    fn test_foreign_inline_ignored() {
        let case = parse_one("#### t\necho a\n## stdout: a\n## OK bash stdout: b\n## BUG zsh status: 2\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("a\n"));
        assert_eq!(case.expected_status, 0);
    }

    #[test]
    fn test_not_implemented_block() {
        let text = "#### t\nlocal x\n## stdout: ok\n## N-I dash STDOUT:\nnope\n## END\n";
        let case = parse_one(text);
        assert!(case.not_implemented);
        assert_eq!(case.code, "local x\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("ok\n"));
    }

    #[test]
    fn test_not_implemented_bare_marker() {
        let case = parse_one("#### t\nshopt -s foo\n## N-I dash/mksh\n");
        assert!(case.not_implemented);
        assert_eq!(case.code, "shopt -s foo\n");
    }

    #[test]
    fn test_not_implemented_inline_status_keeps_status() {
        let case = parse_one("#### t\nfoo\n## status: 0\n## N-I dash status: 2\n");
        assert!(case.not_implemented);
        assert_eq!(case.expected_status, 0);
    }

    #[test]
    fn test_not_implemented_needs_word_boundary() {
        let case = parse_one("#### t\nfoo\n## N-I dashboard\n");
        assert!(!case.not_implemented);
    }

    #[test]
    fn test_status_last_wins() {
        let case = parse_one("#### t\nexit 3\n## status: 1\n## status: 3\n");
        assert_eq!(case.expected_status, 3);
        let case = parse_one("#### t\nexit 2\n## status: 1\n## BUG dash status: 2\n");
        assert_eq!(case.expected_status, 2);
        let case = parse_one("#### t\nexit 1\n## OK dash status: 2\n## status: 1\n");
        assert_eq!(case.expected_status, 1);
    }

    #[test]
    fn test_malformed_status_ignored() {
        let case = parse_one("#### t\nexit 1\n## status: 1\n## status: -1\n## status: x\n## status: 99999999999\n");
        assert_eq!(case.expected_status, 1);
    }

    #[test]
    fn test_stdout_json_decodes_escapes() {
        let case = parse_one("#### t\nprintf 'a\\nb\\n'\n## stdout-json: \"a\\nb\\n\"\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("a\nb\n"));
        let case = parse_one("#### t\ntrue\n## stdout-json: \"\"\n");
        assert_eq!(case.expected_stdout.as_deref(), Some(""));
        let case = parse_one("#### t\ntrue\n## stdout-json: \"\\t\\u00e9\\\"\"\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("\t\u{e9}\""));
    }

    #[test]
    fn test_stdout_json_invalid_ignored() {
        let case = parse_one("#### t\ntrue\n## stdout-json: \"\\q\"\n");
        assert_eq!(case.expected_stdout, None);
        let case = parse_one("#### t\ntrue\n## stdout-json: unquoted\n");
        assert_eq!(case.expected_stdout, None);
    }

    #[test]
    fn test_stdout_json_is_fallback_only() {
        // Plain stdout wins regardless of order
        let case = parse_one("#### t\necho\n## stdout-json: \"j\\n\"\n## stdout: p\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("p\n"));
        let case = parse_one("#### t\necho\n## stdout: p\n## stdout-json: \"j\\n\"\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("p\n"));
    }

    #[test]
    fn test_override_stdout_json() {
        let case = parse_one("#### t\necho\n## stdout: p\n## BUG dash stdout-json: \"x\\ty\"\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("x\ty"));
    }

    #[test]
    fn test_code_annotation_replaces_body() {
        let case = parse_one("#### t\necho body\n## code: echo inline\n## stdout: inline\n");
        assert_eq!(case.code, "echo inline\n");
    }

    #[test]
    fn test_code_only_case() {
        let case = parse_one("#### t\n## code: exit 4\n## status: 4\n");
        assert_eq!(case.code, "exit 4\n");
        assert_eq!(case.expected_status, 4);
    }

    #[test]
    fn test_unknown_annotations_ignored() {
        let case = parse_one("#### t\necho a\n## stdout: a\n## OK bash/zsh foo bar\n## wat\nstray text\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("a\n"));
        assert_eq!(case.expected_status, 0);
    }

    #[test]
    fn test_body_keeps_comment_lines() {
        let case = parse_one("#### t\n# a comment\n##no-space\necho x\n## stdout: x\n");
        assert_eq!(case.code, "# a comment\n##no-space\necho x\n");
    }

    #[test]
    fn test_header_name_trimmed() {
        let case = parse_one("####   spaced name  \ntrue\n");
        assert_eq!(case.name, "spaced name");
    }

    #[test]
    fn test_case_count_matches_headers() {
        let text = "#### a\ntrue\n#### b\n## STDOUT:\n#### c\n## N-I dash\n#### d\n## code: true\n#### e\n";
        let headers = text.lines().filter(|l| l.starts_with("#### ")).count();
        assert_eq!(parse(text).len(), headers);
    }

    #[test]
    fn test_other_dialect_parser() {
        let parser = SpecParser::new(Dialect::new("mksh")).unwrap();
        let text = "#### t\necho a\n## stdout: a\n## OK mksh stdout: m\n## N-I dash stdout: d\n";
        let case = parser.parse(text).remove(0);
        assert_eq!(case.expected_stdout.as_deref(), Some("m\n"));
        assert!(!case.not_implemented);
        assert_eq!(parser.dialect().name(), "mksh");
    }

    #[test]
    fn test_classify() {
        let p = SpecParser::new(Dialect::default()).unwrap();
        assert_eq!(p.classify("## STDOUT:"), Line::BlockHeader(BlockKind::Expected));
        assert_eq!(p.classify("## OK dash STDOUT:"), Line::BlockHeader(BlockKind::Override));
        assert_eq!(p.classify("## N-I dash/bash STDOUT:"), Line::BlockHeader(BlockKind::NotImplemented));
        assert_eq!(p.classify("## OK zsh STDOUT:"), Line::BlockHeader(BlockKind::Foreign));
        assert_eq!(p.classify("## N-I dash"), Line::Single(Annotation::NotImplemented));
        assert_eq!(p.classify("## status: 7"), Line::Single(Annotation::Status(7)));
        assert_eq!(p.classify("## OK dash status: 7"), Line::Single(Annotation::Status(7)));
        assert_eq!(p.classify("## stdout:"), Line::Single(Annotation::Unknown));
        assert_eq!(p.classify("## END"), Line::Single(Annotation::Unknown));
    }

    #[test]
    fn test_block_body_reaches_its_slot() {
        // Blocks carry their captured body; an empty block is an empty expectation
        let case = parse_one("#### t\ntrue\n## STDOUT:\n## END\n## stdout: late\n");
        assert_eq!(case.expected_stdout.as_deref(), Some(""));
        let case = parse_one("#### t\ntrue\n## stdout: early\n## OK dash STDOUT:\nblock\n## END\n");
        assert_eq!(case.expected_stdout.as_deref(), Some("block\n"));
    }
}

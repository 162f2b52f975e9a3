//! Session protocol: inbound submission parsing and outbound message framing
//! (spec §3 "Submission", §6).
//!
//! Inbound parsing is a tolerant substring scanner rather than a strict JSON
//! parser, matching the original's "ad-hoc substring scanning" design note —
//! the wire contract (which payloads are accepted, which escapes round-trip)
//! is what's fixed, not the parsing technique. Outbound messages are built
//! with the same hand-rolled escaping the original uses, so the byte-level
//! contract in spec §6 holds exactly.

/// A parsed submission, before screening or compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub input: SourceInput,
    pub time_limit_sec: Option<u64>,
    pub memory_limit_mb: Option<u64>,
}

/// Single- vs multi-file source payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    Single(String),
    /// `(filename, content)` pairs in the order they appeared on the wire —
    /// main-file selection (spec §3) depends on enumeration order.
    Multi(Vec<(String, String)>),
}

/// Parse one initial request payload (spec §6: a single `recv` of up to
/// 65535 bytes).
///
/// - If the payload doesn't start with `{`, it's treated as a raw single
///   source blob with default limits.
/// - Otherwise, `"files":` is looked for first (multi-file submission);
///   failing that, `"code":` (single-file). Limit fields are recognized
///   under either of their two accepted spellings.
/// - Malformed JSON doesn't abort parsing — missing fields are simply left
///   unset (spec §7: "Parse failures... log and treat remaining fields as
///   defaulted").
#[must_use]
pub fn parse_submission(raw: &str) -> Submission {
    if !raw.starts_with('{') {
        return Submission {
            input: SourceInput::Single(raw.to_string()),
            time_limit_sec: None,
            memory_limit_mb: None,
        };
    }

    let input = if let Some(files) = parse_files_block(raw) {
        SourceInput::Multi(files)
    } else {
        SourceInput::Single(parse_code_field(raw).unwrap_or_default())
    };

    Submission {
        input,
        time_limit_sec: parse_uint_field(raw, &["\"time_limit\":", "\"timeLimitSec\":"]),
        memory_limit_mb: parse_uint_field(raw, &["\"memory_limit\":", "\"memoryLimitMb\":"]),
    }
}

fn parse_code_field(raw: &str) -> Option<String> {
    let key_pos = raw.find("\"code\":")?;
    let after_key = key_pos + "\"code\":".len();
    let value_start = raw[after_key..].find('"')? + after_key;
    let (content, _) = scan_string_value(raw, value_start)?;
    Some(unescape_json_string(&content))
}

/// Find the `"files": { ... }` block (brace-matched) and parse its entries.
fn parse_files_block(raw: &str) -> Option<Vec<(String, String)>> {
    let files_pos = raw.find("\"files\":")?;
    let files_start = raw[files_pos..].find('{')? + files_pos;
    let files_end = find_matching_brace(raw, files_start)?;

    let mut entries = Vec::new();
    let mut pos = files_start + 1;

    while pos < files_end {
        let Some(key_rel) = raw[pos..files_end].find('"') else {
            break;
        };
        let key_start = pos + key_rel;
        let Some((filename, key_value_end)) = scan_string_value(raw, key_start) else {
            break;
        };
        let filename = unescape_json_string(&filename);

        let Some(colon_rel) = raw[key_value_end..files_end].find(':') else {
            break;
        };
        let after_colon = key_value_end + colon_rel + 1;
        let Some(value_rel) = raw[after_colon..files_end].find('"') else {
            break;
        };
        let value_start = after_colon + value_rel;
        let Some((content, value_end)) = scan_string_value(raw, value_start) else {
            break;
        };

        entries.push((filename, unescape_json_string(&content)));
        pos = value_end;
    }

    Some(entries)
}

/// Scan a `"..."` JSON string value starting at the opening quote (index
/// `start`). Returns `(raw_inner_text, index_just_past_closing_quote)`.
/// `raw_inner_text` still contains backslash escapes — callers unescape.
fn scan_string_value(raw: &str, start: usize) -> Option<(String, usize)> {
    let bytes = raw.as_bytes();
    if bytes.get(start) != Some(&b'"') {
        return None;
    }
    let mut i = start + 1;
    let mut in_escape = false;
    while i < bytes.len() {
        let c = bytes[i];
        if in_escape {
            in_escape = false;
        } else if c == b'\\' {
            in_escape = true;
        } else if c == b'"' {
            return Some((raw[start + 1..i].to_string(), i + 1));
        }
        i += 1;
    }
    None
}

fn find_matching_brace(raw: &str, open_pos: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in raw.char_indices().filter(|(i, _)| *i >= open_pos) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Find the first unsigned integer following any of `keys` (the accepted
/// alias spellings of one logical field).
fn parse_uint_field(raw: &str, keys: &[&str]) -> Option<u64> {
    let key_pos = keys.iter().find_map(|k| raw.find(k))?;
    let colon_pos = raw[key_pos..].find(':')? + key_pos;
    let rest = &raw[colon_pos + 1..];
    let digits_start = rest.find(|c: char| c.is_ascii_digit())?;
    let digits_end = rest[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(rest.len(), |e| digits_start + e);
    rest[digits_start..digits_end].parse().ok()
}

/// Unescape the JSON escape set from spec §6: `\n \t \r \" \\ \/ \b \f`, and
/// pass `\uXXXX` sequences through verbatim (the original never decodes the
/// codepoint, it just copies the 6 characters).
#[must_use]
pub fn unescape_json_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'n' => {
                    out.push('\n');
                    i += 2;
                }
                b't' => {
                    out.push('\t');
                    i += 2;
                }
                b'r' => {
                    out.push('\r');
                    i += 2;
                }
                b'"' => {
                    out.push('"');
                    i += 2;
                }
                b'\\' => {
                    out.push('\\');
                    i += 2;
                }
                b'/' => {
                    out.push('/');
                    i += 2;
                }
                b'b' => {
                    out.push('\u{8}');
                    i += 2;
                }
                b'f' => {
                    out.push('\u{c}');
                    i += 2;
                }
                b'u' if i + 5 < bytes.len() => {
                    out.push_str(&input[i..i + 6]);
                    i += 6;
                }
                _ => {
                    out.push(input[i..].chars().next().unwrap());
                    i += 1;
                }
            }
        } else {
            let ch = input[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    out
}

/// Escape `" \ \b \f \n \r \t` for the outbound wire (spec §6); all other
/// bytes pass through unchanged.
#[must_use]
pub fn escape_json_str(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// The final structured outcome of a submission (spec §3 "Verdict").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    CompilationError,
    SecurityError,
}

impl Status {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::RuntimeError => "RUNTIME_ERROR",
            Self::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            Self::MemoryLimitExceeded => "MEMORY_LIMIT_EXCEEDED",
            Self::CompilationError => "COMPILATION_ERROR",
            Self::SecurityError => "SECURITY_ERROR",
        }
    }
}

/// One outbound protocol message (spec §6).
#[derive(Debug, Clone)]
pub enum OutMessage {
    CompileSuccess,
    Output { chunk: String },
    InputRequired { prompt: String },
    Error { message: String, exit_code: i32 },
    ExecutionResult {
        output: String,
        error: String,
        status: Status,
        exit_code: i32,
        execution_time_ms: u64,
        timed_out: bool,
        memory_exceeded: bool,
    },
}

impl OutMessage {
    /// Render this message as the exact UTF-8 JSON object spec §6 names.
    /// Response framing has no separator between consecutive messages.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::CompileSuccess => {
                r#"{"type":"COMPILE_SUCCESS","message":"Code compiled successfully"}"#.to_string()
            }
            Self::Output { chunk } => {
                format!(
                    r#"{{"type":"OUTPUT","message":"{}"}}"#,
                    escape_json_str(chunk)
                )
            }
            Self::InputRequired { prompt } => {
                format!(
                    r#"{{"type":"INPUT_REQUIRED","message":"{}"}}"#,
                    escape_json_str(prompt)
                )
            }
            Self::Error { message, exit_code } => {
                format!(
                    r#"{{"type":"ERROR","message":"{}","exit_code":{exit_code}}}"#,
                    escape_json_str(message)
                )
            }
            Self::ExecutionResult {
                output,
                error,
                status,
                exit_code,
                execution_time_ms,
                timed_out,
                memory_exceeded,
            } => {
                format!(
                    r#"{{"type":"EXECUTION_RESULT","output":"{}","error":"{}","status":"{}","exit_code":{exit_code},"execution_time_ms":{execution_time_ms},"memory_used_kb":0,"timed_out":{timed_out},"memory_exceeded":{memory_exceeded}}}"#,
                    escape_json_str(output),
                    escape_json_str(error),
                    status.as_str(),
                )
            }
        }
    }
}

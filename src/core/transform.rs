use crate::domain::model::{quote_literal, SecurityPolicy};
use crate::utils::error::{Result, RunnerError};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use regex::Regex;
use std::sync::LazyLock;

/// Zero-argument page declaration that submissions must contain exactly once.
pub const PAGE_MARKER: &str = "@page()";

/// Random bytes behind each generated module name.
pub const NAME_TOKEN_BYTES: usize = 8;

// Clients differ on whether they pad, so accept both.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static BARE_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)@page\(\s*\)\s*$").expect("valid marker regex"));

pub fn decode_source(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = URL_SAFE_LENIENT.decode(compact.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn encode_source(source: &str) -> String {
    URL_SAFE.encode(source.as_bytes())
}

/// `<prefix><token>` where the token is URL-safe base64 of fresh random bytes.
pub fn generate_module_name(prefix: &str) -> String {
    let bytes: [u8; NAME_TOKEN_BYTES] = rand::random();
    format!(
        "{}{}",
        prefix,
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    )
}

/// Declaration that binds a page to `route` under `policy`.
pub fn page_declaration(route: &str, policy: &SecurityPolicy) -> String {
    format!(
        "@page(path={}, security_policy={})",
        quote_literal(route),
        policy.to_declaration()
    )
}

/// Rewrite the single bare `@page()` declaration line of `source` so it binds
/// to `route`. Every other byte of the source, line endings included, is kept.
pub fn bind_page_marker(source: &str, route: &str, policy: &SecurityPolicy) -> Result<String> {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();

    let marker_lines: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| BARE_DECLARATION.is_match(strip_line_ending(line)))
        .map(|(idx, _)| idx)
        .collect();

    let marker_idx = match marker_lines.as_slice() {
        [] => return Err(RunnerError::MissingMarkerError),
        [idx] => *idx,
        many => {
            return Err(RunnerError::AmbiguousMarkerError { count: many.len() });
        }
    };

    let declaration = page_declaration(route, policy);
    let mut rewritten = String::with_capacity(source.len() + declaration.len());

    for (idx, line) in lines.iter().enumerate() {
        if idx != marker_idx {
            rewritten.push_str(line);
            continue;
        }

        let body = strip_line_ending(line);
        let ending = &line[body.len()..];
        let indent_len = body.len() - body.trim_start().len();

        rewritten.push_str(&body[..indent_len]);
        rewritten.push_str(&declaration);
        rewritten.push_str(ending);
    }

    Ok(rewritten)
}

fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

//! The slice of GVariant text format that `gsettings get` prints for the proxy
//! schema: strings, integers and string arrays.

/// Renders `value` as a single-quoted GVariant string.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Strips one layer of quotes from a GVariant string. Unquoted input is
/// returned trimmed, which covers enum values printed without quotes.
#[must_use]
pub fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    let mut chars = raw.chars();
    match chars.next() {
        Some(quote @ ('\'' | '"')) => read_string(&mut chars, quote).unwrap_or_default(),
        _ => raw.to_string(),
    }
}

/// Parses an integer, tolerating a leading type annotation like `int32 8080`.
#[must_use]
pub fn parse_int(raw: &str) -> Option<u32> {
    raw.split_whitespace().last()?.parse().ok()
}

#[must_use]
pub fn encode_string_array<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = items.into_iter().map(quote).collect();
    format!("[{}]", quoted.join(", "))
}

/// Parses `['a', "b"]` or `@as []`. Returns `None` for anything else.
#[must_use]
pub fn decode_string_array(raw: &str) -> Option<Vec<String>> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("@as").map_or(raw, str::trim_start);
    let body = raw.strip_prefix('[')?.strip_suffix(']')?;

    let mut items = Vec::new();
    let mut chars = body.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(quote) = chars.next() else {
            return Some(items);
        };
        if quote != '\'' && quote != '"' {
            return None;
        }
        items.push(read_string(&mut chars, quote)?);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => return Some(items),
            Some(',') => {}
            Some(_) => return None,
        }
    }
}

fn read_string(chars: &mut impl Iterator<Item = char>, quote: char) -> Option<String> {
    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.push(chars.next()?),
            c if c == quote => return Some(value),
            c => value.push(c),
        }
    }
    None
}

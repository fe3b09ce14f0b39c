//! Minimal RFC6570 URI template expansion.
//!
//! Covers the level-1/level-2 subset real hypermedia APIs use for element
//! addressing: `{var}` (percent-encoded) and `{+var}` (reserved characters
//! pass through), with comma-separated variable lists. Undefined variables
//! expand to nothing, as the RFC prescribes.

use crate::error::{Error, Result};

/// Expand a URI template with the given variables.
pub(crate) fn expand(template: &str, variables: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            Error::InvalidTemplate(format!("unclosed expression in {template:?}"))
        })?;
        expand_expression(&after[..close], variables, &mut out)?;
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(Error::InvalidTemplate(format!(
            "unmatched '}}' in {template:?}"
        )));
    }
    out.push_str(rest);
    Ok(out)
}

fn expand_expression(expr: &str, variables: &[(&str, &str)], out: &mut String) -> Result<()> {
    let (reserved, names) = match expr.strip_prefix('+') {
        Some(names) => (true, names),
        None => (false, expr),
    };
    if names.is_empty() {
        return Err(Error::InvalidTemplate("empty expression".into()));
    }

    let mut first = true;
    for name in names.split(',') {
        let Some((_, value)) = variables.iter().find(|(n, _)| *n == name) else {
            continue;
        };
        if !first {
            out.push(',');
        }
        first = false;
        if reserved {
            out.push_str(value);
        } else {
            out.push_str(&urlencoding::encode(value));
        }
    }
    Ok(())
}

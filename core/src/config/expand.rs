//! Placeholder expansion for connection option strings.
//!
//! Supports `${env:NAME}` (replaced with the environment variable's value,
//! left untouched when unset) and a leading `~` (replaced with the current
//! user's home directory).

/// Replace every `${env:NAME}` occurrence with the value of `NAME`.
pub fn expand_env_placeholders(input: &str) -> String {
    const OPEN: &str = "${env:";

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(OPEN) {
        result.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(value) => result.push_str(&value),
                    Err(_) => {
                        result.push_str(OPEN);
                        result.push_str(name);
                        result.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated placeholder: keep the remainder verbatim.
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(input: &str) -> String {
    let Some(rest) = input.strip_prefix('~') else {
        return input.to_string();
    };
    if !(rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\')) {
        return input.to_string();
    }
    match dirs::home_dir() {
        Some(home) => format!("{}{rest}", home.to_string_lossy()),
        None => input.to_string(),
    }
}

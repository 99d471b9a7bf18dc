pub fn env_var_non_empty(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => !v.is_empty(),
        Err(_) => false,
    }
}

pub fn env_var_opt(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

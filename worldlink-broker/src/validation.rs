//! Pure-predicate validation helpers invoked by the dispatcher before an
//! envelope is ever sent to a world.

/// Patterns forbidden in a Macro entity's `command` field.
const FORBIDDEN_PATTERNS: &[&str] = &["eval(", "localStorage", "sessionStorage"];

/// Checks a Macro's script body against the forbidden-pattern denylist.
///
/// Returns `Err((error, suggestion))` if the script should be rejected.
pub fn validate_macro_command(command: &str) -> Result<(), (String, String)> {
    if FORBIDDEN_PATTERNS.iter().any(|p| command.contains(p)) {
        return Err((
            "Script contains forbidden patterns".to_owned(),
            "Ensure the script does not access localStorage, sessionStorage, or eval()".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_script() {
        assert!(validate_macro_command("game.actors.get('abc').update({});").is_ok());
    }

    #[test]
    fn rejects_eval() {
        assert!(validate_macro_command("eval('2+2')").is_err());
    }

    #[test]
    fn rejects_local_storage() {
        assert!(validate_macro_command("localStorage.getItem('x')").is_err());
    }

    #[test]
    fn rejects_session_storage() {
        assert!(validate_macro_command("sessionStorage.clear()").is_err());
    }
}

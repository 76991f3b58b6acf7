// Shell resolution and quoting shared by the local and ssh backends

use super::error::{BackendError, Result};
use std::future::Future;
use tracing::{debug, warn};

/// The only fallback shell, tried at most once
pub const FALLBACK_SHELL: &str = "sh";

/// Platform default when neither the caller nor the config names a shell
pub fn platform_default_shell() -> &'static str {
    if cfg!(windows) { "powershell" } else { "bash" }
}

/// Shell names end up inside probe commands, so keep them to a plain charset
pub fn validate_shell_name(shell: &str) -> Result<()> {
    let ok = !shell.is_empty()
        && shell
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));
    if ok {
        Ok(())
    } else {
        Err(BackendError::InvalidInput(format!(
            "invalid shell name '{}'",
            shell
        )))
    }
}

/// Availability probe run through `sh -c`
pub fn probe_command(shell: &str) -> String {
    format!("which {0} || command -v {0}", shell)
}

/// Check an explicitly requested shell against `execution.shell.allowed`
pub fn check_allowed(shell: &str, allowed: &[String]) -> Result<()> {
    if allowed.is_empty() || allowed.iter().any(|a| a.eq_ignore_ascii_case(shell)) {
        Ok(())
    } else {
        Err(BackendError::ShellNotAllowed(shell.to_string()))
    }
}

/// Resolve the shell to run a command with.
///
/// A requested shell is checked against the allow-list first. The candidate is
/// probed; if missing, `sh` is probed once. Both missing fails with
/// `ShellUnavailable` naming the two shells.
pub async fn resolve_shell<F, Fut>(
    requested: Option<&str>,
    default_shell: &str,
    allowed: &[String],
    probe: F,
) -> Result<String>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let candidate = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(shell) => {
            check_allowed(shell, allowed)?;
            shell
        }
        None => default_shell,
    };
    validate_shell_name(candidate)?;

    if probe(candidate.to_string()).await? {
        debug!(shell = candidate, "shell available");
        return Ok(candidate.to_string());
    }

    if candidate != FALLBACK_SHELL && probe(FALLBACK_SHELL.to_string()).await? {
        warn!(
            requested = candidate,
            fallback = FALLBACK_SHELL,
            "requested shell unavailable, falling back"
        );
        return Ok(FALLBACK_SHELL.to_string());
    }

    Err(BackendError::ShellUnavailable {
        requested: candidate.to_string(),
        fallback: FALLBACK_SHELL.to_string(),
    })
}

fn is_powershell(shell: &str) -> bool {
    let base = shell.rsplit('/').next().unwrap_or(shell).to_ascii_lowercase();
    matches!(base.as_str(), "pwsh" | "powershell" | "pwsh.exe" | "powershell.exe")
}

/// Arguments that make `shell` run `command`
pub fn shell_args(shell: &str, command: &str) -> Vec<String> {
    if is_powershell(shell) {
        vec![
            "-NoProfile".to_string(),
            "-Command".to_string(),
            command.to_string(),
        ]
    } else {
        vec!["-c".to_string(), command.to_string()]
    }
}

/// POSIX single-quote a word unless it is plainly safe
pub fn quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '@' | ',' | '+')
        });
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

/// Quote and join words into one command line
pub fn join<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn fake_probe(
        available: &'static [&'static str],
        seen: Arc<Mutex<Vec<String>>>,
    ) -> impl Fn(String) -> std::future::Ready<Result<bool>> {
        move |shell: String| {
            seen.lock().unwrap().push(shell.clone());
            std::future::ready(Ok(available.contains(&shell.as_str())))
        }
    }

    #[tokio::test]
    async fn test_requested_shell_available() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let shell = resolve_shell(Some("zsh"), "bash", &[], fake_probe(&["zsh"], seen.clone()))
            .await
            .unwrap();
        assert_eq!(shell, "zsh");
        assert_eq!(*seen.lock().unwrap(), vec!["zsh"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_sh_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let shell = resolve_shell(Some("fish"), "bash", &[], fake_probe(&["sh"], seen.clone()))
            .await
            .unwrap();
        assert_eq!(shell, "sh");
        assert_eq!(*seen.lock().unwrap(), vec!["fish", "sh"]);
    }

    #[tokio::test]
    async fn test_both_unavailable_names_both() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let err = resolve_shell(Some("fish"), "bash", &[], fake_probe(&[], seen.clone()))
            .await
            .unwrap_err();
        match err {
            BackendError::ShellUnavailable {
                requested,
                fallback,
            } => {
                assert_eq!(requested, "fish");
                assert_eq!(fallback, "sh");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_not_allowed_skips_probe() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let allowed = vec!["bash".to_string()];
        let err = resolve_shell(Some("zsh"), "bash", &allowed, fake_probe(&["zsh"], seen.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::ShellNotAllowed(_)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_shell_metacharacters() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let err = resolve_shell(Some("bash;rm"), "bash", &[], fake_probe(&[], seen))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidInput(_)));
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain-word"), "plain-word");
        assert_eq!(quote("two words"), "'two words'");
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(quote(""), "''");
        assert_eq!(join(&["echo", "a b"]), "echo 'a b'");
    }

    #[test]
    fn test_shell_args() {
        assert_eq!(shell_args("bash", "ls"), vec!["-c", "ls"]);
        assert_eq!(shell_args("pwsh", "ls")[0], "-NoProfile");
    }
}

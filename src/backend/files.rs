// File mutation helpers shared by all backends

use super::shell::quote;
use super::types::ListOrder;
use chrono::{DateTime, Local};

/// Which file mutation to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create parents, replace content
    Create,
    /// File must already exist
    Update,
    /// Append, creating the file if missing
    Append,
}

/// `<path>.bak-<YYYYMMDDHHMMSS>`
pub fn backup_path(path: &str, now: DateTime<Local>) -> String {
    format!("{}.bak-{}", path, now.format("%Y%m%d%H%M%S"))
}

/// Heredoc terminator that no line of `content` equals
pub fn heredoc_delimiter(content: &str) -> String {
    let mut delimiter = "EOF".to_string();
    while content.lines().any(|line| line == delimiter) {
        delimiter = format!("EOF_{}", uuid::Uuid::new_v4().simple());
    }
    delimiter
}

/// Shell script performing a file mutation on a remote host.
///
/// A heredoc always ends the written text with a newline, so one trailing
/// newline of `content` is folded into it.
pub fn remote_write_script(
    path: &str,
    content: &str,
    mode: WriteMode,
    backup: bool,
    now: DateTime<Local>,
) -> String {
    let target = quote(path);
    let mut script = String::from("set -e\n");

    match mode {
        WriteMode::Create | WriteMode::Append => {
            script.push_str(&format!("mkdir -p \"$(dirname {})\"\n", target));
        }
        WriteMode::Update => {
            script.push_str(&format!(
                "[ -f {0} ] || {{ echo \"file does not exist: \"{0} >&2; exit 3; }}\n",
                target
            ));
        }
    }

    if backup {
        script.push_str(&format!(
            "if [ -f {0} ]; then cp -p {0} {1}; fi\n",
            target,
            quote(&backup_path(path, now))
        ));
    }

    let delimiter = heredoc_delimiter(content);
    let redirect = if mode == WriteMode::Append { ">>" } else { ">" };
    let body = content.strip_suffix('\n').unwrap_or(content);
    script.push_str(&format!(
        "cat {} {} <<'{}'\n{}\n{}\n",
        redirect, target, delimiter, body, delimiter
    ));
    script
}

/// Remote listing: one entry per line, ordered by the `ls` flag for `order`
pub fn remote_list_script(dir: &str, order: ListOrder) -> String {
    let flags = match order {
        ListOrder::Name => "-1A",
        ListOrder::Mtime => "-1At",
        ListOrder::Size => "-1AS",
    };
    format!("cd {} && ls {}", quote(dir), flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn test_backup_path_format() {
        assert_eq!(
            backup_path("/etc/app.conf", fixed_now()),
            "/etc/app.conf.bak-20240309070501"
        );
    }

    #[test]
    fn test_delimiter_avoids_content() {
        assert_eq!(heredoc_delimiter("hello\nworld"), "EOF");
        let delimiter = heredoc_delimiter("a\nEOF\nb");
        assert_ne!(delimiter, "EOF");
        assert!(delimiter.starts_with("EOF_"));
        // A line merely containing the word is harmless
        assert_eq!(heredoc_delimiter("x EOF y"), "EOF");
    }

    #[test]
    fn test_write_script_shapes() {
        let script = remote_write_script("/tmp/a b.txt", "one\n", WriteMode::Append, true, fixed_now());
        assert!(script.starts_with("set -e\n"));
        assert!(script.contains("mkdir -p \"$(dirname '/tmp/a b.txt')\""));
        assert!(script.contains("cp -p '/tmp/a b.txt' '/tmp/a b.txt.bak-20240309070501'"));
        assert!(script.contains("cat >> '/tmp/a b.txt' <<'EOF'\none\nEOF\n"));

        let update = remote_write_script("/x", "y", WriteMode::Update, false, fixed_now());
        assert!(update.contains("[ -f /x ] ||"));
        assert!(!update.contains("cp -p"));
        assert!(update.contains("cat > /x <<'EOF'\ny\nEOF\n"));
    }

    #[test]
    fn test_list_script() {
        assert_eq!(remote_list_script("/var/log", ListOrder::Size), "cd /var/log && ls -1AS");
    }
}

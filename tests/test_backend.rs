// Integration tests for the local execution backend
// Run with cargo test --test test_backend

use cmdrelay::backend::{BackendError, ExecOptions, ExecutionBackend, ListOrder, LocalBackend};
use std::path::PathBuf;
use tokio_test::{assert_err, assert_ok};

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    });
}

fn backend() -> LocalBackend {
    LocalBackend::new("sh", Vec::new())
}

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cmdrelay-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo() {
        init_tracing();

        let result = backend()
            .execute_command("echo hello", ExecOptions::new())
            .await
            .unwrap();
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.exit_code, 0);
        assert!(result.succeeded());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_a_result() {
        init_tracing();

        let result = backend()
            .execute_command("echo oops >&2; exit 3", ExecOptions::new())
            .await
            .unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(result.error);
        assert_eq!(result.stderr.trim(), "oops");
        assert!(result.clone().check().is_err());
    }

    #[tokio::test]
    async fn test_soft_timeout() {
        init_tracing();

        let start = std::time::Instant::now();
        let result = backend()
            .execute_command("echo early; sleep 5", ExecOptions::new().timeout_ms(300))
            .await
            .unwrap();
        assert!(result.timed_out);
        assert_eq!(result.exit_code, -1);
        assert!(start.elapsed() < std::time::Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_cwd() {
        init_tracing();

        let dir = scratch_dir();
        let result = backend()
            .execute_command("pwd", ExecOptions::new().cwd(dir.to_string_lossy()))
            .await
            .unwrap();
        let reported = std::fs::canonicalize(result.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(&dir).unwrap());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_default_shell_falls_back_to_sh() {
        init_tracing();

        let backend = LocalBackend::new("no-such-shell-cmdrelay", Vec::new());
        let result = backend
            .execute_command("echo fallback", ExecOptions::new())
            .await
            .unwrap();
        assert_eq!(result.stdout.trim(), "fallback");
    }

    #[tokio::test]
    async fn test_shell_not_allowed() {
        init_tracing();

        let backend = LocalBackend::new("sh", vec!["sh".to_string()]);
        let err = backend
            .execute_command("echo hi", ExecOptions::new().shell("zsh"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::ShellNotAllowed(ref s) if s == "zsh"));
    }

    #[tokio::test]
    async fn test_file_lifecycle_with_backup() {
        init_tracing();

        let dir = scratch_dir();
        let path = dir.join("nested").join("notes.txt");
        let path_str = path.to_string_lossy().into_owned();
        let backend = backend();

        assert!(backend.create_file(&path_str, "one\n", false).await.unwrap());
        assert!(backend.update_file(&path_str, "two\n", true).await.unwrap());
        assert!(backend.amend_file(&path_str, "three\n", false).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two\nthree\n");

        let backups: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("notes.txt.bak-"))
            .collect();
        assert_eq!(backups.len(), 1);
        let backup = path.parent().unwrap().join(&backups[0]);
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "one\n");

        assert_ok!(backend.remove_file(&path_str).await);
        assert!(!path.exists());
        // Removing again is not an error
        assert_ok!(backend.remove_file(&path_str).await);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_update_missing_file_fails() {
        init_tracing();

        let dir = scratch_dir();
        let path = dir.join("absent.txt").to_string_lossy().into_owned();
        let err = assert_err!(backend().update_file(&path, "x", false).await);
        assert!(matches!(err, BackendError::FileOperation { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_list_files_orders_and_pages() {
        init_tracing();

        let dir = scratch_dir();
        std::fs::write(dir.join("b.txt"), "bb").unwrap();
        std::fs::write(dir.join("a.txt"), "a").unwrap();
        std::fs::write(dir.join("c.txt"), "cccc").unwrap();
        let dir_str = dir.to_string_lossy().into_owned();
        let backend = backend();

        let by_name = backend.list_files(&dir_str, 10, 0, ListOrder::Name).await.unwrap();
        assert_eq!(by_name.items, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(by_name.total, 3);

        let by_size = backend.list_files(&dir_str, 2, 0, ListOrder::Size).await.unwrap();
        assert_eq!(by_size.items, vec!["c.txt", "b.txt"]);

        let paged = backend.list_files(&dir_str, 2, 2, ListOrder::Name).await.unwrap();
        assert_eq!(paged.items, vec!["c.txt"]);
        assert_eq!(paged.offset, 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_working_directory() {
        init_tracing();

        let backend = backend().with_working_dir("/srv/app");
        let cwd = assert_ok!(tokio_test::block_on(backend.present_working_directory()));
        assert_eq!(cwd, "/srv/app");
    }
}

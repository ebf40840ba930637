pub mod logging;

pub use logging::{
    null_logger, ConsoleLogger, FileLogger, Logger, MemoryLogger, MultiLogger, NullLogger,
    SharedLogger,
};

/// Expands a leading `~` and resolves relative paths against `base_dir`.
pub fn resolve_path(path: &str, base_dir: Option<&std::path::Path>) -> std::path::PathBuf {
    let expanded = std::path::PathBuf::from(shellexpand::tilde(path).to_string());
    match base_dir {
        Some(dir) if expanded.is_relative() => dir.join(expanded),
        _ => expanded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn relative_paths_join_base_dir() {
        let resolved = resolve_path("certs/ca.crt", Some(Path::new("/etc/kube")));
        assert_eq!(resolved, PathBuf::from("/etc/kube/certs/ca.crt"));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let resolved = resolve_path("/tmp/ca.crt", Some(Path::new("/etc/kube")));
        assert_eq!(resolved, PathBuf::from("/tmp/ca.crt"));
    }
}

//! Process resource limits.

use fdlimit::Outcome;

/// Raises the soft open-file limit of the process to its hard limit.
///
/// The index keeps every table file open (`max_open_files = -1`), and a full mainnet
/// build produces far more files than the usual default soft limit of 1024.
///
/// Returns the soft limit in effect afterwards, or `None` on platforms without one.
pub fn raise_fd_limit() -> std::io::Result<Option<u64>> {
    match fdlimit::raise_fd_limit() {
        Ok(Outcome::LimitRaised { to, .. }) => Ok(Some(to)),
        Ok(Outcome::Unsupported) => Ok(None),
        Err(err) => Err(std::io::Error::other(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_fd_limit_is_stable() {
        let raised = raise_fd_limit().unwrap();

        #[cfg(target_os = "linux")]
        assert!(raised.is_some_and(|limit| limit > 0));

        // Already at the hard limit, so a second call keeps it.
        assert_eq!(raise_fd_limit().unwrap(), raised);
    }
}

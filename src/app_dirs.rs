use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/hiitr`, or the platform local data dir without a HOME.
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join("hiitr"))
        } else {
            ProjectDirs::from("", "", "hiitr")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn session_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("session.json"))
    }

    pub fn log_dir() -> Option<PathBuf> {
        Self::state_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_file_lives_in_state_dir() {
        if let (Some(dir), Some(path)) = (AppDirs::state_dir(), AppDirs::session_path()) {
            assert_eq!(path.parent(), Some(dir.as_path()));
            assert_eq!(path.file_name().unwrap(), "session.json");
        }
    }
}

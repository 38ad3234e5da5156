use std::process::{Command, Stdio};

fn launcher() -> Option<&'static str> {
    if cfg!(target_os = "windows") {
        Some("explorer")
    } else if cfg!(target_os = "macos") {
        Some("open")
    } else if cfg!(unix) {
        Some("xdg-open")
    } else {
        None
    }
}

/// Hands `url` to the desktop's default browser. Returns whether a launcher
/// could be started; callers print the URL regardless.
pub fn open_url(url: &str) -> bool {
    let Some(program) = launcher() else {
        return false;
    };
    if url.is_empty() {
        return false;
    }

    Command::new(program)
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .is_ok()
}

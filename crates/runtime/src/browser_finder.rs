//! Chrome/Chromium executable discovery.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

fn candidates() -> Vec<&'static str> {
	if cfg!(target_os = "macos") {
		vec![
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
		]
	} else {
		vec![
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"brave-browser",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
			"/opt/google/chrome/chrome",
		]
	}
}

/// Searches well-known executable names and install paths.
pub fn find_chrome_executable() -> Option<PathBuf> {
	for candidate in candidates() {
		if candidate.starts_with('/') {
			let path = Path::new(candidate);
			if path.exists() {
				return Some(path.to_path_buf());
			}
		} else if let Ok(path) = which::which(candidate) {
			return Some(path);
		}
	}

	None
}

/// Resolves the browser to launch, preferring an explicit path.
pub fn resolve_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
	if let Some(path) = explicit {
		if path.exists() {
			return Ok(path.to_path_buf());
		}
		// Bare names go through PATH lookup.
		return which::which(path).map_err(|e| Error::Context(format!("Chrome executable {} not found: {}", path.display(), e)));
	}

	find_chrome_executable().ok_or_else(|| {
		Error::Context(
			"Could not find Chrome/Chromium executable. \n\
             Install Chrome or set CHROME_PATH."
				.into(),
		)
	})
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Label font downloading.
//!
//! Fonts are fetched once from the Ultralytics assets release and cached in
//! the user's config directory.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{QuadCropError, Result};
use crate::warn;

/// Base URL of the release assets hosting fonts.
const ASSETS_URL: &str = "https://github.com/ultralytics/assets/releases/download/v0.0.0";

/// Cache directory name under the user's config directory.
const CACHE_DIR: &str = "Ultralytics";

/// Connection timeout in seconds.
const CONNECT_TIMEOUT: u64 = 30;

/// Read timeout in seconds.
const READ_TIMEOUT: u64 = 120;

/// Format bytes as human-readable string (e.g., "10.4MB").
#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes >= GB {
        format!("{:.1}GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes / KB)
    } else {
        format!("{bytes:.0}B")
    }
}

/// Format time duration.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else {
        let mins = (seconds / 60.0) as u32;
        let secs = seconds % 60.0;
        format!("{mins}:{secs:04.1}")
    }
}

/// Generate progress bar string.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn generate_bar(progress: f64, width: usize) -> String {
    let filled = (progress * width as f64) as usize;
    let partial = progress.mul_add(width as f64, -(filled as f64));

    let mut bar = "━".repeat(filled);
    if filled < width {
        if partial > 0.5 {
            bar.push('╸');
            bar.push_str(&"─".repeat(width - filled - 1));
        } else {
            bar.push_str(&"─".repeat(width - filled));
        }
    }
    bar
}

/// Download URL for a font file name.
///
/// # Errors
///
/// Returns an error unless `font` names a `.ttf` or `.otf` file.
pub fn font_url(font: &str) -> Result<String> {
    let name = Path::new(font)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lower = name.to_lowercase();
    if !(lower.ends_with(".ttf") || lower.ends_with(".otf")) {
        return Err(QuadCropError::DownloadError(format!(
            "Auto-download is only supported for .ttf/.otf fonts, got '{font}'"
        )));
    }
    Ok(format!("{ASSETS_URL}/{name}"))
}

/// Stream `url` into `dest` with a progress line on stderr.
///
/// Writes to a `.part` file first and renames it into place once complete.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn download_file(url: &str, dest: &Path) -> Result<()> {
    const BAR_WIDTH: usize = 12;

    let config = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(CONNECT_TIMEOUT)))
        .timeout_recv_body(Some(Duration::from_secs(READ_TIMEOUT)))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let response = agent.get(url).call().map_err(|e| {
        let msg = match &e {
            ureq::Error::Timeout(_) => format!("Connection timed out while downloading {url}"),
            ureq::Error::Io(io_err) => format!("Network error downloading {url}: {io_err}"),
            _ => format!("Failed to download {url}: {e}"),
        };
        QuadCropError::DownloadError(msg)
    })?;

    let total_size: u64 = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s: &str| s.parse().ok())
        .unwrap_or(0);

    let temp_path = dest.with_extension("part");
    let _ = fs::remove_file(&temp_path);
    let mut writer = BufWriter::new(File::create(&temp_path)?);

    let mut reader = response.into_body().into_reader();
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 65536];
    let start_time = Instant::now();
    let desc = format!("Downloading {url} to '{}'", dest.display());

    let result: Result<()> = (|| {
        loop {
            let bytes_read = reader.read(&mut buffer).map_err(|e| {
                QuadCropError::DownloadError(format!("Failed to read from network: {e}"))
            })?;
            if bytes_read == 0 {
                break;
            }
            writer.write_all(&buffer[..bytes_read])?;
            downloaded += bytes_read as u64;

            if total_size > 0 {
                let progress = (downloaded as f64 / total_size as f64).min(1.0);
                eprint!(
                    "\r\x1b[K{desc}: {}% {} {}/{}",
                    (progress * 100.0) as u8,
                    generate_bar(progress, BAR_WIDTH),
                    format_bytes(downloaded as f64),
                    format_bytes(total_size as f64),
                );
                std::io::stderr().flush().ok();
            }
        }
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    let elapsed = start_time.elapsed().as_secs_f64();
    eprintln!(
        "\r\x1b[K{desc}: 100% {} {} {}",
        generate_bar(1.0, BAR_WIDTH),
        format_bytes(downloaded as f64),
        format_time(elapsed)
    );

    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        QuadCropError::DownloadError(format!(
            "Failed to move downloaded file to {}: {e}",
            dest.display()
        ))
    })
}

/// Return the cached path of `font`, downloading it if missing.
///
/// # Errors
///
/// Returns an error if the config directory is unavailable or the download fails.
pub fn try_download_font(font: &str) -> Result<PathBuf> {
    let url = font_url(font)?;
    let config_dir = dirs::config_dir()
        .ok_or_else(|| {
            QuadCropError::DownloadError("Could not determine config directory".to_string())
        })?
        .join(CACHE_DIR);
    let name = Path::new(font).file_name().unwrap_or_default();
    let font_path = config_dir.join(name);
    if font_path.exists() {
        return Ok(font_path);
    }
    fs::create_dir_all(&config_dir)?;
    download_file(&url, &font_path)?;
    Ok(font_path)
}

/// Like [`try_download_font`], reporting failures as warnings.
#[must_use]
pub fn check_font(font: &str) -> Option<PathBuf> {
    match try_download_font(font) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("{e}");
            None
        }
    }
}

use reqwest::blocking::{Client, Response};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{BoxError, RegistryError, Result};
use crate::ui::Ui;

// The registry host rejects requests without a browser-like agent
const USER_AGENT: &str = "Mozilla/5.0 (compatible; faa-registry-loader)";

pub struct RegistryClient {
    client: Client,
}

impl RegistryClient {
    /// Build an IPv4-only client. `connect_timeout` bounds connection setup,
    /// `total_timeout` the whole transfer.
    pub fn new(connect_timeout: Duration, total_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .connect_timeout(connect_timeout)
            .timeout(total_timeout)
            .build()
            .map_err(|e| RegistryError::Download {
                url: String::new(),
                message: "failed to create HTTP client".into(),
                source: Some(e.into()),
            })?;
        Ok(Self { client })
    }

    /// Download `url` to `dest`. The archive is written to a `.part` file
    /// first so an interrupted transfer never leaves a truncated zip behind.
    pub fn download_zip(&self, url: &str, dest: &Path, ui: &mut dyn Ui) -> Result<u64> {
        let download_error = |message: String, source: Option<BoxError>| {
            RegistryError::Download {
                url: url.to_string(),
                message,
                source,
            }
        };

        info!(url, dest = %dest.display(), "Downloading registry archive");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| download_error("request failed".into(), Some(e.into())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("server returned {}", status), None));
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                download_error(format!("cannot create {:?}", parent), Some(e.into()))
            })?;
        }

        let partial = dest.with_extension("zip.part");
        let result = write_body(response, &partial, dest, ui);
        if result.is_err() {
            let _ = fs::remove_file(&partial);
        }
        let downloaded = result.map_err(|(message, source)| download_error(message, source))?;

        ui.clear_progress();
        info!(bytes = downloaded, "Download complete");
        Ok(downloaded)
    }
}

type WriteError = (String, Option<BoxError>);

fn io_error(message: String, e: std::io::Error) -> WriteError {
    (message, Some(e.into()))
}

/// Stream the response into `partial`, then move it to `dest`
fn write_body(
    mut response: Response,
    partial: &Path,
    dest: &Path,
    ui: &mut dyn Ui,
) -> std::result::Result<u64, WriteError> {
    let write_error = |e| io_error(format!("cannot write {:?}", partial), e);

    let mut file =
        File::create(partial).map_err(|e| io_error(format!("cannot create {:?}", partial), e))?;

    let total_size = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| io_error("failed to read response body".into(), e))?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read]).map_err(write_error)?;

        downloaded += bytes_read as u64;
        ui.set_progress(downloaded, total_size, &format_bytes(downloaded, total_size));
    }

    if total_size > 0 && downloaded != total_size {
        return Err((
            format!("transfer ended after {} of {} bytes", downloaded, total_size),
            None,
        ));
    }

    file.flush().map_err(write_error)?;
    drop(file);
    fs::rename(partial, dest)
        .map_err(|e| io_error(format!("cannot move archive to {:?}", dest), e))?;

    Ok(downloaded)
}

/// Format bytes as human-readable string
fn format_bytes(current: u64, total: u64) -> String {
    fn fmt(bytes: u64) -> String {
        if bytes >= 1_000_000_000 {
            format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
        } else if bytes >= 1_000_000 {
            format!("{:.1} MB", bytes as f64 / 1_000_000.0)
        } else if bytes >= 1_000 {
            format!("{:.1} KB", bytes as f64 / 1_000.0)
        } else {
            format!("{} B", bytes)
        }
    }
    if total == 0 {
        return fmt(current);
    }
    format!("{} / {}", fmt(current), fmt(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500, 999), "500 B / 999 B");
        assert_eq!(format_bytes(1500, 3000), "1.5 KB / 3.0 KB");
        assert_eq!(format_bytes(1_500_000, 3_000_000), "1.5 MB / 3.0 MB");
        assert_eq!(format_bytes(2_000_000, 0), "2.0 MB");
    }
}

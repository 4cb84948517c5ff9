// src/fetch/zips.rs
//
// Thin I/O plumbing around the NCHS archive: one ZIP per year, fetched
// over HTTP and unpacked. No retry or backoff here; errors surface to the
// caller.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};
use tracing::info;
use url::Url;
use zip::ZipArchive;

/// CDC archive naming: `Nat1993.zip` but `Nat1994us.zip` onwards, when the
/// territories were split into a separate series.
pub fn archive_name(year: u16) -> String {
    if year < 1994 {
        format!("Nat{year}.zip")
    } else {
        format!("Nat{year}us.zip")
    }
}

pub fn archive_url(base_url: &str, year: u16) -> Result<String> {
    let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
        .with_context(|| format!("invalid base_url `{base_url}`"))?;
    Ok(base.join(&archive_name(year))?.to_string())
}

/// Download one year's archive into `dest_dir`, returning the saved path.
pub async fn download_archive(
    client: &Client,
    url: &str,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dest_dir = dest_dir.as_ref();
    let url = Url::parse(url)?;
    let filename = url
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow!("no filename in {url}"))?;
    let dest_path = dest_dir.join(filename);

    tokio::fs::create_dir_all(dest_dir).await?;

    info!(%url, "downloading");
    let resp = client.get(url.as_str()).send().await?.error_for_status()?;
    let bytes = resp.bytes().await?;
    tokio::fs::write(&dest_path, &bytes).await?;

    Ok(dest_path)
}

/// Unpack the largest entry of the archive into `dest_dir`. The yearly
/// archives bundle the data file with layout PDFs and readmes; the data
/// file is always by far the largest.
pub fn extract_largest(zip_path: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let file =
        File::open(zip_path).with_context(|| format!("opening {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)?;

    let mut largest: Option<(u64, usize)> = None;
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_file() && largest.map_or(true, |(size, _)| entry.size() > size) {
            largest = Some((entry.size(), i));
        }
    }
    let (_, index) =
        largest.ok_or_else(|| anyhow!("{} has no file entries", zip_path.display()))?;

    let mut entry = archive.by_index(index)?;
    let name = entry
        .enclosed_name()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .ok_or_else(|| anyhow!("unsafe entry name in {}", zip_path.display()))?;

    fs::create_dir_all(dest_dir)?;
    let out_path = dest_dir.join(name);
    let mut out = File::create(&out_path)
        .with_context(|| format!("creating {}", out_path.display()))?;
    io::copy(&mut entry, &mut out)?;

    info!(raw = %out_path.display(), "extracted");
    Ok(out_path)
}

/// The extracted-raw heuristic in reverse: when the extraction folder is
/// already populated, the largest file in it is the data file.
pub fn largest_file(dir: &Path) -> Result<PathBuf> {
    let mut best: Option<(u64, PathBuf)> = None;
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let size = fs::metadata(&path)?.len();
        if best.as_ref().map_or(true, |(s, _)| size > *s) {
            best = Some((size, path));
        }
    }
    best.map(|(_, path)| path)
        .ok_or_else(|| anyhow!("{} has no files", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::{ExtendedFileOptions, FileOptions};
    use zip::CompressionMethod;

    #[test]
    fn archive_naming_switches_in_1994() {
        assert_eq!(archive_name(1968), "Nat1968.zip");
        assert_eq!(archive_name(1993), "Nat1993.zip");
        assert_eq!(archive_name(1994), "Nat1994us.zip");
        assert_eq!(archive_name(2014), "Nat2014us.zip");
    }

    #[test]
    fn archive_url_joins_base_and_name() {
        let url = archive_url("https://example.org/natality", 2014).unwrap();
        assert_eq!(url, "https://example.org/natality/Nat2014us.zip");
    }

    #[test]
    fn extraction_picks_the_largest_entry() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = dir.path().join("Nat2000us.zip");
        {
            let mut zip = zip::ZipWriter::new(File::create(&zip_path)?);
            let options = FileOptions::<ExtendedFileOptions>::default()
                .compression_method(CompressionMethod::Stored);
            zip.start_file("readme.txt", options.clone())?;
            zip.write_all(b"small")?;
            zip.start_file("VS2000.NATDATA", options)?;
            zip.write_all(&vec![b'X'; 4096])?;
            zip.finish()?;
        }

        let out = extract_largest(&zip_path, dir.path())?;
        assert_eq!(out.file_name().unwrap(), "VS2000.NATDATA");
        assert_eq!(fs::metadata(&out)?.len(), 4096);
        Ok(())
    }

    #[test]
    fn largest_file_scans_a_directory() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.pdf"), b"tiny")?;
        fs::write(dir.path().join("data.dat"), vec![b'X'; 1024])?;
        let found = largest_file(dir.path())?;
        assert_eq!(found.file_name().unwrap(), "data.dat");
        Ok(())
    }
}

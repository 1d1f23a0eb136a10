//! Image download into timestamp-named directories.
//!
//! Every result record owns a small JSON metadata file and the imagery itself
//! (the "analytics" file). The metadata carries the acquisition start time,
//! which names the directory both files end up in:
//!
//! ```text
//! <out_dir>/
//!   20240103_101530/
//!     <metadata file name>
//!     <analytics file name>
//! ```

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::client::Client;
use crate::listing::ResultRecord;
use crate::transport::Transport;
use crate::util::guess_filename_from_url;

/// Metadata field holding the acquisition start time.
pub const DEFAULT_TIMESTAMP_FIELD: &str = "acquisition_start_time";

/// `strftime` format of the per-acquisition directory names.
pub const DIRECTORY_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Key of the timestamp in the metadata JSON. Dots address nested objects.
    pub timestamp_field: String,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            timestamp_field: DEFAULT_TIMESTAMP_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Fetched(PathBuf),
    /// The destination already existed and was left untouched.
    Skipped(PathBuf),
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FileOutcome::Fetched(p) | FileOutcome::Skipped(p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub directory: PathBuf,
    pub acquired: DateTime<Utc>,
    pub metadata: FileOutcome,
    pub analytics: FileOutcome,
}

impl<T: Transport> Client<T> {
    pub fn download_images(
        &self,
        records: &[ResultRecord],
        out_dir: &Path,
    ) -> Result<Vec<DownloadReport>> {
        self.download_images_with(records, out_dir, &DownloadOptions::default())
    }

    /// Downloads each record in order, stopping at the first failure.
    ///
    /// Nothing is rolled back: a record whose analytics download fails keeps
    /// its metadata file.
    pub fn download_images_with(
        &self,
        records: &[ResultRecord],
        out_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<Vec<DownloadReport>> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create directory {}", out_dir.display()))?;

        let pb = if self.progress() {
            let pb = ProgressBar::new(records.len() as u64);
            let style = ProgressStyle::with_template("{spinner:.green} {pos}/{len} {wide_bar} {msg}")
                .map(|s| s.progress_chars("=>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            pb.set_style(style);
            Some(pb)
        } else {
            None
        };

        let mut reports = Vec::with_capacity(records.len());
        for record in records {
            let report = self.download_record(record, out_dir, options)?;
            if let Some(pb) = &pb {
                pb.set_message(report.directory.display().to_string());
                pb.inc(1);
            }
            reports.push(report);
        }

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        Ok(reports)
    }

    fn download_record(
        &self,
        record: &ResultRecord,
        out_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<DownloadReport> {
        // The directory is unknown until the metadata has been read.
        let mut scratch = NamedTempFile::new_in(out_dir)
            .with_context(|| format!("failed to create scratch file in {}", out_dir.display()))?;
        self.fetch_into(&record.metadata_url, scratch.as_file_mut())?;

        let text = std::fs::read(scratch.path())
            .with_context(|| format!("failed to read {}", scratch.path().display()))?;
        let acquired = timestamp_from_metadata(&text, &options.timestamp_field)
            .with_context(|| format!("bad metadata file ({})", record.metadata_url))?;

        let directory = out_dir.join(directory_name(&acquired));
        std::fs::create_dir_all(&directory)
            .with_context(|| format!("failed to create directory {}", directory.display()))?;

        let metadata_name = file_name(&record.metadata_url, "metadata.json");
        let mut analytics_name = file_name(&record.analytics_url, "analytics.tif");
        // Presigned links often end in the same generic segment for both files.
        if analytics_name == metadata_name {
            analytics_name = format!("analytics_{}", analytics_name);
        }

        let metadata_path = directory.join(metadata_name);
        let metadata = if metadata_path.exists() {
            tracing::debug!(path = %metadata_path.display(), "metadata already present");
            FileOutcome::Skipped(metadata_path)
        } else {
            scratch
                .persist(&metadata_path)
                .with_context(|| format!("failed to move metadata to {}", metadata_path.display()))?;
            tracing::info!(path = %metadata_path.display(), "metadata saved");
            FileOutcome::Fetched(metadata_path)
        };

        let analytics_path = directory.join(analytics_name);
        let analytics = if analytics_path.exists() {
            tracing::debug!(path = %analytics_path.display(), "image already present");
            FileOutcome::Skipped(analytics_path)
        } else {
            let mut part = NamedTempFile::new_in(&directory).with_context(|| {
                format!("failed to create scratch file in {}", directory.display())
            })?;
            let bytes = self.fetch_into(&record.analytics_url, part.as_file_mut())?;
            part.persist(&analytics_path)
                .with_context(|| format!("failed to write {}", analytics_path.display()))?;
            tracing::info!(path = %analytics_path.display(), bytes, "image saved");
            FileOutcome::Fetched(analytics_path)
        };

        Ok(DownloadReport {
            directory,
            acquired,
            metadata,
            analytics,
        })
    }

    fn fetch_into(&self, url: &str, file: &mut std::fs::File) -> Result<u64> {
        tracing::debug!(url, "downloading");
        let n = self.transport().fetch(url, &mut *file)?;
        file.flush()?;
        Ok(n)
    }
}

/// Formats the directory name for an acquisition time.
pub fn directory_name(acquired: &DateTime<Utc>) -> String {
    acquired.format(DIRECTORY_FORMAT).to_string()
}

/// Parses an acquisition time. Naive times are taken as UTC.
pub fn parse_acquisition_time(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    bail!("unrecognised acquisition time {:?}", s)
}

fn timestamp_from_metadata(bytes: &[u8], field: &str) -> Result<DateTime<Utc>> {
    let doc: Value = serde_json::from_slice(bytes).context("metadata is not valid JSON")?;

    let mut cur = &doc;
    for part in field.split('.') {
        cur = cur
            .get(part)
            .ok_or_else(|| anyhow!("metadata has no {:?} field", field))?;
    }
    let raw = cur
        .as_str()
        .ok_or_else(|| anyhow!("metadata field {:?} is not a string", field))?;
    parse_acquisition_time(raw)
}

fn file_name(url: &str, fallback: &str) -> String {
    guess_filename_from_url(url).unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::test_config;
    use crate::transport::mock::ScriptedTransport;
    use tempfile::TempDir;

    const META_1: &str = "https://files.test/r1/scene_metadata.json?sig=1";
    const IMG_1: &str = "https://files.test/r1/scene_analytic.tif?sig=1";
    const META_2: &str = "https://files.test/r2/other_metadata.json";
    const IMG_2: &str = "https://files.test/r2/other_analytic.tif";

    fn client(files: &[(&str, &str)]) -> Client<ScriptedTransport> {
        Client::with_transport(test_config(), ScriptedTransport::with_files(files))
    }

    fn only_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn directory_name_is_deterministic() {
        let t = parse_acquisition_time("2024-01-03T10:15:30.123456+00:00").unwrap();
        assert_eq!(directory_name(&t), "20240103_101530");
        assert_eq!(directory_name(&t), directory_name(&t.clone()));
    }

    #[test]
    fn timestamps_normalise_to_utc() {
        let cases = [
            ("2024-01-03T10:15:30Z", "20240103_101530"),
            ("2024-01-03T12:15:30+02:00", "20240103_101530"),
            ("2024-01-03T10:15:30", "20240103_101530"),
            ("2024-01-03 10:15:30.5", "20240103_101530"),
            ("2024-01-03 10:15:30+00:00", "20240103_101530"),
        ];
        for (raw, want) in cases {
            let t = parse_acquisition_time(raw).unwrap();
            assert_eq!(directory_name(&t), want, "{raw}");
        }
        assert!(parse_acquisition_time("yesterday").is_err());
    }

    #[test]
    fn nested_timestamp_field() {
        let doc = br#"{"properties": {"start": "2023-07-09T00:00:01Z"}}"#;
        let t = timestamp_from_metadata(doc, "properties.start").unwrap();
        assert_eq!(directory_name(&t), "20230709_000001");
        assert!(timestamp_from_metadata(doc, "properties.end").is_err());
    }

    #[test]
    fn downloads_into_timestamp_directory() {
        let tmp = TempDir::new().unwrap();
        let c = client(&[
            (META_1, r#"{"acquisition_start_time": "2024-01-03T10:15:30Z"}"#),
            (IMG_1, "TIFFDATA"),
        ]);

        let reports = c
            .download_images(&[ResultRecord::new(META_1, IMG_1)], tmp.path())
            .unwrap();

        let dir = tmp.path().join("20240103_101530");
        assert_eq!(reports[0].directory, dir);
        assert_eq!(reports[0].metadata, FileOutcome::Fetched(dir.join("scene_metadata.json")));
        assert_eq!(reports[0].analytics, FileOutcome::Fetched(dir.join("scene_analytic.tif")));
        assert_eq!(std::fs::read(dir.join("scene_analytic.tif")).unwrap(), b"TIFFDATA");
        // scratch files do not linger in the output root
        assert_eq!(only_entries(tmp.path()), vec!["20240103_101530".to_string()]);
        assert_eq!(
            only_entries(&dir),
            vec!["scene_analytic.tif".to_string(), "scene_metadata.json".to_string()]
        );
    }

    #[test]
    fn existing_files_are_not_fetched_again() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("20240103_101530");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("scene_metadata.json"), b"old metadata").unwrap();
        std::fs::write(dir.join("scene_analytic.tif"), b"old image").unwrap();

        let c = client(&[
            (META_1, r#"{"acquisition_start_time": "2024-01-03T10:15:30Z"}"#),
            (IMG_1, "new image"),
        ]);
        let reports = c
            .download_images(&[ResultRecord::new(META_1, IMG_1)], tmp.path())
            .unwrap();

        assert!(matches!(reports[0].metadata, FileOutcome::Skipped(_)));
        assert!(matches!(reports[0].analytics, FileOutcome::Skipped(_)));
        assert_eq!(std::fs::read(dir.join("scene_metadata.json")).unwrap(), b"old metadata");
        assert_eq!(std::fs::read(dir.join("scene_analytic.tif")).unwrap(), b"old image");
        // metadata is always read to find the directory; the image is not requested
        assert_eq!(*c.transport().fetched.borrow(), vec![META_1.to_string()]);
        assert_eq!(only_entries(tmp.path()), vec!["20240103_101530".to_string()]);
    }

    #[test]
    fn same_url_file_names_do_not_collide() {
        const META: &str = "https://files.test/meta/download?sig=1";
        const IMG: &str = "https://files.test/img/download?sig=2";
        let tmp = TempDir::new().unwrap();
        let c = client(&[
            (META, r#"{"acquisition_start_time": "2024-01-03T10:15:30Z"}"#),
            (IMG, "pixels"),
        ]);

        let reports = c
            .download_images(&[ResultRecord::new(META, IMG)], tmp.path())
            .unwrap();

        let dir = tmp.path().join("20240103_101530");
        assert_eq!(reports[0].metadata, FileOutcome::Fetched(dir.join("download")));
        assert_eq!(reports[0].analytics, FileOutcome::Fetched(dir.join("analytics_download")));
        assert_eq!(*c.transport().fetched.borrow(), vec![META.to_string(), IMG.to_string()]);
        assert_eq!(std::fs::read(dir.join("analytics_download")).unwrap(), b"pixels");
        assert_eq!(
            only_entries(&dir),
            vec!["analytics_download".to_string(), "download".to_string()]
        );
    }

    #[test]
    fn failed_image_leaves_metadata_behind() {
        let tmp = TempDir::new().unwrap();
        let c = client(&[
            (META_1, r#"{"acquisition_start_time": "2024-01-03T10:15:30Z"}"#),
            (META_2, r#"{"acquisition_start_time": "2024-02-01T00:00:00Z"}"#),
            (IMG_2, "second"),
        ]);

        let err = c
            .download_images(
                &[ResultRecord::new(META_1, IMG_1), ResultRecord::new(META_2, IMG_2)],
                tmp.path(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 404"), "{err}");

        let dir = tmp.path().join("20240103_101530");
        assert_eq!(only_entries(&dir), vec!["scene_metadata.json".to_string()]);
        // processing stopped at the first failure
        assert!(!tmp.path().join("20240201_000000").exists());
    }

    #[test]
    fn metadata_without_timestamp_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let c = client(&[(META_2, r#"{"satellite": "S2A"}"#)]);

        let err = c
            .download_images(&[ResultRecord::new(META_2, IMG_2)], tmp.path())
            .unwrap_err();
        assert!(format!("{err:#}").contains("acquisition_start_time"), "{err:#}");
        assert!(only_entries(tmp.path()).is_empty());
    }
}

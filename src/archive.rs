use std::fs::{self, File};
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{error, info, warn};

use crate::domain::Accession;
use crate::error::HarvestError;
use crate::geo::GeoClient;
use crate::progress::{ProgressEvent, ProgressSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Extracted(Utf8PathBuf),
    Skipped { size: u64 },
    Failed,
}

impl ArchiveOutcome {
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            ArchiveOutcome::Extracted(path) => Some(path),
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ArchiveOutcome::Extracted(_) => "Extracted",
            ArchiveOutcome::Skipped { .. } => "Skipped",
            ArchiveOutcome::Failed => "Failed",
        }
    }
}

pub struct ArchiveRetriever {
    scratch_dir: Utf8PathBuf,
    xml_dir: Utf8PathBuf,
    max_bytes: u64,
}

impl ArchiveRetriever {
    pub fn new(scratch_dir: Utf8PathBuf, xml_dir: Utf8PathBuf, max_bytes: u64) -> Self {
        Self {
            scratch_dir,
            xml_dir,
            max_bytes,
        }
    }

    pub fn archive_url(base_url: &str, accession: &Accession) -> String {
        let separator = if base_url.ends_with('/') { "" } else { "/" };
        format!("{base_url}{separator}{}", accession.archive_name())
    }

    pub fn extraction_dir(&self, accession: &Accession) -> Utf8PathBuf {
        self.xml_dir.join(accession.as_str())
    }

    pub fn retrieve<G: GeoClient>(
        &self,
        geo: &G,
        base_url: &str,
        accession: &Accession,
        sink: &dyn ProgressSink,
    ) -> ArchiveOutcome {
        let url = Self::archive_url(base_url, accession);
        match self.try_retrieve(geo, &url, accession, sink) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(%url, accession = %accession, error = %err, "archive retrieval failed");
                ArchiveOutcome::Failed
            }
        }
    }

    fn try_retrieve<G: GeoClient>(
        &self,
        geo: &G,
        url: &str,
        accession: &Accession,
        sink: &dyn ProgressSink,
    ) -> Result<ArchiveOutcome, HarvestError> {
        sink.event(ProgressEvent::phase(format!("phase=Probe; {url}")));
        if let Some(size) = geo.probe_size(url)? {
            if size > self.max_bytes {
                info!(
                    %url,
                    size_mb = %format!("{:.2}", size as f64 / (1024.0 * 1024.0)),
                    limit_mb = self.max_bytes / (1024 * 1024),
                    "skipping oversized archive"
                );
                return Ok(ArchiveOutcome::Skipped { size });
            }
        }

        fs::create_dir_all(self.scratch_dir.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        // Removed from disk when dropped, whichever way this function returns.
        let mut scratch = tempfile::Builder::new()
            .prefix(&format!("{}.", accession.as_str()))
            .suffix(".tgz")
            .tempfile_in(self.scratch_dir.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;

        sink.event(ProgressEvent::phase(format!("phase=Download; {url}")));
        let start = Instant::now();
        let bytes = geo.download(url, scratch.as_file_mut(), sink)?;
        sink.event(ProgressEvent {
            message: format!("geo.download bytes={bytes}"),
            elapsed: Some(start.elapsed()),
        });

        let file = scratch.as_file_mut();
        file.seek(SeekFrom::Start(0))
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let destination = self.extraction_dir(accession);
        sink.event(ProgressEvent::phase(format!("phase=Extract; {destination}")));
        let extracted = extract_xml_members(file, &destination)?;

        let expected = destination.join(accession.miniml_name());
        if expected.as_std_path().exists() {
            return Ok(ArchiveOutcome::Extracted(expected));
        }
        match extracted.into_iter().next() {
            Some(path) => Ok(ArchiveOutcome::Extracted(path)),
            None => Err(HarvestError::Archive(format!(
                "no MINiML document in {}",
                accession.archive_name()
            ))),
        }
    }
}

pub fn extract_xml_members(
    archive: &mut File,
    destination: &Utf8Path,
) -> Result<Vec<Utf8PathBuf>, HarvestError> {
    fs::create_dir_all(destination.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    let mut archive = Archive::new(GzDecoder::new(archive));
    let entries = archive
        .entries()
        .map_err(|err| HarvestError::Archive(err.to_string()))?;

    let mut matched = Vec::new();
    for entry in entries {
        let mut entry = entry.map_err(|err| HarvestError::Archive(err.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let member = entry
            .path()
            .map_err(|err| HarvestError::Archive(err.to_string()))?
            .into_owned();
        let Some(name) = xml_file_name(&member) else {
            continue;
        };
        let target = destination.join(&name);
        if target.as_std_path().exists() {
            warn!(path = %target, "file already exists, not overwriting");
        } else {
            entry
                .unpack(target.as_std_path())
                .map_err(|err| HarvestError::Archive(err.to_string()))?;
            info!(path = %target, "extracted MINiML member");
        }
        matched.push(target);
    }
    Ok(matched)
}

fn xml_file_name(member: &Path) -> Option<String> {
    let name = member.file_name()?.to_str()?;
    name.ends_with(".xml").then(|| name.to_string())
}

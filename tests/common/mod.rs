#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use geo_harvest::config::{Config, ConfigLoader, QueryEntry, QueryEntryObject, ResolvedConfig};
use geo_harvest::error::HarvestError;
use geo_harvest::geo::GeoClient;
use geo_harvest::progress::{ProgressSink, TransferProgress};

pub const SITE: &str = "http://geo.test";
pub const SEARCH_URL: &str = "http://geo.test/gds?term=(single-cell)";
pub const DETAIL_URL: &str = "http://geo.test/geo/query/acc.cgi?acc=GSE123";
pub const MINIML_BASE: &str = "ftp://ftp.geo.test/geo/series/GSE0nnn/GSE123/miniml/";
pub const ARCHIVE_URL: &str = "https://ftp.geo.test/geo/series/GSE0nnn/GSE123/miniml/GSE123_family.xml.tgz";

pub const FAMILY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MINiML xmlns="http://www.ncbi.nlm.nih.gov/geo/info/MINiML" version="0.5.0">
  <Series iid="GSE123"><Title>T</Title></Series>
  <Sample iid="GSM1001">
    <Channel position="1">
      <Characteristics tag="tissue">primary tumor</Characteristics>
      <Characteristics tag="cell line">A549</Characteristics>
    </Channel>
  </Sample>
  <Sample iid="GSM1002">
    <Channel position="1">
      <Characteristics tag="Tissue">lymph node</Characteristics>
    </Channel>
  </Sample>
</MINiML>
"#;

#[derive(Default)]
pub struct MockGeo {
    pub pages: HashMap<String, String>,
    pub sizes: HashMap<String, u64>,
    pub archives: HashMap<String, Vec<u8>>,
    pub unsized_urls: HashSet<String>,
    pub probes: RefCell<Vec<String>>,
    pub downloads: RefCell<Vec<String>>,
}

impl MockGeo {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_size(mut self, url: &str, size: u64) -> Self {
        self.sizes.insert(url.to_string(), size);
        self
    }

    pub fn with_archive(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.archives.insert(url.to_string(), bytes);
        self
    }

    /// HEAD on `url` answers without a `Content-Length`.
    pub fn without_length(mut self, url: &str) -> Self {
        self.unsized_urls.insert(url.to_string());
        self
    }
}

impl GeoClient for MockGeo {
    fn fetch_text(&self, url: &str) -> Result<String, HarvestError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| HarvestError::GeoStatus {
                status: 404,
                message: url.to_string(),
            })
    }

    fn probe_size(&self, url: &str) -> Result<Option<u64>, HarvestError> {
        self.probes.borrow_mut().push(url.to_string());
        if self.unsized_urls.contains(url) {
            return Ok(None);
        }
        if let Some(size) = self.sizes.get(url) {
            return Ok(Some(*size));
        }
        Ok(self.archives.get(url).map(|bytes| bytes.len() as u64))
    }

    fn download(
        &self,
        url: &str,
        destination: &mut dyn Write,
        progress: &dyn ProgressSink,
    ) -> Result<u64, HarvestError> {
        self.downloads.borrow_mut().push(url.to_string());
        let bytes = self.archives.get(url).ok_or_else(|| HarvestError::GeoStatus {
            status: 404,
            message: url.to_string(),
        })?;
        destination
            .write_all(bytes)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        progress.transfer(TransferProgress {
            name: url.to_string(),
            received: bytes.len() as u64,
            total: Some(bytes.len() as u64),
            done: true,
        });
        Ok(bytes.len() as u64)
    }
}

pub fn family_archive(accession: &str, xml: &str) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_size(xml.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    builder
        .append_data(
            &mut header,
            format!("{accession}/{accession}_family.xml"),
            xml.as_bytes(),
        )
        .unwrap();

    let table = b"ID_REF\tVALUE\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(table.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    builder
        .append_data(&mut header, format!("{accession}/GPL1-tbl-1.txt"), &table[..])
        .unwrap();

    builder.into_inner().unwrap().finish().unwrap()
}

pub fn listing(accessions: &[&str]) -> String {
    let items = accessions
        .iter()
        .map(|acc| {
            format!(
                r#"<div class="rslt"><p class="title"><a href="/geo/query/acc.cgi?acc={acc}">{acc}</a></p></div>"#
            )
        })
        .collect::<String>();
    format!("<html><body><div class=\"content\">{items}</div></body></html>")
}

pub fn detail_page(title: &str, summary: &str, miniml_href: Option<&str>) -> String {
    let download = miniml_href
        .map(|href| {
            format!(r#"<tr><td>Download family</td><td><a href="{href}">MINiML formatted family file(s)</a></td></tr>"#)
        })
        .unwrap_or_default();
    format!(
        r#"<html><body><table>
            <tr><td nowrap>Title</td><td>{title}</td></tr>
            <tr><td nowrap>Summary</td><td>{summary}</td></tr>
            {download}
        </table></body></html>"#
    )
}

pub fn test_config(output_dir: &Path) -> ResolvedConfig {
    let config = Config {
        queries: vec![QueryEntry::Detailed(QueryEntryObject {
            keyword: "single-cell".to_string(),
            url: SEARCH_URL.to_string(),
        })],
        output_dir: Some(output_dir.to_string_lossy().into_owned()),
        site_base_url: Some(SITE.to_string()),
        ..Config::default()
    };
    ConfigLoader::resolve_config(config).unwrap()
}

pub fn utf8(path: &Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

/// Header and rows of a written sheet; empty cells read back as `None`.
pub fn read_sheet(path: &Path) -> (Vec<String>, Vec<HashMap<String, Option<String>>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let rows = reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            header
                .iter()
                .cloned()
                .zip(record.iter().map(|cell| (!cell.is_empty()).then(|| cell.to_string())))
                .collect()
        })
        .collect();
    (header, rows)
}

pub fn leftover_archives(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".tgz"))
                .collect()
        })
        .unwrap_or_default()
}

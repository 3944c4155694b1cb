use std::fs;
use std::path::Path;

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use tracing::{error, info};

use crate::domain::{NOT_AVAILABLE, SampleRecord};
use crate::error::HarvestError;

pub const MINIML_NAMESPACE: &[u8] = b"http://www.ncbi.nlm.nih.gov/geo/info/MINiML";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Characteristic {
    Tissue,
    CellLine,
}

pub fn parse_samples(path: &Path) -> Vec<SampleRecord> {
    let xml = match fs::read_to_string(path) {
        Ok(xml) => xml,
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to read MINiML file");
            return Vec::new();
        }
    };
    let samples = parse_samples_str(&xml);
    info!(path = %path.display(), samples = samples.len(), "parsed MINiML samples");
    samples
}

pub fn parse_samples_str(xml: &str) -> Vec<SampleRecord> {
    match try_parse_samples_str(xml) {
        Ok(samples) => samples,
        Err(err) => {
            error!(error = %err, "failed to process MINiML document");
            Vec::new()
        }
    }
}

pub fn try_parse_samples_str(xml: &str) -> Result<Vec<SampleRecord>, HarvestError> {
    let mut reader = NsReader::from_str(xml);
    let mut samples = Vec::new();
    let mut current: Option<SampleRecord> = None;
    let mut open: Option<(Characteristic, String)> = None;

    loop {
        let (namespace, event) = reader
            .read_resolved_event()
            .map_err(|err| HarvestError::Parse(err.to_string()))?;
        let in_miniml = is_miniml(&namespace);
        match event {
            Event::Start(element) if in_miniml => match element.local_name().as_ref() {
                b"Sample" if current.is_none() => current = Some(start_sample(&element)?),
                b"Characteristics" if current.is_some() => {
                    open = characteristic_kind(&element)?.map(|kind| (kind, String::new()));
                }
                _ => {}
            },
            Event::Empty(element) if in_miniml => match element.local_name().as_ref() {
                b"Sample" if current.is_none() => samples.push(start_sample(&element)?),
                b"Characteristics" => {
                    if let (Some(sample), Some(kind)) =
                        (current.as_mut(), characteristic_kind(&element)?)
                    {
                        assign(sample, kind, "");
                    }
                }
                _ => {}
            },
            Event::Text(text) => {
                if let Some((_, buffer)) = open.as_mut() {
                    let text = text
                        .unescape()
                        .map_err(|err| HarvestError::Parse(err.to_string()))?;
                    buffer.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some((_, buffer)) = open.as_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(element) if in_miniml => match element.local_name().as_ref() {
                b"Characteristics" => {
                    if let (Some(sample), Some((kind, text))) = (current.as_mut(), open.take()) {
                        assign(sample, kind, &text);
                    }
                }
                b"Sample" => {
                    if let Some(sample) = current.take() {
                        samples.push(sample);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if current.is_some() {
        return Err(HarvestError::Parse(
            "document ended inside a Sample element".to_string(),
        ));
    }
    Ok(samples)
}

fn is_miniml(namespace: &ResolveResult<'_>) -> bool {
    matches!(namespace, ResolveResult::Bound(Namespace(uri)) if *uri == MINIML_NAMESPACE)
}

fn start_sample(element: &BytesStart<'_>) -> Result<SampleRecord, HarvestError> {
    let sample_id = attribute(element, "iid")?
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    Ok(SampleRecord {
        sample_id,
        ..SampleRecord::default()
    })
}

fn characteristic_kind(element: &BytesStart<'_>) -> Result<Option<Characteristic>, HarvestError> {
    let tag = attribute(element, "tag")?.unwrap_or_default();
    Ok(match tag.trim().to_lowercase().as_str() {
        "tissue" => Some(Characteristic::Tissue),
        "cell line" => Some(Characteristic::CellLine),
        _ => None,
    })
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, HarvestError> {
    let Some(attr) = element
        .try_get_attribute(name)
        .map_err(|err| HarvestError::Parse(err.to_string()))?
    else {
        return Ok(None);
    };
    let value = attr
        .unescape_value()
        .map_err(|err| HarvestError::Parse(err.to_string()))?;
    Ok(Some(value.trim().to_string()))
}

// Later occurrences of the same tag overwrite earlier ones.
fn assign(sample: &mut SampleRecord, kind: Characteristic, text: &str) {
    let value = match text.trim() {
        "" => NOT_AVAILABLE.to_string(),
        trimmed => trimmed.to_string(),
    };
    match kind {
        Characteristic::Tissue => sample.tissue = value,
        Characteristic::CellLine => sample.cell_line = value,
    }
}

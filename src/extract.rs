use scraper::{ElementRef, Html};

use crate::domain::{CELL_LINE_COLUMN, Record, SAMPLE_ID_COLUMN, TISSUE_COLUMN};

pub const MINIML_LINK_TEXT: &str = "MINiML formatted family file(s)";

const SERIES_PAGE_LABELS: [&str; 12] = [
    "Title",
    "Organism",
    "Experiment type",
    "Summary",
    "Overall design",
    "Submission date",
    "Last update date",
    "Contact name",
    "Organization name",
    "Street address",
    "City",
    "ZIP/Postal code",
];

const DETAIL_PAGE_LABELS: [&str; 16] = [
    "Title",
    "Summary",
    "Experiment type",
    "Overall design",
    "Citation(s)",
    "Submission date",
    "Last update date",
    "Contact name",
    "E-mail(s)",
    "Organization name",
    "Department",
    "Street address",
    "City",
    "State/province",
    "ZIP/Postal code",
    "Country",
];

const SERIES_COLUMNS: [&str; 24] = [
    "Keyword",
    "Accession Number",
    "Title",
    "Status",
    "Release Status",
    "Organism",
    "Experiment type",
    "Summary",
    "Overall design",
    "Contributor(s)",
    "Submission date",
    "Last update date",
    "Contact name",
    "Organization name",
    "Street address",
    "City",
    "ZIP/Postal code",
    "Country",
    "Platforms",
    "XML File URL",
    "XML File Path",
    SAMPLE_ID_COLUMN,
    TISSUE_COLUMN,
    CELL_LINE_COLUMN,
];

const DETAIL_PAGE_COLUMNS: [&str; 21] = [
    "Dataset URL",
    "Title",
    "Summary",
    "Experiment type",
    "Overall design",
    "Contributor(s)",
    "Citation(s)",
    "Submission date",
    "Last update date",
    "Contact name",
    "E-mail(s)",
    "Organization name",
    "Department",
    "Street address",
    "City",
    "State/province",
    "ZIP/Postal code",
    "Country",
    "Platforms",
    "Samples",
    "Accession Number",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionProfile {
    Series,
    DetailPage,
}

impl ExtractionProfile {
    pub fn columns(&self) -> Vec<String> {
        let columns: &[&str] = match self {
            ExtractionProfile::Series => &SERIES_COLUMNS,
            ExtractionProfile::DetailPage => &DETAIL_PAGE_COLUMNS,
        };
        columns.iter().map(|column| column.to_string()).collect()
    }
}

// Page-derived fields for the crawler. Crawler-level columns (keyword,
// accession, retrieval status, archive location) are added by the caller.
pub fn series_fields(document: &Html) -> Record {
    let mut record = Record::new();
    for label in SERIES_PAGE_LABELS {
        record.set(label, labeled_value(document, label));
    }
    record.set("Release Status", labeled_value(document, "Status"));
    record.set("Country", labeled_value(document, "Country"));
    record.set("Contributor(s)", labeled_anchors(document, "Contributor(s)"));
    record.set("Platforms", labeled_anchors(document, "Platforms"));
    record
}

pub fn detail_page_fields(document: &Html, url: &str) -> Record {
    let mut record = Record::new().with("Dataset URL", Some(url.to_string()));
    for label in DETAIL_PAGE_LABELS {
        record.set(label, labeled_value(document, label));
    }
    record.set("Contributor(s)", non_empty(anchors_with_href(document, "Author")));
    record.set("Platforms", non_empty(anchors_with_href(document, "GPL")));
    record.set("Samples", non_empty(anchors_with_href(document, "GSM")));
    record.set("Accession Number", accession_badge(document));
    record
}

pub fn labeled_value(document: &Html, label: &str) -> Option<String> {
    value_cell(document, label).map(stripped_text)
}

pub fn labeled_anchors(document: &Html, label: &str) -> Option<String> {
    let cell = value_cell(document, label)?;
    Some(join_anchor_texts(elements(cell, "a")))
}

pub fn anchors_with_href(document: &Html, needle: &str) -> String {
    join_anchor_texts(elements(document.root_element(), "a").filter(|anchor| {
        anchor
            .value()
            .attr("href")
            .map(|href| href.contains(needle))
            .unwrap_or(false)
    }))
}

pub fn link_with_text(document: &Html, text: &str) -> Option<String> {
    elements(document.root_element(), "a")
        .find(|anchor| anchor.text().collect::<String>() == text)
        .and_then(|anchor| anchor.value().attr("href"))
        .map(|href| href.trim().to_string())
}

fn accession_badge(document: &Html) -> Option<String> {
    elements(document.root_element(), "strong")
        .find(|strong| strong.value().classes().any(|class| class == "acc"))
        .map(stripped_text)
}

fn value_cell<'a>(document: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    let label_cell = elements(document.root_element(), "td")
        .find(|cell| cell.text().collect::<String>() == label)?;
    label_cell
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "td")
}

fn elements<'a>(root: ElementRef<'a>, name: &'a str) -> impl Iterator<Item = ElementRef<'a>> {
    root.descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |element| element.value().name() == name)
}

fn stripped_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn join_anchor_texts<'a>(anchors: impl Iterator<Item = ElementRef<'a>>) -> String {
    anchors.map(stripped_text).collect::<Vec<_>>().join(", ")
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

//! CSV/XML encoding of batch payloads and decoding of results.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{ContentType, Record};
use crate::xml::{is_element_name, XmlBuilder};

/// Body returned for a CSV query batch that matched nothing.
const NO_RECORDS_MESSAGE: &str = "Records not found for this query";

/// How the CSV encoder treats keys that first appear after the first record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderPolicy {
    /// Header comes from the first record; later extra keys are dropped.
    #[default]
    Drop,
    /// Later extra keys are rejected with `InvalidInput`.
    Fail,
    /// Header is the union of all keys in first-seen order.
    Widen,
}

/// One per-record outcome as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutcome {
    pub id: Option<String>,
    pub success: bool,
    pub created: bool,
    pub error: Option<String>,
}

/// Interpret a result flag: trimmed, case-insensitive `"true"`.
pub fn parse_boolean(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode records as a batch body.
pub fn encode(records: &[Record], content_type: ContentType, policy: HeaderPolicy) -> Result<String> {
    if records.is_empty() {
        return Err(Error::invalid_input("Batch data set is empty"));
    }
    match content_type {
        ContentType::Csv => encode_csv(records, policy),
        ContentType::Xml => encode_xml(records),
    }
}

fn csv_header(records: &[Record], policy: HeaderPolicy) -> Result<Vec<String>> {
    let mut header: Vec<String> = records[0].keys().map(str::to_string).collect();

    for (position, record) in records.iter().enumerate().skip(1) {
        for key in record.keys() {
            if header.iter().any(|h| h == key) {
                continue;
            }
            match policy {
                HeaderPolicy::Drop => {}
                HeaderPolicy::Fail => {
                    return Err(Error::invalid_input(format!(
                        "Record {} has field '{}' not present in the first record",
                        position, key
                    )));
                }
                HeaderPolicy::Widen => header.push(key.to_string()),
            }
        }
    }
    Ok(header)
}

fn encode_csv(records: &[Record], policy: HeaderPolicy) -> Result<String> {
    let header = csv_header(records, policy)?;
    if header.is_empty() {
        return Err(Error::invalid_input("Records have no fields"));
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;
    for record in records {
        writer.write_record(header.iter().map(|key| record.get(key).unwrap_or("")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::invalid_input(format!("Failed to flush CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::invalid_input(e.to_string()))
}

fn encode_xml(records: &[Record]) -> Result<String> {
    let mut builder = XmlBuilder::new()?.root("sObjects")?;
    for record in records {
        builder.start("sObject")?;
        for (field, value) in record.iter() {
            if !is_element_name(field) {
                return Err(Error::invalid_input(format!(
                    "Field '{}' cannot be written as an XML element",
                    field
                )));
            }
            builder.element(field, value)?;
        }
        builder.end("sObject")?;
    }
    builder.end("sObjects")?;
    builder.finish()
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a batch result payload into per-record outcomes.
pub fn decode(payload: &str, content_type: ContentType) -> Result<Vec<RawOutcome>> {
    match content_type {
        ContentType::Csv => decode_csv_outcomes(payload),
        ContentType::Xml => decode_xml_outcomes(payload),
    }
}

/// [`decode`] with the content type given by its wire name.
pub fn decode_as(payload: &str, content_type: &str) -> Result<Vec<RawOutcome>> {
    decode(payload, ContentType::from_wire(content_type)?)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn decode_csv_outcomes(payload: &str) -> Result<Vec<RawOutcome>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(payload.as_bytes());

    let mut outcomes = Vec::new();
    for row in reader.records() {
        let row = row?;
        // Positional columns; missing ones read as absent.
        outcomes.push(RawOutcome {
            id: non_empty(row.get(0)),
            success: row.get(1).is_some_and(parse_boolean),
            created: row.get(2).is_some_and(parse_boolean),
            error: non_empty(row.get(3)),
        });
    }
    Ok(outcomes)
}

fn decode_xml_outcomes(payload: &str) -> Result<Vec<RawOutcome>> {
    let elements = flatten_xml(payload)?;
    Ok(elements
        .into_iter()
        .filter(|(name, _)| name == "result")
        .map(|(_, fields)| {
            let field = |path: &str| {
                fields
                    .iter()
                    .find(|(p, _)| p == path)
                    .map(|(_, v)| v.as_str())
            };
            let error = non_empty(field("error")).or_else(|| {
                let messages: Vec<&str> = fields
                    .iter()
                    .filter(|(p, v)| p == "errors.message" && !v.is_empty())
                    .map(|(_, v)| v.as_str())
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            });
            RawOutcome {
                id: non_empty(field("id")),
                success: field("success").is_some_and(parse_boolean),
                created: field("created").is_some_and(parse_boolean),
                error,
            }
        })
        .collect())
}

/// Decode query results or a submitted batch payload into records.
///
/// XML `type` markers are skipped; nested relationship elements become
/// dotted field names (`Account.Name`).
pub fn decode_records(payload: &str, content_type: ContentType) -> Result<Vec<Record>> {
    if payload.trim() == NO_RECORDS_MESSAGE {
        return Ok(Vec::new());
    }

    match content_type {
        ContentType::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .from_reader(payload.as_bytes());
            let header = reader.headers()?.clone();

            reader
                .records()
                .map(|row| -> Result<Record> {
                    let row = row?;
                    Ok(header.iter().zip(row.iter()).collect())
                })
                .collect()
        }
        ContentType::Xml => Ok(flatten_xml(payload)?
            .into_iter()
            .map(|(_, fields)| {
                fields
                    .into_iter()
                    .filter(|(path, _)| path != "type" && !path.ends_with(".type"))
                    .collect()
            })
            .collect()),
    }
}

type Fields = Vec<(String, String)>;

/// Children of the root element, each flattened to `(path, text)` leaves.
fn flatten_xml(payload: &str) -> Result<Vec<(String, Fields)>> {
    struct Open {
        name: String,
        text: String,
        has_children: bool,
    }

    let mut reader = Reader::from_str(payload);
    let mut stack: Vec<Open> = Vec::new();
    let mut elements: Vec<(String, Fields)> = Vec::new();
    let mut saw_root = false;

    let leaf_path = |stack: &[Open], leaf: &str| {
        let mut path: Vec<&str> = stack
            .iter()
            .skip(2)
            .map(|open| open.name.as_str())
            .collect();
        path.push(leaf);
        path.join(".")
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.has_children = true;
                }
                if stack.len() == 1 {
                    elements.push((name.clone(), Vec::new()));
                }
                if stack.is_empty() {
                    if saw_root {
                        return Err(Error::malformed("XML payload has more than one root"));
                    }
                    saw_root = true;
                }
                stack.push(Open {
                    name,
                    text: String::new(),
                    has_children: false,
                });
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.has_children = true;
                }
                match stack.len() {
                    0 => saw_root = true,
                    1 => elements.push((name, Vec::new())),
                    _ => {
                        let path = leaf_path(&stack, &name);
                        if let Some((_, fields)) = elements.last_mut() {
                            fields.push((path, String::new()));
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let Some(open) = stack.last_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| Error::malformed(format!("Invalid XML text: {}", e)))?;
                    open.text.push_str(&text);
                }
            }
            Event::CData(t) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => {
                let Some(open) = stack.pop() else {
                    return Err(Error::malformed("Unbalanced XML end tag"));
                };
                if stack.len() >= 2 && !open.has_children {
                    let path = leaf_path(&stack, &open.name);
                    if let Some((_, fields)) = elements.last_mut() {
                        fields.push((path, open.text.trim().to_string()));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::malformed("XML payload has no root element"));
    }
    if !stack.is_empty() {
        return Err(Error::malformed("XML payload ended inside an element"));
    }
    Ok(elements)
}

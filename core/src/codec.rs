//! XML encoding and decoding for card payloads and MQL results.
//!
//! Typed documents go through quick-xml's serde support. MQL results have no
//! fixed schema, so they are read with the streaming `Reader` instead: every
//! child of a `<result>` becomes one column of that row.

use std::any::type_name;

use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::types::QueryRow;

const RESULTS_ELEMENT: &[u8] = b"results";
const RESULT_ELEMENT: &[u8] = b"result";

/// Serialize `value` to an XML document. The root element name comes from
/// the type's serde name.
pub fn encode<T: Serialize>(value: &T) -> Result<String, ApiError> {
    quick_xml::se::to_string(value).map_err(|e| ApiError::SerializationError {
        type_name: type_name::<T>(),
        reason: format!("{e:?}"),
    })
}

/// Deserialize an XML document into `T`. The root element name is not checked.
pub fn decode<T: DeserializeOwned>(xml: &str) -> Result<T, ApiError> {
    quick_xml::de::from_str(xml).map_err(|e| ApiError::DeserializationError {
        type_name: type_name::<T>(),
        reason: format!("{e} ({e:?})"),
    })
}

/// Stream-parse an `execute_mql` response into rows, in document order.
///
/// Column text is unescaped and CDATA sections are unwrapped. Markup nested
/// inside a column element is kept as raw text rather than being decoded
/// recursively.
pub fn decode_query_results(xml: &str) -> Result<Vec<QueryRow>, ApiError> {
    let mut reader = Reader::from_str(xml);
    let mut rows: Vec<QueryRow> = Vec::new();

    loop {
        match reader.read_event().map_err(query_error)? {
            Event::Start(element) => match element.local_name().as_ref() {
                RESULTS_ELEMENT => {}
                RESULT_ELEMENT => rows.push(QueryRow::new()),
                column => {
                    let column = String::from_utf8_lossy(column).into_owned();
                    let value = read_column(&mut reader, xml)?;
                    if let Some(row) = rows.last_mut() {
                        row.insert(column, value);
                    }
                }
            },
            Event::Empty(element) => match element.local_name().as_ref() {
                RESULTS_ELEMENT => {}
                RESULT_ELEMENT => rows.push(QueryRow::new()),
                column => {
                    if let Some(row) = rows.last_mut() {
                        row.insert(String::from_utf8_lossy(column).into_owned(), String::new());
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rows)
}

/// Read up to the end tag of the column element just opened.
fn read_column(reader: &mut Reader<&[u8]>, xml: &str) -> Result<String, ApiError> {
    let start = reader.buffer_position() as usize;
    let mut text = String::new();
    let mut nested = false;
    let mut depth = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event().map_err(query_error)? {
            Event::Text(t) => text.push_str(&t.unescape().map_err(query_error)?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::Start(_) => {
                nested = true;
                depth += 1;
            }
            Event::Empty(_) => nested = true,
            Event::End(_) if depth > 0 => depth -= 1,
            Event::End(_) => {
                if !nested {
                    return Ok(text);
                }
                let raw = xml.get(start..before).unwrap_or_default();
                return Ok(unescape(raw).map_err(query_error)?.into_owned());
            }
            Event::Eof => return Err(query_error("unexpected end of document inside a column")),
            _ => {}
        }
    }
}

fn query_error(err: impl std::fmt::Debug + std::fmt::Display) -> ApiError {
    ApiError::DeserializationError {
        type_name: type_name::<Vec<QueryRow>>(),
        reason: format!("{err} ({err:?})"),
    }
}

//! Conversion of CKAN package metadata into GCMD DIF 10.2 XML.
//!
//! EnviDat stores several structured fields (`author`, `maintainer`,
//! `publication`, `date`) as JSON encoded inside strings. They are decoded
//! leniently: anything that cannot be read is written as [`NOT_PROVIDED`].

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;
use serde_json::Value;
use thiserror::Error;

pub const NOT_PROVIDED: &str = "Not provided";

const DIF_NAMESPACE: &str = "http://gcmd.gsfc.nasa.gov/Aboutus/xml/dif/";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const DIF_SCHEMA_LOCATION: &str = "http://gcmd.gsfc.nasa.gov/Aboutus/xml/dif/ https://gcmd.earthdata.nasa.gov/Aboutus/xml/dif/dif_v10.2.xsd";

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("package metadata has no \"name\"")]
    MissingName,

    #[error("failed to write DIF XML: {0}")]
    Xml(String),
}

impl From<quick_xml::Error> for ConvertError {
    fn from(e: quick_xml::Error) -> Self {
        ConvertError::Xml(e.to_string())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Person {
    given_name: String,
    last_name: String,
    email: String,
}

impl Person {
    fn from_value(value: &Value) -> Option<Self> {
        let last_name = str_field(value, "name")?;
        Some(Person {
            given_name: str_field(value, "given_name").unwrap_or_default(),
            last_name,
            email: str_field(value, "email").unwrap_or_default(),
        })
    }

    fn citation_name(&self) -> String {
        match self.given_name.chars().next() {
            Some(initial) => format!("{}, {}.", self.last_name, initial),
            None => self.last_name.clone(),
        }
    }
}

/// Values stored as JSON strings are parsed; everything else is returned unchanged.
fn decode_embedded(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn or_not_provided(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_PROVIDED.to_string())
}

fn date_part(timestamp: &str) -> String {
    timestamp.get(..10).unwrap_or(timestamp).to_string()
}

fn authors(record: &Value) -> Vec<Person> {
    match record.get("author").map(decode_embedded) {
        Some(Value::Array(items)) => items.iter().filter_map(Person::from_value).collect(),
        Some(obj @ Value::Object(_)) => Person::from_value(&obj).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn maintainer(record: &Value) -> Option<Person> {
    record
        .get("maintainer")
        .map(decode_embedded)
        .as_ref()
        .and_then(Person::from_value)
}

/// First dated entry of the EnviDat `date` list as (start, optional end).
fn temporal_range(record: &Value) -> Option<(String, Option<String>)> {
    let dates = record.get("date").map(decode_embedded)?;
    let first = dates.as_array()?.iter().find(|d| str_field(d, "date").is_some())?;
    let start = str_field(first, "date")?;
    Some((start, str_field(first, "end_date")))
}

fn text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> quick_xml::Result<()> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn write_personnel<W: std::io::Write>(
    writer: &mut Writer<W>,
    role: &str,
    person: &Person,
) -> quick_xml::Result<()> {
    writer.create_element("Personnel").write_inner_content(|w| {
        text_element(w, "Role", role)?;
        w.create_element("Contact_Person").write_inner_content(|w| {
            if !person.given_name.is_empty() {
                text_element(w, "First_Name", &person.given_name)?;
            }
            text_element(w, "Last_Name", &person.last_name)?;
            if !person.email.is_empty() {
                text_element(w, "Email", &person.email)?;
            }
            Ok::<(), quick_xml::Error>(())
        })?;
        Ok::<(), quick_xml::Error>(())
    })?;
    Ok(())
}

fn write_related_url<W: std::io::Write>(
    writer: &mut Writer<W>,
    url_type: &str,
    url: &str,
    description: Option<&str>,
) -> quick_xml::Result<()> {
    writer.create_element("Related_URL").write_inner_content(|w| {
        w.create_element("URL_Content_Type")
            .write_inner_content(|w| text_element(w, "Type", url_type))?;
        text_element(w, "URL", url)?;
        if let Some(description) = description {
            text_element(w, "Description", description)?;
        }
        Ok::<(), quick_xml::Error>(())
    })?;
    Ok(())
}

/// Convert one `package_show` result into a DIF XML document.
///
/// `catalog_host` is used to build the dataset landing-page URL.
pub fn to_dif_xml(record: &Value, catalog_host: &str) -> Result<String, ConvertError> {
    let name = str_field(record, "name").ok_or(ConvertError::MissingName)?;
    let title = or_not_provided(str_field(record, "title"));
    let version = str_field(record, "version").unwrap_or_else(|| "1.0".to_string());
    let abstract_text = or_not_provided(str_field(record, "notes"));
    let landing_page = format!("{}/dataset/{}", catalog_host.trim_end_matches('/'), name);

    let publication = record
        .get("publication")
        .map(decode_embedded)
        .unwrap_or(Value::Null);
    let publisher = or_not_provided(str_field(&publication, "publisher"));
    let publication_year = or_not_provided(str_field(&publication, "publication_year"));
    let doi = str_field(record, "doi");

    let authors = authors(record);
    let maintainer = maintainer(record);
    let creators = if authors.is_empty() {
        NOT_PROVIDED.to_string()
    } else {
        authors
            .iter()
            .map(Person::citation_name)
            .collect::<Vec<_>>()
            .join("; ")
    };

    let tags: Vec<String> = record
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(|t| str_field(t, "name")).collect())
        .unwrap_or_default();

    let created = str_field(record, "metadata_created").map(|t| date_part(&t));
    let modified = str_field(record, "metadata_modified").map(|t| date_part(&t));

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer
        .create_element("DIF")
        .with_attribute(("xmlns", DIF_NAMESPACE))
        .with_attribute(("xmlns:xsi", XSI_NAMESPACE))
        .with_attribute(("xsi:schemaLocation", DIF_SCHEMA_LOCATION))
        .write_inner_content(|w| {
            w.create_element("Entry_ID").write_inner_content(|w| {
                text_element(w, "Short_Name", &name)?;
                text_element(w, "Version", &version)
            })?;
            text_element(w, "Entry_Title", &title)?;

            w.create_element("Dataset_Citation").write_inner_content(|w| {
                text_element(w, "Dataset_Creator", &creators)?;
                text_element(w, "Dataset_Title", &title)?;
                text_element(w, "Dataset_Release_Date", &publication_year)?;
                text_element(w, "Dataset_Publisher", &publisher)?;
                if let Some(doi) = &doi {
                    w.create_element("Persistent_Identifier").write_inner_content(|w| {
                        text_element(w, "Type", "DOI")?;
                        text_element(w, "Identifier", doi)
                    })?;
                }
                text_element(w, "Online_Resource", &landing_page)
            })?;

            if let Some(maintainer) = &maintainer {
                write_personnel(w, "TECHNICAL CONTACT", maintainer)?;
            }
            for author in &authors {
                write_personnel(w, "INVESTIGATOR", author)?;
            }

            w.create_element("Science_Keywords").write_inner_content(|w| {
                text_element(w, "Category", "EARTH SCIENCE")?;
                text_element(w, "Topic", NOT_PROVIDED)?;
                text_element(w, "Term", NOT_PROVIDED)
            })?;
            for tag in &tags {
                text_element(w, "Ancillary_Keyword", tag)?;
            }

            w.create_element("Platform").write_inner_content(|w| {
                text_element(w, "Type", NOT_PROVIDED)?;
                text_element(w, "Short_Name", NOT_PROVIDED)?;
                w.create_element("Instrument")
                    .write_inner_content(|w| text_element(w, "Short_Name", NOT_PROVIDED))?;
                Ok::<(), quick_xml::Error>(())
            })?;

            w.create_element("Temporal_Coverage").write_inner_content(|w| {
                match temporal_range(record) {
                    Some((start, Some(end))) => {
                        w.create_element("Range_DateTime").write_inner_content(|w| {
                            text_element(w, "Beginning_Date_Time", &start)?;
                            text_element(w, "Ending_Date_Time", &end)
                        })?;
                    }
                    Some((start, None)) => text_element(w, "Single_DateTime", &start)?,
                    None => text_element(
                        w,
                        "Single_DateTime",
                        created.as_deref().unwrap_or(NOT_PROVIDED),
                    )?,
                }
                Ok::<(), quick_xml::Error>(())
            })?;

            w.create_element("Spatial_Coverage").write_inner_content(|w| {
                text_element(w, "Granule_Spatial_Representation", "CARTESIAN")
            })?;

            w.create_element("Project")
                .write_inner_content(|w| text_element(w, "Short_Name", "EnviDat"))?;

            text_element(w, "Dataset_Language", "English")?;
            text_element(w, "Dataset_Progress", "COMPLETE")?;

            w.create_element("Summary")
                .write_inner_content(|w| text_element(w, "Abstract", &abstract_text))?;

            write_related_url(w, "DATA SET LANDING PAGE", &landing_page, None)?;
            if let Some(resources) = record.get("resources").and_then(Value::as_array) {
                for resource in resources {
                    if let Some(url) = str_field(resource, "url") {
                        let description =
                            str_field(resource, "description").or_else(|| str_field(resource, "name"));
                        write_related_url(w, "GET DATA", &url, description.as_deref())?;
                    }
                }
            }

            if let Some(license) = str_field(record, "license_title") {
                w.create_element("Use_Constraints")
                    .write_inner_content(|w| text_element(w, "License_Text", &license))?;
            }

            text_element(w, "Metadata_Name", "CEOS IDN DIF")?;
            text_element(w, "Metadata_Version", "VERSION 10.2")?;

            w.create_element("Metadata_Dates").write_inner_content(|w| {
                let created = created.as_deref().unwrap_or(NOT_PROVIDED);
                let modified = modified.as_deref().unwrap_or(created);
                text_element(w, "Metadata_Creation", created)?;
                text_element(w, "Metadata_Last_Revision", modified)?;
                text_element(w, "Data_Creation", created)?;
                text_element(w, "Data_Last_Revision", modified)
            })?;
            Ok::<(), quick_xml::Error>(())
        })?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(|e| ConvertError::Xml(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> Value {
        json!({
            "name": "snow-depth-davos",
            "title": "Snow depth & density, Davos",
            "notes": "Daily snow depth <measurements> at Davos.",
            "doi": "10.16904/envidat.42",
            "version": "2.0",
            "author": "[{\"name\": \"Muster\", \"given_name\": \"Anna\", \"email\": \"anna@wsl.ch\"}, {\"name\": \"Beispiel\", \"given_name\": \"Ben\"}]",
            "maintainer": "{\"name\": \"Muster\", \"given_name\": \"Anna\", \"email\": \"anna@wsl.ch\"}",
            "publication": "{\"publisher\": \"EnviDat\", \"publication_year\": \"2021\"}",
            "date": "[{\"date\": \"2015-01-01\", \"date_type\": \"collected\", \"end_date\": \"2020-12-31\"}]",
            "tags": [{"name": "SNOW"}, {"name": "DAVOS"}],
            "license_title": "Creative Commons Attribution (CC-BY)",
            "metadata_created": "2021-03-04T10:11:12.000000",
            "metadata_modified": "2022-05-06T07:08:09.000000",
            "resources": [
                {"url": "https://www.envidat.ch/data/snow.csv", "name": "snow.csv"}
            ]
        })
    }

    #[test]
    fn converts_core_fields() {
        let xml = to_dif_xml(&sample_record(), "https://www.envidat.ch/").unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Short_Name>snow-depth-davos</Short_Name>"));
        assert!(xml.contains("<Version>2.0</Version>"));
        assert!(xml.contains("<Entry_Title>Snow depth &amp; density, Davos</Entry_Title>"));
        assert!(xml.contains("<Abstract>Daily snow depth &lt;measurements&gt; at Davos.</Abstract>"));
        assert!(xml.contains("<Identifier>10.16904/envidat.42</Identifier>"));
        assert!(xml.contains("<Dataset_Creator>Muster, A.; Beispiel, B.</Dataset_Creator>"));
        assert!(xml.contains("<Dataset_Release_Date>2021</Dataset_Release_Date>"));
        assert!(xml.contains("<URL>https://www.envidat.ch/dataset/snow-depth-davos</URL>"));
        assert!(xml.contains("<URL>https://www.envidat.ch/data/snow.csv</URL>"));
        assert!(xml.contains("<Ancillary_Keyword>SNOW</Ancillary_Keyword>"));
        assert!(xml.contains("<Beginning_Date_Time>2015-01-01</Beginning_Date_Time>"));
        assert!(xml.contains("<Metadata_Last_Revision>2022-05-06</Metadata_Last_Revision>"));
    }

    #[test]
    fn personnel_lists_contact_then_investigators() {
        let xml = to_dif_xml(&sample_record(), "https://www.envidat.ch").unwrap();
        let contact = xml.find("TECHNICAL CONTACT").unwrap();
        let investigator = xml.find("INVESTIGATOR").unwrap();
        assert!(contact < investigator);
        assert_eq!(xml.matches("<Role>INVESTIGATOR</Role>").count(), 2);
    }

    #[test]
    fn sparse_record_uses_placeholders() {
        let xml = to_dif_xml(&json!({"name": "bare"}), "https://www.envidat.ch").unwrap();
        assert!(xml.contains("<Entry_Title>Not provided</Entry_Title>"));
        assert!(xml.contains("<Dataset_Creator>Not provided</Dataset_Creator>"));
        assert!(!xml.contains("Personnel"));
    }

    #[test]
    fn malformed_embedded_json_is_ignored() {
        let record = json!({"name": "broken", "author": "not json", "publication": "{"});
        let xml = to_dif_xml(&record, "https://www.envidat.ch").unwrap();
        assert!(xml.contains("<Dataset_Publisher>Not provided</Dataset_Publisher>"));
    }

    #[test]
    fn missing_name_is_an_error() {
        let err = to_dif_xml(&json!({"title": "No name"}), "https://www.envidat.ch").unwrap_err();
        assert!(matches!(err, ConvertError::MissingName));
    }
}

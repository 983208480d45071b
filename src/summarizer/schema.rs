//! Structured meeting-data model and its JSON schema.
//!
//! The schema is handed to the LLM runtime as a constrained-generation
//! `format`, and the same serde types validate whatever comes back. Every
//! string field is nullable and every array may be empty: absence of data
//! is always representable.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_decision_maker: Option<bool>,
    #[serde(default)]
    pub tenure_duration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aum: Option<String>,
    /// ICP classification, 1 or 2.
    #[serde(default)]
    pub icp_classification: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_client: Option<bool>,
    #[serde(default)]
    pub competitor_products: Vec<String>,
    #[serde(default)]
    pub strategies_of_interest: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    #[serde(default)]
    pub ticket_size: Option<String>,
    #[serde(default)]
    pub products_of_interest: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingData {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub deals: Vec<Deal>,
}

impl MeetingData {
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty() && self.companies.is_empty() && self.deals.is_empty()
    }

    /// Parse and validate an LLM response against the model. Null handling
    /// is lenient (missing fields default) but the top-level shape must be
    /// the three arrays.
    pub fn parse(json_text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_text)
    }
}

fn nullable_string() -> Value {
    json!({ "type": ["string", "null"] })
}

fn nullable_bool() -> Value {
    json!({ "type": ["boolean", "null"] })
}

fn string_array() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

/// JSON schema for `MeetingData`, built once per call site; used for
/// schema-constrained generation and embedded into the extraction prompt.
pub fn meeting_data_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "contacts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": nullable_string(),
                        "role": nullable_string(),
                        "location": nullable_string(),
                        "is_decision_maker": nullable_bool(),
                        "tenure_duration": nullable_string(),
                    }
                }
            },
            "companies": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": nullable_string(),
                        "aum": nullable_string(),
                        "icp_classification": { "type": ["integer", "null"], "enum": [1, 2, null] },
                        "location": nullable_string(),
                        "is_client": nullable_bool(),
                        "competitor_products": string_array(),
                        "strategies_of_interest": string_array(),
                    }
                }
            },
            "deals": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "ticket_size": nullable_string(),
                        "products_of_interest": string_array(),
                    }
                }
            }
        },
        "required": ["contacts", "companies", "deals"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_payload() {
        let text = r#"{
            "contacts": [{"name": "Dana Reyes", "role": "CIO", "is_decision_maker": true}],
            "companies": [{"name": "Northgate Capital", "aum": "$2.4B", "icp_classification": 1,
                           "competitor_products": ["XYZ Trend Fund"],
                           "strategies_of_interest": ["trend", "gold"]}],
            "deals": [{"ticket_size": "$25M", "products_of_interest": ["RSSB"]}]
        }"#;
        let data = MeetingData::parse(text).unwrap();
        assert_eq!(data.contacts[0].name.as_deref(), Some("Dana Reyes"));
        assert_eq!(data.companies[0].icp_classification, Some(1));
        assert_eq!(data.deals[0].products_of_interest, vec!["RSSB"]);
        assert!(!data.is_empty());
    }

    #[test]
    fn missing_fields_default() {
        let data = MeetingData::parse(r#"{"contacts": [{}], "companies": [], "deals": []}"#).unwrap();
        assert_eq!(data.contacts.len(), 1);
        assert!(data.contacts[0].name.is_none());
    }

    #[test]
    fn empty_object_is_empty_data() {
        let data = MeetingData::parse("{}").unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn garbage_fails_to_parse() {
        assert!(MeetingData::parse("not json").is_err());
        assert!(MeetingData::parse(r#"{"contacts": "nope"}"#).is_err());
    }

    #[test]
    fn schema_names_all_three_arrays() {
        let schema = meeting_data_schema();
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("contacts"));
        assert!(props.contains_key("companies"));
        assert!(props.contains_key("deals"));
    }
}

//! Domain types for the Mingle card API.
//!
//! # Design
//! `Card` mirrors the `<card>` resource. The fields a caller may send
//! (`name`, `description`, `card_type`) are plain values; the server-owned
//! identifiers (`id`, `number`, `version`) are `Option` so a card built for
//! creation never carries fabricated values, and they are only serialized
//! when set. The remaining attributes are read-only: decoded when the
//! server sends them, never written back.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Reference to a card type by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardType {
    pub name: String,
}

impl CardType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Project a card belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub identifier: String,
}

/// User named in `created_by` / `modified_by`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub login: String,
}

/// Current value of one card property, as listed under `<properties>`.
///
/// Plain properties carry their value as text. User, card and tree
/// properties carry a resource (`<value url=".."><name>..</name>..</value>`);
/// for those `value` holds the resource name and the other fields hold
/// whatever the server listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CardProperty {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_property_value")]
    pub value: PropertyValue,
}

/// Decoded `<value>` of a card property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyValue {
    /// Text of a plain value, or the `name` of a resource value (its
    /// `number` when it has no name).
    pub text: String,
    pub url: Option<String>,
    /// Set for user-valued properties.
    pub login: Option<String>,
    /// Set for card-valued properties.
    pub number: Option<String>,
}

/// A Mingle card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "card")]
pub struct Card {
    #[serde(default)]
    pub name: String,
    /// HTML rendered by Mingle for the card body.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub card_type: CardType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,

    #[serde(default, skip_serializing)]
    pub project: Option<ProjectRef>,
    /// Comma-delimited tag list.
    #[serde(default, skip_serializing)]
    pub tags: Option<String>,
    #[serde(default, skip_serializing)]
    pub project_card_rank: Option<u64>,
    #[serde(default, skip_serializing)]
    pub created_on: Option<String>,
    #[serde(default, skip_serializing)]
    pub modified_on: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_by: Option<UserRef>,
    #[serde(default, skip_serializing)]
    pub modified_by: Option<UserRef>,
    #[serde(
        default,
        skip_serializing,
        deserialize_with = "deserialize_properties"
    )]
    pub properties: Vec<CardProperty>,
}

impl Card {
    /// A card ready to be created: no server-assigned fields.
    pub fn new(name: impl Into<String>, card_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            card_type: CardType::new(card_type),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Value of the named property, if the server listed it.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.text.as_str())
    }
}

/// One row of an MQL result: column name to value.
///
/// Columns iterate in key order, not in the order the server listed them;
/// a column repeated within one `<result>` keeps its last value.
pub type QueryRow = BTreeMap<String, String>;

fn deserialize_properties<'de, D>(deserializer: D) -> Result<Vec<CardProperty>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Properties {
        #[serde(default)]
        property: Vec<CardProperty>,
    }

    Ok(Properties::deserialize(deserializer)?.property)
}

fn deserialize_property_value<'de, D>(deserializer: D) -> Result<PropertyValue, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(PropertyValueVisitor)
}

struct PropertyValueVisitor;

impl<'de> Visitor<'de> for PropertyValueVisitor {
    type Value = PropertyValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a property value as text or as a resource element")
    }

    fn visit_str<E: serde::de::Error>(self, text: &str) -> Result<Self::Value, E> {
        Ok(PropertyValue {
            text: text.to_string(),
            ..PropertyValue::default()
        })
    }

    fn visit_string<E: serde::de::Error>(self, text: String) -> Result<Self::Value, E> {
        Ok(PropertyValue {
            text,
            ..PropertyValue::default()
        })
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(PropertyValue::default())
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(PropertyValue::default())
    }

    // Element form: attributes arrive as `@name` keys, text as `$text`.
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut value = PropertyValue::default();
        let mut text = None;
        let mut name = None;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "$text" => text = Some(map.next_value::<String>()?),
                "name" => name = Some(map.next_value::<String>()?),
                "login" => value.login = Some(map.next_value::<String>()?),
                "number" => value.number = Some(map.next_value::<String>()?),
                "@url" => value.url = Some(map.next_value::<String>()?),
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        value.text = name.or(text).or_else(|| value.number.clone()).unwrap_or_default();
        Ok(value)
    }
}

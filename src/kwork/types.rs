// src/kwork/types.rs
use serde::{Deserialize, Deserializer, Serialize};

/// One element of `stateData.wantsListData.wants`, as Kwork embeds it in the
/// listing page. The shape is provider-controlled and only partially trusted:
/// every field is optional and numeric fields sometimes arrive as strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub price_limit: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub possible_price_limit: Option<String>,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub time_left: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    #[serde(default)]
    pub username: Option<String>,
}

/// Canonical project record, fully derived from a [`RawListing`] at
/// normalization time. Two projects with the same `id` are the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub poster_name: String,
    pub time_remaining: String,
    pub url: String,
}

/// Accept `"123"`, `123` and `12.5` alike; everything becomes a string.
fn string_or_number<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        S(String),
        I(i64),
        F(f64),
    }

    Ok(Option::<Raw>::deserialize(de)?.map(|v| match v {
        Raw::S(s) => s,
        Raw::I(n) => n.to_string(),
        Raw::F(n) => n.to_string(),
    }))
}

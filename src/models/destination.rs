use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Mountains,
    Wildlife,
    Heritage,
    Lakes,
    Adventure,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Mountains => "Mountains",
            Category::Wildlife => "Wildlife",
            Category::Heritage => "Heritage",
            Category::Lakes => "Lakes",
            Category::Adventure => "Adventure",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Mountains" => Some(Category::Mountains),
            "Wildlife" => Some(Category::Wildlife),
            "Heritage" => Some(Category::Heritage),
            "Lakes" => Some(Category::Lakes),
            "Adventure" => Some(Category::Adventure),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub user: ObjectId,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub place_name: String,
    pub location: String,
    pub photos: Vec<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    pub information: String,
    pub category: Category,
    pub created_by: ObjectId,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewInput {
    pub rating: i64,
    pub comment: String,
}

/// One entry of the highest-rated reviews list.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopReview {
    pub destination_name: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub user: ReviewerProfile,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReviewerProfile {
    pub name: String,
}

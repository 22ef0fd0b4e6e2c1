use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryDay {
    pub day: u32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub activity_photos: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub package_name: String,
    pub price: f64,
    pub duration: String,
    pub description: String,
    pub destinations: Vec<ObjectId>,
    #[serde(default)]
    pub itinerary: Vec<ItineraryDay>,
    pub photos: Vec<String>,
    pub created_by: ObjectId,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

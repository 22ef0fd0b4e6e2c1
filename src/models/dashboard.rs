use mongodb::bson::{Bson, Document};
use serde::Serialize;

#[derive(Debug, Serialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_number_of_people: i64,
    pub total_bookings: i64,
    pub total_revenue: f64,
    pub canceled_bookings: i64,
    pub total_users: u64,
    pub total_destinations: u64,
    pub total_packages: u64,
    pub total_messages: u64,
}

/// Booking-derived figures produced by the dashboard `$facet` stage.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BookingFigures {
    pub total_number_of_people: i64,
    pub total_bookings: i64,
    pub total_revenue: f64,
    pub canceled_bookings: i64,
}

impl BookingFigures {
    /// Reads the single document emitted by `$facet`. Each facet is an array
    /// holding at most one `{ total }` document; an empty array means zero.
    pub fn from_facet(doc: &Document) -> Self {
        BookingFigures {
            total_number_of_people: facet_number(doc, "totalNumberOfPeople") as i64,
            total_bookings: facet_number(doc, "totalBookings") as i64,
            total_revenue: facet_number(doc, "totalRevenue"),
            canceled_bookings: facet_number(doc, "canceledBookings") as i64,
        }
    }
}

fn facet_number(doc: &Document, facet: &str) -> f64 {
    doc.get_array(facet)
        .ok()
        .and_then(|entries| entries.first())
        .and_then(Bson::as_document)
        .and_then(|entry| entry.get("total"))
        .map(bson_number)
        .unwrap_or(0.0)
}

fn bson_number(value: &Bson) -> f64 {
    match value {
        Bson::Int32(n) => *n as f64,
        Bson::Int64(n) => *n as f64,
        Bson::Double(n) => *n,
        _ => 0.0,
    }
}

use std::collections::{HashMap, HashSet};

use mongodb::bson::oid::ObjectId;

use crate::error::{AppError, AppResult};
use crate::models::destination::{Destination, ReviewInput, ReviewerProfile, TopReview};

pub const TOP_REVIEWS: usize = 4;

/// Checks a submitted review and returns the rating and trimmed comment.
pub fn validate_review(input: &ReviewInput) -> AppResult<(u8, String)> {
    if !(1..=5).contains(&input.rating) {
        return Err(AppError::bad_request("Rating must be between 1 and 5"));
    }
    let comment = input.comment.trim();
    if comment.is_empty() {
        return Err(AppError::bad_request("Comment is required"));
    }
    Ok((input.rating as u8, comment.to_string()))
}

/// Every user referenced by a review, without duplicates.
pub fn reviewer_ids(destinations: &[Destination]) -> Vec<ObjectId> {
    let mut seen = HashSet::new();
    destinations
        .iter()
        .flat_map(|d| d.reviews.iter().map(|r| r.user))
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Flattens all reviews, orders them by rating then recency (both
/// descending) and keeps the first `limit`. Reviews by users that no longer
/// exist are skipped.
pub fn rank_reviews(
    destinations: &[Destination],
    reviewers: &HashMap<ObjectId, String>,
    limit: usize,
) -> Vec<TopReview> {
    let mut reviews: Vec<TopReview> = destinations
        .iter()
        .flat_map(|destination| {
            destination.reviews.iter().filter_map(move |review| {
                reviewers.get(&review.user).map(|name| TopReview {
                    destination_name: destination.place_name.clone(),
                    rating: review.rating,
                    comment: review.comment.clone(),
                    created_at: review.created_at,
                    user: ReviewerProfile { name: name.clone() },
                })
            })
        })
        .collect();

    reviews.sort_by(|a, b| {
        b.rating
            .cmp(&a.rating)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    reviews.truncate(limit);
    reviews
}

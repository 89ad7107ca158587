use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Client, Collection, IndexModel,
};

use crate::error::ApiError;
use crate::schemas::{Expense, Trip, UserId};

const TRIPS: &str = "Trips";
const DUPLICATE_KEY: i32 = 11000;

/// The trips collection. Each trip is one document holding its expenses.
#[derive(Clone)]
pub struct TripStore {
    trips: Collection<Trip>,
}

impl TripStore {
    pub fn new(client: &Client, database: &str) -> Self {
        Self {
            trips: client.database(database).collection(TRIPS),
        }
    }

    /// Makes trip ids unique so concurrent creates can't both succeed, and
    /// indexes membership for the per-member trip listing.
    pub async fn ensure_indexes(&self) -> Result<(), ApiError> {
        let index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.trips.create_index(index, None).await?;
        let members = IndexModel::builder().keys(doc! { "members": 1 }).build();
        self.trips.create_index(members, None).await?;
        Ok(())
    }

    pub async fn insert_trip(&self, trip: Trip) -> Result<(), ApiError> {
        let id = trip.id.clone();
        match self.trips.insert_one(trip, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(ApiError::Conflict(id)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_trip(&self, id: &str) -> Result<Trip, ApiError> {
        self.trips
            .find_one(doc! { "id": id }, None)
            .await?
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    /// Every trip `user_id` is a member of, oldest first.
    pub async fn find_trips_for_member(&self, user_id: &str) -> Result<Vec<Trip>, ApiError> {
        let options = FindOptions::builder().sort(doc! { "createdAt": 1 }).build();
        let trips = self
            .trips
            .find(doc! { "members": user_id }, options)
            .await?
            .try_collect()
            .await?;
        Ok(trips)
    }

    pub async fn push_expense(&self, id: &str, expense: &Expense) -> Result<(), ApiError> {
        let expense = bson::to_bson(expense)?;
        let result = self
            .trips
            .update_one(
                doc! { "id": id },
                doc! { "$push": { "expenses": expense } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub async fn add_member(&self, id: &str, user_id: &UserId) -> Result<(), ApiError> {
        let result = self
            .trips
            .update_one(
                doc! { "id": id },
                doc! { "$addToSet": { "members": user_id } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

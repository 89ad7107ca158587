use actix_web::{get, post, put, web, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::balance::{aggregate, compute_balance_from_trip, AggregationPolicy};
use crate::error::ApiError;
use crate::schemas::{Expense, Trip, UserId};
use crate::settlement::get_transfers_from_trip;
use crate::store::TripStore;
use crate::summary::summarize;

pub struct AppState {
    pub store: TripStore,
    pub policy: AggregationPolicy,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewTripJson {
    name: String,
    currency: String,
    description: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    created_by: Option<UserId>,
    #[serde(default)]
    members: Vec<UserId>,
}

impl NewTripJson {
    // The creator is always the first member.
    fn into_trip(self, id: String, now: DateTime<Utc>) -> Trip {
        let mut members = self.members;
        if let Some(creator) = &self.created_by {
            members.retain(|member| member != creator);
            members.insert(0, creator.clone());
        }
        Trip {
            id,
            name: self.name,
            description: self.description,
            currency: self.currency,
            start_date: self.start_date,
            end_date: self.end_date,
            created_by: self.created_by,
            created_at: Some(now),
            members,
            expenses: vec![],
        }
    }
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMemberJson {
    user_id: UserId,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(add_trip)
        .service(get_trip)
        .service(get_member_trips)
        .service(add_member)
        .service(add_expense)
        .service(get_balance)
        .service(get_settlements)
        .service(get_summary);
}

#[put("/trips/{id}")]
async fn add_trip(
    state: web::Data<AppState>,
    id: web::Path<String>,
    json: web::Json<NewTripJson>,
) -> Result<HttpResponse, ApiError> {
    let trip = json.into_inner().into_trip(id.into_inner(), Utc::now());
    let trip_id = trip.id.clone();
    state.store.insert_trip(trip).await?;
    tracing::info!(trip = %trip_id, "trip added");
    Ok(HttpResponse::Ok().body("Trip added"))
}

#[get("/trips/{id}")]
async fn get_trip(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let trip = state.store.find_trip(&id).await?;
    Ok(HttpResponse::Ok().json(trip))
}

#[get("/members/{user_id}/trips")]
async fn get_member_trips(
    state: web::Data<AppState>,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, ApiError> {
    let trips = state.store.find_trips_for_member(&user_id).await?;
    tracing::debug!(member = %user_id, trips = trips.len(), "member trips fetched");
    Ok(HttpResponse::Ok().json(trips))
}

#[post("/trips/{id}/members")]
async fn add_member(
    state: web::Data<AppState>,
    id: web::Path<String>,
    json: web::Json<NewMemberJson>,
) -> Result<HttpResponse, ApiError> {
    state.store.add_member(&id, &json.user_id).await?;
    tracing::info!(trip = %id, member = %json.user_id, "member added");
    Ok(HttpResponse::Ok().body("Member added"))
}

#[post("/trips/{id}/expenses")]
async fn add_expense(
    state: web::Data<AppState>,
    id: web::Path<String>,
    expense: web::Json<Expense>,
) -> Result<HttpResponse, ApiError> {
    let mut expense = expense.into_inner();
    aggregate(std::slice::from_ref(&expense), state.policy)?;
    expense.date = Some(Utc::now());

    state.store.push_expense(&id, &expense).await?;
    tracing::info!(trip = %id, "expense added");
    Ok(HttpResponse::Ok().body("Expense added"))
}

#[get("/trips/{id}/balance")]
async fn get_balance(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let trip = state.store.find_trip(&id).await?;
    Ok(HttpResponse::Ok().json(compute_balance_from_trip(&trip, state.policy)?))
}

#[get("/trips/{id}/settlements")]
async fn get_settlements(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let trip = state.store.find_trip(&id).await?;
    let transfers = get_transfers_from_trip(&trip, state.policy)?;
    tracing::debug!(trip = %id, transfers = transfers.len(), "settlements computed");
    Ok(HttpResponse::Ok().json(transfers))
}

#[get("/trips/{id}/summary")]
async fn get_summary(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let trip = state.store.find_trip(&id).await?;
    Ok(HttpResponse::Ok().json(summarize(&trip, state.policy)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use mongodb::Client;
    use serde_json::json;

    // The client connects lazily, so requests rejected before the store
    // is touched never need a running database.
    async fn state() -> web::Data<AppState> {
        let client = Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap();
        web::Data::new(AppState {
            store: TripStore::new(&client, "TripSplitTest"),
            policy: AggregationPolicy::default(),
        })
    }

    #[actix_web::test]
    async fn invalid_expense_is_rejected_before_storage() {
        let app = test::init_service(App::new().app_data(state().await).configure(configure)).await;

        let request = test::TestRequest::post()
            .uri("/trips/lisbon/expenses")
            .set_json(json!({
                "description": "Dinner",
                "amount": 30,
                "paidBy": "alice",
                "splitBetween": [
                    { "userId": "alice", "amount": 10 },
                    { "userId": "bob", "amount": 10 }
                ]
            }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: serde_json::Value = test::read_body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("shares sum to 20 but the expense amount is 30"));
    }

    #[::core::prelude::v1::test]
    fn new_trip_puts_creator_first_and_stamps_creation() {
        let json: NewTripJson = serde_json::from_value(json!({
            "name": "Lisbon",
            "currency": "EUR",
            "startDate": "2026-05-01",
            "createdBy": "alice",
            "members": ["bob", "alice"]
        }))
        .unwrap();
        let now = Utc::now();
        let trip = json.into_trip("lisbon".to_string(), now);

        assert_eq!(trip.members, ["alice", "bob"]);
        assert_eq!(trip.created_by.as_deref(), Some("alice"));
        assert_eq!(trip.created_at, Some(now));
        assert_eq!(trip.start_date, NaiveDate::from_ymd_opt(2026, 5, 1));
        assert_eq!(trip.end_date, None);
        assert!(trip.expenses.is_empty());
    }

    #[actix_web::test]
    async fn negative_amount_is_rejected() {
        let app = test::init_service(App::new().app_data(state().await).configure(configure)).await;

        let request = test::TestRequest::post()
            .uri("/trips/lisbon/expenses")
            .set_json(json!({
                "description": "Refund",
                "amount": -5,
                "paidBy": "alice",
                "splitBetween": [{ "userId": "bob", "amount": 5 }]
            }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}

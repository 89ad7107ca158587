//! End-of-trip report figures: totals, per-category and per-member
//! breakdowns, and the settlement that closes the trip.
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::balance::{
    compute_balance_from_trip, round_to_2_decimals, split_remainder, AggregationPolicy,
    UnassignedExpense,
};
use crate::error::InvalidExpenseError;
use crate::schemas::{Expense, Trip, UserId};
use crate::settlement::{compute_transfers, Transfer};

pub const UNCATEGORIZED: &str = "uncategorized";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub count: usize,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub user_id: UserId,
    pub total_paid: Decimal,
    pub total_owed: Decimal,
    pub balance: Decimal,
    pub expense_count: usize,
}

impl MemberSummary {
    fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            total_paid: Decimal::ZERO,
            total_owed: Decimal::ZERO,
            balance: Decimal::ZERO,
            expense_count: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub trip_id: String,
    pub name: String,
    pub currency: String,
    pub total_amount: Decimal,
    pub expense_count: usize,
    pub member_count: usize,
    pub average_per_member: Decimal,
    pub by_category: IndexMap<String, CategoryTotal>,
    pub largest_expense: Option<Expense>,
    pub members: Vec<MemberSummary>,
    pub settlements: Vec<Transfer>,
}

pub fn summarize(trip: &Trip, policy: AggregationPolicy) -> Result<TripSummary, InvalidExpenseError> {
    let balances = compute_balance_from_trip(trip, policy)?;

    let mut members: IndexMap<UserId, MemberSummary> = trip
        .members
        .iter()
        .map(|id| (id.clone(), MemberSummary::new(id.clone())))
        .collect();
    let mut by_category: IndexMap<String, CategoryTotal> = IndexMap::new();
    let mut largest_expense: Option<&Expense> = None;
    let mut total_amount = Decimal::ZERO;

    for expense in &trip.expenses {
        total_amount += expense.amount;

        let category = expense.category.as_deref().unwrap_or(UNCATEGORIZED);
        let entry = by_category.entry(category.to_string()).or_default();
        entry.count += 1;
        entry.total += expense.amount;

        if largest_expense.map_or(true, |largest| expense.amount > largest.amount) {
            largest_expense = Some(expense);
        }

        let payer = members
            .entry(expense.paid_by.clone())
            .or_insert_with(|| MemberSummary::new(expense.paid_by.clone()));
        payer.total_paid += expense.amount;
        payer.expense_count += 1;
        if expense.split_between.is_empty() && policy.unassigned == UnassignedExpense::SelfSplit {
            payer.total_owed += expense.amount;
        }
        payer.total_owed += split_remainder(expense, policy);

        for share in &expense.split_between {
            members
                .entry(share.user_id.clone())
                .or_insert_with(|| MemberSummary::new(share.user_id.clone()))
                .total_owed += share.amount;
        }
    }

    for member in members.values_mut() {
        member.total_paid = round_to_2_decimals(member.total_paid);
        member.total_owed = round_to_2_decimals(member.total_owed);
        member.balance = balances.get(&member.user_id).copied().unwrap_or_default();
    }
    for category in by_category.values_mut() {
        category.total = round_to_2_decimals(category.total);
    }

    let member_count = trip.members.len();
    let average_per_member = if member_count == 0 {
        Decimal::ZERO
    } else {
        round_to_2_decimals(total_amount / Decimal::from(member_count))
    };

    Ok(TripSummary {
        trip_id: trip.id.clone(),
        name: trip.name.clone(),
        currency: trip.currency.clone(),
        total_amount: round_to_2_decimals(total_amount),
        expense_count: trip.expenses.len(),
        member_count,
        average_per_member,
        by_category,
        largest_expense: largest_expense.cloned(),
        members: members.into_values().collect(),
        settlements: compute_transfers(&balances),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::Share;
    use rust_decimal_macros::dec;

    fn expense(
        description: &str,
        payer: &str,
        amount: Decimal,
        category: Option<&str>,
        shares: &[(&str, Decimal)],
    ) -> Expense {
        Expense {
            description: description.to_string(),
            amount,
            paid_by: payer.to_string(),
            split_between: shares
                .iter()
                .map(|(user_id, amount)| Share {
                    user_id: user_id.to_string(),
                    amount: *amount,
                })
                .collect(),
            category: category.map(str::to_string),
            notes: None,
            date: None,
        }
    }

    fn trip() -> Trip {
        Trip {
            id: "lisbon".to_string(),
            name: "Lisbon".to_string(),
            description: None,
            currency: "EUR".to_string(),
            start_date: None,
            end_date: None,
            created_by: None,
            created_at: None,
            members: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            expenses: vec![
                expense(
                    "Dinner",
                    "a",
                    dec!(60),
                    Some("food"),
                    &[("a", dec!(20)), ("b", dec!(20)), ("c", dec!(20))],
                ),
                expense("Taxi", "b", dec!(15), None, &[("a", dec!(7.5)), ("b", dec!(7.5))]),
                expense(
                    "Lunch",
                    "c",
                    dec!(60),
                    Some("food"),
                    &[("b", dec!(30)), ("c", dec!(30))],
                ),
            ],
        }
    }

    #[test]
    fn totals_and_breakdowns() {
        let summary = summarize(&trip(), AggregationPolicy::default()).unwrap();
        assert_eq!(summary.total_amount, dec!(135));
        assert_eq!(summary.expense_count, 3);
        assert_eq!(summary.member_count, 3);
        assert_eq!(summary.average_per_member, dec!(45));
        assert_eq!(
            summary.by_category["food"],
            CategoryTotal {
                count: 2,
                total: dec!(120)
            }
        );
        assert_eq!(summary.by_category[UNCATEGORIZED].count, 1);
        assert_eq!(
            summary.largest_expense.map(|e| e.description),
            Some("Dinner".to_string())
        );
    }

    #[test]
    fn per_member_figures_match_balances() {
        let summary = summarize(&trip(), AggregationPolicy::default()).unwrap();
        let b = summary
            .members
            .iter()
            .find(|m| m.user_id == "b")
            .unwrap();
        assert_eq!(b.total_paid, dec!(15));
        assert_eq!(b.total_owed, dec!(57.5));
        assert_eq!(b.balance, dec!(-42.5));
        assert_eq!(b.expense_count, 1);

        for member in &summary.members {
            assert_eq!(member.balance, member.total_paid - member.total_owed);
        }
    }

    #[test]
    fn settlements_close_the_trip() {
        let summary = summarize(&trip(), AggregationPolicy::default()).unwrap();
        let received: Decimal = summary
            .settlements
            .iter()
            .filter(|t| t.to_user_id == "a")
            .map(|t| t.amount)
            .sum();
        let paid: Decimal = summary
            .settlements
            .iter()
            .filter(|t| t.from_user_id == "a")
            .map(|t| t.amount)
            .sum();
        assert_eq!(received - paid, dec!(32.5));
    }

    #[test]
    fn summary_json_shape() {
        let summary = summarize(&trip(), AggregationPolicy::default()).unwrap();
        let value = serde_json::to_value(&summary).unwrap();

        assert_eq!(value["tripId"], "lisbon");
        assert_eq!(value["totalAmount"], 135.0);
        assert_eq!(value["averagePerMember"], 45.0);
        assert_eq!(value["byCategory"]["food"]["count"], 2);
        assert_eq!(value["largestExpense"]["paidBy"], "a");
        assert_eq!(value["members"][1]["userId"], "b");
        assert_eq!(value["members"][1]["totalOwed"], 57.5);
        assert_eq!(value["settlements"][0]["fromUserId"], "b");
        assert_eq!(value["settlements"][0]["toUserId"], "a");
        assert_eq!(value["settlements"][0]["amount"], 32.5);
    }

    #[test]
    fn empty_trip_has_zero_average() {
        let trip = Trip {
            members: vec![],
            expenses: vec![],
            ..trip()
        };
        let summary = summarize(&trip, AggregationPolicy::default()).unwrap();
        assert_eq!(summary.average_per_member, Decimal::ZERO);
        assert!(summary.largest_expense.is_none());
        assert!(summary.members.is_empty());
        assert!(summary.settlements.is_empty());
    }
}

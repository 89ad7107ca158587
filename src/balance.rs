//! Folds a trip's expenses into one net balance per participant.
//!
//! Positive balances are owed money, negative balances owe money. The map
//! keeps users in order of first appearance (the payer of an expense
//! before its share-holders), which the settlement matcher relies on to
//! break ties between equal amounts.
use std::collections::HashSet;

use indexmap::IndexMap;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

use crate::error::{InvalidExpenseError, InvalidExpenseReason};
use crate::schemas::{Expense, Trip, UserId};

pub type Balances = IndexMap<UserId, Decimal>;

/// One minor currency unit. Anything closer to zero than this is settled.
pub const SETTLED_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// What to do with an expense nobody was assigned a share of.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedExpense {
    /// The payer owns the whole expense, so it nets to zero.
    #[default]
    SelfSplit,
    /// The payer is credited and nobody is debited.
    CreditPayer,
    Reject,
}

/// What to do when the shares don't add up to the expense amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareMismatch {
    #[default]
    Reject,
    Ignore,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AggregationPolicy {
    pub unassigned: UnassignedExpense,
    pub share_mismatch: ShareMismatch,
}

pub fn round_to_2_decimals(n: Decimal) -> Decimal {
    n.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn aggregate(
    expenses: &[Expense],
    policy: AggregationPolicy,
) -> Result<Balances, InvalidExpenseError> {
    let mut balances = Balances::new();

    for (index, expense) in expenses.iter().enumerate() {
        check_expense(expense, policy).map_err(|reason| InvalidExpenseError {
            index,
            expense: expense.clone(),
            reason,
        })?;

        *balances.entry(expense.paid_by.clone()).or_default() += expense.amount;

        if expense.split_between.is_empty() {
            if policy.unassigned == UnassignedExpense::SelfSplit {
                *balances.entry(expense.paid_by.clone()).or_default() -= expense.amount;
            }
            continue;
        }

        for share in &expense.split_between {
            if share.amount.is_zero() {
                continue;
            }
            *balances.entry(share.user_id.clone()).or_default() -= share.amount;
        }

        let remainder = split_remainder(expense, policy);
        if !remainder.is_zero() {
            *balances.entry(expense.paid_by.clone()).or_default() -= remainder;
        }
    }

    for balance in balances.values_mut() {
        *balance = round_to_2_decimals(*balance);
    }

    tracing::debug!(
        expenses = expenses.len(),
        participants = balances.len(),
        "aggregated balances"
    );
    Ok(balances)
}

pub fn compute_balance_from_trip(
    trip: &Trip,
    policy: AggregationPolicy,
) -> Result<Balances, InvalidExpenseError> {
    aggregate(&trip.expenses, policy)
}

/// The part of an accepted expense its shares leave uncovered, owed by the
/// payer so the expense still nets to zero. Always zero under
/// [`ShareMismatch::Ignore`] or when nobody holds a share.
pub fn split_remainder(expense: &Expense, policy: AggregationPolicy) -> Decimal {
    if expense.split_between.is_empty() || policy.share_mismatch == ShareMismatch::Ignore {
        return Decimal::ZERO;
    }
    let covered: Decimal = expense.split_between.iter().map(|share| share.amount).sum();
    expense.amount - covered
}

fn check_expense(expense: &Expense, policy: AggregationPolicy) -> Result<(), InvalidExpenseReason> {
    if expense.amount <= Decimal::ZERO {
        return Err(InvalidExpenseReason::NonPositiveAmount(expense.amount));
    }
    if expense.paid_by.is_empty() {
        return Err(InvalidExpenseReason::EmptyUserId);
    }

    let mut seen = HashSet::new();
    for share in &expense.split_between {
        if share.user_id.is_empty() {
            return Err(InvalidExpenseReason::EmptyUserId);
        }
        if share.amount < Decimal::ZERO {
            return Err(InvalidExpenseReason::NegativeShare {
                user_id: share.user_id.clone(),
                amount: share.amount,
            });
        }
        if !seen.insert(share.user_id.as_str()) {
            return Err(InvalidExpenseReason::DuplicateShare(share.user_id.clone()));
        }
    }

    if expense.split_between.is_empty() {
        if policy.unassigned == UnassignedExpense::Reject {
            return Err(InvalidExpenseReason::UnassignedShares);
        }
        return Ok(());
    }

    if policy.share_mismatch == ShareMismatch::Reject {
        let actual: Decimal = expense.split_between.iter().map(|share| share.amount).sum();
        if (actual - expense.amount).abs() > SETTLED_TOLERANCE {
            return Err(InvalidExpenseReason::ShareMismatch {
                expected: expense.amount,
                actual,
            });
        }
    }
    Ok(())
}

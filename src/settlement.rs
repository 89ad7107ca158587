//! Turns net balances into a short list of transfers that settles a trip.
//!
//! The largest debtor is paired with the largest creditor until one of them
//! is square, then the walk moves on. This is the usual greedy debt
//! simplification: it needs at most `n - 1` transfers for `n` unsettled
//! participants but is not guaranteed to find the fewest possible.
use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::balance::{
    compute_balance_from_trip, round_to_2_decimals, AggregationPolicy, Balances,
    SETTLED_TOLERANCE,
};
use crate::error::InvalidExpenseError;
use crate::schemas::{Trip, UserId};

#[derive(Clone, Debug)]
pub struct PersonalBalance {
    pub id: UserId,
    pub balance: Decimal,
}

/// A recommended payment from one member to another.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Decimal,
}

/// A [`Transfer`] with both ends resolved to display names.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelledTransfer {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
}

pub fn compute_transfers(balances: &Balances) -> Vec<Transfer> {
    // Divide people into debtors and creditors, dropping anyone already square
    let mut debtors = Vec::new();
    let mut creditors = Vec::new();

    for (id, &balance) in balances {
        let person = PersonalBalance {
            id: id.clone(),
            balance: balance.abs(),
        };
        if balance < -SETTLED_TOLERANCE {
            debtors.push(person);
        } else if balance > SETTLED_TOLERANCE {
            creditors.push(person);
        }
    }

    let transfers = get_simplified_transfers(debtors, creditors);
    tracing::debug!(transfers = transfers.len(), "computed settlement");
    transfers
}

// Both lists hold positive amounts still to be paid or received.
fn get_simplified_transfers(
    mut debtors: Vec<PersonalBalance>,
    mut creditors: Vec<PersonalBalance>,
) -> Vec<Transfer> {
    // Stable sorts, so equal amounts keep the order of the balance map
    debtors.sort_by(|a, b| b.balance.cmp(&a.balance));
    creditors.sort_by(|a, b| b.balance.cmp(&a.balance));

    let mut transfers = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < debtors.len() && j < creditors.len() {
        let debtor = &mut debtors[i];
        let creditor = &mut creditors[j];
        let settle_amount = debtor.balance.min(creditor.balance);

        let amount = round_to_2_decimals(settle_amount);
        if amount > Decimal::ZERO {
            transfers.push(Transfer {
                from_user_id: debtor.id.clone(),
                to_user_id: creditor.id.clone(),
                amount,
            });
        }

        debtor.balance -= settle_amount;
        creditor.balance -= settle_amount;

        if debtor.balance < SETTLED_TOLERANCE {
            i += 1;
        }
        if creditor.balance < SETTLED_TOLERANCE {
            j += 1;
        }
    }

    transfers
}

pub fn get_transfers_from_trip(
    trip: &Trip,
    policy: AggregationPolicy,
) -> Result<Vec<Transfer>, InvalidExpenseError> {
    let balances = compute_balance_from_trip(trip, policy)?;
    Ok(compute_transfers(&balances))
}

/// Replaces user ids with display names, keeping the id when no name is known.
pub fn label_transfers(
    transfers: &[Transfer],
    names: &HashMap<UserId, String>,
) -> Vec<LabelledTransfer> {
    let name_of = |id: &UserId| names.get(id).unwrap_or(id).clone();
    transfers
        .iter()
        .map(|transfer| LabelledTransfer {
            from: name_of(&transfer.from_user_id),
            to: name_of(&transfer.to_user_id),
            amount: transfer.amount,
        })
        .collect()
}

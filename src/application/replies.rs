//! Fixed chat replies and the draft summary.

use std::fmt::Write;

use crate::domain::order::{OrderLineInput, PickupInfo};
use crate::domain::pricing;

pub const OFF_TOPIC: &str =
    "Sorry, we cannot help you with that, our goal is to take orders and deliveries.";

pub const CANCELLED: &str =
    "Your order has been cancelled. If you need anything else, just let me know.";

pub const DRAFT_DISCARDED: &str = "Your previous unconfirmed order was discarded.";

pub const ORDER_TOO_LARGE: &str = "The total of this order is too large to process.";

pub fn unavailable(name: &str) -> String {
    format!("That product \"{}\" is not available at the moment.", name)
}

pub fn quantity_too_large(name: &str) -> String {
    format!("The requested quantity of \"{}\" is too large.", name)
}

pub fn confirmed(pickup: &PickupInfo) -> String {
    format!(
        "Your order has been confirmed! We'll see you at {} at {}.",
        pickup.time, pickup.location
    )
}

pub fn with_discard_notice(reply: &str) -> String {
    format!("{}\n\n{}", DRAFT_DISCARDED, reply)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub subtotal: i64,
}

/// What a freshly drafted order looks like to the customer. Carries no
/// transport fee: that is only known at confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSummary {
    pub lines: Vec<SummaryLine>,
    pub subtotal: i64,
    pub currency: String,
}

impl DraftSummary {
    /// `None` when any amount overflows.
    pub fn from_lines(lines: &[OrderLineInput], currency: &str) -> Option<Self> {
        let lines = lines
            .iter()
            .map(|l| {
                Some(SummaryLine {
                    name: l.item_name.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    subtotal: pricing::line_subtotal(l.quantity, l.unit_price)?,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        let subtotal = lines
            .iter()
            .try_fold(0i64, |acc, l| acc.checked_add(l.subtotal))?;
        Some(Self {
            lines,
            subtotal,
            currency: currency.to_string(),
        })
    }

    pub fn render(&self) -> String {
        let cur = &self.currency;
        let mut out = String::from("Okay, here's a summary of your order:\n\nItems:\n");
        for line in &self.lines {
            let _ = writeln!(
                out,
                "- {} × {} @ {} {} = {} {}",
                line.name, line.quantity, line.unit_price, cur, line.subtotal, cur
            );
        }
        let _ = write!(
            out,
            "\nSubtotal: {} {}\n\n\
             Once you confirm, we'll add a transport fee and give you the grand total.\n\n\
             Do you confirm the contents of this order?",
            self.subtotal, cur
        );
        out
    }
}

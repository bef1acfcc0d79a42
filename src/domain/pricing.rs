//! Order pricing.
//!
//! Amounts are whole currency units. The transport fee depends only on how
//! many orders the user has confirmed today, counting the one being confirmed.

pub const FEE_TIER_LOW: i64 = 1000;
pub const FEE_TIER_MID: i64 = 2000;
pub const FEE_TIER_HIGH: i64 = 3000;

pub fn transport_fee(confirmed_orders_today: i64) -> i64 {
    match confirmed_orders_today {
        n if n <= 3 => FEE_TIER_LOW,
        n if n <= 6 => FEE_TIER_MID,
        _ => FEE_TIER_HIGH,
    }
}

/// `None` on overflow.
pub fn line_subtotal(quantity: i32, unit_price: i64) -> Option<i64> {
    i64::from(quantity).checked_mul(unit_price)
}

pub fn order_subtotal<I>(lines: I) -> Option<i64>
where
    I: IntoIterator<Item = (i32, i64)>,
{
    lines.into_iter().try_fold(0i64, |acc, (quantity, unit_price)| {
        acc.checked_add(line_subtotal(quantity, unit_price)?)
    })
}

pub fn order_total<I>(lines: I, transport_fee: i64) -> Option<i64>
where
    I: IntoIterator<Item = (i32, i64)>,
{
    order_subtotal(lines)?.checked_add(transport_fee)
}
